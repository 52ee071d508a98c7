use crate::ffi::{bindings as b, deref_offset};

/// Counter values read from an attached handle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stat {
    pub count: u64,
    pub id: Option<u64>,
    pub time_enabled: Option<u64>,
    pub time_running: Option<u64>,
    /// Values of the other group members in list order, only filled when
    /// read from the leader with [`StatFormat::siblings`][crate::config::StatFormat::siblings].
    pub siblings: Vec<SiblingStat>,
}

impl Stat {
    // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L344
    // struct read_format {
    //     {
    //         u64 value;
    //         { u64 time_enabled; } && PERF_FORMAT_TOTAL_TIME_ENABLED
    //         { u64 time_running; } && PERF_FORMAT_TOTAL_TIME_RUNNING
    //         { u64 id;           } && PERF_FORMAT_ID
    //     } && !PERF_FORMAT_GROUP
    //     {
    //         u64 nr;
    //         { u64 time_enabled; } && PERF_FORMAT_TOTAL_TIME_ENABLED
    //         { u64 time_running; } && PERF_FORMAT_TOTAL_TIME_RUNNING
    //         {
    //             u64 value;
    //             { u64 id;   } && PERF_FORMAT_ID
    //         } cntr[nr];
    //     } && PERF_FORMAT_GROUP
    // };
    //
    // `ptr` must point to at least `read_buf_size` bytes of a read in this format.
    pub(crate) unsafe fn from_ptr(mut ptr: *const u8, read_format: u64) -> Self {
        let ptr = &mut ptr;

        macro_rules! when {
            ($flag:ident) => {
                (read_format & (b::$flag as u64) > 0).then(|| deref_offset::<u64>(ptr))
            };
        }

        if read_format & b::PERF_FORMAT_GROUP as u64 == 0 {
            let count = deref_offset(ptr);
            let time_enabled = when!(PERF_FORMAT_TOTAL_TIME_ENABLED);
            let time_running = when!(PERF_FORMAT_TOTAL_TIME_RUNNING);
            let id = when!(PERF_FORMAT_ID);

            Self {
                count,
                id,
                time_enabled,
                time_running,
                siblings: vec![],
            }
        } else {
            let nr: u64 = deref_offset(ptr);
            let time_enabled = when!(PERF_FORMAT_TOTAL_TIME_ENABLED);
            let time_running = when!(PERF_FORMAT_TOTAL_TIME_RUNNING);

            let count = deref_offset(ptr);
            let id = when!(PERF_FORMAT_ID);

            let siblings = (1..nr)
                .map(|_| {
                    let count = deref_offset(ptr);
                    let id = when!(PERF_FORMAT_ID);
                    SiblingStat { count, id }
                })
                .collect();

            Self {
                count,
                id,
                time_enabled,
                time_running,
                siblings,
            }
        }
    }

    pub(crate) fn read_buf_size(group_size: usize, read_format: u64) -> usize {
        let mut size = size_of::<u64>();

        macro_rules! when {
            ($flag:ident, $size:expr) => {
                if read_format & b::$flag as u64 > 0 {
                    size += $size;
                }
            };
        }

        when!(PERF_FORMAT_TOTAL_TIME_ENABLED, size_of::<u64>());
        when!(PERF_FORMAT_TOTAL_TIME_RUNNING, size_of::<u64>());
        when!(PERF_FORMAT_GROUP, group_size * size_of::<u64>());
        when!(PERF_FORMAT_ID, group_size * size_of::<u64>());

        size
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SiblingStat {
    pub count: u64,
    pub id: Option<u64>,
}
