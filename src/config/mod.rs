use std::io::Result;

use crate::ffi::bindings as b;

pub(crate) mod attr;
mod target;

pub use target::*;

/// Counter options applied to every descriptor built from an event.
///
/// This is the base configuration a [`Session`][crate::session::Session]
/// copies into each counter it resolves.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Opts {
    /// Exclude events with privilege levels.
    ///
    /// For example, if we set [`Priv::kernel`] to `true` here,
    /// events that happen in kernel space will not be counted.
    pub exclude: Priv,

    /// The group must be the only group on the PMU while scheduled.
    ///
    /// Only meaningful for a group leader, the kernel rejects exclusive members.
    pub only_group: bool,

    /// Keep the counter on the PMU at all times.
    ///
    /// Only meaningful for a group leader, the kernel rejects pinned members.
    pub pin_on_pmu: bool,

    /// New child tasks of the target will inherit the counter.
    ///
    /// This applies only to new children, not to any existing children at the time
    /// the counter is attached.
    pub inherit: bool,

    /// Enable the counter on the next [`execve`](https://man7.org/linux/man-pages/man2/execve.2.html)
    /// of the target.
    pub enable_on_exec: bool,

    /// Controls the format of [`Stat`][crate::count::Stat].
    pub stat_format: StatFormat,

    /// Enable counter immediately after the counter is attached.
    pub enable: bool,

    /// Controls the sampling period or frequency written into the attribute block.
    pub sample_on: SampleOn,
}

impl Opts {
    /// Options for counters handed to [`Launcher`][crate::launch::Launcher].
    ///
    /// Counters stay disabled while attached to the waiting child and are
    /// enabled by the kernel when the target program image starts, so the
    /// launcher's own handshake is never counted.
    pub fn for_launch() -> Self {
        Self {
            enable_on_exec: true,
            ..Default::default()
        }
    }
}

/// Privilege levels.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Priv {
    /// User space.
    pub user: bool,

    /// Kernel space.
    pub kernel: bool,

    /// Hypervisor.
    pub hv: bool,

    /// Host mode.
    pub host: bool,

    /// Guest mode.
    pub guest: bool,

    /// Idle task.
    pub idle: bool,
}

/// Controls the format of [`Stat`][crate::count::Stat].
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatFormat {
    /// Contains the [event ID][crate::count::SiblingStat::id].
    pub id: bool,

    /// Contains the [enabled time][crate::count::Stat::time_enabled] of the counter.
    pub time_enabled: bool,

    /// Contains the [running time][crate::count::Stat::time_running] of the counter.
    pub time_running: bool,

    /// Contains [sibling event counts][crate::count::Stat::siblings] when read
    /// from the group leader.
    pub siblings: bool,
}

impl StatFormat {
    pub(crate) fn as_read_format(&self) -> u64 {
        let mut val = 0;
        macro_rules! when {
            ($field:ident, $flag:ident) => {
                if self.$field {
                    val |= b::$flag as u64;
                }
            };
        }
        when!(id, PERF_FORMAT_ID);
        when!(time_enabled, PERF_FORMAT_TOTAL_TIME_ENABLED);
        when!(time_running, PERF_FORMAT_TOTAL_TIME_RUNNING);
        when!(siblings, PERF_FORMAT_GROUP);
        val
    }
}

/// Controls the `sample_period`/`sample_freq` union of the attribute block.
///
/// Defaults to `Count(0)`, which is pure counting mode.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SampleOn {
    /// Sample on frequency (Hz).
    Freq(u64),

    /// Sample on every N event counts.
    Count(u64),
}

impl Default for SampleOn {
    fn default() -> Self {
        Self::Count(0)
    }
}

pub(crate) fn check(opts: &Opts) -> Result<()> {
    // An enabled counter has nothing left for exec to enable.
    if opts.enable && opts.enable_on_exec {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "`enable` and `enable_on_exec` are mutually exclusive",
        ));
    }
    Ok(())
}
