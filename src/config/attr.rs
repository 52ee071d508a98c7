use std::io::Result;

use super::{check, Opts, SampleOn};
use crate::event::EventConfig;
use crate::ffi::Attr;

pub(crate) fn from(event_cfg: EventConfig, opts: &Opts) -> Result<Attr> {
    check(opts)?;

    let mut attr = Attr {
        size: size_of::<Attr>() as _,
        ..Default::default()
    };

    // event config:

    attr.type_ = event_cfg.ty;
    attr.config = event_cfg.config;
    attr.__bindgen_anon_3.config1 = event_cfg.config1;
    attr.__bindgen_anon_4.config2 = event_cfg.config2;

    // count config:

    macro_rules! then {
        ($then:tt) => {
            attr.$then(1)
        };
    }
    macro_rules! when {
        ($bool:ident, $then:tt) => {
            if opts.exclude.$bool {
                then!($then);
            }
        };
    }
    when!(user, set_exclude_user);
    when!(kernel, set_exclude_kernel);
    when!(hv, set_exclude_hv);
    when!(host, set_exclude_host);
    when!(guest, set_exclude_guest);
    when!(idle, set_exclude_idle);

    attr.set_exclusive(opts.only_group as _);
    attr.set_pinned(opts.pin_on_pmu as _);
    attr.set_inherit(opts.inherit as _);
    attr.set_enable_on_exec(opts.enable_on_exec as _);

    attr.read_format = opts.stat_format.as_read_format();
    attr.set_disabled(!opts.enable as _);

    // sample config:

    match opts.sample_on {
        SampleOn::Freq(val) => {
            then!(set_freq);
            attr.__bindgen_anon_1.sample_freq = val;
        }
        SampleOn::Count(val) => {
            attr.__bindgen_anon_1.sample_period = val;
        }
    }

    Ok(attr)
}
