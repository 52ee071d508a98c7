use super::{Generic, ResolveError, Resolver};
use crate::config::Priv;
use crate::event::hw::{Hardware, Op, OpResult, Type};
use crate::event::raw::Raw;
use crate::event::sw::Software;
use crate::event::Event;
use crate::ffi::bindings as b;

#[test]
fn test_resolve_generic_names() {
    let cases = [
        ("cycles", Event::try_from(Hardware::CpuCycle)),
        ("instructions", Event::try_from(Hardware::Instr)),
        ("branches", Event::try_from(Hardware::BranchInstr)),
        ("task-clock", Event::try_from(Software::TaskClock)),
        ("cs", Event::try_from(Software::CtxSwitch)),
    ];
    for (name, event) in cases {
        let resolved = Generic.resolve(name).unwrap();
        assert_eq!(resolved.event, event.unwrap(), "{}", name);
        assert!(resolved.exclude.is_none());
    }
}

#[test]
fn test_resolve_cache_names() {
    let resolved = Generic.resolve("L1-dcache-load-misses").unwrap();
    let expected = Hardware::Cache(Type::L1d, Op::Read, OpResult::Miss);
    assert_eq!(resolved.event, Event::try_from(expected).unwrap());

    let cfg = &resolved.event.0;
    assert_eq!(cfg.ty, b::PERF_TYPE_HW_CACHE as u32);
    let expected = b::PERF_COUNT_HW_CACHE_L1D as u64
        | (b::PERF_COUNT_HW_CACHE_OP_READ as u64) << 8
        | (b::PERF_COUNT_HW_CACHE_RESULT_MISS as u64) << 16;
    assert_eq!(cfg.config, expected);

    let resolved = Generic.resolve("dTLB-stores").unwrap();
    let expected = Hardware::Cache(Type::Dtlb, Op::Write, OpResult::Access);
    assert_eq!(resolved.event, Event::try_from(expected).unwrap());
}

#[test]
fn test_resolve_modifiers() {
    let resolved = Generic.resolve("cycles:u").unwrap();
    let expected = Priv {
        kernel: true,
        hv: true,
        ..Default::default()
    };
    assert_eq!(resolved.exclude, Some(expected));

    let resolved = Generic.resolve("instructions:uk").unwrap();
    let expected = Priv {
        hv: true,
        ..Default::default()
    };
    assert_eq!(resolved.exclude, Some(expected));

    let err = Generic.resolve("cycles:x").unwrap_err();
    assert!(matches!(err, ResolveError::Modifier { modifier: 'x', .. }));
}

#[test]
fn test_resolve_empty_modifiers() {
    let err = Generic.resolve("task-clock:").unwrap_err();
    assert!(matches!(err, ResolveError::Unknown(name) if name == "task-clock:"));
}

#[test]
fn test_resolve_unknown() {
    let err = Generic.resolve("no-such-event").unwrap_err();
    assert!(matches!(err, ResolveError::Unknown(name) if name == "no-such-event"));

    let err = Generic.resolve("L1-dcache-flushes").unwrap_err();
    assert!(matches!(err, ResolveError::Unknown(_)));
}

#[test]
fn test_raw_round_trip() {
    let specs = [
        "raw:0x1c2",
        "raw:1c2,config1=0x3",
        "raw:0xdead,config2=ff,type=8",
        "raw:0X10,type=4,config1=1",
    ];
    for spec in specs {
        let raw: Raw = spec.parse().unwrap();
        let again: Raw = raw.to_string().parse().unwrap();
        assert_eq!(raw, again, "{}", spec);
    }

    let raw: Raw = "raw:0xdead,config2=ff,type=8".parse().unwrap();
    assert_eq!(raw.to_string(), "raw:0xdead,config2=0xff,type=8");
    assert_eq!(Raw::new(0x1c2).to_string(), "raw:0x1c2");
}

#[test]
fn test_raw_malformed() {
    let specs = [
        "0x1c2",
        "raw:",
        "raw:xyz",
        "raw:1,config3=2",
        "raw:1,config1",
        "raw:1,config1=1,config1=2",
        "raw:1,type=0x4",
    ];
    for spec in specs {
        let err = spec.parse::<Raw>().unwrap_err();
        assert!(
            matches!(&err, ResolveError::MalformedRaw { spec: s, .. } if s == spec),
            "{}: {:?}",
            spec,
            err
        );
    }
}
