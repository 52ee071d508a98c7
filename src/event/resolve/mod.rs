#[cfg(test)]
mod test;

use std::io;

use thiserror::Error;

use super::hw::{Hardware, Op, OpResult, Type};
use super::sw::Software;
use super::Event;
use crate::config::Priv;

/// Failure to turn an event specification into an attribute block.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unknown event: {0}")]
    Unknown(String),
    #[error("unknown modifier {modifier:?} in event: {name}")]
    Modifier { name: String, modifier: char },
    #[error("malformed raw event spec {spec:?}: {reason}")]
    MalformedRaw { spec: String, reason: &'static str },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result of a symbolic lookup.
#[derive(Clone, Debug)]
pub struct Resolved {
    pub event: Event,
    /// Privilege levels to exclude instead of the base options, set when the
    /// name carried modifiers such as `:u`.
    pub exclude: Option<Priv>,
}

/// Looks up symbolic event names.
///
/// Implement this to plug in an event table such as libpfm's,
/// [`Generic`] knows the names every Linux kernel provides.
pub trait Resolver {
    fn resolve(&self, name: &str) -> Result<Resolved, ResolveError>;
}

impl<R: Resolver + ?Sized> Resolver for &R {
    fn resolve(&self, name: &str) -> Result<Resolved, ResolveError> {
        (**self).resolve(name)
    }
}

/// Resolver for the generic hardware, software and hardware-cache event names
/// used by `perf list`, e.g. `instructions`, `task-clock:u`, `L1-dcache-load-misses`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Generic;

impl Resolver for Generic {
    fn resolve(&self, name: &str) -> Result<Resolved, ResolveError> {
        let (base, modifiers) = match name.split_once(':') {
            Some((base, modifiers)) => (base, Some(modifiers)),
            None => (name, None),
        };

        let event = match generic(base) {
            Some(Named::Hw(hw)) => Event::try_from(hw)?,
            Some(Named::Sw(sw)) => Event::try_from(sw)?,
            None => match cache(base) {
                Some(hw) => Event::try_from(hw)?,
                None => return Err(ResolveError::Unknown(name.to_string())),
            },
        };

        let exclude = match modifiers {
            Some(modifiers) => Some(exclude(name, modifiers)?),
            None => None,
        };

        Ok(Resolved { event, exclude })
    }
}

enum Named {
    Hw(Hardware),
    Sw(Software),
}

fn generic(name: &str) -> Option<Named> {
    use Named::{Hw, Sw};

    let it = match name {
        "cpu-cycles" | "cycles" => Hw(Hardware::CpuCycle),
        "instructions" => Hw(Hardware::Instr),
        "cache-references" => Hw(Hardware::CacheAccess),
        "cache-misses" => Hw(Hardware::CacheMiss),
        "branch-instructions" | "branches" => Hw(Hardware::BranchInstr),
        "branch-misses" => Hw(Hardware::BranchMiss),
        "bus-cycles" => Hw(Hardware::BusCycle),
        "stalled-cycles-frontend" | "idle-cycles-frontend" => Hw(Hardware::FrontendStalledCycle),
        "stalled-cycles-backend" | "idle-cycles-backend" => Hw(Hardware::BackendStalledCycle),
        "ref-cycles" => Hw(Hardware::RefCpuCycle),

        "cpu-clock" => Sw(Software::CpuClock),
        "task-clock" => Sw(Software::TaskClock),
        "page-faults" | "faults" => Sw(Software::PageFault),
        "minor-faults" => Sw(Software::MinorPageFault),
        "major-faults" => Sw(Software::MajorPageFault),
        "context-switches" | "cs" => Sw(Software::CtxSwitch),
        "cpu-migrations" | "migrations" => Sw(Software::CpuMigration),
        "alignment-faults" => Sw(Software::AlignFault),
        "emulation-faults" => Sw(Software::EmuFault),
        "dummy" => Sw(Software::Dummy),
        "bpf-output" => Sw(Software::BpfOutput),
        _ => return None,
    };
    Some(it)
}

// `<cache>-<op>s` counts accesses, `<cache>-<op>-misses` counts misses.
fn cache(name: &str) -> Option<Hardware> {
    const CACHES: [(&str, Type); 7] = [
        ("L1-dcache-", Type::L1d),
        ("L1-icache-", Type::L1i),
        ("LLC-", Type::Ll),
        ("dTLB-", Type::Dtlb),
        ("iTLB-", Type::Itlb),
        ("branch-", Type::Bpu),
        ("node-", Type::Node),
    ];

    let (ty, rest) = CACHES
        .iter()
        .find_map(|(prefix, ty)| name.strip_prefix(prefix).map(|rest| (*ty, rest)))?;

    let (op, result) = match rest {
        "loads" => (Op::Read, OpResult::Access),
        "load-misses" => (Op::Read, OpResult::Miss),
        "stores" => (Op::Write, OpResult::Access),
        "store-misses" => (Op::Write, OpResult::Miss),
        "prefetches" => (Op::Prefetch, OpResult::Access),
        "prefetch-misses" => (Op::Prefetch, OpResult::Miss),
        _ => return None,
    };

    Some(Hardware::Cache(ty, op, result))
}

// Listed levels are counted, every other level among `u`, `k` and `h` is excluded.
fn exclude(name: &str, modifiers: &str) -> Result<Priv, ResolveError> {
    if modifiers.is_empty() {
        return Err(ResolveError::Unknown(name.to_string()));
    }

    let (mut user, mut kernel, mut hv) = (false, false, false);
    for modifier in modifiers.chars() {
        match modifier {
            'u' => user = true,
            'k' => kernel = true,
            'h' => hv = true,
            _ => {
                return Err(ResolveError::Modifier {
                    name: name.to_string(),
                    modifier,
                })
            }
        }
    }

    Ok(Priv {
        user: !user,
        kernel: !kernel,
        hv: !hv,
        ..Default::default()
    })
}
