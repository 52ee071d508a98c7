use std::fmt;
use std::str::FromStr;

use super::resolve::ResolveError;
use super::EventConfig;
use crate::ffi::bindings as b;

/// A "raw" implementation-specific event.
///
/// A raw event spec bypasses symbolic lookup and writes the config fields
/// directly:
///
/// ```text
/// raw:<config>[,config1=<config1>][,config2=<config2>][,type=<type>]
/// ```
///
/// Config values are hexadecimal with an optional `0x` prefix, the type is
/// decimal and defaults to `PERF_TYPE_RAW`. [`Display`][fmt::Display] writes
/// the canonical form, which parses back to the same value.
///
/// ```rust
/// use perf_ctrs::event::raw::Raw;
///
/// let raw: Raw = "raw:1c2,config1=0x3".parse().unwrap();
/// assert_eq!(raw.config, 0x1c2);
/// assert_eq!(raw.to_string(), "raw:0x1c2,config1=0x3");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Raw {
    /// PMU type, `PERF_TYPE_RAW` for the core PMU.
    pub ty: u32,
    /// Event config.
    pub config: u64,
    /// Event config1.
    pub config1: u64,
    /// Event config2.
    pub config2: u64,
}

impl Raw {
    pub const PREFIX: &'static str = "raw:";

    pub fn new(config: u64) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }
}

impl Default for Raw {
    fn default() -> Self {
        Self {
            ty: b::PERF_TYPE_RAW as _,
            config: 0,
            config1: 0,
            config2: 0,
        }
    }
}

fn parse_hex(spec: &str, val: &str) -> Result<u64, ResolveError> {
    let digits = val
        .strip_prefix("0x")
        .or_else(|| val.strip_prefix("0X"))
        .unwrap_or(val);
    u64::from_str_radix(digits, 16).map_err(|_| ResolveError::MalformedRaw {
        spec: spec.to_string(),
        reason: "config values must be hexadecimal",
    })
}

impl FromStr for Raw {
    type Err = ResolveError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let malformed = |reason| ResolveError::MalformedRaw {
            spec: spec.to_string(),
            reason,
        };

        let body = spec
            .strip_prefix(Self::PREFIX)
            .ok_or_else(|| malformed("missing `raw:` prefix"))?;
        let mut fields = body.split(',');

        // `split` always yields at least one item.
        let config = fields.next().unwrap_or_default();
        if config.is_empty() {
            return Err(malformed("missing config"));
        }
        let mut raw = Raw::new(parse_hex(spec, config)?);

        let (mut config1, mut config2, mut ty) = (None, None, None);
        for field in fields {
            let (key, val) = field
                .split_once('=')
                .ok_or_else(|| malformed("expected `key=value`"))?;
            let slot = match key {
                "config1" => &mut config1,
                "config2" => &mut config2,
                "type" => {
                    let val = val.parse::<u32>().map_err(|_| malformed("type must be decimal"))?;
                    if ty.replace(val).is_some() {
                        return Err(malformed("duplicate `type`"));
                    }
                    continue;
                }
                _ => return Err(malformed("unknown field")),
            };
            if slot.replace(parse_hex(spec, val)?).is_some() {
                return Err(malformed("duplicate field"));
            }
        }

        raw.config1 = config1.unwrap_or_default();
        raw.config2 = config2.unwrap_or_default();
        if let Some(ty) = ty {
            raw.ty = ty;
        }
        Ok(raw)
    }
}

impl fmt::Display for Raw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:#x}", Self::PREFIX, self.config)?;
        if self.config1 != 0 {
            write!(f, ",config1={:#x}", self.config1)?;
        }
        if self.config2 != 0 {
            write!(f, ",config2={:#x}", self.config2)?;
        }
        if self.ty != b::PERF_TYPE_RAW as u32 {
            write!(f, ",type={}", self.ty)?;
        }
        Ok(())
    }
}

super::try_from!(Raw, value, {
    let event_config = EventConfig {
        ty: value.ty,
        config: value.config,
        config1: value.config1,
        config2: value.config2,
    };
    Ok(Self(event_config))
});
