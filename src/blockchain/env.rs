//! Environment overrides.
//!
//! # Responsibilities
//! - Abstract the process environment behind [`EnvSource`] so tests can
//!   inject a fake without touching real process state
//! - Parse raw strings into each semantic type through [`EnvValue`]
//! - Log and swallow malformed values so resolution falls through
//!
//! # Accepted syntax
//! - unsigned integers: decimal
//! - durations: `300ms`, `1.5h`, `2h45m`, `0` (units `ns`, `us`, `µs`, `ms`, `s`, `m`, `h`)
//! - big integers and currency amounts: decimal, or `0x` hex
//! - booleans: `1 t T TRUE true True 0 f F FALSE false False`
//! - addresses: 20-byte hex

use alloy::primitives::{Address, U256};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::blockchain::types::{ChainId, GasEstimatorMode, Link};
use crate::observability::metrics;

/// Source of raw override strings.
pub trait EnvSource: Send + Sync {
    /// Raw value for `key`, or `None` when unset.
    fn get(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// In-memory environment, mostly for tests and tooling.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }
}

impl EnvSource for MapEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// A malformed environment value. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} '{value}' for {key}: {reason}")]
pub struct EnvParseError {
    pub key: String,
    pub value: String,
    pub kind: &'static str,
    pub reason: String,
}

/// A type that can be read from an environment string.
pub trait EnvValue: Sized {
    /// Semantic type name used in error messages.
    const KIND: &'static str;

    fn parse_env(raw: &str) -> Result<Self, String>;
}

macro_rules! unsigned_env_value {
    ($($ty:ty),*) => {
        $(
            impl EnvValue for $ty {
                const KIND: &'static str = "unsigned integer";

                fn parse_env(raw: &str) -> Result<Self, String> {
                    raw.trim().parse::<$ty>().map_err(|e| e.to_string())
                }
            }
        )*
    };
}

unsigned_env_value!(u16, u32, u64);

impl EnvValue for f32 {
    const KIND: &'static str = "float";

    fn parse_env(raw: &str) -> Result<Self, String> {
        let v = raw.trim().parse::<f32>().map_err(|e| e.to_string())?;
        if v.is_finite() {
            Ok(v)
        } else {
            Err("value must be finite".to_string())
        }
    }
}

impl EnvValue for bool {
    const KIND: &'static str = "boolean";

    fn parse_env(raw: &str) -> Result<Self, String> {
        parse_bool(raw)
    }
}

impl EnvValue for String {
    const KIND: &'static str = "string";

    fn parse_env(raw: &str) -> Result<Self, String> {
        Ok(raw.to_string())
    }
}

impl EnvValue for Duration {
    const KIND: &'static str = "duration";

    fn parse_env(raw: &str) -> Result<Self, String> {
        parse_duration(raw)
    }
}

impl EnvValue for U256 {
    const KIND: &'static str = "big integer";

    fn parse_env(raw: &str) -> Result<Self, String> {
        parse_big(raw)
    }
}

impl EnvValue for Link {
    const KIND: &'static str = "currency amount";

    fn parse_env(raw: &str) -> Result<Self, String> {
        parse_big(raw).map(Link)
    }
}

impl EnvValue for Address {
    const KIND: &'static str = "address";

    fn parse_env(raw: &str) -> Result<Self, String> {
        Address::from_str(raw.trim()).map_err(|e| e.to_string())
    }
}

impl EnvValue for GasEstimatorMode {
    const KIND: &'static str = "gas estimator mode";

    fn parse_env(raw: &str) -> Result<Self, String> {
        raw.trim().parse()
    }
}

impl EnvValue for ChainId {
    const KIND: &'static str = "chain id";

    fn parse_env(raw: &str) -> Result<Self, String> {
        raw.parse()
    }
}

/// Read `key` and parse it, reporting malformed values as errors.
pub fn try_lookup<T: EnvValue>(source: &dyn EnvSource, key: &str) -> Result<Option<T>, EnvParseError> {
    let Some(raw) = source.get(key) else {
        return Ok(None);
    };
    T::parse_env(&raw).map(Some).map_err(|reason| EnvParseError {
        key: key.to_string(),
        value: raw,
        kind: T::KIND,
        reason,
    })
}

/// Read `key` and parse it. A malformed value is logged and treated as unset.
pub fn lookup<T: EnvValue>(source: &dyn EnvSource, key: &str) -> Option<T> {
    match try_lookup(source, key) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(
                key = %err.key,
                value = %err.value,
                error = %err,
                "Invalid environment value, falling back to the next configuration source"
            );
            metrics::record_env_parse_failure(key);
            None
        }
    }
}

fn parse_big(raw: &str) -> Result<U256, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('-') {
        return Err("expected a non-negative integer".to_string());
    }
    U256::from_str(trimmed).map_err(|e| e.to_string())
}

/// Boolean spellings accepted by the node's configuration surface.
pub fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.trim() {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        other => Err(format!("'{other}' is not a boolean")),
    }
}

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Parse a duration such as `1h30m`, `1.5s` or `250ms`.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let s = raw.trim();
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    let mut total: u128 = 0;
    let mut rest = s;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration '{s}'"))?;
        let (number, tail) = rest.split_at(num_end);
        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);

        let scale: u128 = match unit {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => NANOS_PER_SEC,
            "m" => 60 * NANOS_PER_SEC,
            "h" => 3_600 * NANOS_PER_SEC,
            _ => return Err(format!("unknown unit '{unit}' in duration '{s}'")),
        };

        let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(format!("invalid duration '{s}'"));
        }
        let int: u128 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| format!("invalid duration '{s}'"))?
        };
        let mut nanos = int
            .checked_mul(scale)
            .ok_or_else(|| format!("duration '{s}' overflows"))?;

        // Digits past 18 cannot change the result at nanosecond precision.
        let frac_digits = &frac_part[..frac_part.len().min(18)];
        if !frac_digits.is_empty() {
            let frac: u128 = frac_digits
                .parse()
                .map_err(|_| format!("invalid duration '{s}'"))?;
            let exp = u32::try_from(frac_digits.len()).unwrap_or(18);
            nanos = nanos
                .checked_add(frac * scale / 10u128.pow(exp))
                .ok_or_else(|| format!("duration '{s}' overflows"))?;
        }

        total = total
            .checked_add(nanos)
            .ok_or_else(|| format!("duration '{s}' overflows"))?;
        rest = tail;
    }

    let secs = u64::try_from(total / NANOS_PER_SEC).map_err(|_| format!("duration '{s}' overflows"))?;
    let sub = u32::try_from(total % NANOS_PER_SEC).unwrap_or(0);
    Ok(Duration::new(secs, sub))
}

/// Format a duration so that [`parse_duration`] reads it back exactly.
pub fn format_duration(d: Duration) -> String {
    if d.is_zero() {
        return "0s".to_string();
    }
    if d.subsec_nanos() != 0 {
        let nanos = d.as_nanos();
        return if nanos % 1_000_000 == 0 {
            format!("{}ms", nanos / 1_000_000)
        } else if nanos % 1_000 == 0 {
            format!("{}us", nanos / 1_000)
        } else {
            format!("{nanos}ns")
        };
    }

    let secs = d.as_secs();
    let (h, m, s) = (secs / 3_600, (secs % 3_600) / 60, secs % 60);
    let mut out = String::new();
    if h > 0 {
        out.push_str(&format!("{h}h"));
    }
    if m > 0 {
        out.push_str(&format!("{m}m"));
    }
    if s > 0 {
        out.push_str(&format!("{s}s"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("300ms").unwrap(), Duration::from_millis(300));
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5_400));
        assert_eq!(parse_duration("2h45m").unwrap(), Duration::from_secs(9_900));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("10us").unwrap(), Duration::from_micros(10));
        assert_eq!(parse_duration("10µs").unwrap(), Duration::from_micros(10));
        assert_eq!(parse_duration(".5s").unwrap(), Duration::from_millis(500));

        for bad in [
            "",
            "10",
            "1x",
            "abc",
            "-1s",
            "1..2s",
            "s",
            "340282366920938463463374607431768211.999us",
        ] {
            assert!(parse_duration(bad).is_err(), "'{bad}' should not parse");
        }
    }

    #[test]
    fn test_format_duration_reads_back() {
        for d in [
            Duration::ZERO,
            Duration::from_secs(1),
            Duration::from_secs(90),
            Duration::from_secs(3_600),
            Duration::from_secs(604_800),
            Duration::from_millis(1_500),
            Duration::from_micros(7),
            Duration::from_nanos(3),
        ] {
            assert_eq!(parse_duration(&format_duration(d)).unwrap(), d);
        }
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_duration(Duration::from_secs(3_600)), "1h");
    }

    #[test]
    fn test_parse_bool() {
        for t in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(parse_bool(t), Ok(true));
        }
        for f in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(parse_bool(f), Ok(false));
        }
        assert!(parse_bool("yes").is_err());
        assert!(parse_bool("").is_err());
    }

    #[test]
    fn test_lookup_falls_through_on_malformed_values() {
        let env = MapEnv::new()
            .with("GOOD", "42")
            .with("BAD", "forty-two")
            .with("BIG", "0x10")
            .with("NEG", "-5");

        assert_eq!(lookup::<u32>(&env, "GOOD"), Some(42));
        assert_eq!(lookup::<u32>(&env, "BAD"), None);
        assert_eq!(lookup::<u32>(&env, "MISSING"), None);
        assert_eq!(lookup::<U256>(&env, "BIG"), Some(U256::from(16)));
        assert_eq!(lookup::<U256>(&env, "NEG"), None);

        let err = try_lookup::<u32>(&env, "BAD").unwrap_err();
        assert_eq!(err.key, "BAD");
        assert_eq!(err.kind, "unsigned integer");
        assert!(err.to_string().contains("forty-two"));
    }

    #[test]
    fn test_typed_values() {
        let env = MapEnv::new()
            .with("ADDR", "0x514910771AF9Ca656af840dff83E8264EcF986CA")
            .with("MODE", "Optimism")
            .with("MODE_BAD", "optimism")
            .with("FLOAT", "1.25")
            .with("FLOAT_BAD", "NaN")
            .with("LINK", "1000000000000000000");

        assert!(lookup::<Address>(&env, "ADDR").is_some());
        assert_eq!(lookup::<GasEstimatorMode>(&env, "MODE"), Some(GasEstimatorMode::Optimism));
        assert_eq!(lookup::<GasEstimatorMode>(&env, "MODE_BAD"), None);
        assert_eq!(lookup::<f32>(&env, "FLOAT"), Some(1.25));
        assert_eq!(lookup::<f32>(&env, "FLOAT_BAD"), None);
        assert_eq!(
            lookup::<Link>(&env, "LINK"),
            Some(Link::from_juels(1_000_000_000_000_000_000))
        );
    }
}
