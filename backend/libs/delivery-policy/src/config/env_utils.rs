//! Key/value configuration sources and parsing helpers
//!
//! Every helper returns `Ok(None)` for an unset key and a
//! `ConfigurationError::InvalidValue` naming the key for a malformed one.
//! Nothing is silently replaced by a default.

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

use crate::error::ConfigurationError;

/// Plain key/value lookup the registry reads overrides from
pub trait ConfigSource {
    /// Raw value for `key`, `None` when unset
    fn get(&self, key: &str) -> Option<String>;
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Process environment, after loading `.env` if one exists
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl EnvSource {
    pub fn new() -> Self {
        dotenv::dotenv().ok();
        Self
    }
}

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Trimmed value, treating an empty string as unset
pub fn read_optional(source: &impl ConfigSource, key: &str) -> Option<String> {
    source
        .get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a value with `FromStr`
///
/// # Example
/// ```ignore
/// let ttl: Option<u64> = parse_optional(&source, "TOKEN_TTL_SECONDS")?;
/// ```
pub fn parse_optional<T>(
    source: &impl ConfigSource,
    key: &str,
) -> Result<Option<T>, ConfigurationError>
where
    T: FromStr,
    T::Err: Display,
{
    match read_optional(source, key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigurationError::invalid_value(key, &raw, e.to_string())),
    }
}

/// Parse a count that must be at least one
pub fn parse_positive<T>(
    source: &impl ConfigSource,
    key: &str,
) -> Result<Option<T>, ConfigurationError>
where
    T: FromStr + Default + PartialEq + Display,
    T::Err: Display,
{
    match parse_optional::<T>(source, key)? {
        Some(value) if value == T::default() => Err(ConfigurationError::invalid_value(
            key,
            &value.to_string(),
            "must be greater than zero",
        )),
        other => Ok(other),
    }
}

/// Parse a size given in megabytes into bytes
pub fn parse_megabytes(
    source: &impl ConfigSource,
    key: &str,
) -> Result<Option<u64>, ConfigurationError> {
    let Some(mb) = parse_positive::<u64>(source, key)? else {
        return Ok(None);
    };
    mb.checked_mul(crate::constants::MB)
        .map(Some)
        .ok_or_else(|| ConfigurationError::invalid_value(key, &mb.to_string(), "too large"))
}

/// Accepts true/false, 1/0, yes/no, on/off (case-insensitive)
pub fn parse_bool(source: &impl ConfigSource, key: &str) -> Result<Option<bool>, ConfigurationError> {
    let Some(raw) = read_optional(source, key) else {
        return Ok(None);
    };
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(Some(true)),
        "false" | "0" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigurationError::invalid_value(key, &raw, "expected a boolean")),
    }
}

/// Comma separated list; blank items are dropped
pub fn parse_list(source: &impl ConfigSource, key: &str) -> Option<Vec<String>> {
    read_optional(source, key).map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_optional() {
        let src = source(&[("PORT", " 8080 "), ("BLANK", "  "), ("BAD", "eighty")]);

        assert_eq!(parse_optional::<u16>(&src, "PORT").unwrap(), Some(8080));
        assert_eq!(parse_optional::<u16>(&src, "BLANK").unwrap(), None);
        assert_eq!(parse_optional::<u16>(&src, "MISSING").unwrap(), None);

        let err = parse_optional::<u16>(&src, "BAD").unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidValue { ref key, .. } if key == "BAD"));
    }

    #[test]
    fn test_parse_positive_rejects_zero() {
        let src = source(&[("COUNT", "0"), ("OK", "2")]);
        assert!(parse_positive::<u32>(&src, "COUNT").is_err());
        assert_eq!(parse_positive::<u32>(&src, "OK").unwrap(), Some(2));
    }

    #[test]
    fn test_parse_megabytes() {
        let src = source(&[("SIZE", "10"), ("HUGE", "18446744073709551615")]);
        assert_eq!(parse_megabytes(&src, "SIZE").unwrap(), Some(10 * 1024 * 1024));
        assert!(parse_megabytes(&src, "HUGE").is_err());
    }

    #[test]
    fn test_parse_bool() {
        let src = source(&[("A", "TRUE"), ("B", "off"), ("C", "sometimes")]);
        assert_eq!(parse_bool(&src, "A").unwrap(), Some(true));
        assert_eq!(parse_bool(&src, "B").unwrap(), Some(false));
        assert!(parse_bool(&src, "C").is_err());
    }

    #[test]
    fn test_parse_list() {
        let src = source(&[("LIST", "a.example.com, ,b.example.com ")]);
        assert_eq!(
            parse_list(&src, "LIST"),
            Some(vec!["a.example.com".to_string(), "b.example.com".to_string()])
        );
        assert_eq!(parse_list(&src, "MISSING"), None);
    }
}
