//! Duration fields in the configuration file.
//!
//! Accepted forms:
//! - humantime: `30s`, `1m 30s`, `2h`
//! - ISO 8601: `PT30S`, `PT1M30S`

use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Parse a duration, trying humantime first and ISO 8601 second.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(d) = humantime::parse_duration(s) {
        return Ok(d);
    }

    if let Some(d) = iso8601_duration::Duration::parse(s)
        .ok()
        .and_then(|d| d.to_std())
    {
        return Ok(d);
    }

    Err(format!(
        "invalid duration '{}': expected humantime (30s) or ISO 8601 (PT30S)",
        s
    ))
}

/// Deserialize a required duration.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(serde::de::Error::custom)
}

/// Deserialize an optional duration. Absent or `null` is `None`.
pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(s) => parse_duration(&s)
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_humantime() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("1m 30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn test_parse_iso8601() {
        assert_eq!(parse_duration("PT30S").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("PT1H").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn test_deserialize_required_and_optional() {
        #[derive(Debug, Deserialize)]
        struct Durations {
            #[serde(deserialize_with = "deserialize")]
            required: Duration,
            #[serde(default, deserialize_with = "deserialize_option")]
            optional: Option<Duration>,
        }

        let parsed: Durations = serde_yml::from_str("required: 5s\n").unwrap();
        assert_eq!(parsed.required, Duration::from_secs(5));
        assert_eq!(parsed.optional, None);

        let parsed: Durations =
            serde_yml::from_str("required: PT2S\noptional: 10s\n").unwrap();
        assert_eq!(parsed.required, Duration::from_secs(2));
        assert_eq!(parsed.optional, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Durations {
            #[serde(deserialize_with = "deserialize")]
            required: Duration,
        }

        assert!(serde_yml::from_str::<Durations>("required: later\n").is_err());
    }
}
