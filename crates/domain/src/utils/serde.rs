//! Serialization utilities for configuration durations.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Serde adapter storing a [`Duration`] as whole milliseconds.
///
/// # Usage
/// ```rust
/// use std::time::Duration;
///
/// use serde::{Deserialize, Serialize};
/// use zsdk_domain::utils::duration_millis;
///
/// #[derive(Serialize, Deserialize)]
/// struct Example {
///     #[serde(with = "duration_millis")]
///     timeout: Duration,
/// }
/// ```
pub mod duration_millis {
    use super::*;

    type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

    /// Serialize a Duration as milliseconds (u64)
    pub fn serialize<S>(duration: &Duration, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    /// Deserialize milliseconds (u64) into a Duration
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Timeouts {
        #[serde(with = "duration_millis")]
        wait: Duration,
    }

    #[test]
    fn test_duration_millis_serialize() {
        let json = serde_json::to_string(&Timeouts { wait: Duration::from_millis(2500) })
            .expect("should serialize");
        assert_eq!(json, r#"{"wait":2500}"#);
    }

    #[test]
    fn test_duration_millis_deserialize() {
        let parsed: Timeouts = serde_json::from_str(r#"{"wait":0}"#).expect("should parse");
        assert_eq!(parsed.wait, Duration::ZERO);
    }
}
