//! `Duration` <-> integer milliseconds, for `#[serde(with = "...")]`.
//!
//! Config files spell delays and deadlines as plain millisecond counts
//! (`base_delay: 100`, `timeout_ms: 5000`).

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    serializer.serialize_u64(millis)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Deadline {
        #[serde(with = "super")]
        after: Duration,
    }

    #[test]
    fn sub_millisecond_precision_is_truncated() {
        let json = serde_json::to_string(&Deadline {
            after: Duration::from_micros(2_750),
        })
        .unwrap();
        assert_eq!(json, r#"{"after":2}"#);
    }

    #[test]
    fn negative_values_are_rejected() {
        assert!(serde_json::from_str::<Deadline>(r#"{"after":-5}"#).is_err());
    }
}
