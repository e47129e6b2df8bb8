// Serde helpers for report output.
// Latencies are written as integer microseconds so JSON/TSV consumers
// never have to decode serde's {secs, nanos} struct form.

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

/// Serialize a Duration as whole microseconds
pub fn serialize_micros<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(d.as_micros().min(u64::MAX as u128) as u64)
}

/// Deserialize whole microseconds into a Duration
pub fn deserialize_micros<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let us = u64::deserialize(deserializer)?;
    Ok(Duration::from_micros(us))
}

/// `#[serde(with = "duration_micros")]` form of the two functions above
pub mod duration_micros {
    pub use super::deserialize_micros as deserialize;
    pub use super::serialize_micros as serialize;
}
