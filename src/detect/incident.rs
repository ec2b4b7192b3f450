use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AnomalyCategory;

/// A confirmed incident as kept in long-term memory.
///
/// Field names on the wire match the historical `incident_history.json`
/// layout (`type`, `snapshot_path`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentRecord {
    /// 1-based position in long-term memory at creation time.
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: AnomalyCategory,
    pub confidence: f64,
    #[serde(with = "iso8601")]
    pub timestamp: DateTime<Utc>,
    pub camera_id: String,
    pub location: String,
    #[serde(rename = "snapshot_path")]
    pub snapshot_reference: String,
    #[serde(default)]
    pub actions: Vec<ActionEntry>,
}

/// A response action taken against an incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEntry {
    pub action: String,
    #[serde(with = "iso8601")]
    pub timestamp: DateTime<Utc>,
}

impl ActionEntry {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            timestamp: Utc::now(),
        }
    }
}

/// ISO-8601 timestamps.
///
/// Written as RFC 3339. Older history files carry naive local timestamps
/// (`2024-05-01T10:15:30.123456`); those are read as local time.
pub mod iso8601 {
    use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Ok(ts.with_timezone(&Utc));
        }
        let naive: NaiveDateTime = raw
            .parse()
            .map_err(|e| format!("invalid timestamp {raw:?}: {e}"))?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|ts| ts.with_timezone(&Utc))
            .ok_or_else(|| format!("timestamp {raw:?} does not exist in the local timezone"))
    }
}
