//! Per-frame detections, consecutive-frame tracking and incident confirmation.

pub mod category;
pub mod engine;
pub mod incident;
pub mod tracker;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::store::StoreError;

pub use self::category::CategoryMapper;
pub use self::engine::IncidentConfirmationEngine;
pub use self::incident::{ActionEntry, IncidentRecord};
pub use self::tracker::ConsecutiveFrameTracker;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One object-detector hit for a single frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Raw detector label, e.g. "person" or "knife".
    #[serde(alias = "class")]
    pub category: String,
    pub confidence: f64,
    /// x1, y1, x2, y2 in frame pixels.
    pub bbox: [f64; 4],
}

impl Detection {
    pub fn new(category: impl Into<String>, confidence: f64, bbox: [f64; 4]) -> Self {
        Self {
            category: category.into(),
            confidence,
            bbox,
        }
    }

    /// Check the fields the confirmation logic relies on.
    pub fn validate(&self) -> Result<(), String> {
        if self.category.trim().is_empty() {
            return Err("empty category label".to_string());
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!("confidence {} outside [0, 1]", self.confidence));
        }
        if self.bbox.iter().any(|v| !v.is_finite()) {
            return Err(format!("non-finite bounding box {:?}", self.bbox));
        }
        Ok(())
    }
}

/// Normalized incident type (fire, weapon, ...).
///
/// Cheap to clone; instances handed out by a [`CategoryMapper`] share storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnomalyCategory(Arc<str>);

impl AnomalyCategory {
    pub(crate) fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnomalyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl PartialEq<str> for AnomalyCategory {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for AnomalyCategory {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl Serialize for AnomalyCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for AnomalyCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self(Arc::from(name)))
    }
}
