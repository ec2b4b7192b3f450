use serde::Serialize;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::detect::IncidentRecord;

/// Where a session is in its confirmation lifecycle.
///
/// `Idle -> Confirmed` happens only inside [`super::IncidentStore::confirm`];
/// the way back is an explicit session reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "phase")]
pub enum SessionPhase {
    Idle,
    Confirmed { incident_id: u64 },
}

/// Mutable session bookkeeping owned by the store.
#[derive(Debug)]
pub(crate) struct Session {
    pub(crate) id: Uuid,
    pub(crate) camera_id: String,
    pub(crate) location: String,
    pub(crate) frame_count: u64,
    pub(crate) phase: SessionPhase,
}

impl Session {
    pub(crate) fn new(config: &SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            camera_id: config.camera_id.clone(),
            location: config.location.clone(),
            frame_count: 0,
            phase: SessionPhase::Idle,
        }
    }

    /// Start a fresh logical session on the same camera.
    pub(crate) fn reset(&mut self) {
        self.id = Uuid::new_v4();
        self.frame_count = 0;
        self.phase = SessionPhase::Idle;
    }
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub session_id: Uuid,
    pub camera_id: String,
    pub location: String,
    pub frame_count: u64,
    pub incident_confirmed: bool,
    pub current_incident: Option<IncidentRecord>,
}
