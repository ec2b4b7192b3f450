//! Session state and long-term incident memory.
//!
//! [`IncidentStore`] is the only owner of the session latch and the incident
//! history. Every mutation runs under one write lock and flushes the full
//! history to its backend before returning. A failed flush rolls the
//! in-memory change back, so memory and disk never disagree.

pub mod session;
pub mod window;

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::SessionConfig;
use crate::detect::{ActionEntry, AnomalyCategory, IncidentRecord};
use crate::storage::{HistoryBackend, StorageError};

pub use self::session::{SessionPhase, SessionState};
pub use self::window::{FrameObservation, ShortTermMemory};

use self::session::Session;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("incident {incident_id} is already confirmed for this session")]
    AlreadyConfirmed { incident_id: u64 },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

struct StoreState {
    session: Session,
    window: ShortTermMemory,
    history: Vec<IncidentRecord>,
}

impl StoreState {
    fn current_incident(&self) -> Option<&IncidentRecord> {
        match self.session.phase {
            SessionPhase::Confirmed { incident_id } => self.history.iter().find(|r| r.id == incident_id),
            SessionPhase::Idle => None,
        }
    }
}

pub struct IncidentStore {
    backend: Box<dyn HistoryBackend>,
    state: RwLock<StoreState>,
}

impl IncidentStore {
    /// Open a store over `backend`, loading whatever history it holds.
    ///
    /// Missing history starts empty. Unreadable or corrupt history is logged
    /// and also starts empty; the next successful flush overwrites it.
    pub fn open(backend: Box<dyn HistoryBackend>, session: &SessionConfig, window_size: usize) -> Self {
        let history = match backend.load() {
            Ok(history) => history,
            Err(e) => {
                warn!(location = %backend.location(), error = %e, "Incident history unreadable, starting with empty history");
                Vec::new()
            }
        };

        if !ids_are_contiguous(&history) {
            warn!(
                location = %backend.location(),
                incidents = history.len(),
                next_id = next_incident_id(&history),
                "Incident history ids are not 1..n, new ids continue after the highest one"
            );
        }

        let session = Session::new(session);
        info!(
            session_id = %session.id,
            camera_id = %session.camera_id,
            incidents = history.len(),
            "Incident store ready"
        );

        Self {
            backend,
            state: RwLock::new(StoreState {
                session,
                window: ShortTermMemory::new(window_size),
                history,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Confirm an incident for the current session.
    ///
    /// Allowed once per session; a second call before [`reset_session`]
    /// is rejected with [`StoreError::AlreadyConfirmed`] and changes nothing.
    ///
    /// [`reset_session`]: IncidentStore::reset_session
    pub fn confirm(
        &self,
        category: AnomalyCategory,
        confidence: f64,
        snapshot_reference: &str,
    ) -> Result<IncidentRecord, StoreError> {
        let mut state = self.write();

        if let SessionPhase::Confirmed { incident_id } = state.session.phase {
            warn!(incident_id, category = %category, "Rejected confirmation: session already has an incident");
            return Err(StoreError::AlreadyConfirmed { incident_id });
        }

        let record = IncidentRecord {
            id: next_incident_id(&state.history),
            kind: category,
            confidence,
            timestamp: chrono::Utc::now(),
            camera_id: state.session.camera_id.clone(),
            location: state.session.location.clone(),
            snapshot_reference: snapshot_reference.to_string(),
            actions: Vec::new(),
        };

        state.history.push(record.clone());
        if let Err(e) = self.backend.save(&state.history) {
            state.history.pop();
            error!(incident_id = record.id, error = %e, "Failed to persist confirmed incident, confirmation rolled back");
            return Err(e.into());
        }

        state.session.phase = SessionPhase::Confirmed { incident_id: record.id };
        info!(
            incident_id = record.id,
            category = %record.kind,
            confidence = record.confidence,
            session_id = %state.session.id,
            "Incident confirmed"
        );
        Ok(record)
    }

    /// Append an action to the current incident and persist it.
    ///
    /// Without a confirmed incident this logs a warning and returns `Ok(None)`.
    pub fn log_action(&self, action: impl Into<String>) -> Result<Option<ActionEntry>, StoreError> {
        let action = action.into();
        let mut state = self.write();

        let SessionPhase::Confirmed { incident_id } = state.session.phase else {
            warn!(%action, "No confirmed incident, action not recorded");
            return Ok(None);
        };
        let Some(pos) = state.history.iter().position(|r| r.id == incident_id) else {
            warn!(incident_id, %action, "Current incident missing from history, action not recorded");
            return Ok(None);
        };

        let entry = ActionEntry::new(action);
        state.history[pos].actions.push(entry.clone());
        if let Err(e) = self.backend.save(&state.history) {
            state.history[pos].actions.pop();
            error!(incident_id, error = %e, "Failed to persist action, action rolled back");
            return Err(e.into());
        }

        info!(incident_id, action = %entry.action, "Action logged");
        Ok(Some(entry))
    }

    /// Add a processed frame to short-term memory.
    pub fn record_frame(&self, observation: FrameObservation) {
        let mut state = self.write();
        state.session.frame_count += 1;
        state.window.push(observation);
    }

    /// Start a new session: clears the latch, the current incident, the
    /// frame counter and short-term memory. Long-term history is untouched.
    pub fn reset_session(&self) {
        let mut state = self.write();
        state.session.reset();
        state.window.clear();
        info!(session_id = %state.session.id, "Session reset");
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn is_confirmed(&self) -> bool {
        matches!(self.read().session.phase, SessionPhase::Confirmed { .. })
    }

    pub fn phase(&self) -> SessionPhase {
        self.read().session.phase
    }

    pub fn session(&self) -> SessionState {
        let state = self.read();
        SessionState {
            session_id: state.session.id,
            camera_id: state.session.camera_id.clone(),
            location: state.session.location.clone(),
            frame_count: state.session.frame_count,
            incident_confirmed: matches!(state.session.phase, SessionPhase::Confirmed { .. }),
            current_incident: state.current_incident().cloned(),
        }
    }

    pub fn current_incident(&self) -> Option<IncidentRecord> {
        self.read().current_incident().cloned()
    }

    /// Short-term memory, oldest frame first.
    pub fn recent_frames(&self) -> Vec<FrameObservation> {
        self.read().window.frames().cloned().collect()
    }

    pub fn get_by_id(&self, id: u64) -> Option<IncidentRecord> {
        self.read().history.iter().find(|r| r.id == id).cloned()
    }

    pub fn get_by_type(&self, kind: &str) -> Vec<IncidentRecord> {
        self.read()
            .history
            .iter()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect()
    }

    pub fn get_all(&self) -> Vec<IncidentRecord> {
        self.read().history.clone()
    }

    pub fn len(&self) -> usize {
        self.read().history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().history.is_empty()
    }

    pub fn storage_location(&self) -> String {
        self.backend.location()
    }
}

/// One past the highest id on record. Equals `len + 1` for well-formed history.
fn next_incident_id(history: &[IncidentRecord]) -> u64 {
    history.iter().map(|r| r.id).max().unwrap_or(0) + 1
}

fn ids_are_contiguous(history: &[IncidentRecord]) -> bool {
    history.iter().zip(1u64..).all(|(r, expected)| r.id == expected)
}
