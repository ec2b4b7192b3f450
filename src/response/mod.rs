//! Response actions taken against a confirmed incident.

pub mod dispatch;

use std::sync::Arc;

use tracing::info;

use crate::detect::{ActionEntry, IncidentRecord};
use crate::store::{IncidentStore, StoreError};

pub use self::dispatch::DispatchResponder;

/// Decides which actions to take for an incident.
pub trait Responder: Send + Sync {
    fn respond(&self, incident: &IncidentRecord) -> Vec<String>;
}

/// Records response actions on the store's current incident.
#[derive(Clone)]
pub struct ActionLog {
    store: Arc<IncidentStore>,
}

impl ActionLog {
    pub fn new(store: Arc<IncidentStore>) -> Self {
        Self { store }
    }

    /// Append one action. `Ok(None)` when no incident is confirmed.
    pub fn append(&self, action: &str) -> Result<Option<ActionEntry>, StoreError> {
        self.store.log_action(action)
    }

    /// Append actions in order; returns how many were recorded.
    pub fn append_all<I, S>(&self, actions: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut recorded = 0;
        for action in actions {
            if self.append(action.as_ref())?.is_some() {
                recorded += 1;
            }
        }
        Ok(recorded)
    }

    /// Ask `responder` what to do about `incident` and record every action.
    pub fn respond(&self, responder: &dyn Responder, incident: &IncidentRecord) -> Result<Vec<String>, StoreError> {
        info!(incident_id = incident.id, category = %incident.kind, "Initiating emergency response");
        let actions = responder.respond(incident);
        for action in &actions {
            info!(incident_id = incident.id, %action, "Action taken");
        }
        self.append_all(&actions)?;
        Ok(actions)
    }
}
