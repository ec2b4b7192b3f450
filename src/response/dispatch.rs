use std::collections::BTreeMap;

use super::Responder;
use crate::config::ResponseConfig;
use crate::detect::IncidentRecord;

/// Alerts the service configured for the incident's category.
#[derive(Debug, Clone)]
pub struct DispatchResponder {
    targets: BTreeMap<String, String>,
    default_target: String,
}

impl DispatchResponder {
    pub fn new(config: &ResponseConfig) -> Self {
        Self {
            targets: config.targets.clone(),
            default_target: config.default_target.clone(),
        }
    }

    pub fn target_for(&self, category: &str) -> &str {
        self.targets
            .get(category)
            .map(String::as_str)
            .unwrap_or(&self.default_target)
    }
}

impl Responder for DispatchResponder {
    fn respond(&self, incident: &IncidentRecord) -> Vec<String> {
        let kind = incident.kind.as_str();
        vec![
            format!("Alert sent to {}", self.target_for(kind)),
            format!("Local alarm triggered for {kind}"),
            "Building admin notified".to_string(),
        ]
    }
}
