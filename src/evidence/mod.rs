//! Evidence references and history export.

use std::path::Path;

use anyhow::{Context, Result};

use crate::detect::IncidentRecord;

/// Conventional snapshot location for a frame.
pub fn snapshot_reference(snapshot_dir: &Path, frame_index: u64) -> String {
    snapshot_dir
        .join(format!("frame_{frame_index}.jpg"))
        .display()
        .to_string()
}

/// Write `incidents` to `output` as a pretty-printed JSON array.
pub async fn export_history(incidents: &[IncidentRecord], output: &Path) -> Result<()> {
    let body = serde_json::to_string_pretty(incidents)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    tokio::fs::write(output, body)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;
    tracing::info!(output = %output.display(), count = incidents.len(), "Exported incident history");
    Ok(())
}
