//! cctvsentinel -- debounced incident confirmation for CCTV detection streams.
//!
//! Per-frame object detections are mapped to anomaly categories, debounced
//! over consecutive frames, and confirmed into a durable incident history
//! together with the response actions taken against each incident.

pub mod config;
pub mod detect;
pub mod evidence;
pub mod pipeline;
pub mod response;
pub mod storage;
pub mod store;

use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::BufReader;

use crate::config::SentinelConfig;
use crate::pipeline::{Pipeline, ReplaySummary};

/// Replay a JSON-lines frame stream from `input` (`-` for stdin).
pub async fn replay(config: &SentinelConfig, input: &str) -> Result<ReplaySummary> {
    tracing::info!(%input, "Starting frame replay");
    let mut pipeline = Pipeline::from_config(config)?;

    let summary = if input == "-" {
        pipeline.replay(BufReader::new(tokio::io::stdin())).await?
    } else {
        let path = Path::new(input);
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("failed to open frame stream {}", path.display()))?;
        pipeline.replay(BufReader::new(file)).await?
    };

    tracing::info!(
        frames = summary.frames_processed,
        incident = ?summary.incident.as_ref().map(|i| i.id),
        "Frame replay finished"
    );
    Ok(summary)
}
