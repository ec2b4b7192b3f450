//! Frame pipeline: detections in, confirmed incidents and response actions out.
//!
//! Frame streams are JSON lines, one frame per line:
//!
//! ```text
//! {"frame": 12, "snapshot": "data/snapshots/frame_12.jpg", "detections": [{"class": "knife", "confidence": 0.82, "bbox": [10, 20, 80, 140]}]}
//! ```
//!
//! `snapshot` is optional and defaults to the conventional path under the
//! configured snapshot directory.

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use crate::config::SentinelConfig;
use crate::detect::{CategoryMapper, DetectError, Detection, IncidentConfirmationEngine, IncidentRecord};
use crate::evidence;
use crate::response::{ActionLog, DispatchResponder, Responder};
use crate::storage;
use crate::store::{IncidentStore, SessionState};

/// One frame's worth of detector output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame: u64,
    #[serde(default)]
    pub snapshot: Option<String>,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

/// Outcome of a replay run.
#[derive(Debug, Serialize)]
pub struct ReplaySummary {
    pub frames_processed: u64,
    /// The confirmed incident, with the actions recorded against it.
    pub incident: Option<IncidentRecord>,
    /// Stopped by Ctrl-C before the stream ended.
    pub interrupted: bool,
    pub session: SessionState,
}

pub struct Pipeline {
    engine: IncidentConfirmationEngine,
    action_log: ActionLog,
    responder: Box<dyn Responder>,
    snapshot_dir: PathBuf,
}

/// Open the configured history backend and wrap it in a store.
pub fn open_store(config: &SentinelConfig) -> Result<Arc<IncidentStore>> {
    let backend = storage::open_backend(&config.storage)
        .with_context(|| format!("failed to open storage at {}", config.storage.path.display()))?;
    Ok(Arc::new(IncidentStore::open(
        backend,
        &config.session,
        config.confirmation.short_term_window,
    )))
}

impl Pipeline {
    pub fn new(
        engine: IncidentConfirmationEngine,
        responder: Box<dyn Responder>,
        snapshot_dir: impl Into<PathBuf>,
    ) -> Self {
        let action_log = ActionLog::new(engine.store().clone());
        Self {
            engine,
            action_log,
            responder,
            snapshot_dir: snapshot_dir.into(),
        }
    }

    /// Build the full pipeline described by `config`.
    pub fn from_config(config: &SentinelConfig) -> Result<Self> {
        let store = open_store(config)?;
        let mapper = CategoryMapper::new(config.categories.iter());
        let engine = IncidentConfirmationEngine::from_config(&config.confirmation, mapper, store);
        let responder = DispatchResponder::new(&config.response);
        Ok(Self::new(engine, Box::new(responder), &config.evidence.snapshot_dir))
    }

    pub fn store(&self) -> &Arc<IncidentStore> {
        self.engine.store()
    }

    /// Start a fresh session with no streaks.
    pub fn reset(&mut self) {
        self.engine.reset();
    }

    /// Run one frame through confirmation and, if it confirms, the responder.
    pub fn process(&mut self, frame: &FrameRecord) -> Result<Option<IncidentRecord>, DetectError> {
        let snapshot = match &frame.snapshot {
            Some(reference) => reference.clone(),
            None => evidence::snapshot_reference(&self.snapshot_dir, frame.frame),
        };

        let confirmed = self.engine.run(&frame.detections, frame.frame, &snapshot)?;
        let Some(incident) = confirmed.into_iter().next() else {
            return Ok(None);
        };

        self.action_log.respond(self.responder.as_ref(), &incident)?;
        Ok(self.store().get_by_id(incident.id))
    }

    /// Feed a JSON-lines frame stream through the pipeline.
    ///
    /// Stops at the first confirmed incident, at end of input, or on Ctrl-C.
    pub async fn replay<R>(&mut self, reader: R) -> Result<ReplaySummary>
    where
        R: AsyncBufRead + Unpin,
    {
        self.replay_until(reader, tokio::signal::ctrl_c()).await
    }

    /// Like [`replay`](Pipeline::replay), stopping when `shutdown` resolves
    /// with `Ok`. An `Err` from `shutdown` is logged and replay carries on.
    pub async fn replay_until<R, S>(&mut self, reader: R, shutdown: S) -> Result<ReplaySummary>
    where
        R: AsyncBufRead + Unpin,
        S: Future<Output = io::Result<()>>,
    {
        self.reset();

        let mut lines = reader.lines();
        tokio::pin!(shutdown);
        let mut listening = true;

        let mut frames_processed = 0u64;
        let mut line_no = 0u64;
        let mut last_frame: Option<u64> = None;
        let mut incident = None;
        let mut interrupted = false;

        loop {
            let line = tokio::select! {
                biased;
                signal = &mut shutdown, if listening => match signal {
                    Ok(()) => {
                        info!("Replay stopped by user");
                        interrupted = true;
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Unable to listen for Ctrl-C");
                        listening = false;
                        continue;
                    }
                },
                line = lines.next_line() => line.context("failed to read frame stream")?,
            };

            let Some(line) = line else { break };
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }

            let frame: FrameRecord = serde_json::from_str(&line)
                .map_err(|e| DetectError::MalformedInput(format!("line {line_no}: {e}")))?;

            if let Some(last) = last_frame.filter(|last| frame.frame <= *last) {
                warn!(frame = frame.frame, previous = last, "Frame index did not increase");
            }
            last_frame = Some(frame.frame);

            info!(frame = frame.frame, detections = frame.detections.len(), "Processing frame");
            let confirmed = self.process(&frame)?;
            frames_processed += 1;

            if let Some(record) = confirmed {
                info!(incident_id = record.id, "Incident confirmed, stopping frame processing");
                incident = Some(record);
                break;
            }
        }

        Ok(ReplaySummary {
            frames_processed,
            incident,
            interrupted,
            session: self.store().session(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{StorageBackendKind, StorageConfig};

    fn config(dir: &tempfile::TempDir) -> SentinelConfig {
        SentinelConfig {
            storage: StorageConfig {
                backend: StorageBackendKind::Json,
                path: dir.path().join("history.json"),
            },
            ..SentinelConfig::default()
        }
    }

    fn line(frame: u64, labels: &[&str]) -> String {
        let detections: Vec<Detection> = labels
            .iter()
            .map(|l| Detection::new(*l, 0.75, [0.0, 0.0, 5.0, 5.0]))
            .collect();
        serde_json::to_string(&FrameRecord {
            frame,
            snapshot: None,
            detections,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_replay_stops_at_first_incident() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&dir);
        let mut pipeline = Pipeline::from_config(&cfg).unwrap();

        let input = [
            line(1, &["knife"]),
            line(2, &["knife"]),
            String::new(),
            line(3, &["knife"]),
            line(4, &["knife"]),
        ]
        .join("\n");

        let summary = pipeline.replay(input.as_bytes()).await.unwrap();
        assert_eq!(summary.frames_processed, 3);
        assert!(!summary.interrupted);

        let incident = summary.incident.unwrap();
        assert_eq!(incident.kind, "weapon");
        assert_eq!(incident.snapshot_reference, "data/snapshots/frame_3.jpg");
        let actions: Vec<&str> = incident.actions.iter().map(|a| a.action.as_str()).collect();
        assert_eq!(
            actions,
            vec!["Alert sent to Police", "Local alarm triggered for weapon", "Building admin notified"]
        );
        assert!(summary.session.incident_confirmed);
        assert_eq!(summary.session.current_incident.unwrap(), incident);
    }

    #[tokio::test]
    async fn test_replay_without_incident() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = Pipeline::from_config(&config(&dir)).unwrap();

        let input = [line(1, &["person"]), line(2, &[]), line(3, &["person"])].join("\n");
        let summary = pipeline.replay(input.as_bytes()).await.unwrap();
        assert_eq!(summary.frames_processed, 3);
        assert!(summary.incident.is_none());
        assert!(pipeline.store().is_empty());
    }

    #[tokio::test]
    async fn test_replay_rejects_malformed_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = Pipeline::from_config(&config(&dir)).unwrap();

        let input = format!("{}\n{{\"frame\": 2, \"detections\": [{{\"class\": \"knife\"}}]}}", line(1, &["knife"]));
        let err = pipeline.replay(input.as_bytes()).await.unwrap_err();
        let detect = err.downcast_ref::<DetectError>().unwrap();
        assert!(matches!(detect, DetectError::MalformedInput(msg) if msg.starts_with("line 2")));
    }

    #[tokio::test]
    async fn test_explicit_snapshot_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(&dir);
        cfg.confirmation.required_consecutive_frames = 1;
        let mut pipeline = Pipeline::from_config(&cfg).unwrap();

        let frame = FrameRecord {
            frame: 9,
            snapshot: Some("s3://bucket/frame_9.jpg".to_string()),
            detections: vec![Detection::new("car", 0.6, [0.0; 4])],
        };
        let incident = pipeline.process(&frame).unwrap().unwrap();
        assert_eq!(incident.kind, "accident");
        assert_eq!(incident.snapshot_reference, "s3://bucket/frame_9.jpg");
        assert_eq!(incident.actions[0].action, "Alert sent to Ambulance");
    }

    #[tokio::test]
    async fn test_out_of_order_frames_still_replay() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = Pipeline::from_config(&config(&dir)).unwrap();

        let input = [line(2, &["knife"]), line(1, &["knife"]), line(3, &["knife"])].join("\n");
        let summary = pipeline.replay(input.as_bytes()).await.unwrap();
        assert_eq!(summary.frames_processed, 3);
        assert_eq!(summary.incident.unwrap().kind, "weapon");
        assert!(!summary.interrupted);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_replay() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = Pipeline::from_config(&config(&dir)).unwrap();

        let input = [line(1, &["knife"]), line(2, &["knife"]), line(3, &["knife"])].join("\n");
        let summary = pipeline
            .replay_until(input.as_bytes(), std::future::ready(Ok(())))
            .await
            .unwrap();
        assert!(summary.interrupted);
        assert_eq!(summary.frames_processed, 0);
        assert!(summary.incident.is_none());
        assert!(pipeline.store().is_empty());
    }

    #[tokio::test]
    async fn test_failed_shutdown_listener_keeps_replaying() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = Pipeline::from_config(&config(&dir)).unwrap();

        let input = [line(1, &["knife"]), line(2, &["knife"]), line(3, &["knife"])].join("\n");
        let shutdown = std::future::ready(Err(io::Error::new(io::ErrorKind::Other, "no signal handler")));
        let summary = pipeline.replay_until(input.as_bytes(), shutdown).await.unwrap();
        assert!(!summary.interrupted);
        assert_eq!(summary.frames_processed, 3);
        assert!(summary.incident.is_some());
    }
}
