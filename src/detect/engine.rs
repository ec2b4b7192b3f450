use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::ConfirmationConfig;
use crate::detect::category::CategoryMapper;
use crate::detect::tracker::ConsecutiveFrameTracker;
use crate::detect::{AnomalyCategory, DetectError, Detection, IncidentRecord};
use crate::store::{FrameObservation, IncidentStore, StoreError};

/// Turns per-frame detections into at most one confirmed incident per session.
pub struct IncidentConfirmationEngine {
    mapper: CategoryMapper,
    tracker: ConsecutiveFrameTracker,
    store: Arc<IncidentStore>,
    required_consecutive_frames: u32,
}

impl IncidentConfirmationEngine {
    pub fn new(mapper: CategoryMapper, store: Arc<IncidentStore>, required_consecutive_frames: u32) -> Self {
        if required_consecutive_frames == 0 {
            warn!("required_consecutive_frames is 0, confirming after a single frame");
        }
        Self {
            mapper,
            tracker: ConsecutiveFrameTracker::new(),
            store,
            required_consecutive_frames: required_consecutive_frames.max(1),
        }
    }

    pub fn from_config(config: &ConfirmationConfig, mapper: CategoryMapper, store: Arc<IncidentStore>) -> Self {
        Self::new(mapper, store, config.required_consecutive_frames)
    }

    pub fn store(&self) -> &Arc<IncidentStore> {
        &self.store
    }

    pub fn mapper(&self) -> &CategoryMapper {
        &self.mapper
    }

    pub fn required_consecutive_frames(&self) -> u32 {
        self.required_consecutive_frames
    }

    /// Current streak for a category.
    pub fn streak(&self, category: &AnomalyCategory) -> u32 {
        self.tracker.count(category)
    }

    /// Process one frame.
    ///
    /// Returns the incidents confirmed on this frame, which is empty or a
    /// single record: when several categories cross the threshold together,
    /// the first one in detection order confirms and the session latch stops
    /// the rest.
    pub fn run(
        &mut self,
        detections: &[Detection],
        frame_index: u64,
        snapshot_reference: &str,
    ) -> Result<Vec<IncidentRecord>, DetectError> {
        // Validate the whole frame before touching any state.
        let mut mapped: Vec<(AnomalyCategory, &Detection)> = Vec::new();
        for (i, detection) in detections.iter().enumerate() {
            detection.validate().map_err(|reason| {
                DetectError::MalformedInput(format!("frame {frame_index}, detection {i}: {reason}"))
            })?;
            if let Some(category) = self.mapper.map(&detection.category) {
                mapped.push((category, detection));
            }
        }

        let present: HashSet<AnomalyCategory> = mapped.iter().map(|(c, _)| c.clone()).collect();

        self.store.record_frame(FrameObservation::new(
            frame_index,
            detections.to_vec(),
            snapshot_reference,
        ));
        let counts = self.tracker.observe(&present);

        let mut seen: HashSet<&AnomalyCategory> = HashSet::new();
        let mut confirmed = Vec::new();

        for (category, detection) in &mapped {
            // The first detection of a category in the frame speaks for it.
            if !seen.insert(category) {
                continue;
            }

            let count = counts.get(category).copied().unwrap_or(0);
            debug!(frame = frame_index, category = %category, count, "Potential anomaly");

            if count < self.required_consecutive_frames || self.store.is_confirmed() {
                continue;
            }

            info!(frame = frame_index, category = %category, count, "Consecutive-frame threshold reached");
            match self
                .store
                .confirm(category.clone(), detection.confidence, snapshot_reference)
            {
                Ok(record) => confirmed.push(record),
                Err(StoreError::AlreadyConfirmed { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(confirmed)
    }

    /// Forget all streaks and start a new store session.
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.store.reset_session();
    }
}
