use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detect::Detection;

/// What was seen on one processed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameObservation {
    pub timestamp: DateTime<Utc>,
    pub frame_index: u64,
    pub detections: Vec<Detection>,
    pub snapshot_reference: String,
}

impl FrameObservation {
    pub fn new(frame_index: u64, detections: Vec<Detection>, snapshot_reference: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            frame_index,
            detections,
            snapshot_reference: snapshot_reference.into(),
        }
    }
}

/// Rolling window of the most recent frame observations.
#[derive(Debug)]
pub struct ShortTermMemory {
    frames: VecDeque<FrameObservation>,
    capacity: usize,
}

impl ShortTermMemory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a frame, evicting the oldest one once the window is full.
    pub fn push(&mut self, observation: FrameObservation) {
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(observation);
    }

    /// Oldest first.
    pub fn frames(&self) -> impl Iterator<Item = &FrameObservation> {
        self.frames.iter()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(frame: u64) -> FrameObservation {
        FrameObservation::new(frame, vec![], format!("frame_{frame}.jpg"))
    }

    #[test]
    fn test_evicts_oldest_when_full() {
        let mut w = ShortTermMemory::new(3);
        for f in 1..=5 {
            w.push(obs(f));
        }
        assert_eq!(w.len(), 3);
        let kept: Vec<u64> = w.frames().map(|o| o.frame_index).collect();
        assert_eq!(kept, vec![3, 4, 5]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut w = ShortTermMemory::new(0);
        assert_eq!(w.capacity(), 1);
        w.push(obs(1));
        w.push(obs(2));
        assert_eq!(w.frames().next().unwrap().frame_index, 2);
    }

    #[test]
    fn test_clear() {
        let mut w = ShortTermMemory::new(2);
        w.push(obs(1));
        w.clear();
        assert!(w.is_empty());
    }
}
