use std::collections::{HashMap, HashSet};

use super::AnomalyCategory;

/// Counts, per category, how many frames in a row it has been observed.
#[derive(Debug, Default)]
pub struct ConsecutiveFrameTracker {
    counts: HashMap<AnomalyCategory, u32>,
}

impl ConsecutiveFrameTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one frame into the counters and return the updated counts.
    ///
    /// Present categories go up by one; every tracked category missing from
    /// `present` drops back to zero.
    pub fn observe(&mut self, present: &HashSet<AnomalyCategory>) -> &HashMap<AnomalyCategory, u32> {
        for (category, count) in self.counts.iter_mut() {
            if !present.contains(category) {
                *count = 0;
            }
        }
        for category in present {
            *self.counts.entry(category.clone()).or_insert(0) += 1;
        }
        &self.counts
    }

    /// Current streak for `category`; zero if never seen.
    pub fn count(&self, category: &AnomalyCategory) -> u32 {
        self.counts.get(category).copied().unwrap_or(0)
    }

    pub fn reset(&mut self) {
        self.counts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cat(name: &str) -> AnomalyCategory {
        AnomalyCategory::new(name)
    }

    fn frame(names: &[&str]) -> HashSet<AnomalyCategory> {
        names.iter().map(|n| cat(n)).collect()
    }

    #[test]
    fn test_increments_while_present() {
        let mut t = ConsecutiveFrameTracker::new();
        for expected in 1..=4 {
            let counts = t.observe(&frame(&["fire"]));
            assert_eq!(counts[&cat("fire")], expected);
        }
    }

    #[test]
    fn test_absence_resets_to_zero() {
        let mut t = ConsecutiveFrameTracker::new();
        t.observe(&frame(&["fire", "smoke"]));
        t.observe(&frame(&["fire", "smoke"]));
        let counts = t.observe(&frame(&["smoke"]));
        assert_eq!(counts[&cat("fire")], 0);
        assert_eq!(counts[&cat("smoke")], 3);

        t.observe(&frame(&["fire"]));
        assert_eq!(t.count(&cat("fire")), 1);
        assert_eq!(t.count(&cat("smoke")), 0);
    }

    #[test]
    fn test_unseen_category_reads_zero() {
        let mut t = ConsecutiveFrameTracker::new();
        let counts = t.observe(&frame(&[]));
        assert!(counts.is_empty());
        assert_eq!(t.count(&cat("weapon")), 0);
    }

    #[test]
    fn test_count_matches_longest_present_suffix() {
        let frames: Vec<&[&str]> = vec![
            &["fire"],
            &["fire", "weapon"],
            &[],
            &["weapon"],
            &["fire", "weapon"],
            &["fire", "weapon"],
        ];

        let mut t = ConsecutiveFrameTracker::new();
        for (k, names) in frames.iter().enumerate() {
            t.observe(&frame(names));
            for c in ["fire", "weapon"] {
                let suffix = frames[..=k]
                    .iter()
                    .rev()
                    .take_while(|f| f.contains(&c))
                    .count() as u32;
                assert_eq!(t.count(&cat(c)), suffix, "category {c} at frame {k}");
            }
        }
    }

    #[test]
    fn test_reset_forgets_everything() {
        let mut t = ConsecutiveFrameTracker::new();
        t.observe(&frame(&["fire"]));
        t.reset();
        assert_eq!(t.count(&cat("fire")), 0);
    }
}
