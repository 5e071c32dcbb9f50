use std::collections::{HashMap, HashSet};

use super::base::{Category, SeriesLabels};

pub type SeriesKey = (Category, SeriesLabels);

/// Remembers every series the exporter has written and how many successful
/// cycles have passed since each was last written.
///
/// With `stale_after == 0` nothing is ever pruned and series for deleted
/// pods keep their last value until the process restarts.
#[derive(Debug, Default)]
pub struct SeriesTracker {
    stale_after: u32,
    missed: HashMap<SeriesKey, u32>,
    touched: HashSet<SeriesKey>,
}

impl SeriesTracker {
    pub fn new(stale_after: u32) -> Self {
        Self {
            stale_after,
            ..Default::default()
        }
    }

    pub fn touch(&mut self, category: Category, labels: &SeriesLabels) {
        let key = (category, labels.clone());
        if self.stale_after > 0 {
            self.touched.insert(key.clone());
        }
        self.missed.insert(key, 0);
    }

    pub fn contains(&self, category: Category, labels: &SeriesLabels) -> bool {
        self.missed.contains_key(&(category, labels.clone()))
    }

    pub fn len(&self) -> usize {
        self.missed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.missed.is_empty()
    }

    /// Closes a successful cycle and returns the series to drop.
    pub fn finish_cycle(&mut self) -> Vec<SeriesKey> {
        if self.stale_after == 0 {
            return Vec::new();
        }

        let touched = std::mem::take(&mut self.touched);
        let mut expired = Vec::new();
        for (key, missed) in self.missed.iter_mut() {
            if touched.contains(key) {
                continue;
            }
            *missed += 1;
            if *missed >= self.stale_after {
                expired.push(key.clone());
            }
        }
        for key in &expired {
            self.missed.remove(key);
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pod: &str) -> SeriesLabels {
        SeriesLabels::pod(pod, "default", "n1", None)
    }

    #[test]
    fn test_never_prunes_when_disabled() {
        let mut tracker = SeriesTracker::new(0);
        tracker.touch(Category::EphemeralStorage, &labels("web-0"));

        for _ in 0..10 {
            assert!(tracker.finish_cycle().is_empty());
        }
        assert!(tracker.contains(Category::EphemeralStorage, &labels("web-0")));
    }

    #[test]
    fn test_prunes_after_consecutive_misses() {
        let mut tracker = SeriesTracker::new(2);
        tracker.touch(Category::EphemeralStorage, &labels("web-0"));
        tracker.touch(Category::EphemeralStorage, &labels("web-1"));
        assert!(tracker.finish_cycle().is_empty());

        // web-1 disappears
        tracker.touch(Category::EphemeralStorage, &labels("web-0"));
        assert!(tracker.finish_cycle().is_empty());

        tracker.touch(Category::EphemeralStorage, &labels("web-0"));
        let expired = tracker.finish_cycle();
        assert_eq!(expired, vec![(Category::EphemeralStorage, labels("web-1"))]);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_touch_resets_miss_count() {
        let mut tracker = SeriesTracker::new(2);
        tracker.touch(Category::PodVolume, &labels("web-0"));
        assert!(tracker.finish_cycle().is_empty());
        assert!(tracker.finish_cycle().is_empty());

        // seen again just before it would expire
        tracker.touch(Category::PodVolume, &labels("web-0"));
        assert!(tracker.finish_cycle().is_empty());
        assert!(tracker.finish_cycle().is_empty());
        assert_eq!(tracker.finish_cycle().len(), 1);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_keys_are_scoped_by_category() {
        let mut tracker = SeriesTracker::new(1);
        tracker.touch(Category::ContainerRootfs, &labels("web-0").with_object("app"));
        tracker.touch(Category::ContainerLogs, &labels("web-0").with_object("app"));
        tracker.finish_cycle();

        tracker.touch(Category::ContainerRootfs, &labels("web-0").with_object("app"));
        let expired = tracker.finish_cycle();
        assert_eq!(
            expired,
            vec![(Category::ContainerLogs, labels("web-0").with_object("app"))]
        );
    }
}
