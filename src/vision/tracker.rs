//! Centroid tracking and line-crossing counting.
//!
//! The tracker associates detections across frames by nearest centroid
//! with a distance gate; tracks that go unseen for a few frames are
//! dropped. The counter increments when a track's center moves from
//! above the counting line to on or below it.

use std::collections::HashMap;

/// Association gate in pixels.
const DEFAULT_MAX_DISTANCE: f32 = 80.0;
/// Frames a track may go unseen before it is dropped.
const DEFAULT_MAX_MISSES: u32 = 5;

struct Track {
    center: (f32, f32),
    misses: u32,
}

pub struct CentroidTracker {
    next_id: u32,
    tracks: HashMap<u32, Track>,
    max_distance: f32,
    max_misses: u32,
}

impl Default for CentroidTracker {
    fn default() -> CentroidTracker {
        CentroidTracker::new(DEFAULT_MAX_DISTANCE, DEFAULT_MAX_MISSES)
    }
}

impl CentroidTracker {
    pub fn new(max_distance: f32, max_misses: u32) -> CentroidTracker {
        CentroidTracker {
            next_id: 0,
            tracks: HashMap::new(),
            max_distance,
            max_misses,
        }
    }

    /// Feed one frame of detection centers; returns `(track_id, center)`
    /// for every detection, existing tracks matched greedily by distance.
    pub fn update(&mut self, centers: &[(f32, f32)]) -> Vec<(u32, (f32, f32))> {
        // all candidate pairs inside the gate, closest first
        let mut candidates: Vec<(f32, u32, usize)> = Vec::new();
        for (&id, track) in &self.tracks {
            for (index, &center) in centers.iter().enumerate() {
                let d = distance(track.center, center);
                if d <= self.max_distance {
                    candidates.push((d, id, index));
                }
            }
        }
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut matched_tracks: HashMap<u32, usize> = HashMap::new();
        let mut matched_detections = vec![false; centers.len()];
        for (_, id, index) in candidates {
            if matched_tracks.contains_key(&id) || matched_detections[index] {
                continue;
            }
            matched_tracks.insert(id, index);
            matched_detections[index] = true;
        }

        let mut assignments = vec![None; centers.len()];
        for (id, index) in &matched_tracks {
            let track = self.tracks.get_mut(id).expect("matched track exists");
            track.center = centers[*index];
            track.misses = 0;
            assignments[*index] = Some(*id);
        }

        // unseen tracks age out
        let max_misses = self.max_misses;
        self.tracks.retain(|id, track| {
            if matched_tracks.contains_key(id) {
                return true;
            }
            track.misses += 1;
            track.misses <= max_misses
        });

        // unmatched detections start new tracks
        for (index, assignment) in assignments.iter_mut().enumerate() {
            if assignment.is_none() {
                let id = self.next_id;
                self.next_id += 1;
                self.tracks.insert(
                    id,
                    Track {
                        center: centers[index],
                        misses: 0,
                    },
                );
                *assignment = Some(id);
            }
        }

        assignments
            .into_iter()
            .enumerate()
            .map(|(index, id)| (id.expect("every detection assigned"), centers[index]))
            .collect()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.tracks.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx * dx + dy * dy).sqrt()
}

pub struct LineCounter {
    line_y: f32,
    count: u32,
    last_y: HashMap<u32, f32>,
}

impl LineCounter {
    pub fn new(line_y: f32) -> LineCounter {
        LineCounter {
            line_y,
            count: 0,
            last_y: HashMap::new(),
        }
    }

    /// Feed one frame of tracked centers; returns how many tracks crossed
    /// the line downward in this frame.
    pub fn observe(&mut self, tracks: &[(u32, (f32, f32))]) -> u32 {
        let mut crossings = 0;
        for &(id, (_, cy)) in tracks {
            // a track's first observation can never cross
            let prev = self.last_y.get(&id).copied().unwrap_or(cy);
            if prev < self.line_y && cy >= self.line_y {
                crossings += 1;
            }
            self.last_y.insert(id, cy);
        }
        self.count += crossings;
        crossings
    }

    /// Drop position history for tracks the tracker no longer knows.
    pub fn prune(&mut self, tracker: &CentroidTracker) {
        self.last_y.retain(|id, _| tracker.contains(*id));
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn line_y(&self) -> f32 {
        self.line_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_keeps_id_across_small_motion() {
        let mut tracker = CentroidTracker::default();
        let first = tracker.update(&[(100.0, 100.0)]);
        let second = tracker.update(&[(110.0, 120.0)]);
        assert_eq!(first[0].0, second[0].0);
    }

    #[test]
    fn distant_detection_gets_new_id() {
        let mut tracker = CentroidTracker::default();
        let first = tracker.update(&[(100.0, 100.0)]);
        let second = tracker.update(&[(400.0, 400.0)]);
        assert_ne!(first[0].0, second[0].0);
    }

    #[test]
    fn track_expires_after_misses() {
        let mut tracker = CentroidTracker::new(80.0, 2);
        let id = tracker.update(&[(100.0, 100.0)])[0].0;
        for _ in 0..3 {
            tracker.update(&[]);
        }
        assert!(!tracker.contains(id));
        assert!(tracker.is_empty());
    }

    #[test]
    fn two_people_keep_distinct_ids() {
        let mut tracker = CentroidTracker::default();
        let frame1 = tracker.update(&[(100.0, 100.0), (500.0, 100.0)]);
        let frame2 = tracker.update(&[(505.0, 110.0), (105.0, 110.0)]);

        // same ids, matched by proximity regardless of detection order
        let left1 = frame1.iter().find(|(_, c)| c.0 < 300.0).unwrap().0;
        let left2 = frame2.iter().find(|(_, c)| c.0 < 300.0).unwrap().0;
        assert_eq!(left1, left2);
    }

    #[test]
    fn downward_crossing_counts_once() {
        let mut counter = LineCounter::new(240.0);
        let id = 7;
        assert_eq!(counter.observe(&[(id, (100.0, 200.0))]), 0);
        assert_eq!(counter.observe(&[(id, (100.0, 250.0))]), 1);
        // staying below the line does not recount
        assert_eq!(counter.observe(&[(id, (100.0, 300.0))]), 0);
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn upward_crossing_does_not_count() {
        let mut counter = LineCounter::new(240.0);
        counter.observe(&[(1, (100.0, 300.0))]);
        assert_eq!(counter.observe(&[(1, (100.0, 200.0))]), 0);
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn first_observation_below_line_does_not_count() {
        let mut counter = LineCounter::new(240.0);
        assert_eq!(counter.observe(&[(3, (100.0, 250.0))]), 0);
    }

    #[test]
    fn recrossing_after_going_back_up_counts_again() {
        let mut counter = LineCounter::new(240.0);
        counter.observe(&[(1, (0.0, 200.0))]);
        counter.observe(&[(1, (0.0, 260.0))]);
        counter.observe(&[(1, (0.0, 200.0))]);
        counter.observe(&[(1, (0.0, 260.0))]);
        assert_eq!(counter.count(), 2);
    }

    #[test]
    fn prune_drops_dead_track_history() {
        let mut tracker = CentroidTracker::new(80.0, 0);
        let mut counter = LineCounter::new(240.0);

        let id = tracker.update(&[(100.0, 200.0)])[0].0;
        counter.observe(&[(id, (100.0, 200.0))]);
        tracker.update(&[]); // track dies immediately with max_misses = 0
        counter.prune(&tracker);

        // the id is reused-safe: fresh history, first sight below line is no crossing
        assert_eq!(counter.observe(&[(id, (100.0, 250.0))]), 0);
    }
}
