//! Track geometry, border collisions and checkpoint/lap progression
//!
//! A track is two nested border loops, an ordered list of checkpoint lines
//! and a finish line. The finish line counts as checkpoint `N` (one past the
//! last real checkpoint) and only registers once every checkpoint has been
//! passed since the last lap.
//!
//! `Track` itself is immutable after construction, so one track can be shared
//! by any number of cars. Per-car collision flags come back in the
//! `CollisionReport` instead of being cached on the track.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::geometry::{Polygon, Ring, Segment};
use crate::consts::{MIN_LOOP_POINTS, NO_CHECKPOINT_DISTANCE};
use crate::{normalize_degrees, to_facing_angle, travel_bearing};

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("{border} border needs at least {min} distinct points, got {count}", min = MIN_LOOP_POINTS)]
    TooFewPoints { border: &'static str, count: usize },
    #[error("{border} border crosses itself")]
    NotSimple { border: &'static str },
    #[error("track has no checkpoints")]
    NoCheckpoints,
    #[error("neither border contains the other")]
    BordersNotNested,
    #[error("start point {0} is not between the borders")]
    StartOutsideTrack(Vec2),
    #[error("failed to read tracks: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed track data: {0}")]
    Json(#[from] serde_json::Error),
}

/// Track description as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    #[serde(rename = "inner border")]
    pub inner_border: Vec<Vec2>,
    #[serde(rename = "outer border")]
    pub outer_border: Vec<Vec2>,
    #[serde(rename = "start point")]
    pub start_point: Vec2,
    pub checkpoints: Vec<[Vec2; 2]>,
    #[serde(rename = "finish line")]
    pub finish_line: [Vec2; 2],
}

impl TrackRecord {
    /// Square loop between two centred squares
    ///
    /// The car starts on the +y straight heading toward +x. Checkpoint 0
    /// crosses that straight at three fifths of `half_inner`, checkpoint 1 crosses
    /// the opposite straight, and the finish line sits just behind the start.
    pub fn square(half_inner: f32, half_outer: f32) -> Self {
        let corners = |h: f32| {
            vec![
                Vec2::new(-h, -h),
                Vec2::new(h, -h),
                Vec2::new(h, h),
                Vec2::new(-h, h),
            ]
        };
        let mid = (half_inner + half_outer) / 2.0;
        let cp_x = half_inner * 3.0 / 5.0;
        let finish_x = -half_inner * 3.0 / 10.0;
        Self {
            inner_border: corners(half_inner),
            outer_border: corners(half_outer),
            start_point: Vec2::new(0.0, mid),
            checkpoints: vec![
                [Vec2::new(cp_x, half_inner), Vec2::new(cp_x, half_outer)],
                [Vec2::new(-cp_x, -half_inner), Vec2::new(-cp_x, -half_outer)],
            ],
            finish_line: [
                Vec2::new(finish_x, half_inner),
                Vec2::new(finish_x, half_outer),
            ],
        }
    }
}

/// Parse a JSON array of track records
pub fn parse_tracks(json: &str) -> Result<Vec<TrackRecord>, TrackError> {
    Ok(serde_json::from_str(json)?)
}

/// Read a JSON array of track records from disk
pub fn load_tracks(path: &Path) -> Result<Vec<TrackRecord>, TrackError> {
    let tracks = parse_tracks(&fs::read_to_string(path)?)?;
    log::info!("Loaded {} tracks from {}", tracks.len(), path.display());
    Ok(tracks)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub segment: Segment,
    pub midpoint: Vec2,
}

/// Distance and relative bearing to the nearest unpassed checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetrics {
    pub distance: f32,
    /// Car heading minus the bearing to the checkpoint, in [-180, 180)
    pub bearing: f32,
}

impl Default for CheckpointMetrics {
    fn default() -> Self {
        Self {
            distance: NO_CHECKPOINT_DISTANCE,
            bearing: 0.0,
        }
    }
}

/// Everything one `collide` call found
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollisionReport {
    /// The hitbox touches either border
    pub border_hit: bool,
    /// First-time checkpoint pass (the finish line reports `checkpoint_count()`)
    pub new_checkpoint: Option<usize>,
    pub new_lap: bool,
    pub inner_hit: bool,
    pub outer_hit: bool,
    /// Every checkpoint the hitbox touches, passed or not
    pub checkpoint_hits: Vec<usize>,
    pub finish_line_hit: bool,
}

#[derive(Debug, Clone)]
pub struct Track {
    inner_border: Ring,
    outer_border: Ring,
    checkpoints: Vec<Checkpoint>,
    finish_line: Segment,
    start_point: Vec2,
    /// Facing angle that points the car at checkpoint 0
    start_angle: f32,
}

impl Track {
    pub fn new(record: &TrackRecord) -> Result<Self, TrackError> {
        let mut inner = Ring::new(record.inner_border.iter().copied());
        let mut outer = Ring::new(record.outer_border.iter().copied());

        for (border, ring) in [("inner", &inner), ("outer", &outer)] {
            if ring.len() < MIN_LOOP_POINTS {
                return Err(TrackError::TooFewPoints {
                    border,
                    count: ring.len(),
                });
            }
            if !ring.is_simple() {
                return Err(TrackError::NotSimple { border });
            }
        }

        if record.checkpoints.is_empty() {
            return Err(TrackError::NoCheckpoints);
        }

        if !outer.contains_ring(&inner) {
            if inner.contains_ring(&outer) {
                log::info!("Track borders were listed inside out, swapping");
                std::mem::swap(&mut inner, &mut outer);
            } else {
                return Err(TrackError::BordersNotNested);
            }
        }

        let start_point = record.start_point;
        if !outer.contains_point(start_point) || inner.contains_point(start_point) {
            return Err(TrackError::StartOutsideTrack(start_point));
        }

        let checkpoints: Vec<Checkpoint> = record
            .checkpoints
            .iter()
            .map(|&[a, b]| {
                let segment = Segment::new(a, b);
                Checkpoint {
                    segment,
                    midpoint: segment.midpoint(),
                }
            })
            .collect();

        let start_angle = to_facing_angle(travel_bearing(start_point, checkpoints[0].midpoint));

        Ok(Self {
            inner_border: inner,
            outer_border: outer,
            checkpoints,
            finish_line: Segment::new(record.finish_line[0], record.finish_line[1]),
            start_point,
            start_angle,
        })
    }

    pub fn inner_border(&self) -> &Ring {
        &self.inner_border
    }

    pub fn outer_border(&self) -> &Ring {
        &self.outer_border
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn checkpoint_count(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn finish_line(&self) -> Segment {
        self.finish_line
    }

    pub fn start_point(&self) -> Vec2 {
        self.start_point
    }

    pub fn start_angle(&self) -> f32 {
        self.start_angle
    }

    /// Check a hitbox against the borders, checkpoints and finish line
    pub fn collide(&self, hitbox: &Polygon, passed: &BTreeSet<usize>) -> CollisionReport {
        let mut report = CollisionReport {
            inner_hit: hitbox.intersects_ring(&self.inner_border),
            outer_hit: hitbox.intersects_ring(&self.outer_border),
            ..Default::default()
        };
        report.border_hit = report.inner_hit || report.outer_hit;

        for (i, checkpoint) in self.checkpoints.iter().enumerate() {
            if hitbox.intersects_segment(&checkpoint.segment) {
                report.checkpoint_hits.push(i);
                if !passed.contains(&i) {
                    // Later indices overwrite earlier ones
                    report.new_checkpoint = Some(i);
                }
            }
        }

        if hitbox.intersects_segment(&self.finish_line) {
            report.finish_line_hit = true;
            if self.all_checkpoints_passed(passed) {
                report.new_lap = true;
                report.new_checkpoint = Some(self.checkpoints.len());
            }
        }

        report
    }

    fn all_checkpoints_passed(&self, passed: &BTreeSet<usize>) -> bool {
        (0..self.checkpoints.len()).all(|i| passed.contains(&i))
    }

    /// Checkpoints not yet passed, in track order
    pub fn unpassed_checkpoints(&self, passed: &BTreeSet<usize>) -> Vec<&Checkpoint> {
        self.checkpoints
            .iter()
            .enumerate()
            .filter(|(i, _)| !passed.contains(i))
            .map(|(_, checkpoint)| checkpoint)
            .collect()
    }

    /// Distance and relative bearing from a car to the closest unpassed checkpoint midpoint
    ///
    /// `heading` is the car's facing direction in the travel convention.
    pub fn nearest_unpassed_checkpoint(
        &self,
        position: Vec2,
        heading: f32,
        passed: &BTreeSet<usize>,
    ) -> CheckpointMetrics {
        let nearest = self
            .unpassed_checkpoints(passed)
            .into_iter()
            .map(|cp| (position.distance(cp.midpoint), cp.midpoint))
            .fold(None, |best: Option<(f32, Vec2)>, (dist, midpoint)| match best {
                Some((best_dist, _)) if best_dist <= dist => best,
                _ => Some((dist, midpoint)),
            });

        match nearest {
            Some((distance, midpoint)) => CheckpointMetrics {
                distance,
                bearing: normalize_degrees(heading - travel_bearing(position, midpoint)),
            },
            None => CheckpointMetrics::default(),
        }
    }

    /// Distance from a point to the closer of the two borders
    pub fn border_clearance(&self, point: Vec2) -> f32 {
        let inner = self.inner_border.distance_to_point(point);
        let outer = self.outer_border.distance_to_point(point);
        match (inner, outer) {
            (Some(a), Some(b)) => a.min(b),
            (Some(d), None) | (None, Some(d)) => d,
            (None, None) => f32::INFINITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_track() -> Track {
        Track::new(&TrackRecord::square(100.0, 200.0)).unwrap()
    }

    fn hitbox_at(x: f32, y: f32) -> Polygon {
        Polygon::rect(Vec2::new(x, y), 10.0, 20.0)
    }

    fn passed(indices: &[usize]) -> BTreeSet<usize> {
        indices.iter().copied().collect()
    }

    #[test]
    fn test_square_track_layout() {
        let track = square_track();
        assert_eq!(track.checkpoint_count(), 2);
        assert_eq!(track.start_point(), Vec2::new(0.0, 150.0));
        assert!((track.checkpoints()[0].midpoint - Vec2::new(60.0, 150.0)).length() < 1e-4);
        assert!((track.finish_line().midpoint() - Vec2::new(-30.0, 150.0)).length() < 1e-4);
        // Facing 90° means travelling along +x toward checkpoint 0
        assert!((track.start_angle() - 90.0).abs() < 1e-4);
    }

    #[test]
    fn test_square_record_coordinates_are_exact() {
        let record = TrackRecord::square(100.0, 200.0);
        assert_eq!(record.checkpoints[0], [Vec2::new(60.0, 100.0), Vec2::new(60.0, 200.0)]);
        assert_eq!(record.checkpoints[1], [Vec2::new(-60.0, -100.0), Vec2::new(-60.0, -200.0)]);
        assert_eq!(record.finish_line, [Vec2::new(-30.0, 100.0), Vec2::new(-30.0, 200.0)]);
    }

    #[test]
    fn test_swaps_reversed_borders() {
        let mut record = TrackRecord::square(100.0, 200.0);
        std::mem::swap(&mut record.inner_border, &mut record.outer_border);
        let track = Track::new(&record).unwrap();
        assert!(track.outer_border().contains_ring(track.inner_border()));
        assert!(track.outer_border().contains_point(Vec2::new(190.0, 0.0)));
        assert!(!track.inner_border().contains_point(Vec2::new(190.0, 0.0)));
    }

    #[test]
    fn test_rejects_malformed_tracks() {
        let mut record = TrackRecord::square(100.0, 200.0);
        record.inner_border.truncate(2);
        assert!(matches!(
            Track::new(&record),
            Err(TrackError::TooFewPoints { border: "inner", count: 2 })
        ));

        let mut record = TrackRecord::square(100.0, 200.0);
        record.checkpoints.clear();
        assert!(matches!(Track::new(&record), Err(TrackError::NoCheckpoints)));

        let mut record = TrackRecord::square(100.0, 200.0);
        record.outer_border.swap(0, 1);
        assert!(matches!(
            Track::new(&record),
            Err(TrackError::NotSimple { border: "outer" })
        ));

        let mut record = TrackRecord::square(100.0, 200.0);
        record.inner_border = record
            .inner_border
            .iter()
            .map(|p| *p + Vec2::new(150.0, 0.0))
            .collect();
        assert!(matches!(Track::new(&record), Err(TrackError::BordersNotNested)));

        let mut record = TrackRecord::square(100.0, 200.0);
        record.start_point = Vec2::ZERO;
        assert!(matches!(Track::new(&record), Err(TrackError::StartOutsideTrack(_))));
    }

    #[test]
    fn test_checkpoint_then_clear_road() {
        let track = square_track();

        let report = track.collide(&hitbox_at(60.0, 150.0), &passed(&[]));
        assert_eq!(
            (report.border_hit, report.new_checkpoint, report.new_lap),
            (false, Some(0), false)
        );
        assert_eq!(report.checkpoint_hits, vec![0]);

        let report = track.collide(&hitbox_at(100.0, 150.0), &passed(&[0]));
        assert_eq!(
            (report.border_hit, report.new_checkpoint, report.new_lap),
            (false, None, false)
        );
        assert!(report.checkpoint_hits.is_empty());
    }

    #[test]
    fn test_passed_checkpoint_not_reported_again() {
        let track = square_track();
        let hitbox = hitbox_at(60.0, 150.0);
        for _ in 0..3 {
            let report = track.collide(&hitbox, &passed(&[0]));
            assert_eq!(report.new_checkpoint, None);
            assert_eq!(report.checkpoint_hits, vec![0]);
        }
    }

    #[test]
    fn test_last_new_checkpoint_wins() {
        let mut record = TrackRecord::square(100.0, 200.0);
        record.checkpoints = vec![
            [Vec2::new(60.0, 100.0), Vec2::new(60.0, 200.0)],
            [Vec2::new(62.0, 100.0), Vec2::new(62.0, 200.0)],
        ];
        let track = Track::new(&record).unwrap();
        let report = track.collide(&hitbox_at(61.0, 150.0), &passed(&[]));
        assert_eq!(report.checkpoint_hits, vec![0, 1]);
        assert_eq!(report.new_checkpoint, Some(1));

        let report = track.collide(&hitbox_at(61.0, 150.0), &passed(&[1]));
        assert_eq!(report.new_checkpoint, Some(0));
    }

    #[test]
    fn test_finish_line_needs_every_checkpoint() {
        let track = square_track();
        let on_finish = hitbox_at(-30.0, 150.0);

        let report = track.collide(&on_finish, &passed(&[0, 1]));
        assert!(report.new_lap);
        assert_eq!(report.new_checkpoint, Some(2));

        for missing in [0, 1] {
            let others: Vec<usize> = [0, 1].into_iter().filter(|&i| i != missing).collect();
            let report = track.collide(&on_finish, &passed(&others));
            assert!(!report.new_lap);
            assert_eq!(report.new_checkpoint, None);
            assert!(report.finish_line_hit);
        }
    }

    #[test]
    fn test_border_hits() {
        let track = square_track();
        let report = track.collide(&hitbox_at(0.0, 195.0), &passed(&[]));
        assert!(report.border_hit && report.outer_hit && !report.inner_hit);

        let report = track.collide(&hitbox_at(0.0, 105.0), &passed(&[]));
        assert!(report.border_hit && report.inner_hit && !report.outer_hit);

        let report = track.collide(&hitbox_at(0.0, 150.0), &passed(&[]));
        assert!(!report.border_hit);
    }

    #[test]
    fn test_unpassed_checkpoints_in_order() {
        let track = square_track();
        assert_eq!(track.unpassed_checkpoints(&passed(&[])).len(), 2);

        let remaining = track.unpassed_checkpoints(&passed(&[0]));
        assert_eq!(remaining.len(), 1);
        assert!((remaining[0].midpoint - Vec2::new(-60.0, -150.0)).length() < 1e-4);

        assert!(track.unpassed_checkpoints(&passed(&[0, 1])).is_empty());
    }

    #[test]
    fn test_nearest_unpassed_checkpoint() {
        let track = square_track();
        let start = track.start_point();
        let heading = crate::to_travel_angle(track.start_angle());

        let metrics = track.nearest_unpassed_checkpoint(start, heading, &passed(&[]));
        assert!((metrics.distance - 60.0).abs() < 1e-4);
        assert!(metrics.bearing.abs() < 1e-3);

        let none_left = track.nearest_unpassed_checkpoint(start, heading, &passed(&[0, 1]));
        assert_eq!(none_left, CheckpointMetrics::default());
    }

    #[test]
    fn test_border_clearance() {
        let track = square_track();
        assert!((track.border_clearance(Vec2::new(0.0, 150.0)) - 50.0).abs() < 1e-4);
        assert!((track.border_clearance(Vec2::new(0.0, 190.0)) - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_load_tracks_from_file() {
        let path = std::env::temp_dir().join(format!("drift_racer_tracks_{}.json", std::process::id()));
        let records = vec![TrackRecord::square(100.0, 200.0), TrackRecord::square(50.0, 90.0)];
        fs::write(&path, serde_json::to_string(&records).unwrap()).unwrap();
        let loaded = load_tracks(&path);
        let _ = fs::remove_file(&path);
        assert_eq!(loaded.unwrap(), records);

        assert!(matches!(
            load_tracks(Path::new("/nonexistent/drift_racer_tracks.json")),
            Err(TrackError::Io(_))
        ));
    }

    #[test]
    fn test_parse_tracks_json() {
        let json = r#"[{
            "inner border": [[100, 100], [200, 100], [200, 200], [100, 200]],
            "outer border": [[0, 0], [300, 0], [300, 300], [0, 300], [0, 0]],
            "start point": [50, 150],
            "checkpoints": [[[0, 120], [100, 120]], [[200, 150], [300, 150]]],
            "finish line": [[0, 160], [100, 160]]
        }]"#;
        let records = parse_tracks(json).unwrap();
        assert_eq!(records.len(), 1);
        let track = Track::new(&records[0]).unwrap();
        assert_eq!(track.outer_border().len(), 4);
        assert_eq!(track.checkpoints()[1].midpoint, Vec2::new(250.0, 150.0));
    }
}
