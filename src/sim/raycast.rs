//! Distance sensing by ray casting
//!
//! A ray is a fixed-length segment from an origin along a travel angle. Each
//! cast recomputes its result from scratch; the cached last hit exists only
//! so a renderer can draw the ray truncated at whatever it touched.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::geometry::{RayTarget, Segment};
use crate::consts::NO_HIT_DISTANCE;
use crate::travel_direction;

/// Nearest intersection found by a cast
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RayHit {
    /// Distance from the ray origin
    pub distance: f32,
    pub point: Vec2,
}

/// Distance of a cast result, or the no-hit sentinel (-1)
#[inline]
pub fn hit_distance(hit: Option<RayHit>) -> f32 {
    hit.map_or(NO_HIT_DISTANCE, |h| h.distance)
}

#[derive(Debug, Clone)]
pub struct Ray {
    origin: Vec2,
    /// Travel-convention angle in degrees
    angle: f32,
    cast_length: f32,
    segment: Segment,
    last_distance: f32,
    last_intersection: Option<Vec2>,
}

impl Ray {
    pub fn new(origin: Vec2, angle: f32, cast_length: f32) -> Self {
        let mut ray = Self {
            origin,
            angle,
            cast_length,
            segment: Segment::new(origin, origin),
            last_distance: cast_length,
            last_intersection: None,
        };
        ray.update_segment();
        ray
    }

    fn update_segment(&mut self) {
        let end = self.origin + travel_direction(self.angle) * self.cast_length;
        self.segment = Segment::new(self.origin, end);
    }

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn cast_length(&self) -> f32 {
        self.cast_length
    }

    /// The full-length segment this ray casts along
    pub fn segment(&self) -> Segment {
        self.segment
    }

    /// Distance of the last hit, or the cast length after a miss
    pub fn last_distance(&self) -> f32 {
        self.last_distance
    }

    pub fn last_intersection(&self) -> Option<Vec2> {
        self.last_intersection
    }

    pub fn set_origin(&mut self, origin: Vec2) {
        self.origin = origin;
        self.update_segment();
    }

    /// Move the origin by `offset`
    pub fn translate(&mut self, offset: Vec2) {
        self.set_origin(self.origin + offset);
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.angle = angle;
        self.update_segment();
    }

    /// Turn the ray by `delta` degrees
    pub fn rotate_by(&mut self, delta: f32) {
        self.set_angle(self.angle + delta);
    }

    fn record(&mut self, hit: Option<RayHit>) {
        match hit {
            Some(h) => {
                self.last_distance = h.distance;
                self.last_intersection = Some(h.point);
            }
            None => {
                self.last_distance = self.cast_length;
                self.last_intersection = None;
            }
        }
    }

    fn nearest_hit<T: RayTarget + ?Sized>(&self, target: &T) -> Option<RayHit> {
        target
            .nearest_intersection(&self.segment, self.origin)
            .map(|point| RayHit {
                distance: self.origin.distance(point),
                point,
            })
    }

    /// Cast against one geometry, returning the intersection nearest the origin
    pub fn cast<T: RayTarget + ?Sized>(&mut self, target: &T) -> Option<RayHit> {
        let hit = self.nearest_hit(target);
        self.record(hit);
        hit
    }

    /// Cast against several geometries, returning the nearest hit with a
    /// positive distance across all of them
    ///
    /// Ties go to the geometry listed first.
    pub fn multi_cast(&mut self, targets: &[&dyn RayTarget]) -> Option<RayHit> {
        let mut best: Option<RayHit> = None;
        for target in targets {
            let Some(hit) = self.nearest_hit(*target) else {
                continue;
            };
            if hit.distance <= 0.0 {
                continue;
            }
            if best.is_none_or(|b| hit.distance < b.distance) {
                best = Some(hit);
            }
        }
        self.record(best);
        best
    }
}
