//! Planar geometry for track borders, checkpoints, hitboxes and rays
//!
//! Everything is built from straight segments:
//! - `Segment`: a line segment (checkpoints, finish line, rays)
//! - `Ring`: a closed loop of points (track borders), treated as a line
//! - `Polygon`: a filled ring (car hitbox, containment tests)
//!
//! Intersection queries can produce several points (a ray crossing a border
//! twice, or running along a collinear edge). Callers that want a single
//! answer pick the point nearest to a reference with [`nearest_to`].

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::GEOMETRY_EPSILON;

/// A straight line segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Vec2,
    pub end: Vec2,
}

/// Result of intersecting two segments
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentIntersection {
    /// Segments cross or touch at one point
    Point(Vec2),
    /// Collinear segments share a stretch between two points
    Overlap(Vec2, Vec2),
}

impl SegmentIntersection {
    /// The intersection point closest to `reference`
    pub fn nearest_to(&self, reference: Vec2) -> Vec2 {
        match *self {
            SegmentIntersection::Point(p) => p,
            SegmentIntersection::Overlap(a, b) => {
                if b.distance_squared(reference) < a.distance_squared(reference) {
                    b
                } else {
                    a
                }
            }
        }
    }

    fn push_points(&self, out: &mut Vec<Vec2>) {
        match *self {
            SegmentIntersection::Point(p) => out.push(p),
            SegmentIntersection::Overlap(a, b) => {
                out.push(a);
                out.push(b);
            }
        }
    }
}

impl Segment {
    pub fn new(start: Vec2, end: Vec2) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn vector(&self) -> Vec2 {
        self.end - self.start
    }

    #[inline]
    pub fn length(&self) -> f32 {
        self.vector().length()
    }

    #[inline]
    pub fn midpoint(&self) -> Vec2 {
        (self.start + self.end) * 0.5
    }

    /// Zero-length segments never intersect anything
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.vector().length_squared() <= GEOMETRY_EPSILON * GEOMETRY_EPSILON
    }

    /// Point on the segment closest to `p`
    pub fn closest_point(&self, p: Vec2) -> Vec2 {
        let v = self.vector();
        let len_sq = v.length_squared();
        if len_sq <= GEOMETRY_EPSILON * GEOMETRY_EPSILON {
            return self.start;
        }
        let t = ((p - self.start).dot(v) / len_sq).clamp(0.0, 1.0);
        self.start + v * t
    }

    pub fn distance_to_point(&self, p: Vec2) -> f32 {
        self.closest_point(p).distance(p)
    }

    /// Intersect two segments
    ///
    /// Parallel non-collinear segments and degenerate segments return `None`.
    pub fn intersect(&self, other: &Segment) -> Option<SegmentIntersection> {
        if self.is_degenerate() || other.is_degenerate() {
            return None;
        }

        let p = self.start;
        let r = self.vector();
        let q = other.start;
        let s = other.vector();
        let qp = q - p;

        let r_len = r.length();
        let s_len = s.length();
        let denom = r.perp_dot(s);

        if denom.abs() <= GEOMETRY_EPSILON * r_len * s_len {
            // Parallel: only collinear segments can meet
            let offset = qp.perp_dot(r).abs() / r_len;
            if offset > GEOMETRY_EPSILON * r_len.max(1.0) {
                return None;
            }

            let rr = r.length_squared();
            let t0 = qp.dot(r) / rr;
            let t1 = t0 + s.dot(r) / rr;
            let lo = t0.min(t1).max(0.0);
            let hi = t0.max(t1).min(1.0);
            if lo > hi + GEOMETRY_EPSILON {
                return None;
            }
            if hi - lo <= GEOMETRY_EPSILON {
                return Some(SegmentIntersection::Point(p + r * lo.min(1.0)));
            }
            return Some(SegmentIntersection::Overlap(p + r * lo, p + r * hi));
        }

        let t = qp.perp_dot(s) / denom;
        let u = qp.perp_dot(r) / denom;
        let range = -GEOMETRY_EPSILON..=1.0 + GEOMETRY_EPSILON;
        if range.contains(&t) && range.contains(&u) {
            Some(SegmentIntersection::Point(p + r * t.clamp(0.0, 1.0)))
        } else {
            None
        }
    }

    #[inline]
    pub fn intersects(&self, other: &Segment) -> bool {
        self.intersect(other).is_some()
    }
}

/// Pick the point nearest to `reference`; the first of equally near points wins
pub fn nearest_to<I>(reference: Vec2, points: I) -> Option<Vec2>
where
    I: IntoIterator<Item = Vec2>,
{
    let mut best: Option<(f32, Vec2)> = None;
    for point in points {
        let dist = point.distance_squared(reference);
        match best {
            Some((best_dist, _)) if best_dist <= dist => {}
            _ => best = Some((dist, point)),
        }
    }
    best.map(|(_, point)| point)
}

/// A closed loop of points; the edge from the last point back to the first is implied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ring {
    points: Vec<Vec2>,
}

impl Ring {
    /// Build a ring, dropping consecutive duplicates and a repeated closing point
    pub fn new(points: impl IntoIterator<Item = Vec2>) -> Self {
        let mut cleaned: Vec<Vec2> = Vec::new();
        for point in points {
            if cleaned
                .last()
                .is_none_or(|last| last.distance(point) > GEOMETRY_EPSILON)
            {
                cleaned.push(point);
            }
        }
        while cleaned.len() > 1 {
            let (first, last) = (cleaned[0], cleaned[cleaned.len() - 1]);
            if first.distance(last) > GEOMETRY_EPSILON {
                break;
            }
            cleaned.pop();
        }
        Self { points: cleaned }
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Edges in order, including the closing edge
    pub fn edges(&self) -> impl Iterator<Item = Segment> + '_ {
        let n = self.points.len();
        let count = if n < 2 { 0 } else { n };
        (0..count).map(move |i| Segment::new(self.points[i], self.points[(i + 1) % n]))
    }

    /// Shoelace area (positive for one winding, negative for the other)
    pub fn signed_area(&self) -> f32 {
        self.edges().map(|e| e.start.perp_dot(e.end)).sum::<f32>() * 0.5
    }

    /// Even-odd test for a point strictly inside the loop
    pub fn contains_point(&self, p: Vec2) -> bool {
        let n = self.points.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[j];
            if (a.y > p.y) != (b.y > p.y) {
                let x_cross = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
                if p.x < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    /// Whether `inner` lies entirely inside this loop without touching it
    pub fn contains_ring(&self, inner: &Ring) -> bool {
        if inner.is_empty() {
            return false;
        }
        if !inner.points.iter().all(|&p| self.contains_point(p)) {
            return false;
        }
        !inner
            .edges()
            .any(|e| self.edges().any(|own| own.intersects(&e)))
    }

    /// True when no two edges cross and adjacent edges meet only at their shared vertex
    pub fn is_simple(&self) -> bool {
        let edges: Vec<Segment> = self.edges().collect();
        let n = edges.len();
        if n < 3 || self.signed_area().abs() <= GEOMETRY_EPSILON {
            return false;
        }
        for i in 0..n {
            for j in (i + 1)..n {
                let adjacent = j == i + 1 || (i == 0 && j == n - 1);
                match edges[i].intersect(&edges[j]) {
                    None => {}
                    Some(SegmentIntersection::Point(_)) if adjacent => {}
                    Some(_) => return false,
                }
            }
        }
        true
    }

    /// Closest point on the loop's outline to `p`
    pub fn nearest_point(&self, p: Vec2) -> Option<Vec2> {
        if self.points.len() == 1 {
            return Some(self.points[0]);
        }
        nearest_to(p, self.edges().map(|e| e.closest_point(p)))
    }

    pub fn distance_to_point(&self, p: Vec2) -> Option<f32> {
        self.nearest_point(p).map(|q| q.distance(p))
    }

    /// Every point where `segment` meets the outline
    pub fn intersections(&self, segment: &Segment) -> Vec<Vec2> {
        let mut hits = Vec::new();
        for edge in self.edges() {
            if let Some(hit) = segment.intersect(&edge) {
                hit.push_points(&mut hits);
            }
        }
        hits
    }

    pub fn intersects_segment(&self, segment: &Segment) -> bool {
        self.edges().any(|e| e.intersects(segment))
    }
}

/// A filled polygon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    exterior: Ring,
}

impl Polygon {
    pub fn new(points: impl IntoIterator<Item = Vec2>) -> Self {
        Self {
            exterior: Ring::new(points),
        }
    }

    /// Axis-aligned rectangle centred on `center`
    pub fn rect(center: Vec2, width: f32, height: f32) -> Self {
        let half = Vec2::new(width, height) * 0.5;
        Self::new([
            Vec2::new(center.x - half.x, center.y - half.y),
            Vec2::new(center.x + half.x, center.y - half.y),
            Vec2::new(center.x + half.x, center.y + half.y),
            Vec2::new(center.x - half.x, center.y + half.y),
        ])
    }

    pub fn exterior(&self) -> &Ring {
        &self.exterior
    }

    pub fn corners(&self) -> &[Vec2] {
        self.exterior.points()
    }

    pub fn contains_point(&self, p: Vec2) -> bool {
        self.exterior.contains_point(p)
    }

    /// The segment crosses the outline or lies inside the area
    pub fn intersects_segment(&self, segment: &Segment) -> bool {
        if segment.is_degenerate() {
            return self.contains_point(segment.start);
        }
        self.exterior.intersects_segment(segment) || self.contains_point(segment.start)
    }

    /// The polygon's area shares at least one point with the loop's outline
    pub fn intersects_ring(&self, ring: &Ring) -> bool {
        ring.edges().any(|e| self.intersects_segment(&e))
    }
}

/// Geometry a ray can be cast against
pub trait RayTarget {
    /// All points where `segment` meets this geometry
    fn intersections(&self, segment: &Segment) -> Vec<Vec2>;

    /// The intersection closest to `reference`
    fn nearest_intersection(&self, segment: &Segment, reference: Vec2) -> Option<Vec2> {
        nearest_to(reference, self.intersections(segment))
    }
}

impl RayTarget for Segment {
    fn intersections(&self, segment: &Segment) -> Vec<Vec2> {
        let mut hits = Vec::new();
        if let Some(hit) = segment.intersect(self) {
            hit.push_points(&mut hits);
        }
        hits
    }
}

impl RayTarget for Ring {
    fn intersections(&self, segment: &Segment) -> Vec<Vec2> {
        Ring::intersections(self, segment)
    }
}

impl RayTarget for Polygon {
    fn intersections(&self, segment: &Segment) -> Vec<Vec2> {
        let mut hits = self.exterior.intersections(segment);
        // A segment starting inside the area touches it immediately
        if self.contains_point(segment.start) {
            hits.push(segment.start);
        }
        hits
    }
}
