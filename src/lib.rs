//! Drift Racer - a top-down drift racing simulation for evolving drivers
//!
//! Core modules:
//! - `sim`: Deterministic simulation (geometry, raycasts, car physics, track, tick)
//! - `settings`: Tunable configuration loaded from JSON
//! - `training`: Track rotation and the demo policy used by the headless runner
//! - `leaderboard`: Best runs across generations

pub mod leaderboard;
pub mod settings;
pub mod sim;
pub mod training;

pub use leaderboard::Leaderboard;
pub use settings::Settings;

use glam::Vec2;
use thiserror::Error;

/// Simulation configuration constants
pub mod consts {
    /// Reported distance for a ray that hit nothing
    pub const NO_HIT_DISTANCE: f32 = -1.0;
    /// Checkpoint distance reported when no unpassed checkpoint remains
    pub const NO_CHECKPOINT_DISTANCE: f32 = 10_000.0;
    /// Distance-moved value of a freshly spawned car (never counts as stuck)
    pub const SPAWN_DISTANCE_MOVED: f32 = 10_000.0;
    /// Minimum points in a closed border loop
    pub const MIN_LOOP_POINTS: usize = 3;
    /// Tolerance used by the geometry predicates
    pub const GEOMETRY_EPSILON: f32 = 1e-5;
    /// Fixed extra observation slots after the rays: speed, angle delta, checkpoint bearing
    pub const EXTRA_OBSERVATIONS: usize = 3;
}

/// Invalid tuning value
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name}: start and end of the response range are both {value}")]
    DegenerateRange { name: &'static str, value: f32 },
    #[error("{name} must be finite, got {value}")]
    NonFinite { name: &'static str, value: f32 },
    #[error("{name} must not be negative, got {value}")]
    Negative { name: &'static str, value: f32 },
}

/// Reject NaN and infinities in a tuning value
pub fn ensure_finite(name: &'static str, value: f32) -> Result<f32, ConfigError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::NonFinite { name, value })
    }
}

/// Reject negative (or non-finite) tuning values
pub fn ensure_non_negative(name: &'static str, value: f32) -> Result<f32, ConfigError> {
    let value = ensure_finite(name, value)?;
    if value < 0.0 {
        return Err(ConfigError::Negative { name, value });
    }
    Ok(value)
}

// Angles are degrees throughout. Positive rotation is clockwise on screen
// (y grows downward). A car's travel direction is stored as the negative of
// its facing angle; the two helpers below are the only place that inversion
// is spelled out.

/// Travel (velocity) angle that corresponds to a facing angle
#[inline]
pub fn to_travel_angle(facing_angle: f32) -> f32 {
    -facing_angle
}

/// Facing angle that corresponds to a travel (velocity) angle
#[inline]
pub fn to_facing_angle(travel_angle: f32) -> f32 {
    -travel_angle
}

/// Rotate a vector by `degrees`
#[inline]
pub fn rotate_degrees(v: Vec2, degrees: f32) -> Vec2 {
    let (sin, cos) = degrees.to_radians().sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// Unit vector pointing along a travel angle (0° points down +y)
#[inline]
pub fn travel_direction(travel_angle: f32) -> Vec2 {
    rotate_degrees(Vec2::Y, travel_angle)
}

/// Travel angle of the direction from `from` to `to`
///
/// Inverse of [`travel_direction`]: `travel_direction(travel_bearing(a, b))`
/// points from `a` toward `b`.
#[inline]
pub fn travel_bearing(from: Vec2, to: Vec2) -> f32 {
    let d = to - from;
    (-d.x).atan2(d.y).to_degrees()
}

/// Normalize an angle in degrees to [-180, 180)
#[inline]
pub fn normalize_degrees(angle: f32) -> f32 {
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 180.0 { wrapped - 360.0 } else { wrapped }
}

/// Whether a response curve scales down (reduction) or up (boost)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveDirection {
    Reduction,
    Boost,
}

/// Linear remap of an angle error onto a multiplier, clamped between 1 and
/// the target multiplier.
///
/// `value == from_min` maps to 1, `value == from_max` maps to `multiplier`;
/// values outside the domain are extrapolated and then clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseCurve {
    from_min: f32,
    from_max: f32,
    multiplier: f32,
}

impl ResponseCurve {
    pub fn new(
        name: &'static str,
        from_min: f32,
        from_max: f32,
        multiplier: f32,
    ) -> Result<Self, ConfigError> {
        let from_min = ensure_finite(name, from_min)?;
        let from_max = ensure_finite(name, from_max)?;
        let multiplier = ensure_finite(name, multiplier)?;
        if from_min == from_max {
            return Err(ConfigError::DegenerateRange {
                name,
                value: from_min,
            });
        }
        Ok(Self {
            from_min,
            from_max,
            multiplier,
        })
    }

    pub fn direction(&self) -> CurveDirection {
        if self.multiplier <= 1.0 {
            CurveDirection::Reduction
        } else {
            CurveDirection::Boost
        }
    }

    /// Ordered clamp bounds of the output
    pub fn bounds(&self) -> (f32, f32) {
        match self.direction() {
            CurveDirection::Reduction => (self.multiplier, 1.0),
            CurveDirection::Boost => (1.0, self.multiplier),
        }
    }

    /// Evaluate the curve at `value`
    pub fn eval(&self, value: f32) -> f32 {
        let scaled = (value - self.from_min) / (self.from_max - self.from_min);
        let raw = 1.0 + scaled * (self.multiplier - 1.0);
        let (lo, hi) = self.bounds();
        raw.clamp(lo, hi)
    }
}
