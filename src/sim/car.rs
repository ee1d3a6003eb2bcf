//! Car kinematics and the drift model
//!
//! The car has two angles: where the body points (`facing_angle`, steered
//! directly) and where it actually travels (`velocity_angle`). Each tick the
//! travel direction is pulled toward the facing direction by a grip curve,
//! which is exponential in the angle error. Large errors get large
//! corrections (up to `max_grip`), small ones snap shut.
//!
//! The velocity angle lives in the travel convention, so at steady state
//! `velocity_angle == to_travel_angle(facing_angle)`.

use std::collections::BTreeSet;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::geometry::Polygon;
use super::track::CheckpointMetrics;
use crate::consts::SPAWN_DISTANCE_MOVED;
use crate::settings::CarSettings;
use crate::{ConfigError, ResponseCurve, ensure_finite, ensure_non_negative, to_travel_angle, travel_direction};

/// Validated, immutable handling constants
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarTuning {
    pub max_speed: f32,
    pub acceleration: f32,
    pub braking_force: f32,
    pub friction: f32,
    speed_curve: ResponseCurve,
    pub steering_response: f32,
    steer_curve: ResponseCurve,
    pub snap_threshold: f32,
    pub max_delta: f32,
    pub no_overshoot: bool,
    pub min_grip: f32,
    /// `f32::INFINITY` when the configured maximum is disabled
    pub max_grip: f32,
    pub point_scalar: f32,
    pub grip_exp: f32,
    pub width: f32,
    pub length: f32,
}

impl CarTuning {
    pub fn new(s: &CarSettings) -> Result<Self, ConfigError> {
        let min_grip = ensure_finite("car.min_grip", s.min_grip)?;
        let max_grip = ensure_finite("car.max_grip", s.max_grip)?;
        let max_grip = if max_grip < 0.0 || max_grip < min_grip {
            f32::INFINITY
        } else {
            max_grip
        };

        Ok(Self {
            max_speed: ensure_non_negative("car.max_speed", s.max_speed)?,
            acceleration: ensure_non_negative("car.acceleration", s.acceleration)?,
            braking_force: ensure_non_negative("car.braking_force", s.braking_force)?,
            friction: ensure_non_negative("car.friction", s.friction)?,
            speed_curve: ResponseCurve::new(
                "car.speed_start_delta/speed_end_delta",
                s.speed_start_delta,
                s.speed_end_delta,
                ensure_non_negative("car.turn_speed_mult", s.turn_speed_mult)?,
            )?,
            steering_response: ensure_finite("car.steering_response", s.steering_response)?,
            steer_curve: ResponseCurve::new(
                "car.steer_start_delta/steer_end_delta",
                s.steer_start_delta,
                s.steer_end_delta,
                s.turn_steering_mult,
            )?,
            snap_threshold: ensure_finite("car.snap_threshold", s.snap_threshold)?,
            max_delta: ensure_non_negative("car.max_delta", s.max_delta)?,
            no_overshoot: s.no_overshoot,
            min_grip,
            max_grip,
            point_scalar: ensure_finite("car.point_scalar", s.point_scalar)?,
            grip_exp: ensure_non_negative("car.grip_exp", s.grip_exp)?,
            width: ensure_non_negative("car.width", s.width)?,
            length: ensure_non_negative("car.length", s.length)?,
        })
    }

    /// Speed multiplier at a given absolute angle delta
    pub fn speed_reduction(&self, abs_delta: f32) -> f32 {
        self.speed_curve.eval(abs_delta)
    }

    /// Steering multiplier at a given absolute angle delta
    pub fn steer_reduction(&self, abs_delta: f32) -> f32 {
        self.steer_curve.eval(abs_delta)
    }

    /// Highest speed the car can ever reach
    pub fn speed_limit(&self) -> f32 {
        self.max_speed * self.speed_curve.bounds().1
    }

    /// Unsigned velocity correction for an angle error
    pub fn grip(&self, abs_delta: f32) -> f32 {
        self.grip_exp
            .powf(0.1 * (abs_delta - self.point_scalar))
            .clamp(self.min_grip, self.max_grip)
    }
}

/// Driver input for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlInput {
    /// Positive accelerates, negative brakes, zero coasts
    pub throttle: f32,
    /// In [-1, 1]; positive turns right
    pub steering: f32,
}

impl ControlInput {
    pub fn new(throttle: f32, steering: f32) -> Self {
        Self { throttle, steering }
    }
}

#[derive(Debug, Clone)]
pub struct Car {
    tuning: CarTuning,
    position: Vec2,
    speed: f32,
    facing_angle: f32,
    velocity_angle: f32,
    angle_delta: f32,
    current_top_speed: f32,
    hitbox: Polygon,
    /// How far the last tick moved the car
    distance_moved: f32,
    /// Checkpoint indices passed since the last lap reset
    pub passed_checkpoints: BTreeSet<usize>,
    /// Nearest unpassed checkpoint, refreshed by the simulation loop
    pub last_checkpoint: CheckpointMetrics,
}

impl Car {
    pub fn new(tuning: CarTuning, position: Vec2, facing_angle: f32, initial_speed: f32) -> Self {
        Self {
            tuning,
            position,
            speed: initial_speed.clamp(0.0, tuning.max_speed),
            facing_angle,
            velocity_angle: to_travel_angle(facing_angle),
            angle_delta: 0.0,
            current_top_speed: tuning.max_speed,
            hitbox: Polygon::rect(position, tuning.width, tuning.length),
            distance_moved: SPAWN_DISTANCE_MOVED,
            passed_checkpoints: BTreeSet::new(),
            last_checkpoint: CheckpointMetrics::default(),
        }
    }

    pub fn tuning(&self) -> &CarTuning {
        &self.tuning
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn facing_angle(&self) -> f32 {
        self.facing_angle
    }

    pub fn velocity_angle(&self) -> f32 {
        self.velocity_angle
    }

    /// Signed gap between the facing direction and the travel direction
    pub fn angle_delta(&self) -> f32 {
        self.angle_delta
    }

    /// Facing direction expressed in the travel convention (used to aim rays)
    pub fn heading(&self) -> f32 {
        to_travel_angle(self.facing_angle)
    }

    /// Top speed allowed on the last tick
    pub fn current_top_speed(&self) -> f32 {
        self.current_top_speed
    }

    pub fn hitbox(&self) -> &Polygon {
        &self.hitbox
    }

    pub fn distance_moved(&self) -> f32 {
        self.distance_moved
    }

    /// Record a checkpoint pass; completing a lap clears the passed set afterwards
    pub fn pass_checkpoint(&mut self, index: usize, lap_complete: bool) {
        self.passed_checkpoints.insert(index);
        if lap_complete {
            self.passed_checkpoints.clear();
        }
    }

    /// Advance the car by one tick
    pub fn drive(&mut self, input: ControlInput) {
        let t = self.tuning;
        let steering = input.steering.clamp(-1.0, 1.0);

        let accel = if input.throttle > 0.0 {
            t.acceleration
        } else if input.throttle < 0.0 {
            -t.braking_force
        } else {
            -t.friction
        };
        self.speed += accel;

        let abs_delta = self.angle_delta.abs();
        self.current_top_speed = t.max_speed * t.speed_reduction(abs_delta);
        self.speed = self.speed.clamp(0.0, self.current_top_speed);

        let steer_amount = t.steering_response * steering;
        self.facing_angle -= steer_amount * t.steer_reduction(abs_delta);

        // Must be measured after steering and before the velocity catches up
        self.angle_delta = to_travel_angle(self.facing_angle) - self.velocity_angle;
        self.turn_velocity();

        let old_position = self.position;
        self.position += travel_direction(self.velocity_angle) * self.speed;
        self.distance_moved = old_position.distance(self.position);

        // Axis-aligned on purpose: the hitbox does not rotate with the body
        self.hitbox = Polygon::rect(self.position, t.width, t.length);
    }

    /// Pull the travel direction toward the facing direction
    fn turn_velocity(&mut self) {
        let t = self.tuning;
        let target = to_travel_angle(self.facing_angle);

        if self.angle_delta.abs() < t.snap_threshold {
            self.velocity_angle = target;
            return;
        }

        let grip = t.grip(self.angle_delta.abs());
        let turn = if self.angle_delta < 0.0 { -grip } else { grip };
        self.velocity_angle =
            (self.velocity_angle + turn).clamp(target - t.max_delta, target + t.max_delta);

        let new_delta = target - self.velocity_angle;
        let overshot = (self.angle_delta < 0.0 && new_delta > 0.0)
            || (self.angle_delta > 0.0 && new_delta < 0.0);
        if overshot && t.no_overshoot {
            self.velocity_angle = target;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tuning() -> CarTuning {
        CarTuning::new(&CarSettings::default()).unwrap()
    }

    #[test]
    fn test_accelerates_to_top_speed_then_holds() {
        let t = tuning();
        let mut car = Car::new(t, Vec2::ZERO, 0.0, 0.0);
        let full = ControlInput::new(1.0, 0.0);
        let mut prev = car.speed();
        for _ in 0..200 {
            car.drive(full);
            if prev < t.max_speed {
                assert!(car.speed() > prev, "speed stalled at {prev}");
            } else {
                assert_eq!(car.speed(), t.max_speed);
            }
            prev = car.speed();
        }
        assert_eq!(car.speed(), t.max_speed);
    }

    #[test]
    fn test_spawn_speed_clamped_to_top_speed() {
        let t = tuning();
        let fast = Car::new(t, Vec2::ZERO, 0.0, t.max_speed * 3.0);
        assert_eq!(fast.speed(), t.max_speed);
        assert!(fast.speed() <= fast.current_top_speed());
        assert_eq!(Car::new(t, Vec2::ZERO, 0.0, -2.0).speed(), 0.0);
    }

    #[test]
    fn test_coasting_stops_at_zero() {
        let mut car = Car::new(tuning(), Vec2::ZERO, 0.0, 0.5);
        for _ in 0..100 {
            car.drive(ControlInput::default());
            assert!(car.speed() >= 0.0);
        }
        assert_eq!(car.speed(), 0.0);
        assert_eq!(car.distance_moved(), 0.0);
    }

    #[test]
    fn test_drives_along_travel_direction() {
        let mut car = Car::new(tuning(), Vec2::new(100.0, 100.0), 0.0, 2.0);
        car.drive(ControlInput::new(1.0, 0.0));
        let expected_speed = 2.0 + car.tuning().acceleration;
        assert!((car.position() - Vec2::new(100.0, 100.0 + expected_speed)).length() < 1e-4);
        assert!((car.distance_moved() - expected_speed).abs() < 1e-4);
    }

    #[test]
    fn test_steering_turns_facing_counter_to_input() {
        let t = tuning();
        let mut car = Car::new(t, Vec2::ZERO, 0.0, 3.0);
        car.drive(ControlInput::new(1.0, 0.5));
        // Zero angle delta means no steering reduction yet
        assert!((car.facing_angle() + t.steering_response * 0.5).abs() < 1e-6);
        // Delta below the snap threshold: travel follows facing exactly
        assert_eq!(car.velocity_angle(), to_travel_angle(car.facing_angle()));
    }

    #[test]
    fn test_hitbox_is_axis_aligned_at_position() {
        let t = tuning();
        let mut car = Car::new(t, Vec2::new(50.0, 50.0), 35.0, 4.0);
        car.drive(ControlInput::new(1.0, 1.0));
        let p = car.position();
        let corners = car.hitbox().corners();
        assert_eq!(corners[0], Vec2::new(p.x - t.width / 2.0, p.y - t.length / 2.0));
        assert_eq!(corners[2], Vec2::new(p.x + t.width / 2.0, p.y + t.length / 2.0));
    }

    #[test]
    fn test_drift_pulls_velocity_toward_facing() {
        let t = tuning();
        let mut car = Car::new(t, Vec2::ZERO, 0.0, 5.0);
        car.velocity_angle = -40.0;
        car.angle_delta = to_travel_angle(car.facing_angle) - car.velocity_angle;
        car.turn_velocity();
        let expected = -40.0 + t.grip(40.0);
        assert!((car.velocity_angle - expected).abs() < 1e-5);
        assert!(car.velocity_angle < 0.0);
    }

    #[test]
    fn test_velocity_clamped_to_max_delta() {
        let mut settings = CarSettings::default();
        settings.max_delta = 10.0;
        let mut car = Car::new(CarTuning::new(&settings).unwrap(), Vec2::ZERO, 0.0, 5.0);
        car.velocity_angle = -90.0;
        car.angle_delta = 90.0;
        car.turn_velocity();
        assert_eq!(car.velocity_angle, -10.0);
    }

    #[test]
    fn test_overshoot_guard() {
        let mut settings = CarSettings::default();
        settings.snap_threshold = 2.0;
        settings.min_grip = 5.0;
        settings.max_grip = 8.0;
        settings.no_overshoot = true;
        let mut car = Car::new(CarTuning::new(&settings).unwrap(), Vec2::ZERO, 20.0, 5.0);
        let target = to_travel_angle(20.0);
        car.velocity_angle = target - 3.0;
        car.angle_delta = 3.0;
        car.turn_velocity();
        assert_eq!(car.velocity_angle, target);

        settings.no_overshoot = false;
        let mut car = Car::new(CarTuning::new(&settings).unwrap(), Vec2::ZERO, 20.0, 5.0);
        car.velocity_angle = target - 3.0;
        car.angle_delta = 3.0;
        car.turn_velocity();
        assert!((car.velocity_angle - (target + 2.0)).abs() < 1e-5);
    }

    #[test]
    fn test_max_grip_disabled_when_below_min() {
        let mut settings = CarSettings::default();
        settings.min_grip = 2.0;
        settings.max_grip = 1.0;
        let t = CarTuning::new(&settings).unwrap();
        assert_eq!(t.max_grip, f32::INFINITY);
        settings.max_grip = -1.0;
        assert_eq!(CarTuning::new(&settings).unwrap().max_grip, f32::INFINITY);
    }

    #[test]
    fn test_tuning_rejects_degenerate_steer_range() {
        let mut settings = CarSettings::default();
        settings.steer_start_delta = 30.0;
        settings.steer_end_delta = 30.0;
        assert!(matches!(
            CarTuning::new(&settings),
            Err(ConfigError::DegenerateRange { .. })
        ));
    }

    #[test]
    fn test_pass_checkpoint_clears_after_lap() {
        let mut car = Car::new(tuning(), Vec2::ZERO, 0.0, 0.0);
        car.pass_checkpoint(0, false);
        car.pass_checkpoint(1, false);
        assert_eq!(car.passed_checkpoints.len(), 2);
        car.pass_checkpoint(2, true);
        assert!(car.passed_checkpoints.is_empty());
    }

    proptest! {
        #[test]
        fn prop_small_delta_snaps_exactly(
            facing in -720.0f32..720.0,
            fraction in -0.999f32..0.999,
        ) {
            let t = tuning();
            let mut car = Car::new(t, Vec2::ZERO, facing, 1.0);
            let delta = fraction * t.snap_threshold;
            car.velocity_angle = to_travel_angle(facing) - delta;
            car.angle_delta = delta;
            car.turn_velocity();
            prop_assert_eq!(car.velocity_angle, to_travel_angle(facing));
        }

        #[test]
        fn prop_speed_stays_in_bounds(
            inputs in proptest::collection::vec((-1i8..=1, -1i8..=1), 1..300),
            boost in any::<bool>(),
        ) {
            let mut settings = CarSettings::default();
            if boost {
                settings.turn_speed_mult = 1.5;
            }
            let t = CarTuning::new(&settings).unwrap();
            let limit = if boost { t.max_speed * 1.5 } else { t.max_speed };
            let mut car = Car::new(t, Vec2::ZERO, 0.0, 0.0);
            for (throttle, steering) in inputs {
                car.drive(ControlInput::new(throttle as f32, steering as f32));
                prop_assert!(car.speed() >= 0.0);
                prop_assert!(car.speed() <= limit);
                prop_assert!(car.speed() <= t.speed_limit());
            }
        }
    }
}
