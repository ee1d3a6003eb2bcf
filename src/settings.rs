//! Simulation settings
//!
//! Persisted as JSON. Every section falls back to its defaults, so a file only
//! needs the values it changes.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ConfigError;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to access settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed settings: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Car handling constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarSettings {
    // === Control ===
    /// Top speed (distance per tick) when driving straight
    pub max_speed: f32,
    /// Top speed multiplier at full angle delta (< 1 slows, > 1 boosts)
    pub turn_speed_mult: f32,
    /// Angle delta where the top speed starts to change
    pub speed_start_delta: f32,
    /// Angle delta where the top speed reaches `turn_speed_mult`
    pub speed_end_delta: f32,
    pub acceleration: f32,
    pub braking_force: f32,
    /// Deceleration per tick while coasting
    pub friction: f32,

    // === Steering ===
    /// Degrees of facing change per tick at full lock
    pub steering_response: f32,
    pub turn_steering_mult: f32,
    pub steer_start_delta: f32,
    pub steer_end_delta: f32,

    // === Grip ===
    /// Angle deltas below this snap the velocity onto the facing direction
    pub snap_threshold: f32,
    /// Largest allowed gap between velocity and facing angles
    pub max_delta: f32,
    /// Snap instead of letting a grip correction overshoot past zero
    pub no_overshoot: bool,
    pub min_grip: f32,
    /// Negative or below `min_grip` means unbounded
    pub max_grip: f32,
    /// Angle delta at which the grip curve passes 1
    pub point_scalar: f32,
    /// Base of the exponential grip curve
    pub grip_exp: f32,

    // === Size ===
    pub width: f32,
    pub length: f32,
}

impl Default for CarSettings {
    fn default() -> Self {
        Self {
            max_speed: 6.0,
            turn_speed_mult: 0.7,
            speed_start_delta: 10.0,
            speed_end_delta: 45.0,
            acceleration: 0.08,
            braking_force: 0.15,
            friction: 0.03,

            steering_response: 3.0,
            turn_steering_mult: 0.6,
            steer_start_delta: 15.0,
            steer_end_delta: 60.0,

            snap_threshold: 2.0,
            max_delta: 60.0,
            no_overshoot: true,
            min_grip: 0.4,
            max_grip: 6.0,
            point_scalar: 20.0,
            grip_exp: 1.6,

            width: 10.0,
            length: 20.0,
        }
    }
}

/// Distance sensor layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaySettings {
    /// Maximum distance a ray can see
    pub cast_length: f32,
    /// Ray offsets in degrees relative to the car's travel direction
    pub angles: Vec<f32>,
}

impl Default for RaySettings {
    fn default() -> Self {
        Self {
            cast_length: 300.0,
            angles: vec![-90.0, -45.0, 0.0, 45.0, 90.0],
        }
    }
}

/// Fitness shaping and generation bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    /// Initial speed of freshly spawned cars
    pub spawn_speed: f32,
    /// A car that moves less than this in one tick is stuck and dies
    pub min_move_amount: f32,
    pub death_penalty: f32,
    /// Base reward for reaching a new checkpoint (scaled by the time multiplier)
    pub checkpoint_score: f32,
    /// Reward per unit of distance closed on the nearest unpassed checkpoint
    pub checkpoint_advance_score: f32,
    pub max_time_multiplier: f32,
    /// Time multiplier decay per tick, in thousandths
    pub time_multiplier_decay: f32,
    /// Policy output magnitude needed to steer
    pub steering_snap: f32,
    /// Policy output magnitude needed to accelerate or brake
    pub throttle_snap: f32,
    pub allow_braking: bool,
    pub change_tracks: bool,
    pub generations_per_track: u32,
    pub num_generations: u32,
    pub population: usize,
    /// Hard ceiling on ticks per car
    pub max_ticks: u32,
    pub seed: u64,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            spawn_speed: 1.0,
            min_move_amount: 0.05,
            death_penalty: 50.0,
            checkpoint_score: 100.0,
            checkpoint_advance_score: 0.1,
            max_time_multiplier: 3.0,
            time_multiplier_decay: 5.0,
            steering_snap: 0.5,
            throttle_snap: 0.5,
            allow_braking: true,
            change_tracks: true,
            generations_per_track: 5,
            num_generations: 20,
            population: 50,
            max_ticks: 5_000,
            seed: 0x5eed,
        }
    }
}

impl TrainingSettings {
    /// Per-tick time multiplier decay as a plain fraction
    pub fn decay_per_tick(&self) -> f32 {
        self.time_multiplier_decay / 1000.0
    }
}

/// All simulation settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub car: CarSettings,
    pub rays: RaySettings,
    pub training: TrainingSettings,
}

impl Settings {
    /// Parse settings from a JSON string and check the values
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path)?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Load settings, falling back to defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
        if path.exists() {
            Self::load(path)
        } else {
            log::info!("No settings at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }

    /// Fail fast on values the simulation cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        crate::sim::CarTuning::new(&self.car)?;
        crate::ensure_non_negative("rays.cast_length", self.rays.cast_length)?;
        for &angle in &self.rays.angles {
            crate::ensure_finite("rays.angles", angle)?;
        }
        let t = &self.training;
        crate::ensure_non_negative("training.spawn_speed", t.spawn_speed)?;
        crate::ensure_non_negative("training.min_move_amount", t.min_move_amount)?;
        crate::ensure_finite("training.death_penalty", t.death_penalty)?;
        crate::ensure_finite("training.checkpoint_score", t.checkpoint_score)?;
        crate::ensure_finite("training.checkpoint_advance_score", t.checkpoint_advance_score)?;
        crate::ensure_non_negative("training.max_time_multiplier", t.max_time_multiplier)?;
        crate::ensure_non_negative("training.time_multiplier_decay", t.time_multiplier_decay)?;
        crate::ensure_non_negative("training.steering_snap", t.steering_snap)?;
        crate::ensure_non_negative("training.throttle_snap", t.throttle_snap)?;
        Ok(())
    }
}
