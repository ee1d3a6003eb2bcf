//! Fixed timestep simulation tick
//!
//! One tick advances one agent: sense with rays, ask the policy, drive the
//! car, then score whatever the track reports. Agents never share mutable
//! state, so a generation is just each agent run to completion in turn.

use serde::{Deserialize, Serialize};

use super::car::{Car, CarTuning, ControlInput};
use super::raycast::Ray;
use super::track::{CollisionReport, Track};
use crate::consts::EXTRA_OBSERVATIONS;
use crate::settings::{Settings, TrainingSettings};
use crate::ConfigError;

/// A driver: maps an observation vector to two raw outputs
///
/// Output 0 steers, output 1 drives the throttle. The observation holds one
/// distance per ray, then speed, angle delta and the bearing to the nearest
/// unpassed checkpoint.
pub trait Policy {
    fn activate(&mut self, observation: &[f32]) -> [f32; 2];
}

impl<F> Policy for F
where
    F: FnMut(&[f32]) -> [f32; 2],
{
    fn activate(&mut self, observation: &[f32]) -> [f32; 2] {
        self(observation)
    }
}

/// Snap raw policy outputs onto {-1, 0, 1} controls
pub fn snap_outputs(outputs: [f32; 2], training: &TrainingSettings) -> ControlInput {
    let steering = if outputs[0] > training.steering_snap {
        1.0
    } else if outputs[0] < -training.steering_snap {
        -1.0
    } else {
        0.0
    };

    let throttle = if outputs[1] > training.throttle_snap {
        1.0
    } else if outputs[1] < -training.throttle_snap && training.allow_braking {
        -1.0
    } else {
        0.0
    };

    ControlInput { throttle, steering }
}

/// Why an agent stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeathCause {
    /// Moved less than the minimum in one tick
    Stuck,
    HitBorder,
    /// Reached the tick ceiling
    OutOfTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentPhase {
    Driving,
    Finished(DeathCause),
}

/// One car plus its sensors and score
#[derive(Debug, Clone)]
pub struct Agent {
    pub car: Car,
    rays: Vec<Ray>,
    ray_offsets: Vec<f32>,
    pub fitness: f32,
    pub time_multiplier: f32,
    pub ticks: u32,
    pub laps: u32,
    /// Checkpoint passes including finish line crossings
    pub checkpoints_passed: u32,
    /// Flags from the latest collision check (for display)
    pub last_collision: CollisionReport,
    pub phase: AgentPhase,
}

impl Agent {
    pub fn rays(&self) -> &[Ray] {
        &self.rays
    }

    pub fn is_alive(&self) -> bool {
        self.phase == AgentPhase::Driving
    }

    /// Cast every ray from the car and build the policy input
    ///
    /// Rays that hit nothing report their full cast length.
    pub fn observe(&mut self, track: &Track) -> Vec<f32> {
        let car = &self.car;
        let mut observation = Vec::with_capacity(self.rays.len() + EXTRA_OBSERVATIONS);
        for (ray, offset) in self.rays.iter_mut().zip(&self.ray_offsets) {
            ray.set_origin(car.position());
            ray.set_angle(car.heading() + offset);
            let hit = ray.multi_cast(&[track.inner_border(), track.outer_border()]);
            observation.push(hit.map_or(ray.cast_length(), |h| h.distance));
        }
        observation.push(car.speed());
        observation.push(car.angle_delta());
        observation.push(car.last_checkpoint.bearing);
        observation
    }

    fn finish(&mut self, cause: DeathCause) {
        self.phase = AgentPhase::Finished(cause);
    }
}

/// Summary of one agent's run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentReport {
    pub fitness: f32,
    pub ticks: u32,
    pub laps: u32,
    pub checkpoints_passed: u32,
    pub cause: DeathCause,
}

/// Runs agents on one track with one set of settings
#[derive(Debug, Clone)]
pub struct Simulation<'a> {
    track: &'a Track,
    settings: &'a Settings,
    tuning: CarTuning,
}

impl<'a> Simulation<'a> {
    pub fn new(track: &'a Track, settings: &'a Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            track,
            settings,
            tuning: CarTuning::new(&settings.car)?,
        })
    }

    pub fn track(&self) -> &Track {
        self.track
    }

    /// Place a new agent on the start line
    pub fn spawn_agent(&self) -> Agent {
        let track = self.track;
        let training = &self.settings.training;
        let mut car = Car::new(
            self.tuning,
            track.start_point(),
            track.start_angle(),
            training.spawn_speed,
        );
        car.last_checkpoint =
            track.nearest_unpassed_checkpoint(car.position(), car.heading(), &car.passed_checkpoints);

        let rays_cfg = &self.settings.rays;
        let rays = rays_cfg
            .angles
            .iter()
            .map(|offset| Ray::new(car.position(), car.heading() + offset, rays_cfg.cast_length))
            .collect();

        Agent {
            car,
            rays,
            ray_offsets: rays_cfg.angles.clone(),
            fitness: 0.0,
            time_multiplier: training.max_time_multiplier,
            ticks: 0,
            laps: 0,
            checkpoints_passed: 0,
            last_collision: CollisionReport::default(),
            phase: AgentPhase::Driving,
        }
    }

    /// Advance one agent by one tick
    pub fn tick<P: Policy + ?Sized>(&self, agent: &mut Agent, policy: &mut P) -> AgentPhase {
        if !agent.is_alive() {
            return agent.phase;
        }
        let track = self.track;
        let training = &self.settings.training;

        // Movement from the previous tick decides whether the car is stuck
        if agent.car.distance_moved() < training.min_move_amount {
            agent.fitness -= training.death_penalty;
            agent.finish(DeathCause::Stuck);
            log::debug!("Agent stuck after {} ticks", agent.ticks);
            return agent.phase;
        }

        agent.ticks += 1;

        let observation = agent.observe(track);
        let input = snap_outputs(policy.activate(&observation), training);
        agent.car.drive(input);

        let report = track.collide(agent.car.hitbox(), &agent.car.passed_checkpoints);
        let border_hit = report.border_hit;
        let new_checkpoint = report.new_checkpoint;
        let new_lap = report.new_lap;
        agent.last_collision = report;

        if border_hit {
            agent.fitness -= training.death_penalty;
            agent.finish(DeathCause::HitBorder);
            log::debug!(
                "Agent hit the border after {} ticks ({:.1} from the nearest wall)",
                agent.ticks,
                track.border_clearance(agent.car.position())
            );
            return agent.phase;
        }

        let car = &mut agent.car;
        if let Some(index) = new_checkpoint {
            agent.fitness += training.checkpoint_score * agent.time_multiplier;
            agent.time_multiplier = training.max_time_multiplier;
            agent.checkpoints_passed += 1;

            // Bookkeeping for this pass happens before the lap reset clears the set
            car.pass_checkpoint(index, new_lap);
            if new_lap {
                agent.laps += 1;
            }
            car.last_checkpoint =
                track.nearest_unpassed_checkpoint(car.position(), car.heading(), &car.passed_checkpoints);
        } else {
            agent.time_multiplier = (agent.time_multiplier - training.decay_per_tick()).max(1.0);

            let latest =
                track.nearest_unpassed_checkpoint(car.position(), car.heading(), &car.passed_checkpoints);
            if latest.distance < car.last_checkpoint.distance {
                agent.fitness +=
                    (car.last_checkpoint.distance - latest.distance) * training.checkpoint_advance_score;
                car.last_checkpoint.distance = latest.distance;
            }
            car.last_checkpoint.bearing = latest.bearing;
        }

        if agent.ticks >= training.max_ticks {
            agent.finish(DeathCause::OutOfTime);
        }
        agent.phase
    }

    /// Run one fresh agent until it stops
    pub fn run_agent<P: Policy + ?Sized>(&self, policy: &mut P) -> AgentReport {
        let mut agent = self.spawn_agent();
        let cause = loop {
            if let AgentPhase::Finished(cause) = self.tick(&mut agent, policy) {
                break cause;
            }
        };
        AgentReport {
            fitness: agent.fitness,
            ticks: agent.ticks,
            laps: agent.laps,
            checkpoints_passed: agent.checkpoints_passed,
            cause,
        }
    }

    /// Run every policy in order, one agent each
    pub fn evaluate_generation<P: Policy>(&self, policies: &mut [P]) -> Vec<AgentReport> {
        policies.iter_mut().map(|p| self.run_agent(p)).collect()
    }
}
