//! Generation runner
//!
//! Evolution itself is out of scope; this module rotates tracks between
//! generations and supplies a seeded random linear driver so a session can be
//! run end to end.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use thiserror::Error;

use crate::consts::EXTRA_OBSERVATIONS;
use crate::leaderboard::Leaderboard;
use crate::settings::{Settings, TrainingSettings};
use crate::sim::{AgentReport, Policy, Simulation, Track, TrackError, TrackRecord};
use crate::ConfigError;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("no tracks to train on")]
    NoTracks,
    #[error("track {index} is invalid: {source}")]
    Track {
        index: usize,
        #[source]
        source: TrackError,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Seeded choice of which track each generation drives on
#[derive(Debug, Clone)]
pub struct TrackSchedule {
    tracks: Vec<Track>,
    current: usize,
    generations_on_track: u32,
    change_tracks: bool,
    generations_per_track: u32,
    rng: Pcg32,
}

impl TrackSchedule {
    pub fn new(records: &[TrackRecord], training: &TrainingSettings) -> Result<Self, TrainingError> {
        if records.is_empty() {
            return Err(TrainingError::NoTracks);
        }
        let tracks = records
            .iter()
            .enumerate()
            .map(|(index, record)| Track::new(record).map_err(|source| TrainingError::Track { index, source }))
            .collect::<Result<Vec<_>, _>>()?;

        let mut rng = Pcg32::seed_from_u64(training.seed);
        let current = rng.random_range(0..tracks.len());
        log::info!("Training on {} track(s), starting with track {current}", tracks.len());

        Ok(Self {
            tracks,
            current,
            generations_on_track: 0,
            change_tracks: training.change_tracks,
            generations_per_track: training.generations_per_track.max(1),
            rng,
        })
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> &Track {
        &self.tracks[self.current]
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Mark a generation as finished
    ///
    /// Returns true when a new track was drawn. The draw may land on the
    /// track that was already current.
    pub fn advance(&mut self) -> bool {
        self.generations_on_track += 1;
        if !self.change_tracks || self.generations_on_track < self.generations_per_track {
            return false;
        }
        self.generations_on_track = 0;
        self.current = self.rng.random_range(0..self.tracks.len());
        log::info!("Switching to track {}", self.current);
        true
    }
}

/// Single-layer tanh driver with fixed random weights
#[derive(Debug, Clone, PartialEq)]
pub struct LinearPolicy {
    /// One weight row per output
    weights: [Vec<f32>; 2],
    bias: [f32; 2],
    /// Per-input factors that bring observations to roughly [-1, 1]
    input_scale: Vec<f32>,
}

impl LinearPolicy {
    /// Random weights in [-1, 1], scaled for the observation layout of `settings`
    pub fn random(settings: &Settings, rng: &mut impl Rng) -> Self {
        let mut input_scale: Vec<f32> = settings
            .rays
            .angles
            .iter()
            .map(|_| 1.0 / settings.rays.cast_length.max(1.0))
            .collect();
        input_scale.push(1.0 / settings.car.max_speed.max(1.0));
        input_scale.push(1.0 / settings.car.max_delta.max(1.0));
        input_scale.push(1.0 / 180.0);
        debug_assert_eq!(input_scale.len(), settings.rays.angles.len() + EXTRA_OBSERVATIONS);

        let mut row = |n: usize| -> Vec<f32> { (0..n).map(|_| rng.random_range(-1.0..=1.0)).collect() };
        let n = input_scale.len();
        let weights = [row(n), row(n)];
        let bias = [rng.random_range(-1.0..=1.0), rng.random_range(-1.0..=1.0)];

        Self {
            weights,
            bias,
            input_scale,
        }
    }
}

impl Policy for LinearPolicy {
    fn activate(&mut self, observation: &[f32]) -> [f32; 2] {
        let mut out = self.bias;
        for (o, row) in out.iter_mut().zip(&self.weights) {
            *o += observation
                .iter()
                .zip(&self.input_scale)
                .zip(row)
                .map(|((x, s), w)| x * s * w)
                .sum::<f32>();
            *o = o.tanh();
        }
        out
    }
}

fn log_generation(generation: u32, track: usize, reports: &[AgentReport]) {
    if reports.is_empty() {
        return;
    }
    let best = reports.iter().map(|r| r.fitness).fold(f32::NEG_INFINITY, f32::max);
    let mean = reports.iter().map(|r| r.fitness).sum::<f32>() / reports.len() as f32;
    let laps: u32 = reports.iter().map(|r| r.laps).sum();
    log::info!("Generation {generation} on track {track}: best {best:.1}, mean {mean:.1}, laps {laps}");
}

/// Run `num_generations` generations of random linear drivers
pub fn run_session(settings: &Settings, records: &[TrackRecord]) -> Result<Leaderboard, TrainingError> {
    settings.validate()?;
    let training = &settings.training;
    let mut schedule = TrackSchedule::new(records, training)?;
    let mut rng = Pcg32::seed_from_u64(training.seed.wrapping_add(1));
    let mut leaderboard = Leaderboard::new();

    for generation in 0..training.num_generations {
        let track = schedule.current_index();
        let sim = Simulation::new(schedule.current(), settings)?;
        let mut policies: Vec<LinearPolicy> = (0..training.population)
            .map(|_| LinearPolicy::random(settings, &mut rng))
            .collect();

        let reports = sim.evaluate_generation(&mut policies);
        log_generation(generation, track, &reports);
        let previous_best = leaderboard.best().map(|e| e.fitness);
        if leaderboard.record_generation(generation, track, &reports) > 0 {
            if let Some(best) = leaderboard.best().filter(|b| previous_best != Some(b.fitness)) {
                log::info!("New best fitness {:.1} in generation {generation}", best.fitness);
            }
        }
        schedule.advance();
    }

    Ok(leaderboard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn records(n: usize) -> Vec<TrackRecord> {
        (0..n).map(|i| TrackRecord::square(100.0 + i as f32 * 10.0, 200.0 + i as f32 * 10.0)).collect()
    }

    #[test]
    fn test_no_tracks() {
        let err = TrackSchedule::new(&[], &TrainingSettings::default()).unwrap_err();
        assert!(matches!(err, TrainingError::NoTracks));
    }

    #[test]
    fn test_invalid_track_reports_index() {
        let mut list = records(2);
        list[1].start_point = Vec2::ZERO;
        let err = TrackSchedule::new(&list, &TrainingSettings::default()).unwrap_err();
        assert!(matches!(err, TrainingError::Track { index: 1, .. }));
    }

    #[test]
    fn test_fixed_track_never_changes() {
        let training = TrainingSettings {
            change_tracks: false,
            ..Default::default()
        };
        let mut schedule = TrackSchedule::new(&records(3), &training).unwrap();
        let start = schedule.current_index();
        for _ in 0..20 {
            assert!(!schedule.advance());
        }
        assert_eq!(schedule.current_index(), start);
    }

    #[test]
    fn test_track_draws_every_n_generations() {
        let training = TrainingSettings {
            generations_per_track: 3,
            ..Default::default()
        };
        let mut schedule = TrackSchedule::new(&records(4), &training).unwrap();
        let draws: Vec<bool> = (0..9).map(|_| schedule.advance()).collect();
        assert_eq!(draws, vec![false, false, true, false, false, true, false, false, true]);
        assert!(schedule.current_index() < schedule.len());
    }

    #[test]
    fn test_schedule_is_seeded() {
        let training = TrainingSettings {
            generations_per_track: 1,
            ..Default::default()
        };
        let sequence = || {
            let mut schedule = TrackSchedule::new(&records(5), &training).unwrap();
            (0..10)
                .map(|_| {
                    schedule.advance();
                    schedule.current_index()
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(sequence(), sequence());
    }

    #[test]
    fn test_linear_policy_outputs_bounded() {
        let settings = Settings::default();
        let mut rng = Pcg32::seed_from_u64(7);
        let mut policy = LinearPolicy::random(&settings, &mut rng);
        let obs = [300.0, 150.0, 42.0, 7.0, 300.0, 5.5, -30.0, 179.0];
        let out = policy.activate(&obs);
        assert!(out.iter().all(|o| (-1.0..=1.0).contains(o)));
        assert_eq!(policy.activate(&obs), out);
    }

    #[test]
    fn test_run_session_is_deterministic() {
        let mut settings = Settings::default();
        settings.training.population = 4;
        settings.training.num_generations = 3;
        settings.training.max_ticks = 300;
        let first = run_session(&settings, &records(2)).unwrap();
        let second = run_session(&settings, &records(2)).unwrap();
        assert_eq!(first.entries.len(), 10);
        assert_eq!(first, second);
    }

    #[test]
    fn test_run_session_best_is_top_entry() {
        let mut settings = Settings::default();
        settings.training.population = 5;
        settings.training.num_generations = 2;
        settings.training.max_ticks = 200;
        let board = run_session(&settings, &records(1)).unwrap();
        let top = board.entries.iter().map(|e| e.fitness).fold(f32::NEG_INFINITY, f32::max);
        assert_eq!(board.best().map(|e| e.fitness), Some(top));
        assert!(board.entries.windows(2).all(|w| w[0].fitness >= w[1].fitness));
    }

    #[test]
    fn test_run_session_rejects_bad_config() {
        let mut settings = Settings::default();
        settings.car.steer_end_delta = settings.car.steer_start_delta;
        let err = run_session(&settings, &records(1)).unwrap_err();
        assert!(matches!(err, TrainingError::Config(ConfigError::DegenerateRange { .. })));
    }
}
