//! Best-run leaderboard
//!
//! Tracks the top 10 agent runs of a training session.

use serde::{Deserialize, Serialize};

use crate::sim::AgentReport;

/// Maximum number of runs to keep
pub const MAX_ENTRIES: usize = 10;

/// A single leaderboard entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub fitness: f32,
    /// Generation the run belongs to
    pub generation: u32,
    pub laps: u32,
    /// Index of the track the run was driven on
    pub track: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a fitness would make the board
    pub fn qualifies(&self, fitness: f32) -> bool {
        fitness.is_finite()
            && (self.entries.len() < MAX_ENTRIES
                || self.entries.last().is_some_and(|e| fitness > e.fitness))
    }

    /// Insert a run, keeping entries sorted by descending fitness
    ///
    /// Returns the rank achieved (1-indexed) or None if the run didn't
    /// qualify. Ties keep the earlier run ahead.
    pub fn add_run(&mut self, entry: LeaderboardEntry) -> Option<usize> {
        if !self.qualifies(entry.fitness) {
            return None;
        }
        let index = self.entries.partition_point(|e| e.fitness >= entry.fitness);
        self.entries.insert(index, entry);
        self.entries.truncate(MAX_ENTRIES);
        Some(index + 1)
    }

    /// Offer a whole generation's reports
    ///
    /// Returns how many of them made the board.
    pub fn record_generation(&mut self, generation: u32, track: usize, reports: &[AgentReport]) -> usize {
        reports
            .iter()
            .filter_map(|r| {
                self.add_run(LeaderboardEntry {
                    fitness: r.fitness,
                    generation,
                    laps: r.laps,
                    track,
                })
            })
            .count()
    }

    pub fn best(&self) -> Option<&LeaderboardEntry> {
        self.entries.first()
    }
}
