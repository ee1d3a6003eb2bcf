//! Deterministic simulation module
//!
//! All driving logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - No shared mutable state between agents
//! - Stable iteration order (checkpoints by index, geometries by list order)
//! - No rendering or platform dependencies

pub mod car;
pub mod geometry;
pub mod raycast;
pub mod tick;
pub mod track;

pub use car::{Car, CarTuning, ControlInput};
pub use geometry::{Polygon, RayTarget, Ring, Segment, SegmentIntersection};
pub use raycast::{Ray, RayHit, hit_distance};
pub use tick::{Agent, AgentPhase, AgentReport, DeathCause, Policy, Simulation, snap_outputs};
pub use track::{
    Checkpoint, CheckpointMetrics, CollisionReport, Track, TrackError, TrackRecord, load_tracks,
    parse_tracks,
};
