//! Drift Racer headless runner
//!
//! Usage: `drift-racer [settings.json] [tracks.json]`
//!
//! Missing files fall back to the default settings and a built-in square track.

use std::path::{Path, PathBuf};

use drift_racer::sim::{TrackRecord, load_tracks};
use drift_racer::{Settings, training};

const DEFAULT_SETTINGS_PATH: &str = "settings.json";
const DEFAULT_TRACKS_PATH: &str = "tracks.json";

fn load_track_records(path: &Path) -> Result<Vec<TrackRecord>, Box<dyn std::error::Error>> {
    if path.exists() {
        Ok(load_tracks(path)?)
    } else {
        log::info!("No tracks at {}, using the built-in square track", path.display());
        Ok(vec![TrackRecord::square(100.0, 200.0)])
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Drift Racer starting...");

    let mut args = std::env::args().skip(1);
    let settings_path = PathBuf::from(args.next().unwrap_or_else(|| DEFAULT_SETTINGS_PATH.into()));
    let tracks_path = PathBuf::from(args.next().unwrap_or_else(|| DEFAULT_TRACKS_PATH.into()));

    let settings = Settings::load_or_default(&settings_path)?;
    let records = load_track_records(&tracks_path)?;

    let leaderboard = training::run_session(&settings, &records)?;
    for (rank, entry) in leaderboard.entries.iter().enumerate() {
        log::info!(
            "#{:<2} fitness {:>9.1}  generation {:>3}  track {}  laps {}",
            rank + 1,
            entry.fitness,
            entry.generation,
            entry.track,
            entry.laps
        );
    }
    match leaderboard.best() {
        Some(best) => log::info!("Best run: generation {} with fitness {:.1}", best.generation, best.fitness),
        None => log::warn!("No run produced a finite fitness"),
    }
    Ok(())
}
