//! Loading typed events and instance snapshots from JSON files

use anyhow::{Context, Result};
use instance_history::{sort_newest_first, InstanceSnapshot, LifecycleEvent};
use std::fs;
use std::path::{Path, PathBuf};

fn read_json_array<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse input file: {:?}", path))
}

/// Load events from all files, merged and sorted newest first
pub fn load_events(paths: &[PathBuf]) -> Result<Vec<LifecycleEvent>> {
    let mut events = Vec::new();
    for path in paths {
        let loaded: Vec<LifecycleEvent> = read_json_array(path)?;
        log::info!("Loaded {} events from {:?}", loaded.len(), path);
        events.extend(loaded);
    }

    sort_newest_first(&mut events);
    Ok(events)
}

/// Load live instance snapshots
pub fn load_snapshots(path: &Path) -> Result<Vec<InstanceSnapshot>> {
    let snapshots: Vec<InstanceSnapshot> = read_json_array(path)?;
    log::info!("Loaded {} instance snapshots from {:?}", snapshots.len(), path);
    Ok(snapshots)
}
