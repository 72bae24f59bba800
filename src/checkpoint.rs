//! Watermark persistence for the activity watcher.
//!
//! A checkpoint records the end of the last successfully processed poll
//! window. When one exists the next window starts there instead of at
//! `now - poll_window`, so a delayed or missed run does not lose items.

use crate::error::{PipelineError, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Exclusive end of the last processed window
    pub last_processed_at: DateTime<Utc>,

    /// Items observed across all runs
    pub items_seen: u64,
}

/// Half-open creation-time interval `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl PollWindow {
    pub fn trailing(now: DateTime<Utc>, length: Duration) -> Result<Self> {
        let length = ChronoDuration::from_std(length)
            .map_err(|e| PipelineError::Config(format!("Invalid poll window: {}", e)))?;
        Ok(Self {
            start: now - length,
            end: now,
        })
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

/// File-backed checkpoint store (one JSON document).
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<Checkpoint>> {
        if !self.path.exists() {
            debug!("No checkpoint at {:?}", self.path);
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)?;
        let checkpoint: Checkpoint = serde_json::from_str(&raw).map_err(|e| {
            PipelineError::Checkpoint(format!("Corrupt checkpoint {:?}: {}", self.path, e))
        })?;
        Ok(Some(checkpoint))
    }

    /// Write through a sibling temp file so a crash never leaves a torn document.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(checkpoint)?)?;
        fs::rename(&tmp, &self.path)?;
        info!(
            "Checkpoint saved at {:?} (watermark {})",
            self.path, checkpoint.last_processed_at
        );
        Ok(())
    }

    /// Window for the next run: from the stored watermark when present,
    /// otherwise the trailing window ending at `now`. A watermark at or past
    /// `now` yields the empty window `[now, now)`.
    pub fn window_for(&self, now: DateTime<Utc>, fallback: Duration) -> Result<PollWindow> {
        match self.load()? {
            Some(cp) if cp.last_processed_at < now => Ok(PollWindow {
                start: cp.last_processed_at,
                end: now,
            }),
            Some(cp) => {
                warn!(
                    "Watermark {} is not before now ({}), nothing to poll",
                    cp.last_processed_at, now
                );
                Ok(PollWindow { start: now, end: now })
            }
            None => PollWindow::trailing(now, fallback),
        }
    }
}
