//! JSONL session log: one line per overlay lifecycle event.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::debug;

/// Overlay lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStart {
        timestamp: DateTime<Utc>,
        version: String,
    },
    SessionEnd {
        timestamp: DateTime<Utc>,
        times_shown: u64,
    },
    OverlayShown {
        timestamp: DateTime<Utc>,
        idle_after_seconds: u64,
    },
    OverlayHidden {
        timestamp: DateTime<Utc>,
        visible_seconds: u64,
    },
    GalleryLoaded {
        timestamp: DateTime<Utc>,
        image_count: usize,
    },
    GalleryFailed {
        timestamp: DateTime<Utc>,
    },
}

/// Append-only JSONL writer, one file per day.
pub struct SessionLog {
    writer: BufWriter<std::fs::File>,
    path: PathBuf,
}

impl SessionLog {
    /// Open (or create) today's log file in the given directory.
    pub fn new(logs_dir: impl Into<PathBuf>) -> Result<Self> {
        let logs_dir = logs_dir.into();
        std::fs::create_dir_all(&logs_dir)
            .with_context(|| format!("Failed to create logs directory: {:?}", logs_dir))?;

        let filename = format!("session-{}.jsonl", Local::now().format("%Y%m%d"));
        let path = logs_dir.join(filename);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open session log: {:?}", path))?;

        debug!("Session log at {:?}", path);
        Ok(Self {
            writer: BufWriter::new(file),
            path,
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn append(&mut self, event: &SessionEvent) -> Result<()> {
        let line = serde_json::to_string(event)?;
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn log_session_start(&mut self, version: &str) -> Result<()> {
        self.append(&SessionEvent::SessionStart {
            timestamp: Utc::now(),
            version: version.to_string(),
        })
    }

    pub fn log_session_end(&mut self, times_shown: u64) -> Result<()> {
        self.append(&SessionEvent::SessionEnd {
            timestamp: Utc::now(),
            times_shown,
        })
    }

    pub fn log_overlay_shown(&mut self, idle_after_seconds: u64) -> Result<()> {
        self.append(&SessionEvent::OverlayShown {
            timestamp: Utc::now(),
            idle_after_seconds,
        })
    }

    pub fn log_overlay_hidden(&mut self, visible_seconds: u64) -> Result<()> {
        self.append(&SessionEvent::OverlayHidden {
            timestamp: Utc::now(),
            visible_seconds,
        })
    }

    pub fn log_gallery_loaded(&mut self, image_count: usize) -> Result<()> {
        self.append(&SessionEvent::GalleryLoaded {
            timestamp: Utc::now(),
            image_count,
        })
    }

    pub fn log_gallery_failed(&mut self) -> Result<()> {
        self.append(&SessionEvent::GalleryFailed {
            timestamp: Utc::now(),
        })
    }
}
