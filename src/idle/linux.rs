//! System idle time for Linux using the X11 XScreenSaver extension.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::screensaver::ConnectionExt as ScreensaverConnectionExt;
use x11rb::rust_connection::RustConnection;

use super::ActivityProbe;

/// Activity probe backed by `XScreenSaverQueryInfo`.
pub struct SystemActivity {
    conn: RustConnection,
    root: u32,
}

impl SystemActivity {
    /// Connect to the X server and verify the extension responds.
    pub fn new() -> Result<Self> {
        let (conn, screen_num) = RustConnection::connect(None)
            .context("Failed to connect to X11 display. Is DISPLAY set?")?;
        let root = conn.setup().roots[screen_num].root;

        conn.screensaver_query_info(root)
            .context("XScreenSaver extension not available")?
            .reply()
            .context("Failed to query XScreenSaver info")?;

        info!("System activity probe ready (X11 XScreenSaver)");
        Ok(Self { conn, root })
    }
}

impl ActivityProbe for SystemActivity {
    fn poll_idle(&mut self) -> Option<Duration> {
        let reply = self
            .conn
            .screensaver_query_info(self.root)
            .ok()?
            .reply()
            .map_err(|e| warn!("XScreenSaver query failed: {}", e))
            .ok()?;

        // ms_since_user_input is the idle time in milliseconds
        Some(Duration::from_millis(reply.ms_since_user_input as u64))
    }
}
