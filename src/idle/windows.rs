//! System idle time for Windows using the GetLastInputInfo Win32 API.

use anyhow::{anyhow, Result};
use std::time::Duration;
use tracing::info;
use windows::Win32::System::SystemInformation::GetTickCount;
use windows::Win32::UI::Input::KeyboardAndMouse::{GetLastInputInfo, LASTINPUTINFO};

use super::ActivityProbe;

/// Activity probe backed by `GetLastInputInfo`.
pub struct SystemActivity;

impl SystemActivity {
    pub fn new() -> Result<Self> {
        last_input_idle().ok_or_else(|| anyhow!("GetLastInputInfo failed"))?;
        info!("System activity probe ready (GetLastInputInfo)");
        Ok(Self)
    }
}

impl ActivityProbe for SystemActivity {
    fn poll_idle(&mut self) -> Option<Duration> {
        last_input_idle()
    }
}

fn last_input_idle() -> Option<Duration> {
    unsafe {
        let mut last_input = LASTINPUTINFO {
            cbSize: std::mem::size_of::<LASTINPUTINFO>() as u32,
            dwTime: 0,
        };

        if GetLastInputInfo(&mut last_input).as_bool() {
            let current_tick = GetTickCount();
            let idle_ms = current_tick.wrapping_sub(last_input.dwTime);
            Some(Duration::from_millis(idle_ms as u64))
        } else {
            None
        }
    }
}
