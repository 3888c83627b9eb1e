//! System idle time for macOS using IOKit `HIDIdleTime`.

use anyhow::{anyhow, Result};
use core_foundation::base::TCFType;
use core_foundation::number::CFNumber;
use core_foundation::string::CFString;
use std::time::Duration;
use tracing::info;

use super::ActivityProbe;

#[link(name = "IOKit", kind = "framework")]
extern "C" {
    fn IOServiceGetMatchingService(
        main_port: u32,
        matching: core_foundation::base::CFTypeRef,
    ) -> u32;
    fn IOServiceMatching(name: *const std::os::raw::c_char) -> core_foundation::base::CFTypeRef;
    fn IORegistryEntryCreateCFProperty(
        entry: u32,
        key: core_foundation::string::CFStringRef,
        allocator: core_foundation::base::CFAllocatorRef,
        options: u32,
    ) -> core_foundation::base::CFTypeRef;
    fn IOObjectRelease(object: u32) -> i32;
}

/// Activity probe backed by the IOHIDSystem `HIDIdleTime` registry property.
pub struct SystemActivity;

impl SystemActivity {
    /// Verify the registry property is readable before handing out a probe.
    pub fn new() -> Result<Self> {
        hid_idle_time().ok_or_else(|| anyhow!("IOHIDSystem HIDIdleTime not readable"))?;
        info!("System activity probe ready (IOKit HIDIdleTime)");
        Ok(Self)
    }
}

impl ActivityProbe for SystemActivity {
    fn poll_idle(&mut self) -> Option<Duration> {
        hid_idle_time()
    }
}

/// Read the nanosecond idle counter from the IOHIDSystem registry entry.
fn hid_idle_time() -> Option<Duration> {
    unsafe {
        let service_name = std::ffi::CString::new("IOHIDSystem").ok()?;
        let matching = IOServiceMatching(service_name.as_ptr());
        if matching.is_null() {
            return None;
        }

        let service = IOServiceGetMatchingService(0, matching);
        if service == 0 {
            return None;
        }

        let key = CFString::new("HIDIdleTime");
        let property =
            IORegistryEntryCreateCFProperty(service, key.as_concrete_TypeRef(), std::ptr::null(), 0);

        IOObjectRelease(service);

        if property.is_null() {
            return None;
        }

        let cf_number: CFNumber = CFNumber::wrap_under_create_rule(property as *mut _);
        let nanoseconds: i64 = cf_number.to_i64()?;

        Some(Duration::from_nanos(nanoseconds as u64))
    }
}
