//! Platform-specific implementations.

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::*;

// evdev and uinput only exist on Linux
#[cfg(not(target_os = "linux"))]
compile_error!("evrelay only supports Linux");
