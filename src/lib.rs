//! # evrelay
//!
//! Mirror a Linux input device through uinput under a different USB
//! vendor/product id.
//!
//! The relay copies the source device's capabilities (event types, axes
//! with their calibration, keys) onto a freshly created virtual device and
//! then forwards every input record unchanged, optionally dropping one
//! button code. If the source disappears the relay keeps the virtual
//! device alive and reattaches when the source comes back, so consumers of
//! the virtual device never see it vanish.
//!
//! ## Quick Start
//!
//! ```no_run
//! use evrelay::{
//!     CancelToken, EventFilter, Relay, SourceDevice, VirtualDevice, VirtualDeviceDescriptor,
//!     cancel_on_interrupt, mirror,
//! };
//!
//! # fn main() -> evrelay::Result<()> {
//! let source = SourceDevice::open("/dev/input/event16")?;
//! let mut device = VirtualDevice::open("/dev/uinput")?;
//!
//! let mut descriptor = VirtualDeviceDescriptor::default();
//! mirror(&source, &mut device, &mut descriptor)?;
//! device.activate(&descriptor)?;
//!
//! let cancel = CancelToken::new();
//! cancel_on_interrupt(&cancel)?;
//!
//! let outcome = Relay::new(source, device, cancel)
//!     .with_reopen("/dev/input/event16", SourceDevice::reopen)
//!     .with_filter(EventFilter::suppress(evrelay::BTN_MODE))
//!     .run();
//! println!("stopped: {}", outcome.reason);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`capability`] copies capabilities from a [`CapabilitySource`] to a
//!   [`CapabilityTarget`], filling in a [`VirtualDeviceDescriptor`].
//! - [`relay`] is the `Init → Steady ⇄ Failed → Halt` state machine.
//! - [`SourceDevice`] and [`VirtualDevice`] are the evdev and uinput ends;
//!   both implement the traits above, so everything else is testable with
//!   in-memory fakes.

pub mod bits;
pub mod cancel;
pub mod capability;
pub mod config;
pub mod descriptor;
pub mod discover;
pub mod error;
pub mod event;
pub mod filter;
pub mod relay;

mod platform;

// Re-exports
pub use bits::{CapabilityKind, CapabilitySet};
pub use cancel::{CancelToken, cancel_on_interrupt};
pub use capability::{CapabilitySource, CapabilityTarget, mirror};
pub use config::{RelayConfig, UsbId};
pub use descriptor::{AxisCalibration, VirtualDeviceDescriptor};
pub use discover::find_by_usb_id;
pub use error::{Error, Result};
pub use event::InputEvent;
pub use filter::{BTN_MODE, EventFilter};
pub use platform::{Lifecycle, SourceDevice, VirtualDevice};
pub use relay::{
    EventSink, HaltReason, HangupWatch, RecoveryPolicy, Relay, RelayOutcome, RelayState,
    RelayStats, Timings,
};
