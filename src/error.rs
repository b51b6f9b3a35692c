//! Error types for the relay.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for evrelay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while setting up or tearing down a relay.
#[derive(Debug, Error)]
pub enum Error {
    /// A device node could not be opened.
    #[error("cannot open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A descriptor handed over by the parent process is not usable.
    #[error("descriptor {0} is not open")]
    BadDescriptor(i32),

    /// The source refused a capability bit-vector query.
    #[error("cannot query {what} capabilities: {source}")]
    CapabilityQuery {
        what: &'static str,
        #[source]
        source: io::Error,
    },

    /// The uinput node refused a capability registration.
    #[error("cannot register {what} code {code:#x}: {source}")]
    Register {
        what: &'static str,
        code: u16,
        #[source]
        source: io::Error,
    },

    /// The source refused an axis calibration query.
    #[error("cannot read calibration of axis {axis:#x}: {source}")]
    Calibration {
        axis: u16,
        #[source]
        source: io::Error,
    },

    /// Writing the device descriptor to uinput failed.
    #[error("cannot write device descriptor: {0}")]
    Descriptor(#[source] io::Error),

    /// `UI_DEV_CREATE` failed.
    #[error("cannot create virtual device: {0}")]
    Create(#[source] io::Error),

    /// `UI_DEV_DESTROY` failed.
    #[error("cannot destroy virtual device: {0}")]
    Destroy(#[source] io::Error),

    /// The virtual device has already been created once.
    #[error("virtual device was already activated")]
    AlreadyActive,

    /// Teardown was requested for a device that is not active.
    #[error("virtual device is not active")]
    NotActive,

    /// No `/dev/input/event*` node matched the requested USB id.
    #[error("no input device with USB id {0}")]
    NoMatchingDevice(String),

    /// The configuration file could not be read.
    #[error("cannot read config {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid TOML for this program.
    #[error("cannot parse config {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Installing the interrupt handler failed.
    #[error("cannot install interrupt handler: {0}")]
    Signal(#[from] ctrlc::Error),

    /// Other I/O errors.
    #[error(transparent)]
    Io(#[from] io::Error),
}
