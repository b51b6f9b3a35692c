//! Linux evdev/uinput backend.
//!
//! ## Permissions
//!
//! The source node under `/dev/input` must be readable and `/dev/uinput`
//! writable:
//! ```bash
//! sudo usermod -aG input $USER
//! # Then log out and back in
//! ```

mod source;
pub(crate) mod sys;
mod uinput;

pub use source::SourceDevice;
pub use uinput::{Lifecycle, VirtualDevice};
