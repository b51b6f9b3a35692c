//! Virtual device over the uinput control node.
//!
//! Uses the legacy `uinput_user_dev` write for the descriptor so that the
//! per-axis calibration tables are submitted in one go, then
//! `UI_DEV_CREATE`. Capabilities must be registered before activation;
//! the kernel rejects changes to a created device.

use super::sys;
use crate::bits::CapabilityKind;
use crate::capability::CapabilityTarget;
use crate::descriptor::VirtualDeviceDescriptor;
use crate::error::{Error, Result};
use crate::event::InputEvent;
use crate::relay::EventSink;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

/// Lifecycle of a [`VirtualDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Control node open, capabilities may still be registered.
    Registered,
    /// `UI_DEV_CREATE` succeeded; the device is visible to userspace.
    Active,
    /// `UI_DEV_DESTROY` succeeded.
    Destroyed,
}

/// Handle to the uinput control node backing the relay's virtual device.
#[derive(Debug)]
pub struct VirtualDevice {
    file: File,
    state: Lifecycle,
}

impl VirtualDevice {
    /// Open the uinput control node at `path` (write-only, non-blocking).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .map_err(|source| Error::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::from_file(file))
    }

    /// Adopt a control node descriptor opened by the parent process.
    pub fn from_fd(fd: OwnedFd) -> Self {
        Self::from_file(File::from(fd))
    }

    /// Adopt inherited descriptor `fd` if it is open.
    ///
    /// # Safety
    ///
    /// `fd` must not be owned by anything else in this process.
    pub unsafe fn from_inherited(fd: RawFd) -> Result<Self> {
        if !sys::is_open(fd) {
            return Err(Error::BadDescriptor(fd));
        }
        Ok(Self::from_fd(unsafe { OwnedFd::from_raw_fd(fd) }))
    }

    fn from_file(file: File) -> Self {
        Self {
            file,
            state: Lifecycle::Registered,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> Lifecycle {
        self.state
    }

    /// Submit `descriptor` and create the device.
    ///
    /// Call once, after every capability has been registered. Either step
    /// failing leaves the device unusable; there is no retry.
    pub fn activate(&mut self, descriptor: &VirtualDeviceDescriptor) -> Result<()> {
        if self.state != Lifecycle::Registered {
            return Err(Error::AlreadyActive);
        }

        let bytes = descriptor.encode();
        let written = self.file.write(&bytes).map_err(Error::Descriptor)?;
        if written != bytes.len() {
            return Err(Error::Descriptor(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short descriptor write ({written} of {} bytes)", bytes.len()),
            )));
        }

        unsafe { sys::ui_dev_create(self.as_raw_fd()) }.map_err(|e| Error::Create(e.into()))?;
        self.state = Lifecycle::Active;
        log::info!(
            "virtual device \"{}\" created as {}",
            descriptor.name(),
            descriptor.identity()
        );
        Ok(())
    }

    /// Destroy the device.
    ///
    /// Returns [`Error::NotActive`] if the device was never activated or is
    /// already gone; callers treat any error here as non-fatal.
    pub fn deactivate(&mut self) -> Result<()> {
        if self.state != Lifecycle::Active {
            return Err(Error::NotActive);
        }
        unsafe { sys::ui_dev_destroy(self.as_raw_fd()) }.map_err(|e| Error::Destroy(e.into()))?;
        self.state = Lifecycle::Destroyed;
        log::debug!("virtual device destroyed");
        Ok(())
    }
}

impl CapabilityTarget for VirtualDevice {
    fn register(&mut self, kind: CapabilityKind, code: u16) -> io::Result<()> {
        let set_bit = match kind {
            CapabilityKind::EventType => sys::ui_set_evbit,
            CapabilityKind::Axis => sys::ui_set_absbit,
            CapabilityKind::Key => sys::ui_set_keybit,
        };
        unsafe { set_bit(self.as_raw_fd(), code.into()) }?;
        Ok(())
    }
}

impl EventSink for VirtualDevice {
    fn write_event(&mut self, event: &InputEvent) -> io::Result<()> {
        let written = self.file.write(event.as_bytes())?;
        if written != InputEvent::SIZE {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short event write ({written} of {} bytes)", InputEvent::SIZE),
            ));
        }
        Ok(())
    }
}

impl Drop for VirtualDevice {
    fn drop(&mut self) {
        if self.state == Lifecycle::Active
            && let Err(e) = self.deactivate()
        {
            log::warn!("{e}");
        }
    }
}

impl AsFd for VirtualDevice {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl AsRawFd for VirtualDevice {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // /dev/null accepts writes but no ioctls, which is enough to drive the
    // lifecycle error paths without touching the real uinput driver.
    fn null_device() -> VirtualDevice {
        VirtualDevice::open("/dev/null").unwrap()
    }

    #[test]
    fn test_open_missing_path() {
        let err = VirtualDevice::open("/nonexistent/uinput").unwrap_err();
        assert!(matches!(err, Error::Open { .. }));
    }

    #[test]
    fn test_deactivate_before_activate() {
        let mut dev = null_device();
        assert!(matches!(dev.deactivate(), Err(Error::NotActive)));
        assert!(matches!(dev.deactivate(), Err(Error::NotActive)));
        assert_eq!(dev.state(), Lifecycle::Registered);
    }

    #[test]
    fn test_create_failure_is_reported() {
        let mut dev = null_device();
        let err = dev.activate(&VirtualDeviceDescriptor::default()).unwrap_err();
        assert!(matches!(err, Error::Create(_)));
        assert_eq!(dev.state(), Lifecycle::Registered);
    }

    #[test]
    fn test_register_failure_is_reported() {
        let mut dev = null_device();
        assert!(dev.register(CapabilityKind::Key, 0x130).is_err());
    }

    #[test]
    fn test_write_event() {
        let mut dev = null_device();
        dev.write_event(&InputEvent::new(1, 0x130, 1)).unwrap();
    }
}
