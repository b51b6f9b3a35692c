//! Source event device (`/dev/input/event*`).

use super::sys;
use crate::bits::CapabilityKind;
use crate::capability::CapabilitySource;
use crate::config::UsbId;
use crate::descriptor::AxisCalibration;
use crate::error::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};

/// Open handle to the device whose events are mirrored.
#[derive(Debug)]
pub struct SourceDevice {
    path: Option<PathBuf>,
    file: File,
}

impl SourceDevice {
    /// Open `path`, read-write if permitted, otherwise read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::reopen(path).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`SourceDevice::open`] but keeps the bare I/O error, as the
    /// relay's reconnect hook expects.
    pub fn reopen(path: &Path) -> io::Result<Self> {
        Ok(Self {
            path: Some(path.to_path_buf()),
            file: open_event_node(path)?,
        })
    }

    /// Adopt a descriptor opened by the parent process.
    ///
    /// The device has no known path, so it cannot be reopened after loss.
    pub fn from_fd(fd: OwnedFd) -> Self {
        Self {
            path: None,
            file: File::from(fd),
        }
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

    /// Path the device was opened from.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Device name reported by the driver.
    pub fn name(&self) -> Option<String> {
        let mut buf = [0u8; 256];
        let len = unsafe { sys::eviocgname(self.as_raw_fd(), &mut buf) }.ok()? as usize;
        let name = &buf[..len.min(buf.len())];
        let name = name.split(|&b| b == 0).next().unwrap_or_default();
        Some(String::from_utf8_lossy(name).into_owned())
    }

    /// USB vendor/product the device reports.
    pub fn usb_id(&self) -> io::Result<UsbId> {
        let mut id = sys::input_id::default();
        unsafe { sys::eviocgid(self.as_raw_fd(), &mut id) }?;
        Ok(UsbId::new(id.vendor, id.product))
    }

    /// Take exclusive access so no other reader sees the source's events.
    pub fn grab(&self) -> io::Result<()> {
        unsafe { sys::eviocgrab(self.as_raw_fd(), 1) }?;
        Ok(())
    }
}

/// Open an event node read-write, falling back to read-only.
fn open_event_node(path: &Path) -> io::Result<File> {
    match OpenOptions::new().read(true).write(true).open(path) {
        Ok(file) => Ok(file),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            log::debug!("{} is not writable, opening read-only", path.display());
            File::open(path)
        }
        Err(e) => Err(e),
    }
}

impl CapabilitySource for SourceDevice {
    fn query_bits(&self, kind: CapabilityKind, buf: &mut [u8]) -> io::Result<usize> {
        let query = match kind {
            CapabilityKind::EventType => sys::eviocgbit_type,
            CapabilityKind::Key => sys::eviocgbit_key,
            CapabilityKind::Axis => sys::eviocgbit_abs,
        };
        let len = unsafe { query(self.as_raw_fd(), buf) }?;
        Ok(len as usize)
    }

    fn query_calibration(&self, axis: u16) -> io::Result<AxisCalibration> {
        let mut info = sys::input_absinfo::default();
        unsafe { sys::eviocgabs(self.as_raw_fd(), axis, &mut info) }?;
        Ok(AxisCalibration {
            minimum: info.minimum,
            maximum: info.maximum,
            fuzz: info.fuzz,
            flat: info.flat,
        })
    }
}

impl Read for SourceDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl AsFd for SourceDevice {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl AsRawFd for SourceDevice {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}
