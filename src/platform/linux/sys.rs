//! Kernel ABI for evdev and uinput.
//!
//! Structures mirror `linux/input.h` / `linux/uinput.h` field for field;
//! request wrappers are generated with `nix`'s ioctl macros.

#![allow(non_camel_case_types)]

use std::io;
use std::mem::size_of;
use std::os::fd::RawFd;
use std::time::Duration;

use libc::c_int;
use nix::errno::Errno;
use nix::fcntl::{FcntlArg, fcntl};
use nix::sys::ioctl::ioctl_num_type;
use nix::{ioctl_none, ioctl_read, ioctl_read_buf, ioctl_write_int, request_code_read};

/// `struct input_event`.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct input_event {
    pub time: libc::timeval,
    pub type_: u16,
    pub code: u16,
    pub value: i32,
}

/// `struct input_id`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct input_id {
    pub bustype: u16,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
}

/// `struct input_absinfo`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct input_absinfo {
    pub value: i32,
    pub minimum: i32,
    pub maximum: i32,
    pub fuzz: i32,
    pub flat: i32,
    pub resolution: i32,
}

/// `UINPUT_MAX_NAME_SIZE`.
pub const UINPUT_MAX_NAME_SIZE: usize = 80;

/// `BUS_VIRTUAL`.
pub const BUS_VIRTUAL: u16 = 0x06;

ioctl_read!(eviocgid, b'E', 0x02, input_id);
ioctl_read_buf!(eviocgname, b'E', 0x06, u8);
ioctl_write_int!(eviocgrab, b'E', 0x90);

// EVIOCGBIT(ev, len) for the three event types that are mirrored.
ioctl_read_buf!(eviocgbit_type, b'E', 0x20, u8);
ioctl_read_buf!(eviocgbit_key, b'E', 0x21, u8);
ioctl_read_buf!(eviocgbit_abs, b'E', 0x23, u8);

ioctl_none!(ui_dev_create, b'U', 1);
ioctl_none!(ui_dev_destroy, b'U', 2);
ioctl_write_int!(ui_set_evbit, b'U', 100);
ioctl_write_int!(ui_set_keybit, b'U', 101);
ioctl_write_int!(ui_set_absbit, b'U', 103);

/// Request number of `EVIOCGABS(abs)`; the axis is part of the number.
pub fn eviocgabs_request(abs: u16) -> ioctl_num_type {
    request_code_read!(b'E', 0x40 + u32::from(abs), size_of::<input_absinfo>())
}

/// `EVIOCGABS(abs)`.
///
/// # Safety
///
/// `fd` must be an open descriptor.
pub unsafe fn eviocgabs(fd: c_int, abs: u16, info: &mut input_absinfo) -> nix::Result<c_int> {
    Errno::result(unsafe { libc::ioctl(fd, eviocgabs_request(abs), info as *mut input_absinfo) })
}

/// Whether `fd` refers to an open descriptor in this process.
pub fn is_open(fd: RawFd) -> bool {
    fcntl(fd, FcntlArg::F_GETFD).is_ok()
}

/// `poll(2)` with a millisecond-rounded timeout.
///
/// Negative descriptors are skipped by the kernel, which lets callers keep
/// a fixed-size array with optional slots. Returns the number of
/// descriptors with non-zero `revents`.
pub fn poll(fds: &mut [libc::pollfd], timeout: Duration) -> io::Result<usize> {
    let timeout = timeout.as_millis().min(c_int::MAX as u128) as c_int;
    let n = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout) };
    Ok(Errno::result(n)? as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::AsRawFd;

    #[test]
    fn test_request_numbers() {
        assert_eq!(eviocgabs_request(0) as u64, 0x8018_4540);
        assert_eq!(eviocgabs_request(0x10) as u64, 0x8018_4550);
        assert_eq!(nix::request_code_write!(b'U', 100, size_of::<c_int>()) as u64, 0x4004_5564);
        assert_eq!(nix::request_code_none!(b'U', 1) as u64, 0x5501);
        assert_eq!(nix::request_code_read!(b'E', 0x02, size_of::<input_id>()) as u64, 0x8008_4502);
    }

    #[test]
    fn test_struct_sizes() {
        assert_eq!(size_of::<input_id>(), 8);
        assert_eq!(size_of::<input_absinfo>(), 24);
        assert_eq!(
            size_of::<input_event>(),
            size_of::<libc::timeval>() + 8
        );
    }

    #[test]
    fn test_requests_rejected_by_non_input_node() {
        let file = std::fs::File::open("/dev/null").unwrap();
        let fd = file.as_raw_fd();
        assert_eq!(unsafe { ui_dev_create(fd) }, Err(Errno::ENOTTY));
        assert_eq!(unsafe { ui_set_keybit(fd, 0x130) }, Err(Errno::ENOTTY));
        let mut info = input_absinfo::default();
        assert_eq!(unsafe { eviocgabs(fd, 0, &mut info) }, Err(Errno::ENOTTY));
    }

    #[test]
    fn test_is_open() {
        let file = std::fs::File::open("/dev/null").unwrap();
        assert!(is_open(file.as_raw_fd()));
        assert!(!is_open(-1));
    }

    #[test]
    fn test_poll_skips_negative_descriptors() {
        let mut fds = [libc::pollfd {
            fd: -1,
            events: libc::POLLIN,
            revents: 0,
        }];
        assert_eq!(poll(&mut fds, Duration::from_millis(1)).unwrap(), 0);
    }
}
