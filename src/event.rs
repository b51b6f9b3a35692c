//! Raw input event records.
//!
//! An [`InputEvent`] is the exact byte image of a kernel `struct input_event`.
//! The relay copies it from the source device to the virtual device without
//! touching the timestamp or payload; only the type and code are ever read,
//! to decide whether the filter drops the record.

use crate::platform::sys;
use std::fmt;
use std::mem::{offset_of, size_of};

const TYPE_OFFSET: usize = offset_of!(sys::input_event, type_);
const CODE_OFFSET: usize = offset_of!(sys::input_event, code);
const VALUE_OFFSET: usize = offset_of!(sys::input_event, value);
const EVENT_SIZE: usize = size_of::<sys::input_event>();

/// One fixed-size event record, stored as raw bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputEvent([u8; EVENT_SIZE]);

impl InputEvent {
    /// Size in bytes of a kernel event record on this platform.
    pub const SIZE: usize = EVENT_SIZE;

    /// Build a record with a zero timestamp.
    ///
    /// The kernel fills in the time for events written to uinput.
    pub fn new(event_type: u16, code: u16, value: i32) -> Self {
        let mut bytes = [0u8; Self::SIZE];
        bytes[TYPE_OFFSET..TYPE_OFFSET + 2].copy_from_slice(&event_type.to_ne_bytes());
        bytes[CODE_OFFSET..CODE_OFFSET + 2].copy_from_slice(&code.to_ne_bytes());
        bytes[VALUE_OFFSET..VALUE_OFFSET + 4].copy_from_slice(&value.to_ne_bytes());
        Self(bytes)
    }

    /// Wrap a record read from a device.
    ///
    /// Returns `None` unless `bytes` is exactly [`InputEvent::SIZE`] long.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        <[u8; Self::SIZE]>::try_from(bytes).ok().map(Self)
    }

    /// The record as written to a device.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Event type (`EV_KEY`, `EV_ABS`, ...).
    pub fn event_type(&self) -> u16 {
        u16::from_ne_bytes([self.0[TYPE_OFFSET], self.0[TYPE_OFFSET + 1]])
    }

    /// Event code within the type.
    pub fn code(&self) -> u16 {
        u16::from_ne_bytes([self.0[CODE_OFFSET], self.0[CODE_OFFSET + 1]])
    }

    /// Event value.
    pub fn value(&self) -> i32 {
        let mut value = [0u8; 4];
        value.copy_from_slice(&self.0[VALUE_OFFSET..VALUE_OFFSET + 4]);
        i32::from_ne_bytes(value)
    }
}

impl fmt::Debug for InputEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputEvent")
            .field("type", &self.event_type())
            .field("code", &self.code())
            .field("value", &self.value())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::EV_KEY;

    #[test]
    fn test_fields() {
        let ev = InputEvent::new(EV_KEY, 0x130, 1);
        assert_eq!(ev.event_type(), EV_KEY);
        assert_eq!(ev.code(), 0x130);
        assert_eq!(ev.value(), 1);
        assert_eq!(ev.as_bytes().len(), InputEvent::SIZE);
    }

    #[test]
    fn test_from_bytes_requires_exact_size() {
        let ev = InputEvent::new(3, 0, -32768);
        assert_eq!(InputEvent::from_bytes(ev.as_bytes()), Some(ev));
        assert!(InputEvent::from_bytes(&ev.as_bytes()[..InputEvent::SIZE - 1]).is_none());
        assert!(InputEvent::from_bytes(&[0u8; InputEvent::SIZE + 1]).is_none());
    }

    #[test]
    fn test_timestamp_bytes_preserved() {
        let mut raw = [0xa5u8; InputEvent::SIZE];
        raw[TYPE_OFFSET..TYPE_OFFSET + 2].copy_from_slice(&EV_KEY.to_ne_bytes());
        let ev = InputEvent::from_bytes(&raw).unwrap();
        assert_eq!(ev.as_bytes(), &raw[..]);
        assert_eq!(ev.event_type(), EV_KEY);
    }
}
