//! Virtual device descriptor (`struct uinput_user_dev`).

use crate::bits::ABS_CNT;
use crate::config::UsbId;
use crate::platform::sys::{BUS_VIRTUAL, UINPUT_MAX_NAME_SIZE};

/// Default device name presented by the virtual device.
pub const DEFAULT_NAME: &str = "Xpad Relay (evrelay)";

/// Default identity: vendor 0xf055 (unofficial FOSS vendor id), product
/// 0x11fc (the Steam Controller gamepad product id).
pub const DEFAULT_IDENTITY: UsbId = UsbId::new(0xf055, 0x11fc);

/// Device version reported by the virtual device.
pub const VERSION: u16 = 1;

/// Encoded size of `struct uinput_user_dev`.
pub const ENCODED_LEN: usize = UINPUT_MAX_NAME_SIZE + 8 + 4 + 4 * 4 * ABS_CNT;

/// Reporting range and noise tolerance of one absolute axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AxisCalibration {
    pub minimum: i32,
    pub maximum: i32,
    pub fuzz: i32,
    pub flat: i32,
}

/// Everything uinput needs to know before `UI_DEV_CREATE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualDeviceDescriptor {
    name: String,
    identity: UsbId,
    axes: [AxisCalibration; ABS_CNT],
}

impl Default for VirtualDeviceDescriptor {
    fn default() -> Self {
        Self::new(DEFAULT_NAME, DEFAULT_IDENTITY)
    }
}

impl VirtualDeviceDescriptor {
    /// Create a descriptor with no calibrated axes.
    ///
    /// The name is cut to fit `UINPUT_MAX_NAME_SIZE` including the
    /// terminating NUL.
    pub fn new(name: &str, identity: UsbId) -> Self {
        let mut end = name.len().min(UINPUT_MAX_NAME_SIZE - 1);
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        Self {
            name: name[..end].to_owned(),
            identity,
            axes: [AxisCalibration::default(); ABS_CNT],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identity(&self) -> UsbId {
        self.identity
    }

    /// Always `BUS_VIRTUAL`.
    pub fn bus_type(&self) -> u16 {
        BUS_VIRTUAL
    }

    pub fn version(&self) -> u16 {
        VERSION
    }

    /// Record the calibration of `axis`. Out-of-range axes are ignored.
    pub fn set_axis(&mut self, axis: usize, calibration: AxisCalibration) {
        if let Some(slot) = self.axes.get_mut(axis) {
            *slot = calibration;
        }
    }

    /// Calibration of `axis`; zero when never set.
    pub fn axis(&self, axis: usize) -> AxisCalibration {
        self.axes.get(axis).copied().unwrap_or_default()
    }

    /// Serialize into the kernel's `uinput_user_dev` layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ENCODED_LEN);

        let mut name = [0u8; UINPUT_MAX_NAME_SIZE];
        name[..self.name.len()].copy_from_slice(self.name.as_bytes());
        out.extend_from_slice(&name);

        for field in [BUS_VIRTUAL, self.identity.vendor, self.identity.product, VERSION] {
            out.extend_from_slice(&field.to_ne_bytes());
        }
        // ff_effects_max
        out.extend_from_slice(&0u32.to_ne_bytes());

        let columns: [fn(&AxisCalibration) -> i32; 4] = [
            |a: &AxisCalibration| a.maximum,
            |a: &AxisCalibration| a.minimum,
            |a: &AxisCalibration| a.fuzz,
            |a: &AxisCalibration| a.flat,
        ];
        for column in columns {
            for axis in &self.axes {
                out.extend_from_slice(&column(axis).to_ne_bytes());
            }
        }

        debug_assert_eq!(out.len(), ENCODED_LEN);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_i32(bytes: &[u8], offset: usize) -> i32 {
        i32::from_ne_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    fn read_u16(bytes: &[u8], offset: usize) -> u16 {
        u16::from_ne_bytes(bytes[offset..offset + 2].try_into().unwrap())
    }

    #[test]
    fn test_encoded_len() {
        assert_eq!(ENCODED_LEN, 1116);
        assert_eq!(VirtualDeviceDescriptor::default().encode().len(), 1116);
    }

    #[test]
    fn test_identity_fields() {
        let desc = VirtualDeviceDescriptor::default();
        let bytes = desc.encode();
        assert_eq!(&bytes[..DEFAULT_NAME.len()], DEFAULT_NAME.as_bytes());
        assert_eq!(bytes[DEFAULT_NAME.len()], 0);
        assert_eq!(read_u16(&bytes, 80), BUS_VIRTUAL);
        assert_eq!(read_u16(&bytes, 82), 0xf055);
        assert_eq!(read_u16(&bytes, 84), 0x11fc);
        assert_eq!(read_u16(&bytes, 86), VERSION);
    }

    #[test]
    fn test_axis_tables() {
        let mut desc = VirtualDeviceDescriptor::default();
        let cal = AxisCalibration {
            minimum: -32768,
            maximum: 32767,
            fuzz: 16,
            flat: 128,
        };
        desc.set_axis(1, cal);
        let bytes = desc.encode();

        let table = |n: usize| 92 + n * 4 * ABS_CNT;
        assert_eq!(read_i32(&bytes, table(0) + 4), 32767);
        assert_eq!(read_i32(&bytes, table(1) + 4), -32768);
        assert_eq!(read_i32(&bytes, table(2) + 4), 16);
        assert_eq!(read_i32(&bytes, table(3) + 4), 128);

        // Unset axes stay zero.
        assert_eq!(read_i32(&bytes, table(0)), 0);
        assert_eq!(desc.axis(0), AxisCalibration::default());
        assert_eq!(desc.axis(ABS_CNT), AxisCalibration::default());
    }

    #[test]
    fn test_long_name_truncated() {
        let long = "x".repeat(200);
        let desc = VirtualDeviceDescriptor::new(&long, DEFAULT_IDENTITY);
        assert_eq!(desc.name().len(), UINPUT_MAX_NAME_SIZE - 1);
        assert_eq!(desc.encode()[UINPUT_MAX_NAME_SIZE - 1], 0);
    }
}
