//! Capability mirroring.
//!
//! Reads the event type, axis and key bit-vectors of a source device and
//! replays every set bit as a registration on a not-yet-created uinput
//! device. Axis calibration is copied into the [`VirtualDeviceDescriptor`]
//! in the same pass, right after the axis is registered.

use crate::bits::{set_bits, CapabilityKind, CapabilitySet};
use crate::descriptor::{AxisCalibration, VirtualDeviceDescriptor};
use crate::error::{Error, Result};
use std::io;

/// A device whose capabilities can be queried.
pub trait CapabilitySource {
    /// Fill `buf` with the `kind` bit-vector; returns the number of valid bytes.
    fn query_bits(&self, kind: CapabilityKind, buf: &mut [u8]) -> io::Result<usize>;

    /// Read the calibration of absolute axis `axis`.
    fn query_calibration(&self, axis: u16) -> io::Result<AxisCalibration>;
}

/// A device that accepts capability registrations.
pub trait CapabilityTarget {
    /// Declare support for `code` of `kind`.
    fn register(&mut self, kind: CapabilityKind, code: u16) -> io::Result<()>;
}

/// Copy every capability of `source` onto `target`.
///
/// Codes are registered in ascending order, event types first, then axes,
/// then keys. The returned set holds exactly the codes whose registration
/// succeeded; since any failure aborts the whole pass, on `Ok` that is
/// every code the source advertised.
pub fn mirror<S, T>(
    source: &S,
    target: &mut T,
    descriptor: &mut VirtualDeviceDescriptor,
) -> Result<CapabilitySet>
where
    S: CapabilitySource + ?Sized,
    T: CapabilityTarget + ?Sized,
{
    let mut caps = CapabilitySet::new();
    let mut buf = vec![0u8; CapabilityKind::Key.byte_len()];

    for kind in CapabilityKind::ALL {
        let buf = &mut buf[..kind.byte_len()];
        buf.fill(0);

        let len = source
            .query_bits(kind, buf)
            .map_err(|source| Error::CapabilityQuery {
                what: kind.name(),
                source,
            })?
            .min(buf.len());

        for code in set_bits(&buf[..len]).take_while(|&code| code < kind.code_count()) {
            let code16 = code as u16;
            target
                .register(kind, code16)
                .map_err(|source| Error::Register {
                    what: kind.name(),
                    code: code16,
                    source,
                })?;
            caps.insert(kind, code);

            if kind == CapabilityKind::Axis {
                let calibration = source
                    .query_calibration(code16)
                    .map_err(|source| Error::Calibration { axis: code16, source })?;
                descriptor.set_axis(code, calibration);
            }
        }

        log::debug!("mirrored {} {} codes", caps.count(kind), kind.name());
    }

    Ok(caps)
}
