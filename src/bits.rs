//! Capability bit-vectors.
//!
//! The kernel advertises supported features as byte arrays in which bit
//! position `n` (byte `n / 8`, bit `n % 8`) stands for feature code `n`.
//! [`set_bits`] walks such an array in ascending code order and
//! [`CapabilitySet`] stores the three vectors the relay mirrors.

/// `EV_KEY` event type.
pub const EV_KEY: u16 = 0x01;
/// `EV_ABS` event type.
pub const EV_ABS: u16 = 0x03;

/// Number of event type codes (`EV_CNT`).
pub const EV_CNT: usize = 0x20;
/// Number of absolute axis codes (`ABS_CNT`).
pub const ABS_CNT: usize = 0x40;
/// Number of key/button codes (`KEY_CNT`).
pub const KEY_CNT: usize = 0x300;

/// Bytes needed to hold `bits` bits.
pub const fn bitvec_len(bits: usize) -> usize {
    bits.div_ceil(8)
}

/// Iterator over the indices of set bits in a byte slice.
///
/// Yields indices low to high, byte-major then bit-minor. A clone resumes
/// from the same position; call [`set_bits`] again for a fresh pass.
#[derive(Debug, Clone)]
pub struct SetBits<'a> {
    bytes: &'a [u8],
    index: usize,
}

/// Lazily enumerate the set bit positions of `bytes`.
pub fn set_bits(bytes: &[u8]) -> SetBits<'_> {
    SetBits { bytes, index: 0 }
}

impl Iterator for SetBits<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let total = self.bytes.len() * 8;
        while self.index < total {
            let byte = self.bytes[self.index / 8];
            if byte == 0 {
                // Skip to the next byte boundary.
                self.index = (self.index / 8 + 1) * 8;
                continue;
            }
            let index = self.index;
            self.index += 1;
            if byte & (1 << (index % 8)) != 0 {
                return Some(index);
            }
        }
        None
    }
}

/// The three capability classes the relay replicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    /// Supported event types (`EVIOCGBIT(0, ..)`).
    EventType,
    /// Supported absolute axes (`EVIOCGBIT(EV_ABS, ..)`).
    Axis,
    /// Supported keys and buttons (`EVIOCGBIT(EV_KEY, ..)`).
    Key,
}

impl CapabilityKind {
    /// Scan order used when mirroring a device.
    pub const ALL: [CapabilityKind; 3] = [Self::EventType, Self::Axis, Self::Key];

    /// Number of valid codes in this class.
    pub const fn code_count(self) -> usize {
        match self {
            Self::EventType => EV_CNT,
            Self::Axis => ABS_CNT,
            Self::Key => KEY_CNT,
        }
    }

    /// Size in bytes of this class's bit-vector.
    pub const fn byte_len(self) -> usize {
        bitvec_len(self.code_count())
    }

    /// Human-readable name, used in diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            Self::EventType => "event type",
            Self::Axis => "axis",
            Self::Key => "key",
        }
    }
}

/// Event type, axis and key bit-vectors of a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilitySet {
    event_types: [u8; bitvec_len(EV_CNT)],
    axes: [u8; bitvec_len(ABS_CNT)],
    keys: [u8; bitvec_len(KEY_CNT)],
}

impl Default for CapabilitySet {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilitySet {
    /// Create an empty set.
    pub const fn new() -> Self {
        Self {
            event_types: [0; bitvec_len(EV_CNT)],
            axes: [0; bitvec_len(ABS_CNT)],
            keys: [0; bitvec_len(KEY_CNT)],
        }
    }

    /// Raw bit-vector of `kind`.
    pub fn bits(&self, kind: CapabilityKind) -> &[u8] {
        match kind {
            CapabilityKind::EventType => &self.event_types,
            CapabilityKind::Axis => &self.axes,
            CapabilityKind::Key => &self.keys,
        }
    }

    fn bits_mut(&mut self, kind: CapabilityKind) -> &mut [u8] {
        match kind {
            CapabilityKind::EventType => &mut self.event_types,
            CapabilityKind::Axis => &mut self.axes,
            CapabilityKind::Key => &mut self.keys,
        }
    }

    /// Mark `code` as supported. Codes outside the class range are ignored.
    pub fn insert(&mut self, kind: CapabilityKind, code: usize) {
        if code < kind.code_count() {
            self.bits_mut(kind)[code / 8] |= 1 << (code % 8);
        }
    }

    /// Whether `code` is marked as supported.
    pub fn contains(&self, kind: CapabilityKind, code: usize) -> bool {
        code < kind.code_count() && self.bits(kind)[code / 8] & (1 << (code % 8)) != 0
    }

    /// Supported codes of `kind`, ascending.
    pub fn iter(&self, kind: CapabilityKind) -> SetBits<'_> {
        set_bits(self.bits(kind))
    }

    /// Number of supported codes of `kind`.
    pub fn count(&self, kind: CapabilityKind) -> usize {
        self.bits(kind).iter().map(|b| b.count_ones() as usize).sum()
    }
}
