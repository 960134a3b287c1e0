//! Device identity: derived values computed from the hardware serial number.

/// One MurmurHash3 32-bit scramble step. Spreads the bits of a serial number so that any
/// slice of the result is usable as an identifier.
pub fn scramble(k: u32) -> u32 {
    k.wrapping_mul(0xcc9e_2d51)
        .rotate_left(15)
        .wrapping_mul(0x1b87_3593)
}

/// Eight upper-case hex digits.
pub fn to_hex(v: u32) -> String {
    format!("{v:08X}")
}

/// Identity of the local device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId {
    serial: u32,
}

impl DeviceId {
    pub fn from_serial(serial: u32) -> Self {
        Self { serial }
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }

    pub fn scrambled(&self) -> u32 {
        scramble(self.serial)
    }

    /// Low 12 bits of the scrambled serial. Short id for space-constrained fields.
    pub fn node_id(&self) -> u16 {
        (self.scrambled() & 0xFFF) as u16
    }

    /// Stable 24-bit RGB color for this device.
    pub fn color(&self) -> u32 {
        self.scrambled() >> 8
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&to_hex(self.serial))
    }
}
