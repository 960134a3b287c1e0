//! BotMesh wire protocol: packet type tags, frame limits, radio pairing ranges.

use serde::{Deserialize, Serialize};

/// Hard payload limit of the radio transport. Every variant fits in it.
pub const MAX_PACKET_SIZE: usize = 32;

/// Highest legal radio channel (frequency band).
pub const MAX_CHANNEL: u16 = 83;
/// Highest legal radio group.
pub const MAX_GROUP: u16 = 255;
/// Highest legal transmit power.
pub const MAX_POWER: u8 = 7;

/// Well-known pairing every device mirrors its beacon onto.
pub const DISCOVERY_PAIRING: Pairing = Pairing {
    channel: 1,
    group: 1,
};

/// One-byte tag at offset 0 of every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PacketType {
    Joystick = 10,
    HereIAm = 11,
    BotStatus = 12,
}

impl PacketType {
    pub fn tag(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for PacketType {
    type Error = u8;

    fn try_from(tag: u8) -> Result<Self, u8> {
        match tag {
            10 => Ok(PacketType::Joystick),
            11 => Ok(PacketType::HereIAm),
            12 => Ok(PacketType::BotStatus),
            other => Err(other),
        }
    }
}

/// A (channel, group) pair. Devices only hear each other on the same pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pairing {
    pub channel: u16,
    pub group: u16,
}

impl Pairing {
    pub fn new(channel: u16, group: u16) -> Self {
        Self { channel, group }
    }

    /// True when both values are inside the legal radio ranges.
    pub fn is_valid(&self) -> bool {
        self.channel <= MAX_CHANNEL && self.group <= MAX_GROUP
    }

    pub fn is_discovery(&self) -> bool {
        *self == DISCOVERY_PAIRING
    }
}

impl std::fmt::Display for Pairing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ch{}/g{}", self.channel, self.group)
    }
}

/// Metadata the transport attaches to a received buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceptionMeta {
    /// Milliseconds on the host's monotonic clock.
    pub arrival_ms: u64,
    /// Serial number of the sending device.
    pub serial: u32,
    /// Received signal strength in dBm (0 when the transport does not measure it).
    pub signal_strength: i16,
}
