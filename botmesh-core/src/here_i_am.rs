//! Discovery beacon: announces the sender's role (class id) and its working pairing.
//!
//! Layout: `tag@0 group:u16@1 channel:u16@3 len:u8@5 classId@6..6+len`

use std::fmt;

use crate::payload::Payload;
use crate::protocol::{PacketType, Pairing, MAX_PACKET_SIZE};
use crate::wire::{self, DecodeError};

pub const HERE_I_AM_HEADER_SIZE: usize = 6;
/// Longest class id that fits in one frame.
pub const MAX_CLASS_ID_LEN: usize = MAX_PACKET_SIZE - HERE_I_AM_HEADER_SIZE;

const GROUP: usize = 1;
const CHANNEL: usize = 3;
const LEN: usize = 5;
const CLASS_ID: usize = HERE_I_AM_HEADER_SIZE;

#[derive(Clone, PartialEq, Eq)]
pub struct HereIAm {
    buf: Vec<u8>,
}

impl HereIAm {
    /// `class_id` is truncated to `MAX_CLASS_ID_LEN` bytes.
    pub fn new(class_id: &str, pairing: Pairing) -> Self {
        let class_id = wire::truncate_utf8(class_id, MAX_CLASS_ID_LEN);
        let mut buf = vec![0u8; HERE_I_AM_HEADER_SIZE + class_id.len()];
        buf[0] = PacketType::HereIAm.tag();
        wire::put_u16(&mut buf, GROUP, pairing.group);
        wire::put_u16(&mut buf, CHANNEL, pairing.channel);
        buf[LEN] = class_id.len() as u8;
        buf[CLASS_ID..].copy_from_slice(class_id.as_bytes());
        Self { buf }
    }

    pub fn group(&self) -> u16 {
        wire::get_u16(&self.buf, GROUP)
    }

    pub fn channel(&self) -> u16 {
        wire::get_u16(&self.buf, CHANNEL)
    }

    pub fn pairing(&self) -> Pairing {
        Pairing::new(self.channel(), self.group())
    }

    pub fn class_id(&self) -> String {
        String::from_utf8_lossy(&self.buf[CLASS_ID..]).into_owned()
    }
}

impl Payload for HereIAm {
    const PACKET_TYPE: PacketType = PacketType::HereIAm;
    const MIN_SIZE: usize = HERE_I_AM_HEADER_SIZE;

    fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        wire::check_header(bytes, Self::PACKET_TYPE, Self::MIN_SIZE)?;
        let available = bytes.len().min(MAX_PACKET_SIZE) - CLASS_ID;
        let len = (bytes[LEN] as usize).min(available);
        let mut buf = bytes[..CLASS_ID + len].to_vec();
        buf[LEN] = len as u8;
        Ok(Self { buf })
    }

    fn fingerprint(&self) -> u32 {
        let first = self.buf.get(CLASS_ID).copied().unwrap_or(0);
        self.group() as u32 ^ self.channel() as u32 ^ first as u32
    }
}

impl fmt::Debug for HereIAm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for HereIAm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HereIAm(class={:?}, {})", self.class_id(), self.pairing())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_group_then_channel() {
        let h = HereIAm::new("cutebot", Pairing::new(42, 17));
        let b = h.as_bytes();
        assert_eq!(b[0], 11);
        assert_eq!(&b[1..3], &17u16.to_le_bytes());
        assert_eq!(&b[3..5], &42u16.to_le_bytes());
        assert_eq!(b[5], 7);
        assert_eq!(&b[6..], b"cutebot");
    }

    #[test]
    fn roundtrip() {
        let h = HereIAm::new("cutebot", Pairing::new(42, 17));
        let d = HereIAm::decode(h.as_bytes()).unwrap();
        assert_eq!(d, h);
        assert_eq!(d.class_id(), "cutebot");
        assert_eq!(d.pairing(), Pairing::new(42, 17));
        assert_eq!(d.fingerprint(), h.fingerprint());
    }

    #[test]
    fn long_class_id_is_truncated() {
        let long = "x".repeat(40);
        let h = HereIAm::new(&long, Pairing::new(1, 1));
        assert_eq!(h.as_bytes().len(), MAX_PACKET_SIZE);
        assert_eq!(h.class_id().len(), MAX_CLASS_ID_LEN);
    }

    #[test]
    fn declared_length_is_clamped_to_buffer() {
        let mut raw = HereIAm::new("bot", Pairing::new(5, 6)).as_bytes().to_vec();
        raw[5] = 200;
        let d = HereIAm::decode(&raw).unwrap();
        assert_eq!(d.class_id(), "bot");
        assert!(HereIAm::decode(&raw[..5]).is_err());
    }

    #[test]
    fn single_byte_class_id_survives_decode() {
        let mut raw = HereIAm::new("ab", Pairing::new(42, 17)).as_bytes().to_vec();
        raw[6] = 0xE9;
        let d = HereIAm::decode(&raw).unwrap();
        assert_eq!(d.as_bytes(), &raw[..]);
        assert_eq!(d.fingerprint(), 17 ^ 42 ^ 0xE9);
        assert_eq!(d.class_id(), "\u{FFFD}b");
    }

    #[test]
    fn empty_class_id() {
        let h = HereIAm::new("", Pairing::new(3, 4));
        assert_eq!(h.as_bytes().len(), HERE_I_AM_HEADER_SIZE);
        let d = HereIAm::decode(h.as_bytes()).unwrap();
        assert_eq!(d.class_id(), "");
        assert_eq!(d.fingerprint(), 4 ^ 3);
    }
}
