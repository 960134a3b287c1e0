//! Bot status message: a fixed 17-byte header followed by optional text.
//!
//! Layout: `tag@0 code:i32@1 dist:i16@5 pinState:i16@7 flags:i32@9 imageBits:u32@13 text@17..`
//!
//! The packet size is fixed per instance (default `MAX_PACKET_SIZE`). Text is truncated to
//! fit and zero-padded; decoding stops at the first zero byte or the end of the packet.

use std::fmt;

use crate::payload::Payload;
use crate::protocol::{PacketType, MAX_PACKET_SIZE};
use crate::wire::{self, DecodeError, Grid, IMAGE_MASK};

pub const BOT_STATUS_HEADER_SIZE: usize = 17;

const CODE: usize = 1;
const DIST: usize = 5;
const PIN_STATE: usize = 7;
const FLAGS: usize = 9;
const IMAGE: usize = 13;
const TEXT: usize = BOT_STATUS_HEADER_SIZE;

#[derive(Clone, PartialEq, Eq)]
pub struct BotStatusMessage {
    buf: Vec<u8>,
}

impl BotStatusMessage {
    /// New message using the full transport frame.
    pub fn new(code: i32, dist: i16, pin_state: i16, flags: i32) -> Self {
        Self::with_packet_size(code, dist, pin_state, flags, MAX_PACKET_SIZE)
    }

    /// New message framed to `packet_size` bytes, clamped to
    /// `[BOT_STATUS_HEADER_SIZE, MAX_PACKET_SIZE]`.
    pub fn with_packet_size(
        code: i32,
        dist: i16,
        pin_state: i16,
        flags: i32,
        packet_size: usize,
    ) -> Self {
        let size = packet_size.clamp(BOT_STATUS_HEADER_SIZE, MAX_PACKET_SIZE);
        let mut buf = vec![0u8; size];
        buf[0] = PacketType::BotStatus.tag();
        let mut m = Self { buf };
        m.set_code(code);
        m.set_dist(dist);
        m.set_pin_state(pin_state);
        m.set_flags(flags);
        m
    }

    pub fn packet_size(&self) -> usize {
        self.buf.len()
    }

    /// Bytes available for text in this frame.
    pub fn text_capacity(&self) -> usize {
        self.buf.len() - TEXT
    }

    pub fn code(&self) -> i32 {
        wire::get_i32(&self.buf, CODE)
    }

    pub fn set_code(&mut self, code: i32) {
        wire::put_i32(&mut self.buf, CODE, code);
    }

    pub fn dist(&self) -> i16 {
        wire::get_i16(&self.buf, DIST)
    }

    pub fn set_dist(&mut self, dist: i16) {
        wire::put_i16(&mut self.buf, DIST, dist);
    }

    pub fn pin_state(&self) -> i16 {
        wire::get_i16(&self.buf, PIN_STATE)
    }

    pub fn set_pin_state(&mut self, pin_state: i16) {
        wire::put_i16(&mut self.buf, PIN_STATE, pin_state);
    }

    /// Indices at or past 16 read as unset.
    pub fn pin_bit(&self, index: u8) -> bool {
        wire::bit(self.pin_state() as u16 as u32, index, 16)
    }

    /// Indices at or past 16 are ignored.
    pub fn set_pin_bit(&mut self, index: u8, on: bool) {
        let bits = wire::with_bit(self.pin_state() as u16 as u32, index, 16, on);
        self.set_pin_state(bits as u16 as i16);
    }

    pub fn flags(&self) -> i32 {
        wire::get_i32(&self.buf, FLAGS)
    }

    pub fn set_flags(&mut self, flags: i32) {
        wire::put_i32(&mut self.buf, FLAGS, flags);
    }

    /// Indices at or past 32 read as unset.
    pub fn flag(&self, index: u8) -> bool {
        wire::bit(self.flags() as u32, index, 32)
    }

    /// Indices at or past 32 are ignored.
    pub fn set_flag(&mut self, index: u8, on: bool) {
        let bits = wire::with_bit(self.flags() as u32, index, 32, on);
        self.set_flags(bits as i32);
    }

    pub fn image_bits(&self) -> u32 {
        wire::get_u32(&self.buf, IMAGE)
    }

    pub fn set_image_bits(&mut self, bits: u32) {
        wire::put_u32(&mut self.buf, IMAGE, bits & IMAGE_MASK);
    }

    pub fn image_grid(&self) -> Grid {
        wire::bits_to_grid(self.image_bits())
    }

    pub fn set_image_grid(&mut self, grid: &Grid) {
        self.set_image_bits(wire::grid_to_bits(grid));
    }

    /// Pixels outside the 5x5 grid read as off.
    pub fn pixel(&self, row: usize, col: usize) -> bool {
        row < wire::GRID_SIZE
            && col < wire::GRID_SIZE
            && wire::bit(self.image_bits(), wire::pixel_bit(row, col), 25)
    }

    /// Pixels outside the 5x5 grid are ignored.
    pub fn set_pixel(&mut self, row: usize, col: usize, on: bool) {
        if row >= wire::GRID_SIZE || col >= wire::GRID_SIZE {
            return;
        }
        let bits = wire::with_bit(self.image_bits(), wire::pixel_bit(row, col), 25, on);
        self.set_image_bits(bits);
    }

    pub fn message(&self) -> String {
        wire::read_text(&self.buf[TEXT..])
    }

    /// Store `text`, truncated to the frame's text capacity. Returns the stored text length.
    pub fn set_message(&mut self, text: &str) -> usize {
        let text = wire::truncate_utf8(text, self.text_capacity());
        let area = &mut self.buf[TEXT..];
        area.fill(0);
        area[..text.len()].copy_from_slice(text.as_bytes());
        text.len()
    }
}

impl Payload for BotStatusMessage {
    const PACKET_TYPE: PacketType = PacketType::BotStatus;
    const MIN_SIZE: usize = BOT_STATUS_HEADER_SIZE;

    fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        wire::check_header(bytes, Self::PACKET_TYPE, Self::MIN_SIZE)?;
        let size = bytes.len().min(MAX_PACKET_SIZE);
        let mut m = Self::with_packet_size(
            wire::get_i32(bytes, CODE),
            wire::get_i16(bytes, DIST),
            wire::get_i16(bytes, PIN_STATE),
            wire::get_i32(bytes, FLAGS),
            size,
        );
        m.set_image_bits(wire::get_u32(bytes, IMAGE));
        // Raw copy: senders may write one byte per character rather than UTF-8.
        let text = wire::text_bytes(&bytes[TEXT..size]);
        m.buf[TEXT..TEXT + text.len()].copy_from_slice(text);
        Ok(m)
    }

    fn fingerprint(&self) -> u32 {
        let first = self.buf[TEXT..].first().copied().unwrap_or(0);
        self.code() as u32
            ^ ((self.dist() as u16 as u32) << 1)
            ^ ((self.pin_state() as u16 as u32) << 2)
            ^ self.flags() as u32
            ^ self.image_bits()
            ^ first as u32
    }
}

impl fmt::Debug for BotStatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for BotStatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BotStatus(code={}, dist={}, pins={:#06x}, flags={:#010x}, image={:07x}, msg={:?})",
            self.code(),
            self.dist(),
            self.pin_state() as u16,
            self.flags() as u32,
            self.image_bits(),
            self.message()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let m = BotStatusMessage::new(42, -7, 0x0003, 0xA5A5);
        let b = m.as_bytes();
        assert_eq!(b.len(), MAX_PACKET_SIZE);
        assert_eq!(b[0], 12);
        assert_eq!(&b[1..5], &42i32.to_le_bytes());
        assert_eq!(&b[5..7], &(-7i16).to_le_bytes());
        assert_eq!(&b[7..9], &3i16.to_le_bytes());
        assert_eq!(&b[9..13], &0xA5A5i32.to_le_bytes());
        assert!(b[17..].iter().all(|&x| x == 0));
    }

    #[test]
    fn roundtrip_with_bits_and_image() {
        let mut m = BotStatusMessage::new(42, 123, 0x0003, 0xA5A5);
        m.set_flag(5, true);
        m.set_pin_bit(2, true);
        let mut grid = [[false; 5]; 5];
        grid[0][1] = true;
        grid[4][4] = true;
        m.set_image_grid(&grid);
        m.set_message("ok");
        let d = BotStatusMessage::decode(m.as_bytes()).unwrap();
        assert_eq!(d, m);
        assert_eq!(d.fingerprint(), m.fingerprint());
        assert!(d.flag(5));
        assert!(d.pin_bit(2));
        assert_eq!(d.pin_state(), 0b111);
        assert_eq!(d.image_grid(), grid);
        assert!(d.pixel(4, 4));
        assert!(!d.pixel(5, 0));
        assert_eq!(d.message(), "ok");
    }

    #[test]
    fn nineteen_byte_frame_truncates_text() {
        let mut m = BotStatusMessage::with_packet_size(1, 2, 3, 4, 19);
        assert_eq!(m.set_message("Hello"), 2);
        assert_eq!(m.as_bytes().len(), 19);
        let d = BotStatusMessage::decode(m.as_bytes()).unwrap();
        assert_eq!(d.message(), "He");
        assert_eq!(d.fingerprint(), m.fingerprint());
    }

    #[test]
    fn single_byte_text_survives_decode() {
        let mut raw = BotStatusMessage::with_packet_size(1, 2, 3, 4, 19)
            .as_bytes()
            .to_vec();
        raw[17] = 0xE9;
        raw[18] = b'!';
        let d = BotStatusMessage::decode(&raw).unwrap();
        assert_eq!(d.as_bytes(), &raw[..]);
        assert_eq!(d.fingerprint(), 1 ^ (2 << 1) ^ (3 << 2) ^ 4 ^ 0xE9);
        assert_eq!(d.message(), "\u{FFFD}!");
    }

    #[test]
    fn text_is_zero_padded_and_replaced() {
        let mut m = BotStatusMessage::new(0, 0, 0, 0);
        m.set_message("longer text");
        m.set_message("hi");
        assert_eq!(&m.as_bytes()[17..20], b"hi\0");
        assert_eq!(m.message(), "hi");
    }

    #[test]
    fn decode_caps_oversized_buffer() {
        let mut raw = vec![b'x'; 40];
        raw[0] = 12;
        let d = BotStatusMessage::decode(&raw).unwrap();
        assert_eq!(d.packet_size(), MAX_PACKET_SIZE);
        assert_eq!(d.message().len(), MAX_PACKET_SIZE - BOT_STATUS_HEADER_SIZE);
    }

    #[test]
    fn header_only_frame() {
        let m = BotStatusMessage::with_packet_size(9, 0, 0, 0, 3);
        assert_eq!(m.packet_size(), BOT_STATUS_HEADER_SIZE);
        let d = BotStatusMessage::decode(m.as_bytes()).unwrap();
        assert_eq!(d.code(), 9);
        assert_eq!(d.message(), "");
        assert!(BotStatusMessage::decode(&m.as_bytes()[..16]).is_err());
    }

    #[test]
    fn out_of_range_bits_are_ignored() {
        let mut m = BotStatusMessage::new(0, 0, 0, 0);
        m.set_pin_bit(16, true);
        m.set_flag(32, true);
        m.set_pixel(0, 7, true);
        assert_eq!(m.pin_state(), 0);
        assert_eq!(m.flags(), 0);
        assert_eq!(m.image_bits(), 0);
        m.set_pin_bit(15, true);
        assert_eq!(m.pin_state(), i16::MIN);
        m.set_flag(31, true);
        assert_eq!(m.flags(), i32::MIN);
    }
}
