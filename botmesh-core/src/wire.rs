//! Byte-level codec helpers shared by every payload variant.
//! All multi-byte integers are little-endian; offsets are fixed per variant.

use crate::protocol::PacketType;

/// Side length of the LED matrix carried in image bitmaps.
pub const GRID_SIZE: usize = 5;
/// Mask of the 25 meaningful bits of an image bitmap.
pub const IMAGE_MASK: u32 = (1 << (GRID_SIZE * GRID_SIZE)) - 1;

/// Row-major 5x5 pixel grid: `grid[row][col]`.
pub type Grid = [[bool; GRID_SIZE]; GRID_SIZE];

/// Error decoding a received buffer into a payload variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("buffer too short: need {need} bytes, got {got}")]
    TooShort { need: usize, got: usize },
    #[error("unrecognized packet type {0}")]
    UnknownType(u8),
    #[error("packet type {got} is not a {expected:?}")]
    WrongType { expected: PacketType, got: u8 },
}

/// Check the minimum length and the type tag before a variant reads its fields.
pub(crate) fn check_header(
    bytes: &[u8],
    expected: PacketType,
    min_size: usize,
) -> Result<(), DecodeError> {
    if bytes.len() < min_size {
        return Err(DecodeError::TooShort {
            need: min_size,
            got: bytes.len(),
        });
    }
    if bytes[0] != expected.tag() {
        return Err(DecodeError::WrongType {
            expected,
            got: bytes[0],
        });
    }
    Ok(())
}

pub(crate) fn get_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([buf[off], buf[off + 1]])
}

pub(crate) fn get_i16(buf: &[u8], off: usize) -> i16 {
    i16::from_le_bytes([buf[off], buf[off + 1]])
}

pub(crate) fn get_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

pub(crate) fn get_i32(buf: &[u8], off: usize) -> i32 {
    i32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

pub(crate) fn put_u16(buf: &mut [u8], off: usize, v: u16) {
    buf[off..off + 2].copy_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_i16(buf: &mut [u8], off: usize, v: i16) {
    buf[off..off + 2].copy_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_i32(buf: &mut [u8], off: usize, v: i32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

/// Set or clear one bit of `bits`. Indices at or past `width` are ignored.
pub fn with_bit(bits: u32, index: u8, width: u8, on: bool) -> u32 {
    if index >= width {
        return bits;
    }
    if on {
        bits | (1 << index)
    } else {
        bits & !(1 << index)
    }
}

/// Read one bit of `bits`. Indices at or past `width` read as unset.
pub fn bit(bits: u32, index: u8, width: u8) -> bool {
    index < width && bits & (1 << index) != 0
}

/// Truncate `text` to at most `max` bytes without splitting a UTF-8 character.
pub fn truncate_utf8(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Bytes of `buf` up to the first zero byte or the end of the slice.
pub(crate) fn text_bytes(buf: &[u8]) -> &[u8] {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    &buf[..end]
}

/// Text up to the first zero byte. Bytes that are not UTF-8 show as U+FFFD.
pub(crate) fn read_text(buf: &[u8]) -> String {
    String::from_utf8_lossy(text_bytes(buf)).into_owned()
}

/// Bit index of a pixel: row-major, `row * 5 + col`.
pub fn pixel_bit(row: usize, col: usize) -> u8 {
    (row * GRID_SIZE + col) as u8
}

/// Expand an image bitmap into a 5x5 grid.
pub fn bits_to_grid(bits: u32) -> Grid {
    let mut grid = [[false; GRID_SIZE]; GRID_SIZE];
    for (row, cells) in grid.iter_mut().enumerate() {
        for (col, cell) in cells.iter_mut().enumerate() {
            *cell = bits & (1 << pixel_bit(row, col)) != 0;
        }
    }
    grid
}

/// Pack a 5x5 grid into an image bitmap.
pub fn grid_to_bits(grid: &Grid) -> u32 {
    let mut bits = 0u32;
    for (row, cells) in grid.iter().enumerate() {
        for (col, &on) in cells.iter().enumerate() {
            if on {
                bits |= 1 << pixel_bit(row, col);
            }
        }
    }
    bits
}
