//! Joystick payload: stick position, buttons, accelerometer, a data word, an image and a tone.
//!
//! Layout (20 bytes):
//! `tag@0 x:u16@1 y:u16@3 buttons:u8@5 accelX:i16@6 accelY:i16@8 accelZ:i16@10
//!  data:u16@12 image:u32@14 tone:u8@18 duration:u8@19`
//!
//! The buffer is the only storage; accessors read it and setters write it.

use std::fmt;

use crate::payload::Payload;
use crate::protocol::PacketType;
use crate::wire::{self, DecodeError, Grid, IMAGE_MASK};

pub const JOYSTICK_PACKET_SIZE: usize = 20;

/// Largest stick position.
pub const AXIS_MAX: u16 = 1023;
/// Accelerometer readings are clipped to `[-ACCEL_MAX, ACCEL_MAX]`.
pub const ACCEL_MAX: i16 = 1023;

const X: usize = 1;
const Y: usize = 3;
const BUTTONS: usize = 5;
const ACCEL_X: usize = 6;
const ACCEL_Y: usize = 8;
const ACCEL_Z: usize = 10;
const DATA: usize = 12;
const IMAGE: usize = 14;
const TONE: usize = 18;
const DURATION: usize = 19;

// Raw stick values above this were negative before being written unsigned.
const WRAPPED_NEGATIVE: u16 = 65000;

/// Named buttons; the discriminant is the bit position in the button byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoystickButton {
    A = 0,
    B = 1,
    Logo = 2,
    C = 3,
    D = 4,
    E = 5,
    F = 6,
    G = 7,
}

impl JoystickButton {
    pub const ALL: [JoystickButton; 8] = [
        JoystickButton::A,
        JoystickButton::B,
        JoystickButton::Logo,
        JoystickButton::C,
        JoystickButton::D,
        JoystickButton::E,
        JoystickButton::F,
        JoystickButton::G,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }
}

/// Selector for the numeric readings of a joystick payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoystickValue {
    X,
    Y,
    AccelX,
    AccelY,
    AccelZ,
}

/// Raw sensor sample supplied by the hardware collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoystickSample {
    pub x: i32,
    pub y: i32,
    pub buttons: u8,
    pub accel_x: i32,
    pub accel_y: i32,
    pub accel_z: i32,
}

#[derive(Clone, PartialEq, Eq)]
pub struct JoystickPayload {
    buf: [u8; JOYSTICK_PACKET_SIZE],
}

fn clip_axis(v: i32) -> u16 {
    v.unsigned_abs().min(AXIS_MAX as u32) as u16
}

fn clip_accel(v: i32) -> i16 {
    v.clamp(-(ACCEL_MAX as i32), ACCEL_MAX as i32) as i16
}

impl JoystickPayload {
    /// Build from a sensor sample. Stick values are stored as absolute values clipped to
    /// `AXIS_MAX`; accelerometer values are clipped to `ACCEL_MAX`.
    pub fn new(sample: JoystickSample) -> Self {
        let mut p = Self::empty();
        p.set_x(sample.x);
        p.set_y(sample.y);
        p.set_buttons(sample.buttons);
        p.set_accel(sample.accel_x, sample.accel_y, sample.accel_z);
        p
    }

    fn empty() -> Self {
        let mut buf = [0u8; JOYSTICK_PACKET_SIZE];
        buf[0] = PacketType::Joystick.tag();
        Self { buf }
    }

    pub fn x(&self) -> u16 {
        wire::get_u16(&self.buf, X)
    }

    pub fn y(&self) -> u16 {
        wire::get_u16(&self.buf, Y)
    }

    pub fn set_x(&mut self, x: i32) {
        wire::put_u16(&mut self.buf, X, clip_axis(x));
    }

    pub fn set_y(&mut self, y: i32) {
        wire::put_u16(&mut self.buf, Y, clip_axis(y));
    }

    /// Button bitmask, bit `n` is `JoystickButton` with index `n`.
    pub fn buttons(&self) -> u8 {
        self.buf[BUTTONS]
    }

    pub fn set_buttons(&mut self, mask: u8) {
        self.buf[BUTTONS] = mask;
    }

    /// Indices at or past 8 are ignored.
    pub fn set_button(&mut self, index: u8, pressed: bool) {
        self.buf[BUTTONS] = wire::with_bit(self.buf[BUTTONS] as u32, index, 8, pressed) as u8;
    }

    pub fn button(&self, index: u8) -> bool {
        wire::bit(self.buf[BUTTONS] as u32, index, 8)
    }

    pub fn is_pressed(&self, button: JoystickButton) -> bool {
        self.button(button.index())
    }

    pub fn pressed(&self) -> Vec<JoystickButton> {
        JoystickButton::ALL
            .into_iter()
            .filter(|b| self.is_pressed(*b))
            .collect()
    }

    pub fn accel_x(&self) -> i16 {
        wire::get_i16(&self.buf, ACCEL_X)
    }

    pub fn accel_y(&self) -> i16 {
        wire::get_i16(&self.buf, ACCEL_Y)
    }

    pub fn accel_z(&self) -> i16 {
        wire::get_i16(&self.buf, ACCEL_Z)
    }

    pub fn set_accel(&mut self, x: i32, y: i32, z: i32) {
        wire::put_i16(&mut self.buf, ACCEL_X, clip_accel(x));
        wire::put_i16(&mut self.buf, ACCEL_Y, clip_accel(y));
        wire::put_i16(&mut self.buf, ACCEL_Z, clip_accel(z));
    }

    pub fn data(&self) -> u16 {
        wire::get_u16(&self.buf, DATA)
    }

    pub fn set_data(&mut self, data: u16) {
        wire::put_u16(&mut self.buf, DATA, data);
    }

    /// 25-bit row-major image bitmap.
    pub fn image(&self) -> u32 {
        wire::get_u32(&self.buf, IMAGE)
    }

    pub fn set_image(&mut self, bits: u32) {
        wire::put_u32(&mut self.buf, IMAGE, bits & IMAGE_MASK);
    }

    pub fn image_grid(&self) -> Grid {
        wire::bits_to_grid(self.image())
    }

    pub fn set_image_grid(&mut self, grid: &Grid) {
        self.set_image(wire::grid_to_bits(grid));
    }

    pub fn tone(&self) -> u8 {
        self.buf[TONE]
    }

    /// Duration in 10 ms units.
    pub fn duration(&self) -> u8 {
        self.buf[DURATION]
    }

    pub fn set_tone(&mut self, tone: u8, duration: u8) {
        self.buf[TONE] = tone;
        self.buf[DURATION] = duration;
    }

    pub fn value(&self, which: JoystickValue) -> i32 {
        match which {
            JoystickValue::X => self.x() as i32,
            JoystickValue::Y => self.y() as i32,
            JoystickValue::AccelX => self.accel_x() as i32,
            JoystickValue::AccelY => self.accel_y() as i32,
            JoystickValue::AccelZ => self.accel_z() as i32,
        }
    }
}

impl Payload for JoystickPayload {
    const PACKET_TYPE: PacketType = PacketType::Joystick;
    const MIN_SIZE: usize = JOYSTICK_PACKET_SIZE;

    fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        wire::check_header(bytes, Self::PACKET_TYPE, Self::MIN_SIZE)?;
        let axis = |raw: u16| -> i32 {
            if raw > WRAPPED_NEGATIVE {
                0
            } else {
                raw as i32
            }
        };
        let mut p = Self::new(JoystickSample {
            x: axis(wire::get_u16(bytes, X)),
            y: axis(wire::get_u16(bytes, Y)),
            buttons: bytes[BUTTONS],
            accel_x: wire::get_i16(bytes, ACCEL_X) as i32,
            accel_y: wire::get_i16(bytes, ACCEL_Y) as i32,
            accel_z: wire::get_i16(bytes, ACCEL_Z) as i32,
        });
        p.set_data(wire::get_u16(bytes, DATA));
        p.set_image(wire::get_u32(bytes, IMAGE));
        p.set_tone(bytes[TONE], bytes[DURATION]);
        Ok(p)
    }

    fn fingerprint(&self) -> u32 {
        self.x() as u32
            ^ self.y() as u32
            ^ self.buttons() as u32
            ^ self.accel_x() as i32 as u32
            ^ self.accel_y() as i32 as u32
            ^ self.accel_z() as i32 as u32
            ^ self.data() as u32
            ^ self.image()
            ^ self.tone() as u32
            ^ self.duration() as u32
    }
}

impl fmt::Debug for JoystickPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for JoystickPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Joystick(x={}, y={}, buttons={:?}, accel=({}, {}, {}), data={}, image={:07x}, tone={}/{})",
            self.x(),
            self.y(),
            self.pressed(),
            self.accel_x(),
            self.accel_y(),
            self.accel_z(),
            self.data(),
            self.image(),
            self.tone(),
            self.duration()
        )
    }
}
