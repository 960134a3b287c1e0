//! Payload variants as a closed sum type, plus the trait each variant implements.

use std::fmt;

use crate::bot_status::BotStatusMessage;
use crate::here_i_am::HereIAm;
use crate::joystick::JoystickPayload;
use crate::protocol::{PacketType, ReceptionMeta};
use crate::wire::DecodeError;

/// Encode/decode/fingerprint contract shared by every variant.
/// `as_bytes()[0]` is always `PACKET_TYPE` and the length is the variant's packet size.
pub trait Payload: Sized {
    const PACKET_TYPE: PacketType;
    /// Shortest buffer `decode` accepts.
    const MIN_SIZE: usize;

    fn as_bytes(&self) -> &[u8];
    fn decode(bytes: &[u8]) -> Result<Self, DecodeError>;
    /// Cheap content hash used to suppress unchanged transmissions.
    fn fingerprint(&self) -> u32;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadKind {
    Joystick(JoystickPayload),
    BotStatus(BotStatusMessage),
    HereIAm(HereIAm),
}

/// A payload plus the reception metadata it arrived with (absent for local payloads).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioPayload {
    pub kind: PayloadKind,
    pub meta: Option<ReceptionMeta>,
}

impl RadioPayload {
    pub fn packet_type(&self) -> PacketType {
        match &self.kind {
            PayloadKind::Joystick(_) => PacketType::Joystick,
            PayloadKind::BotStatus(_) => PacketType::BotStatus,
            PayloadKind::HereIAm(_) => PacketType::HereIAm,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match &self.kind {
            PayloadKind::Joystick(p) => p.as_bytes(),
            PayloadKind::BotStatus(p) => p.as_bytes(),
            PayloadKind::HereIAm(p) => p.as_bytes(),
        }
    }

    pub fn fingerprint(&self) -> u32 {
        match &self.kind {
            PayloadKind::Joystick(p) => p.fingerprint(),
            PayloadKind::BotStatus(p) => p.fingerprint(),
            PayloadKind::HereIAm(p) => p.fingerprint(),
        }
    }

    pub fn with_meta(mut self, meta: ReceptionMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn as_joystick(&self) -> Option<&JoystickPayload> {
        match &self.kind {
            PayloadKind::Joystick(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_bot_status(&self) -> Option<&BotStatusMessage> {
        match &self.kind {
            PayloadKind::BotStatus(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_here_i_am(&self) -> Option<&HereIAm> {
        match &self.kind {
            PayloadKind::HereIAm(p) => Some(p),
            _ => None,
        }
    }
}

impl From<JoystickPayload> for RadioPayload {
    fn from(p: JoystickPayload) -> Self {
        Self {
            kind: PayloadKind::Joystick(p),
            meta: None,
        }
    }
}

impl From<BotStatusMessage> for RadioPayload {
    fn from(p: BotStatusMessage) -> Self {
        Self {
            kind: PayloadKind::BotStatus(p),
            meta: None,
        }
    }
}

impl From<HereIAm> for RadioPayload {
    fn from(p: HereIAm) -> Self {
        Self {
            kind: PayloadKind::HereIAm(p),
            meta: None,
        }
    }
}

impl fmt::Display for RadioPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            PayloadKind::Joystick(p) => write!(f, "{p}")?,
            PayloadKind::BotStatus(p) => write!(f, "{p}")?,
            PayloadKind::HereIAm(p) => write!(f, "{p}")?,
        }
        if let Some(meta) = &self.meta {
            write!(
                f,
                " from {:08X} @{}ms rssi={}",
                meta.serial, meta.arrival_ms, meta.signal_strength
            )?;
        }
        Ok(())
    }
}
