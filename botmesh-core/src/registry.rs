//! Dispatch raw buffers to the right variant decoder by the tag byte, and hand decoded
//! payloads to registered handlers.

use std::collections::HashMap;

use crate::bot_status::BotStatusMessage;
use crate::here_i_am::HereIAm;
use crate::joystick::JoystickPayload;
use crate::payload::{Payload, PayloadKind, RadioPayload};
use crate::protocol::{PacketType, ReceptionMeta};
use crate::wire::DecodeError;

/// Callback invoked with each decoded payload. Runs to completion on the caller's thread.
pub type Handler = Box<dyn FnMut(&RadioPayload) + Send>;

/// Outcome of dispatching a received buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Decoded(RadioPayload),
    /// Tag byte names no known variant (foreign traffic). Dropped.
    Unrecognized(u8),
    /// Known tag but the buffer is unusable. Dropped.
    Malformed(DecodeError),
}

/// Decode `bytes` into a payload without reception metadata.
pub fn decode(bytes: &[u8]) -> Result<RadioPayload, DecodeError> {
    let tag = *bytes
        .first()
        .ok_or(DecodeError::TooShort { need: 1, got: 0 })?;
    let kind = match PacketType::try_from(tag).map_err(DecodeError::UnknownType)? {
        PacketType::Joystick => PayloadKind::Joystick(JoystickPayload::decode(bytes)?),
        PacketType::BotStatus => PayloadKind::BotStatus(BotStatusMessage::decode(bytes)?),
        PacketType::HereIAm => PayloadKind::HereIAm(HereIAm::decode(bytes)?),
    };
    Ok(RadioPayload { kind, meta: None })
}

/// Decode `bytes` and attach the transport's reception metadata.
pub fn dispatch(bytes: &[u8], meta: ReceptionMeta) -> Dispatch {
    match decode(bytes) {
        Ok(payload) => Dispatch::Decoded(payload.with_meta(meta)),
        Err(DecodeError::UnknownType(tag)) => Dispatch::Unrecognized(tag),
        Err(e) => Dispatch::Malformed(e),
    }
}

/// Per-variant and global handlers.
#[derive(Default)]
pub struct PayloadRegistry {
    handlers: HashMap<PacketType, Handler>,
    global: Option<Handler>,
}

impl PayloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the handler for one packet type.
    pub fn register(&mut self, packet_type: PacketType, handler: Handler) {
        self.handlers.insert(packet_type, handler);
    }

    /// Replace the handler that sees every decoded payload.
    pub fn register_global(&mut self, handler: Handler) {
        self.global = Some(handler);
    }

    /// Invoke the variant handler, then the global handler. Returns how many ran.
    pub fn deliver(&mut self, payload: &RadioPayload) -> usize {
        let mut ran = 0;
        if let Some(h) = self.handlers.get_mut(&payload.packet_type()) {
            h(payload);
            ran += 1;
        }
        if let Some(h) = self.global.as_mut() {
            h(payload);
            ran += 1;
        }
        ran
    }
}
