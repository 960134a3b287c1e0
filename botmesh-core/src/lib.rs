//! BotMesh: typed radio payloads and channel negotiation for small broadcast radio nodes.
//! Host-driven: no I/O; host passes received buffers and clock ticks, and performs the
//! returned radio actions.

pub mod beacon;
pub mod bot_status;
pub mod core;
pub mod gate;
pub mod here_i_am;
pub mod identity;
pub mod joystick;
pub mod negotiate;
pub mod payload;
pub mod peers;
pub mod protocol;
pub mod registry;
pub mod wire;

pub use crate::core::{BotMeshCore, ConfigError, OutboundAction, RadioConfig};
pub use bot_status::BotStatusMessage;
pub use here_i_am::HereIAm;
pub use identity::DeviceId;
pub use joystick::{JoystickButton, JoystickPayload, JoystickSample, JoystickValue};
pub use negotiate::{NegotiationEngine, NegotiationState};
pub use payload::{Payload, PayloadKind, RadioPayload};
pub use peers::{PeerRecord, PeerStore};
pub use protocol::{PacketType, Pairing, ReceptionMeta, DISCOVERY_PAIRING, MAX_PACKET_SIZE};
pub use wire::DecodeError;
