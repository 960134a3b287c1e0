//! Suppress transmissions whose content fingerprint matches the last one considered
//! for the same packet type.

use std::collections::HashMap;

use crate::payload::RadioPayload;
use crate::protocol::PacketType;

#[derive(Debug, Default)]
pub struct ChangeGate {
    last: HashMap<PacketType, u32>,
}

impl ChangeGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `payload` should go on air. The payload becomes the last considered one
    /// for its packet type either way.
    pub fn consider(&mut self, payload: &RadioPayload) -> bool {
        let fp = payload.fingerprint();
        let changed = self.last.insert(payload.packet_type(), fp) != Some(fp);
        if !changed {
            log::trace!("suppressing unchanged {:?}", payload.packet_type());
        }
        changed
    }

    /// Forget the history for one packet type so its next payload is always sent.
    pub fn reset(&mut self, packet_type: PacketType) {
        self.last.remove(&packet_type);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot_status::BotStatusMessage;
    use crate::joystick::{JoystickPayload, JoystickSample};

    fn joy(x: i32) -> RadioPayload {
        JoystickPayload::new(JoystickSample {
            x,
            ..Default::default()
        })
        .into()
    }

    #[test]
    fn identical_payload_sent_once() {
        let mut gate = ChangeGate::new();
        assert!(gate.consider(&joy(100)));
        assert!(!gate.consider(&joy(100)));
        assert!(!gate.consider(&joy(100)));
        assert!(gate.consider(&joy(101)));
    }

    #[test]
    fn classes_are_tracked_separately() {
        let mut gate = ChangeGate::new();
        let status: RadioPayload = BotStatusMessage::new(0, 0, 0, 0).into();
        assert!(gate.consider(&joy(0)));
        assert!(gate.consider(&status));
        assert!(!gate.consider(&joy(0)));
        assert!(!gate.consider(&status));
    }

    #[test]
    fn single_field_change_is_sent() {
        let mut gate = ChangeGate::new();
        let mut m = BotStatusMessage::new(5, 10, 0, 0);
        assert!(gate.consider(&m.clone().into()));
        m.set_flag(3, true);
        assert!(gate.consider(&m.clone().into()));
        m.set_message("Go");
        assert!(gate.consider(&m.clone().into()));
        assert!(!gate.consider(&m.into()));
    }

    #[test]
    fn reset_forces_next_send() {
        let mut gate = ChangeGate::new();
        assert!(gate.consider(&joy(1)));
        gate.reset(PacketType::Joystick);
        assert!(gate.consider(&joy(1)));
    }
}
