//! Host-driven API: BotMeshCore receives buffers and clock ticks from the host and returns
//! actions for the host's radio.
//!
//! Everything runs to completion inside one call; the host must not call into the core from
//! two tasks at once (wrap it in a mutex or feed it from a single event loop).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::beacon::Beacon;
use crate::gate::ChangeGate;
use crate::identity::DeviceId;
use crate::negotiate::{NegotiationEngine, NegotiationEvent, NegotiationState};
use crate::payload::{Payload, PayloadKind, RadioPayload};
use crate::peers::PeerStore;
use crate::protocol::{PacketType, Pairing, ReceptionMeta, MAX_CHANNEL, MAX_GROUP, MAX_POWER};
use crate::registry::{self, Dispatch, PayloadRegistry};

pub const DEFAULT_CHANNEL: u16 = 7;
pub const DEFAULT_GROUP: u16 = 1;
pub const DEFAULT_POWER: u8 = 7;

/// Radio settings applied by `initialize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RadioConfig {
    #[serde(default = "default_channel")]
    pub channel: u16,
    #[serde(default = "default_group")]
    pub group: u16,
    #[serde(default = "default_power")]
    pub power: u8,
}

fn default_channel() -> u16 {
    DEFAULT_CHANNEL
}
fn default_group() -> u16 {
    DEFAULT_GROUP
}
fn default_power() -> u8 {
    DEFAULT_POWER
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            group: default_group(),
            power: default_power(),
        }
    }
}

impl RadioConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel > MAX_CHANNEL {
            return Err(ConfigError::Channel(self.channel));
        }
        if self.group > MAX_GROUP {
            return Err(ConfigError::Group(self.group));
        }
        if self.power > MAX_POWER {
            return Err(ConfigError::Power(self.power));
        }
        Ok(())
    }

    pub fn pairing(&self) -> Pairing {
        Pairing::new(self.channel, self.group)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("channel {0} out of range 0..={MAX_CHANNEL}")]
    Channel(u16),
    #[error("group {0} out of range 0..={MAX_GROUP}")]
    Group(u16),
    #[error("power {0} out of range 0..={MAX_POWER}")]
    Power(u8),
}

/// Action for the host radio to perform, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundAction {
    /// Switch the receiver and transmitter to this pairing.
    Tune(Pairing),
    SetPower(u8),
    /// Transmit `bytes` on `pairing`. When it differs from the tuned pairing the host
    /// switches for this transmission only.
    Send { pairing: Pairing, bytes: Vec<u8> },
}

/// Main coordinator: configuration surface, receive path, beacon and negotiation.
pub struct BotMeshCore {
    device: DeviceId,
    pairing: Pairing,
    power: u8,
    peers: PeerStore,
    registry: PayloadRegistry,
    gate: ChangeGate,
    beacon: Beacon,
    negotiation: Option<NegotiationEngine>,
    last_received: HashMap<PacketType, RadioPayload>,
}

impl BotMeshCore {
    pub fn new(serial: u32) -> Self {
        let defaults = RadioConfig::default();
        Self {
            device: DeviceId::from_serial(serial),
            pairing: defaults.pairing(),
            power: defaults.power,
            peers: PeerStore::new(),
            registry: PayloadRegistry::new(),
            gate: ChangeGate::new(),
            beacon: Beacon::new(),
            negotiation: None,
            last_received: HashMap::new(),
        }
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// Apply channel, group and power. Returns the actions that bring the radio in line.
    pub fn initialize(&mut self, config: RadioConfig) -> Result<Vec<OutboundAction>, ConfigError> {
        config.validate()?;
        log::info!(
            "radio {} initialized on {} power {}",
            self.device,
            config.pairing(),
            config.power
        );
        self.power = config.power;
        self.peers.clear();
        self.pairing = config.pairing();
        Ok(vec![
            OutboundAction::SetPower(config.power),
            OutboundAction::Tune(self.pairing),
        ])
    }

    pub fn channel(&self) -> u16 {
        self.pairing.channel
    }

    pub fn group(&self) -> u16 {
        self.pairing.group
    }

    pub fn pairing(&self) -> Pairing {
        self.pairing
    }

    pub fn power(&self) -> u8 {
        self.power
    }

    pub fn set_channel(&mut self, channel: u16) -> Result<Vec<OutboundAction>, ConfigError> {
        if channel > MAX_CHANNEL {
            return Err(ConfigError::Channel(channel));
        }
        Ok(self.retune(Pairing::new(channel, self.pairing.group)))
    }

    pub fn set_group(&mut self, group: u16) -> Result<Vec<OutboundAction>, ConfigError> {
        if group > MAX_GROUP {
            return Err(ConfigError::Group(group));
        }
        Ok(self.retune(Pairing::new(self.pairing.channel, group)))
    }

    /// Peer visibility is scoped to the pairing, so any change clears the peer table.
    fn retune(&mut self, pairing: Pairing) -> Vec<OutboundAction> {
        if pairing == self.pairing {
            return Vec::new();
        }
        log::debug!("retune {} -> {}", self.pairing, pairing);
        self.pairing = pairing;
        self.peers.clear();
        vec![OutboundAction::Tune(pairing)]
    }

    /// Handler for every decoded payload, called after the variant handler.
    pub fn register_global_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&RadioPayload) + Send + 'static,
    {
        self.registry.register_global(Box::new(handler));
    }

    pub fn register_handler<F>(&mut self, packet_type: PacketType, handler: F)
    where
        F: FnMut(&RadioPayload) + Send + 'static,
    {
        self.registry.register(packet_type, Box::new(handler));
    }

    /// Announce `class_id` every beacon interval from the next `tick` on.
    pub fn start_beacon(&mut self, class_id: &str) {
        log::info!("beacon started as {:?}", class_id);
        self.beacon.start(class_id);
    }

    pub fn stop_beacon(&mut self) {
        if self.beacon.is_running() {
            log::info!("beacon stopped");
        }
        self.beacon.stop();
    }

    pub fn is_beaconing(&self) -> bool {
        self.beacon.is_running()
    }

    /// Negotiate a free pairing for `class_id`, starting from the serial-derived seed.
    pub fn start_negotiation(&mut self, class_id: &str, now_ms: u64) -> Vec<OutboundAction> {
        self.start_negotiation_with(NegotiationEngine::new(class_id), None, now_ms)
    }

    /// Negotiate with a prepared engine, optionally starting from `candidate` instead of the seed.
    pub fn start_negotiation_with(
        &mut self,
        mut engine: NegotiationEngine,
        candidate: Option<Pairing>,
        now_ms: u64,
    ) -> Vec<OutboundAction> {
        let first = match candidate {
            Some(c) => engine.probe(c, now_ms),
            None => engine.begin(self.device.serial(), now_ms),
        };
        self.negotiation = Some(engine);
        self.tune_candidate(first)
    }

    /// Only peers heard after tuning a candidate count, even when it is the pairing already tuned.
    fn tune_candidate(&mut self, candidate: Pairing) -> Vec<OutboundAction> {
        let actions = self.retune(candidate);
        self.peers.clear();
        actions
    }

    pub fn cancel_negotiation(&mut self) {
        if let Some(engine) = self.negotiation.as_mut() {
            engine.cancel();
        }
    }

    pub fn negotiation_state(&self) -> NegotiationState {
        self.negotiation
            .as_ref()
            .map(|e| e.state())
            .unwrap_or(NegotiationState::Idle)
    }

    /// Receive path: decode, record discovery beacons, remember the last payload per type,
    /// run handlers. Own, foreign and malformed frames are dropped and return `None`.
    pub fn on_buffer(&mut self, bytes: &[u8], meta: ReceptionMeta) -> Option<RadioPayload> {
        if meta.serial == self.device.serial() {
            log::trace!("dropping own frame");
            return None;
        }
        let payload = match registry::dispatch(bytes, meta) {
            Dispatch::Decoded(p) => p,
            Dispatch::Unrecognized(tag) => {
                log::trace!("dropping frame with unknown tag {} from {:08X}", tag, meta.serial);
                return None;
            }
            Dispatch::Malformed(e) => {
                log::trace!("dropping malformed frame from {:08X}: {}", meta.serial, e);
                return None;
            }
        };
        if let PayloadKind::HereIAm(hia) = &payload.kind {
            self.peers.upsert(
                meta.serial,
                &hia.class_id(),
                hia.group(),
                hia.channel(),
                meta.arrival_ms,
            );
        }
        self.last_received
            .insert(payload.packet_type(), payload.clone());
        self.registry.deliver(&payload);
        Some(payload)
    }

    /// Periodic tick: advance negotiation, then emit a beacon round if one is due.
    pub fn tick(&mut self, now_ms: u64) -> Vec<OutboundAction> {
        let mut actions = Vec::new();
        if let Some(mut engine) = self.negotiation.take() {
            while let Some(event) = engine.poll(&self.peers, now_ms) {
                match event {
                    NegotiationEvent::Probe(next) => actions.extend(self.tune_candidate(next)),
                    NegotiationEvent::Occupied { .. } => {}
                    NegotiationEvent::Acquired(p) => {
                        log::info!("{} {} acquired {}", engine.class_id(), self.device, p);
                    }
                }
            }
            self.negotiation = Some(engine);
        }
        if let Some(round) = self.beacon.poll(self.pairing, now_ms) {
            let bytes = round.announcement.as_bytes().to_vec();
            for pairing in round.targets {
                actions.push(OutboundAction::Send {
                    pairing,
                    bytes: bytes.clone(),
                });
            }
        }
        actions
    }

    /// Transmit `payload` on the current pairing.
    pub fn send(&self, payload: &RadioPayload) -> OutboundAction {
        OutboundAction::Send {
            pairing: self.pairing,
            bytes: payload.as_bytes().to_vec(),
        }
    }

    /// Transmit only if the fingerprint differs from the last payload of the same type.
    /// `Some` means the payload was sent.
    pub fn send_if_changed(&mut self, payload: &RadioPayload) -> Option<OutboundAction> {
        if self.gate.consider(payload) {
            Some(self.send(payload))
        } else {
            None
        }
    }

    pub fn peers(&self) -> &PeerStore {
        &self.peers
    }

    /// Most recent payload received of `packet_type`.
    pub fn last_received(&self, packet_type: PacketType) -> Option<&RadioPayload> {
        self.last_received.get(&packet_type)
    }
}
