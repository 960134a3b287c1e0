//! Channel negotiation: find a (channel, group) pairing not already used by a device of
//! the same class.
//!
//! `Idle -> Probing(candidate) -> Occupied(candidate, retry) -> Probing(next) ... -> Acquired`
//!
//! The first candidate is derived from the serial number, so devices that are meant to pair
//! start on the same pairing without any traffic. A candidate is occupied when a HereIAm with
//! our own class id is heard on it within `PROBE_WINDOW_MS`; otherwise it is acquired.
//!
//! Retries are unbounded: if every random candidate is occupied the engine keeps probing
//! until the host cancels it. Two devices that probe the same empty pairing at the same time
//! both acquire it; nothing here detects that.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::identity::scramble;
use crate::peers::PeerStore;
use crate::protocol::{Pairing, MAX_CHANNEL, MAX_GROUP};

pub const PROBE_WINDOW_MS: u64 = 5000;

// Seeds skip channel/group 0 and 1 so they never land on the discovery pairing.
const SEED_OFFSET: u16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    Probing {
        candidate: Pairing,
        since_ms: u64,
        retry: u32,
    },
    Occupied {
        candidate: Pairing,
        retry: u32,
    },
    Acquired(Pairing),
}

/// What the host must act on after a `poll`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationEvent {
    /// Tune to `candidate` and listen.
    Probe(Pairing),
    /// A same-class device (by serial) was heard on `candidate`.
    Occupied { candidate: Pairing, by: u32 },
    /// The probe window elapsed without a same-class device; keep this pairing.
    Acquired(Pairing),
}

/// Deterministic first candidate for a serial number.
pub fn seed_candidate(serial: u32) -> Pairing {
    let h = scramble(serial);
    let channel_span = (MAX_CHANNEL + 1 - SEED_OFFSET) as u32;
    let group_span = (MAX_GROUP + 1 - SEED_OFFSET) as u32;
    Pairing {
        channel: SEED_OFFSET + (h % channel_span) as u16,
        group: SEED_OFFSET + ((h >> 16) % group_span) as u16,
    }
}

pub struct NegotiationEngine {
    class_id: String,
    state: NegotiationState,
    rng: StdRng,
}

impl NegotiationEngine {
    pub fn new(class_id: &str) -> Self {
        Self::with_rng(class_id, StdRng::from_entropy())
    }

    /// Engine with a fixed random sequence.
    pub fn with_seed(class_id: &str, seed: u64) -> Self {
        Self::with_rng(class_id, StdRng::seed_from_u64(seed))
    }

    fn with_rng(class_id: &str, rng: StdRng) -> Self {
        Self {
            class_id: class_id.to_string(),
            state: NegotiationState::Idle,
            rng,
        }
    }

    pub fn class_id(&self) -> &str {
        &self.class_id
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            NegotiationState::Probing { .. } | NegotiationState::Occupied { .. }
        )
    }

    pub fn acquired(&self) -> Option<Pairing> {
        match self.state {
            NegotiationState::Acquired(p) => Some(p),
            _ => None,
        }
    }

    /// Start probing from the serial-derived seed. Returns the pairing to tune to.
    pub fn begin(&mut self, serial: u32, now_ms: u64) -> Pairing {
        self.probe(seed_candidate(serial), now_ms)
    }

    /// Start probing an explicit candidate.
    pub fn probe(&mut self, candidate: Pairing, now_ms: u64) -> Pairing {
        log::info!("probing {} as {:?}", candidate, self.class_id);
        self.state = NegotiationState::Probing {
            candidate,
            since_ms: now_ms,
            retry: 0,
        };
        candidate
    }

    /// Stop negotiating and keep whatever pairing is tuned.
    pub fn cancel(&mut self) {
        if self.is_active() {
            log::info!("negotiation cancelled");
        }
        self.state = NegotiationState::Idle;
    }

    /// Advance the state machine. `peers` holds what has been heard on the candidate since
    /// it was tuned. Call repeatedly until it returns `None`.
    pub fn poll(&mut self, peers: &PeerStore, now_ms: u64) -> Option<NegotiationEvent> {
        match self.state {
            NegotiationState::Probing {
                candidate,
                since_ms,
                retry,
            } => {
                if let Some(peer) = peers.find_first_by_class(&self.class_id) {
                    log::info!(
                        "{} occupied by {:08X} (retry {})",
                        candidate,
                        peer.serial,
                        retry + 1
                    );
                    self.state = NegotiationState::Occupied {
                        candidate,
                        retry: retry + 1,
                    };
                    return Some(NegotiationEvent::Occupied {
                        candidate,
                        by: peer.serial,
                    });
                }
                if now_ms.saturating_sub(since_ms) >= PROBE_WINDOW_MS {
                    log::info!("acquired {} after {} retries", candidate, retry);
                    self.state = NegotiationState::Acquired(candidate);
                    return Some(NegotiationEvent::Acquired(candidate));
                }
                None
            }
            NegotiationState::Occupied { candidate, retry } => {
                let next = self.random_candidate(candidate);
                log::debug!("next candidate {}", next);
                self.state = NegotiationState::Probing {
                    candidate: next,
                    since_ms: now_ms,
                    retry,
                };
                Some(NegotiationEvent::Probe(next))
            }
            NegotiationState::Idle | NegotiationState::Acquired(_) => None,
        }
    }

    fn random_candidate(&mut self, occupied: Pairing) -> Pairing {
        loop {
            let p = Pairing {
                channel: self.rng.gen_range(0..=MAX_CHANNEL),
                group: self.rng.gen_range(0..=MAX_GROUP),
            };
            if p != occupied && !p.is_discovery() {
                return p;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_is_pure_and_in_range() {
        for serial in [0u32, 1, 0xDEAD_BEEF, u32::MAX, 12345] {
            let a = seed_candidate(serial);
            assert_eq!(a, seed_candidate(serial));
            assert!(a.is_valid());
            assert!(a.channel >= 2 && a.group >= 2);
            assert!(!a.is_discovery());
        }
    }

    #[test]
    fn quiet_window_acquires() {
        let peers = PeerStore::new();
        let mut e = NegotiationEngine::with_seed("cutebot", 1);
        let c = e.probe(Pairing::new(42, 17), 1000);
        assert_eq!(c, Pairing::new(42, 17));
        assert_eq!(e.poll(&peers, 1000 + PROBE_WINDOW_MS - 1), None);
        assert_eq!(
            e.poll(&peers, 1000 + PROBE_WINDOW_MS),
            Some(NegotiationEvent::Acquired(Pairing::new(42, 17)))
        );
        assert_eq!(e.acquired(), Some(Pairing::new(42, 17)));
        assert_eq!(e.poll(&peers, 99_999), None);
    }

    #[test]
    fn other_classes_do_not_occupy() {
        let mut peers = PeerStore::new();
        peers.upsert(7, "joystick", 17, 42, 10);
        let mut e = NegotiationEngine::with_seed("cutebot", 1);
        e.probe(Pairing::new(42, 17), 0);
        assert_eq!(
            e.poll(&peers, PROBE_WINDOW_MS),
            Some(NegotiationEvent::Acquired(Pairing::new(42, 17)))
        );
    }

    #[test]
    fn same_class_moves_to_new_candidate() {
        let mut peers = PeerStore::new();
        let mut e = NegotiationEngine::with_seed("cutebot", 99);
        e.probe(Pairing::new(42, 17), 0);
        peers.upsert(0xA, "cutebot", 17, 42, 1200);
        assert_eq!(
            e.poll(&peers, 1200),
            Some(NegotiationEvent::Occupied {
                candidate: Pairing::new(42, 17),
                by: 0xA
            })
        );
        let next = match e.poll(&peers, 1200) {
            Some(NegotiationEvent::Probe(p)) => p,
            other => panic!("expected probe, got {other:?}"),
        };
        assert_ne!(next, Pairing::new(42, 17));
        assert!(next.is_valid());
        assert!(!next.is_discovery());
        assert_eq!(
            e.state(),
            NegotiationState::Probing {
                candidate: next,
                since_ms: 1200,
                retry: 1
            }
        );
    }

    #[test]
    fn seeded_retries_are_reproducible() {
        let mut peers = PeerStore::new();
        peers.upsert(1, "cutebot", 0, 0, 0);
        let run = |seed| {
            let mut e = NegotiationEngine::with_seed("cutebot", seed);
            e.probe(Pairing::new(3, 3), 0);
            e.poll(&peers, 0);
            e.poll(&peers, 0)
        };
        assert_eq!(run(5), run(5));
    }

    #[test]
    fn cancel_returns_to_idle() {
        let mut e = NegotiationEngine::with_seed("cutebot", 1);
        e.begin(1234, 0);
        assert!(e.is_active());
        e.cancel();
        assert_eq!(e.state(), NegotiationState::Idle);
        assert_eq!(e.poll(&PeerStore::new(), 10_000), None);
    }
}
