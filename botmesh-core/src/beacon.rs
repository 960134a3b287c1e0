//! Periodic HereIAm announcement.
//!
//! Every `BEACON_INTERVAL_MS` the announcement goes out on the current pairing. It is also
//! mirrored onto the discovery pairing when the pairing changed since the previous round or
//! when the countdown runs out, so listeners on the discovery pairing can find every device's
//! working pairing while steady-state traffic stays off it.

use crate::here_i_am::HereIAm;
use crate::protocol::{Pairing, DISCOVERY_PAIRING};

pub const BEACON_INTERVAL_MS: u64 = 3000;
/// Rounds between discovery mirrors in steady state.
pub const MIRROR_COUNTDOWN: u8 = 10;

/// One beacon round: what to send and on which pairings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconRound {
    pub announcement: HereIAm,
    pub targets: Vec<Pairing>,
}

#[derive(Debug)]
pub struct Beacon {
    class_id: Option<String>,
    countdown: u8,
    last_pairing: Option<Pairing>,
    last_round_ms: Option<u64>,
}

impl Default for Beacon {
    fn default() -> Self {
        Self::new()
    }
}

impl Beacon {
    pub fn new() -> Self {
        Self {
            class_id: None,
            countdown: MIRROR_COUNTDOWN,
            last_pairing: None,
            last_round_ms: None,
        }
    }

    /// Start announcing as `class_id`. The first round is due immediately.
    pub fn start(&mut self, class_id: &str) {
        self.class_id = Some(class_id.to_string());
        self.countdown = MIRROR_COUNTDOWN;
        self.last_pairing = None;
        self.last_round_ms = None;
    }

    pub fn stop(&mut self) {
        self.class_id = None;
    }

    pub fn is_running(&self) -> bool {
        self.class_id.is_some()
    }

    pub fn class_id(&self) -> Option<&str> {
        self.class_id.as_deref()
    }

    pub fn countdown(&self) -> u8 {
        self.countdown
    }

    /// Produce the round due at `now_ms`, if any.
    pub fn poll(&mut self, current: Pairing, now_ms: u64) -> Option<BeaconRound> {
        let class_id = self.class_id.as_deref()?;
        if let Some(last) = self.last_round_ms {
            if now_ms.saturating_sub(last) < BEACON_INTERVAL_MS {
                return None;
            }
        }
        let announcement = HereIAm::new(class_id, current);
        let mut targets = vec![current];
        let changed = self.last_pairing != Some(current);
        if changed || self.countdown == 0 {
            if !current.is_discovery() {
                targets.push(DISCOVERY_PAIRING);
            }
            self.countdown = MIRROR_COUNTDOWN;
        } else {
            self.countdown -= 1;
        }
        self.last_pairing = Some(current);
        self.last_round_ms = Some(now_ms);
        Some(BeaconRound {
            announcement,
            targets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rounds(beacon: &mut Beacon, pairing: Pairing, from: u64, n: u64) -> Vec<BeaconRound> {
        (0..n)
            .filter_map(|i| beacon.poll(pairing, from + i * BEACON_INTERVAL_MS))
            .collect()
    }

    #[test]
    fn stopped_beacon_is_silent() {
        let mut b = Beacon::new();
        assert!(b.poll(Pairing::new(5, 5), 0).is_none());
        b.start("cutebot");
        assert!(b.poll(Pairing::new(5, 5), 0).is_some());
        b.stop();
        assert!(b.poll(Pairing::new(5, 5), 10_000).is_none());
    }

    #[test]
    fn respects_interval() {
        let mut b = Beacon::new();
        b.start("cutebot");
        let p = Pairing::new(5, 5);
        assert!(b.poll(p, 1000).is_some());
        assert!(b.poll(p, 1000 + BEACON_INTERVAL_MS - 1).is_none());
        assert!(b.poll(p, 1000 + BEACON_INTERVAL_MS).is_some());
    }

    #[test]
    fn mirrors_on_first_round_then_every_eleventh() {
        let mut b = Beacon::new();
        b.start("cutebot");
        let p = Pairing::new(42, 17);
        let all = rounds(&mut b, p, 0, 23);
        let mirrored: Vec<usize> = all
            .iter()
            .enumerate()
            .filter(|(_, r)| r.targets.contains(&DISCOVERY_PAIRING))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(mirrored, vec![0, 11, 22]);
        assert!(all.iter().all(|r| r.targets[0] == p));
        assert_eq!(all[0].announcement.class_id(), "cutebot");
        assert_eq!(all[0].announcement.pairing(), p);
    }

    #[test]
    fn pairing_change_forces_mirror() {
        let mut b = Beacon::new();
        b.start("cutebot");
        rounds(&mut b, Pairing::new(42, 17), 0, 3);
        let r = b.poll(Pairing::new(50, 9), 3 * BEACON_INTERVAL_MS).unwrap();
        assert_eq!(r.targets, vec![Pairing::new(50, 9), DISCOVERY_PAIRING]);
        assert_eq!(b.countdown(), MIRROR_COUNTDOWN);
    }

    #[test]
    fn no_duplicate_send_on_discovery_pairing() {
        let mut b = Beacon::new();
        b.start("joystick");
        let r = b.poll(DISCOVERY_PAIRING, 0).unwrap();
        assert_eq!(r.targets, vec![DISCOVERY_PAIRING]);
    }
}
