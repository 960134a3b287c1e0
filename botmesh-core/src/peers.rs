//! Table of recently seen peers, keyed by serial number.
//! Scoped to the current pairing: the owner clears it whenever the local channel or group
//! changes. There is no expiry; callers compare `last_seen_ms` themselves.

use serde::{Deserialize, Serialize};

use crate::protocol::Pairing;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub serial: u32,
    pub class_id: String,
    pub group: u16,
    pub channel: u16,
    pub last_seen_ms: u64,
}

impl PeerRecord {
    pub fn pairing(&self) -> Pairing {
        Pairing::new(self.channel, self.group)
    }
}

/// Insertion-ordered, upsert-only peer table.
#[derive(Debug, Default)]
pub struct PeerStore {
    peers: Vec<PeerRecord>,
}

impl PeerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or refresh the record for `serial`. Class and pairing are overwritten;
    /// `last_seen_ms` never moves backwards.
    pub fn upsert(
        &mut self,
        serial: u32,
        class_id: &str,
        group: u16,
        channel: u16,
        now_ms: u64,
    ) -> &PeerRecord {
        let idx = match self.peers.iter().position(|p| p.serial == serial) {
            Some(i) => {
                let rec = &mut self.peers[i];
                rec.class_id.clear();
                rec.class_id.push_str(class_id);
                rec.group = group;
                rec.channel = channel;
                rec.last_seen_ms = rec.last_seen_ms.max(now_ms);
                i
            }
            None => {
                log::debug!("new peer {:08X} class={:?} ch{}/g{}", serial, class_id, channel, group);
                self.peers.push(PeerRecord {
                    serial,
                    class_id: class_id.to_string(),
                    group,
                    channel,
                    last_seen_ms: now_ms,
                });
                self.peers.len() - 1
            }
        };
        &self.peers[idx]
    }

    pub fn find_by_serial(&self, serial: u32) -> Option<&PeerRecord> {
        self.peers.iter().find(|p| p.serial == serial)
    }

    /// First record with `class_id`, in insertion order.
    pub fn find_first_by_class(&self, class_id: &str) -> Option<&PeerRecord> {
        self.peers.iter().find(|p| p.class_id == class_id)
    }

    pub fn clear(&mut self) {
        if !self.peers.is_empty() {
            log::debug!("clearing {} peer records", self.peers.len());
        }
        self.peers.clear();
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerRecord> {
        self.peers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_keeps_one_record_per_serial() {
        let mut store = PeerStore::new();
        store.upsert(1, "cutebot", 5, 6, 100);
        let rec = store.upsert(1, "joystick", 7, 8, 200).clone();
        assert_eq!(store.len(), 1);
        assert_eq!(rec.class_id, "joystick");
        assert_eq!(rec.pairing(), Pairing::new(8, 7));
        assert_eq!(rec.last_seen_ms, 200);
    }

    #[test]
    fn last_seen_never_moves_backwards() {
        let mut store = PeerStore::new();
        store.upsert(1, "a", 1, 1, 500);
        assert_eq!(store.upsert(1, "a", 1, 1, 300).last_seen_ms, 500);
        assert_eq!(store.upsert(1, "a", 1, 1, 900).last_seen_ms, 900);
    }

    #[test]
    fn find_first_by_class_uses_insertion_order() {
        let mut store = PeerStore::new();
        store.upsert(30, "cutebot", 1, 2, 0);
        store.upsert(10, "cutebot", 1, 2, 5);
        store.upsert(20, "joystick", 1, 2, 9);
        assert_eq!(store.find_first_by_class("cutebot").unwrap().serial, 30);
        assert_eq!(store.find_first_by_class("joystick").unwrap().serial, 20);
        assert!(store.find_first_by_class("nobody").is_none());
        assert_eq!(store.find_by_serial(10).unwrap().last_seen_ms, 5);
        assert!(store.find_by_serial(11).is_none());
    }

    #[test]
    fn clear_empties_table() {
        let mut store = PeerStore::new();
        store.upsert(1, "a", 1, 1, 0);
        store.upsert(2, "b", 1, 1, 0);
        store.clear();
        assert!(store.is_empty());
        assert!(store.find_by_serial(1).is_none());
    }
}
