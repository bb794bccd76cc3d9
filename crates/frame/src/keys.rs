//! Network key material and key selection

use tracing::{debug, info, warn};
use zbsec_api::{AuthError, CryptoError, IeeeAddr, Key128, Result, StoreError};
use zbsec_common::{ct_eq, SecretBuffer};

/// Keys held at once; the active key plus alternates being distributed
pub const DEFAULT_NETWORK_KEY_SLOTS: usize = 3;

/// Key used to secure an outgoing frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySelector {
    /// Active network key
    ActiveNetworkKey,
    /// Network key with this sequence number
    NetworkKey(u8),
    /// Link key shared with the peer
    Link(IeeeAddr),
    /// Key-transport key derived from the peer's link key
    KeyTransport(IeeeAddr),
    /// Key-load key derived from the peer's link key
    KeyLoad(IeeeAddr),
}

struct NetworkKey {
    sequence: u8,
    key: SecretBuffer<16>,
    next_counter: u32,
}

/// Network keys indexed by key sequence number
///
/// Each key carries its own outgoing frame counter. The counter starts at
/// zero when a key value is installed and only moves forward afterwards,
/// whichever key is active.
pub struct NetworkKeyTable {
    keys: Vec<NetworkKey>,
    active: Option<u8>,
    capacity: usize,
}

impl Default for NetworkKeyTable {
    fn default() -> Self {
        Self::new(DEFAULT_NETWORK_KEY_SLOTS)
    }
}

impl NetworkKeyTable {
    /// Empty table holding up to `capacity` keys
    pub fn new(capacity: usize) -> Self {
        NetworkKeyTable {
            keys: Vec::with_capacity(capacity),
            active: None,
            capacity: capacity.max(1),
        }
    }

    fn slot(&self, sequence: u8) -> Option<&NetworkKey> {
        self.keys.iter().find(|k| k.sequence == sequence)
    }

    fn slot_mut(&mut self, sequence: u8) -> Option<&mut NetworkKey> {
        self.keys.iter_mut().find(|k| k.sequence == sequence)
    }

    /// Install `key` under `sequence`
    ///
    /// Installing the value already held is a no-op. A different value
    /// under the same sequence number replaces the key and restarts its
    /// counter. When the table is full the oldest inactive key makes room
    /// and its sequence number is returned; the active key is never
    /// dropped.
    pub fn insert(&mut self, sequence: u8, key: &Key128) -> Result<Option<u8>> {
        if let Some(slot) = self.slot_mut(sequence) {
            if !ct_eq(slot.key.expose(), key) {
                slot.key = SecretBuffer::new(*key);
                slot.next_counter = 0;
                debug!(sequence, "network key replaced");
            }
            return Ok(None);
        }
        let mut dropped = None;
        if self.keys.len() >= self.capacity {
            let victim = self
                .keys
                .iter()
                .position(|k| Some(k.sequence) != self.active)
                .ok_or(StoreError::StoreFull {
                    capacity: self.capacity,
                })?;
            let removed = self.keys.remove(victim);
            debug!(sequence = removed.sequence, "network key dropped");
            dropped = Some(removed.sequence);
        }
        self.keys.push(NetworkKey {
            sequence,
            key: SecretBuffer::new(*key),
            next_counter: 0,
        });
        if self.active.is_none() {
            self.active = Some(sequence);
        }
        info!(sequence, active = ?self.active, "network key installed");
        Ok(dropped)
    }

    /// Make the key `sequence` the active key; its counter carries on
    pub fn switch(&mut self, sequence: u8) -> Result<()> {
        if self.get(sequence).is_none() {
            return Err(AuthError::UnknownKey.into());
        }
        info!(from = ?self.active, to = sequence, "network key switched");
        self.active = Some(sequence);
        Ok(())
    }

    /// Key with sequence number `sequence`
    pub fn get(&self, sequence: u8) -> Option<&Key128> {
        self.slot(sequence).map(|k| k.key.expose())
    }

    /// Sequence number and key of the active key
    pub fn active(&self) -> Option<(u8, &Key128)> {
        let seq = self.active?;
        Some((seq, self.get(seq)?))
    }

    /// Sequence number of the active key
    pub fn active_sequence(&self) -> Option<u8> {
        self.active
    }

    /// Next outgoing counter of the key `sequence`
    pub fn outgoing_counter(&self, sequence: u8) -> Option<u32> {
        self.slot(sequence).map(|k| k.next_counter)
    }

    /// Move the outgoing counter of `sequence` forward, e.g. to a persisted
    /// value; a counter below the current one is refused
    pub fn advance_counter(&mut self, sequence: u8, counter: u32) -> Result<()> {
        let slot = self.slot_mut(sequence).ok_or(AuthError::UnknownKey)?;
        if counter < slot.next_counter {
            return Err(CryptoError::InvalidParameter {
                context: "network key counter",
                reason: "counters never move backwards",
            }
            .into());
        }
        slot.next_counter = counter;
        Ok(())
    }

    /// Take the next outgoing counter of the key `sequence`
    ///
    /// `0xFFFF_FFFF` is never used; reaching it fails `CounterExhausted`.
    pub fn take_counter(&mut self, sequence: u8) -> Result<u32> {
        let slot = self.slot_mut(sequence).ok_or(AuthError::UnknownKey)?;
        if slot.next_counter == u32::MAX {
            warn!(sequence, "network key frame counter exhausted");
            return Err(AuthError::CounterExhausted.into());
        }
        let counter = slot.next_counter;
        slot.next_counter += 1;
        Ok(counter)
    }

    /// Remove every key
    pub fn clear(&mut self) {
        self.keys.clear();
        self.active = None;
    }

    /// Number of keys held
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True when no key is held
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl core::fmt::Debug for NetworkKeyTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let counters: Vec<(u8, u32)> = self.keys.iter().map(|k| (k.sequence, k.next_counter)).collect();
        f.debug_struct("NetworkKeyTable")
            .field("counters", &counters)
            .field("active", &self.active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zbsec_api::Error;

    #[test]
    fn first_key_becomes_active() {
        let mut table = NetworkKeyTable::default();
        assert!(table.active().is_none());
        table.insert(0, &[1; 16]).unwrap();
        table.insert(1, &[2; 16]).unwrap();
        assert_eq!(table.active(), Some((0, &[1; 16])));
        table.switch(1).unwrap();
        assert_eq!(table.active(), Some((1, &[2; 16])));
        assert_eq!(table.switch(9).unwrap_err(), Error::Auth(AuthError::UnknownKey));
    }

    #[test]
    fn full_table_keeps_active_key() {
        let mut table = NetworkKeyTable::new(2);
        table.insert(10, &[1; 16]).unwrap();
        table.insert(11, &[2; 16]).unwrap();
        table.insert(12, &[3; 16]).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.get(10).is_some());
        assert!(table.get(11).is_none());
        table.insert(12, &[4; 16]).unwrap();
        assert_eq!(table.get(12), Some(&[4; 16]));
    }

    #[test]
    fn counters_belong_to_key_values() {
        let mut table = NetworkKeyTable::new(2);
        assert_eq!(table.insert(0, &[1; 16]).unwrap(), None);
        table.insert(1, &[2; 16]).unwrap();
        assert_eq!(table.take_counter(0).unwrap(), 0);
        assert_eq!(table.take_counter(0).unwrap(), 1);

        // switching never rewinds, not even to the key already active
        table.switch(0).unwrap();
        table.switch(1).unwrap();
        assert_eq!(table.take_counter(1).unwrap(), 0);
        table.switch(0).unwrap();
        assert_eq!(table.take_counter(0).unwrap(), 2);

        // the same value again keeps its counter, a new value restarts it
        table.insert(0, &[1; 16]).unwrap();
        assert_eq!(table.outgoing_counter(0), Some(3));
        table.insert(0, &[9; 16]).unwrap();
        assert_eq!(table.outgoing_counter(0), Some(0));

        assert_eq!(table.insert(2, &[3; 16]).unwrap(), Some(1));
        assert_eq!(table.take_counter(1).unwrap_err(), Error::Auth(AuthError::UnknownKey));
        assert!(table.advance_counter(0, 7).is_ok());
        assert!(table.advance_counter(0, 6).is_err());
        assert_eq!(table.take_counter(0).unwrap(), 7);
    }
}
