//! Incoming frame counter tracking for network-keyed frames
//!
//! Link-key counters are persisted by the key-pair store; this table only
//! covers frames secured with a network key.

use std::collections::BTreeMap;

use tracing::warn;
use zbsec_api::{AuthError, IeeeAddr, Result};

/// Default number of (source, key) pairs tracked
pub const DEFAULT_REPLAY_CAPACITY: usize = 64;

/// Key a counter is tracked against
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReplayScope {
    /// NWK and APS frames under the network key with this sequence number
    Network(u8),
    /// MAC-layer frames under the network key with this sequence number
    Mac(u8),
}

impl ReplayScope {
    /// Sequence number of the network key the scope belongs to
    pub fn key_sequence(self) -> u8 {
        match self {
            ReplayScope::Network(seq) | ReplayScope::Mac(seq) => seq,
        }
    }
}

/// Last accepted counter per (source, key) pair
///
/// The table is bounded and never forgets a floor to make room: once it is
/// full, frames from untracked pairs are refused with `ReplayTableFull`
/// until a key change or device removal releases entries.
#[derive(Debug)]
pub struct ReplayTable {
    entries: BTreeMap<(IeeeAddr, ReplayScope), u32>,
    capacity: usize,
}

impl Default for ReplayTable {
    fn default() -> Self {
        Self::new(DEFAULT_REPLAY_CAPACITY)
    }
}

impl ReplayTable {
    /// Table tracking up to `capacity` pairs
    pub fn new(capacity: usize) -> Self {
        ReplayTable {
            entries: BTreeMap::new(),
            capacity: capacity.max(1),
        }
    }

    fn ensure_room(&self, key: &(IeeeAddr, ReplayScope)) -> Result<()> {
        if !self.entries.contains_key(key) && self.entries.len() >= self.capacity {
            warn!(peer = %key.0, scope = ?key.1, capacity = self.capacity, "replay table full, frame refused");
            return Err(AuthError::ReplayTableFull {
                capacity: self.capacity,
            }
            .into());
        }
        Ok(())
    }

    /// Fail `ReplayedCounter` unless `counter` is above the last accepted
    /// one, or `ReplayTableFull` if the pair could not be tracked
    pub fn check(&self, source: IeeeAddr, scope: ReplayScope, counter: u32) -> Result<()> {
        let key = (source, scope);
        match self.entries.get(&key) {
            Some(&last) if counter <= last => Err(AuthError::ReplayedCounter {
                counter,
                last_accepted: last,
            }
            .into()),
            Some(_) => Ok(()),
            None => self.ensure_room(&key),
        }
    }

    /// Record `counter` as accepted; call only after authentication
    pub fn accept(&mut self, source: IeeeAddr, scope: ReplayScope, counter: u32) -> Result<()> {
        let key = (source, scope);
        self.ensure_room(&key)?;
        let last = self.entries.entry(key).or_insert(counter);
        *last = (*last).max(counter);
        Ok(())
    }

    /// Last counter accepted for the pair
    pub fn last_accepted(&self, source: IeeeAddr, scope: ReplayScope) -> Option<u32> {
        self.entries.get(&(source, scope)).copied()
    }

    /// Drop the counters of one pair; returns whether one was tracked
    pub fn forget(&mut self, source: IeeeAddr, scope: ReplayScope) -> bool {
        self.entries.remove(&(source, scope)).is_some()
    }

    /// Drop every counter of `source`
    pub fn forget_source(&mut self, source: IeeeAddr) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(addr, _), _| *addr != source);
        before - self.entries.len()
    }

    /// Drop every counter tracked under the network key `sequence`
    pub fn forget_key(&mut self, sequence: u8) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(_, scope), _| scope.key_sequence() != sequence);
        before - self.entries.len()
    }

    /// Pairs tracked
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
