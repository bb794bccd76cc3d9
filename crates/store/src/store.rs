//! The key-pair table

use tracing::{debug, info, warn};
use zbsec_api::{AuthError, IeeeAddr, Key128, Result, StoreError};

use crate::entry::{EntryAttributes, KeyAttribute, KeyClass, KeyPairEntry, NegotiationState};
use crate::persistence::Persistence;
use crate::policy::{KeyUpdatePolicy, LegacyKeyUpdate, R22Defaults};
use crate::record;

/// Outgoing counters reserved per persisted write unless configured
pub const DEFAULT_COUNTER_STRIDE: u32 = 1024;

/// Entry selection for lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFilter {
    /// Primary entry if present, otherwise the unverified one
    Any,
    /// Entry of one class
    Class(KeyClass),
    /// Entry with exactly this attribute
    Attribute(KeyAttribute),
    /// Verified or provisional primary entry
    VerifiedOrProvisional,
}

impl KeyFilter {
    fn matches(&self, entry: &KeyPairEntry) -> bool {
        match self {
            KeyFilter::Any => true,
            KeyFilter::Class(class) => entry.class() == *class,
            KeyFilter::Attribute(attr) => entry.key_attribute == *attr,
            KeyFilter::VerifiedOrProvisional => matches!(
                entry.key_attribute,
                KeyAttribute::Verified | KeyAttribute::Provisional
            ),
        }
    }
}

/// Arguments of the extended (r23) key-pair update
#[derive(Debug, Clone)]
pub struct ExtendedKeyUpdate {
    /// Every attribute of the entry
    pub attributes: EntryAttributes,
}

/// Fixed-capacity table of per-peer link keys
///
/// Holds at most one primary and one unverified entry per peer address.
/// Every mutation is persisted before the table changes, so a failed write
/// leaves the table exactly as it was.
pub struct KeyPairStore {
    slots: Vec<Option<KeyPairEntry>>,
    persistence: Box<dyn Persistence>,
    policy: Box<dyn KeyUpdatePolicy>,
    counter_stride: u32,
}

impl core::fmt::Debug for KeyPairStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeyPairStore")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("policy", &self.policy.name())
            .field("counter_stride", &self.counter_stride)
            .finish()
    }
}

impl KeyPairStore {
    /// Empty store; existing records in `persistence` are ignored
    pub fn new(capacity: u16, persistence: Box<dyn Persistence>) -> Self {
        KeyPairStore {
            slots: vec![None; capacity as usize],
            persistence,
            policy: Box::new(R22Defaults),
            counter_stride: DEFAULT_COUNTER_STRIDE,
        }
    }

    /// Rebuild the table from persisted records
    ///
    /// Outgoing counters resume at their reservation ceilings. A record in a
    /// slot beyond `capacity` or failing to decode aborts the restore.
    pub fn restore(capacity: u16, mut persistence: Box<dyn Persistence>) -> Result<Self> {
        let records = persistence.load_all()?;
        let mut store = Self::new(capacity, persistence);
        for (slot, raw) in records {
            let entry = record::decode(slot, &raw)?;
            let cell = store
                .slots
                .get_mut(slot as usize)
                .ok_or(StoreError::CorruptRecord { slot })?;
            *cell = Some(entry);
        }
        info!(entries = store.len(), capacity, "key-pair store restored");
        Ok(store)
    }

    /// Replace the policy used by [`update_key_pair`](Self::update_key_pair)
    pub fn with_policy(mut self, policy: Box<dyn KeyUpdatePolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Set how many outgoing counters one persisted write reserves
    pub fn with_counter_stride(mut self, stride: u32) -> Self {
        self.counter_stride = stride.max(1);
        self
    }

    /// Name of the active legacy update policy
    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// True when no entry is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live entries with their slot index
    pub fn iter(&self) -> impl Iterator<Item = (u16, &KeyPairEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|e| (i as u16, e)))
    }

    /// Entry stored in `slot`
    pub fn entry_at(&self, slot: u16) -> Option<&KeyPairEntry> {
        self.slots.get(slot as usize)?.as_ref()
    }

    /// Slot of the entry a lookup with `filter` returns
    pub fn lookup_slot(&self, address: IeeeAddr, filter: KeyFilter) -> Option<u16> {
        let mut fallback = None;
        for (slot, entry) in self.iter() {
            if entry.peer_long_address != address || !filter.matches(entry) {
                continue;
            }
            if entry.class() == KeyClass::Primary {
                return Some(slot);
            }
            fallback = Some(slot);
        }
        fallback
    }

    /// Entry for `address` selected by `filter`
    pub fn lookup(&self, address: IeeeAddr, filter: KeyFilter) -> Option<&KeyPairEntry> {
        self.entry_at(self.lookup_slot(address, filter)?)
    }

    fn slot_of_class(&self, address: IeeeAddr, class: KeyClass) -> Option<u16> {
        self.lookup_slot(address, KeyFilter::Class(class))
    }

    fn free_slot(&self) -> Option<u16> {
        self.slots.iter().position(|s| s.is_none()).map(|i| i as u16)
    }

    fn stored(&self, slot: u16) -> Result<&KeyPairEntry> {
        self.entry_at(slot).ok_or_else(|| StoreError::NotFound.into())
    }

    /// Persist `entry` into `slot`, then install it
    fn commit(&mut self, slot: u16, entry: KeyPairEntry) -> Result<&KeyPairEntry> {
        self.persistence.write(slot, &record::encode(&entry))?;
        let cell = &mut self.slots[slot as usize];
        *cell = Some(entry);
        self.stored(slot)
    }

    /// Persist the erase of `slot`, then clear it
    fn remove(&mut self, slot: u16) -> Result<()> {
        self.persistence.erase(slot)?;
        self.slots[slot as usize] = None;
        Ok(())
    }

    /// Insert a key, merging with the existing entry of the same class
    ///
    /// Fails with `StoreFull` when a new slot is needed and none is free;
    /// nothing is evicted.
    pub fn upsert(
        &mut self,
        address: IeeeAddr,
        key: &Key128,
        attributes: &EntryAttributes,
    ) -> Result<&KeyPairEntry> {
        let class = attributes.attribute().class();
        let (slot, entry) = match self.slot_of_class(address, class) {
            Some(slot) => {
                let merged = self.stored(slot)?.merged(key, attributes);
                debug!(peer = %address, slot, ?class, "merging key-pair entry");
                (slot, merged)
            }
            None => {
                let slot = self.free_slot().ok_or_else(|| {
                    warn!(peer = %address, capacity = self.capacity(), "key-pair store full");
                    StoreError::StoreFull {
                        capacity: self.capacity(),
                    }
                })?;
                (slot, KeyPairEntry::new(address, key, attributes))
            }
        };
        info!(
            peer = %address,
            slot,
            attribute = ?entry.key_attribute,
            source = ?entry.key_source,
            "key-pair entry stored"
        );
        self.commit(slot, entry)
    }

    /// Legacy (r22) update; attributes not supplied come from the policy
    pub fn update_key_pair(
        &mut self,
        address: IeeeAddr,
        key: &Key128,
        update: &LegacyKeyUpdate,
    ) -> Result<&KeyPairEntry> {
        let attributes = self.policy.legacy_attributes(update);
        self.upsert(address, key, &attributes)
    }

    /// Extended (r23) update with every attribute explicit
    pub fn update_key_pair_ex(
        &mut self,
        address: IeeeAddr,
        key: &Key128,
        update: &ExtendedKeyUpdate,
    ) -> Result<&KeyPairEntry> {
        self.upsert(address, key, &update.attributes)
    }

    /// Promote the peer's unverified key to Verified
    ///
    /// The promoted record overwrites the primary slot in a single write,
    /// then the unverified slot is erased. Without an unverified entry a
    /// provisional primary is promoted in place.
    pub fn verify(&mut self, address: IeeeAddr) -> Result<&KeyPairEntry> {
        let primary = self.slot_of_class(address, KeyClass::Primary);
        match self.slot_of_class(address, KeyClass::Unverified) {
            Some(unverified) => {
                let mut promoted = self.stored(unverified)?.clone();
                promoted.key_attribute = KeyAttribute::Verified;
                let target = primary.unwrap_or(unverified);
                self.persistence
                    .write(target, &record::encode(&promoted))?;
                if target != unverified {
                    self.persistence.erase(unverified)?;
                    self.slots[unverified as usize] = None;
                }
                self.slots[target as usize] = Some(promoted);
                info!(peer = %address, slot = target, "unverified key promoted");
                self.stored(target)
            }
            None => {
                let slot = primary.ok_or(StoreError::NotFound)?;
                let current = self.stored(slot)?;
                if current.key_attribute != KeyAttribute::Provisional {
                    return Err(StoreError::NotFound.into());
                }
                let mut promoted = current.clone();
                promoted.key_attribute = KeyAttribute::Verified;
                info!(peer = %address, slot, "provisional key verified");
                self.commit(slot, promoted)
            }
        }
    }

    /// Record negotiation progress; volatile
    pub fn set_negotiation_state(&mut self, address: IeeeAddr, state: NegotiationState) -> Result<()> {
        let slot = self
            .lookup_slot(address, KeyFilter::Any)
            .ok_or(StoreError::NotFound)?;
        if let Some(entry) = self.slots[slot as usize].as_mut() {
            debug!(peer = %address, ?state, "negotiation state");
            entry.negotiation_state = state;
        }
        Ok(())
    }

    /// Reserve the next outgoing frame counter of the peer's active key
    ///
    /// Counters are reserved in strides: the ceiling is persisted before
    /// any counter below it is handed out, so a restart never reuses one.
    /// `0xFFFF_FFFF` is never used; reaching it fails `CounterExhausted`.
    pub fn next_outgoing_counter(&mut self, address: IeeeAddr) -> Result<u32> {
        let slot = self
            .lookup_slot(address, KeyFilter::Any)
            .ok_or(StoreError::NotFound)?;
        let stride = self.counter_stride;
        let current = self.stored(slot)?;
        let counter = current.frame_counter_out;
        if counter == u32::MAX {
            warn!(peer = %address, "outgoing frame counter exhausted");
            return Err(AuthError::CounterExhausted.into());
        }
        if counter >= current.reserved_out {
            let mut reserved = current.clone();
            reserved.reserved_out = counter.saturating_add(stride);
            self.persistence.write(slot, &record::encode(&reserved))?;
            debug!(peer = %address, ceiling = reserved.reserved_out, "frame counters reserved");
            self.slots[slot as usize] = Some(reserved);
        }
        if let Some(entry) = self.slots[slot as usize].as_mut() {
            entry.frame_counter_out = counter + 1;
        }
        Ok(counter)
    }

    /// Accept `counter` as the next incoming frame counter under the peer's
    /// key of class `class`; call only after the frame authenticated
    ///
    /// Fails `ReplayedCounter` unless `counter` is above every counter
    /// accepted under that key, across restarts. The floor is persisted in
    /// strides ahead of the live value, so a restart may refuse up to one
    /// stride of genuine frames but never accepts a replay.
    pub fn accept_incoming_counter(&mut self, address: IeeeAddr, class: KeyClass, counter: u32) -> Result<()> {
        let slot = self
            .slot_of_class(address, class)
            .ok_or(StoreError::NotFound)?;
        let stride = self.counter_stride;
        let current = self.stored(slot)?;
        if let Some(last) = current.frame_counter_in_highwater {
            if counter <= last {
                debug!(peer = %address, counter, last_accepted = last, "replayed link frame counter");
                return Err(AuthError::ReplayedCounter {
                    counter,
                    last_accepted: last,
                }
                .into());
            }
        }
        if current.reserved_in.map_or(true, |floor| counter > floor) {
            let mut reserved = current.clone();
            reserved.reserved_in = Some(counter.saturating_add(stride));
            self.persistence.write(slot, &record::encode(&reserved))?;
            debug!(peer = %address, floor = ?reserved.reserved_in, "incoming counter floor persisted");
            self.slots[slot as usize] = Some(reserved);
        }
        if let Some(entry) = self.slots[slot as usize].as_mut() {
            entry.frame_counter_in_highwater = Some(counter);
        }
        Ok(())
    }

    /// Remove the entry `lookup(address, Any)` returns
    pub fn delete(&mut self, address: IeeeAddr) -> Result<()> {
        let slot = self
            .lookup_slot(address, KeyFilter::Any)
            .ok_or(StoreError::NotFound)?;
        self.remove(slot)?;
        info!(peer = %address, slot, "key-pair entry deleted");
        Ok(())
    }

    /// Remove both entries of a peer; returns how many were removed
    pub fn delete_all_for(&mut self, address: IeeeAddr) -> Result<usize> {
        let slots: Vec<u16> = self
            .iter()
            .filter(|(_, e)| e.peer_long_address == address)
            .map(|(slot, _)| slot)
            .collect();
        for slot in &slots {
            self.remove(*slot)?;
        }
        if !slots.is_empty() {
            info!(peer = %address, removed = slots.len(), "key-pair entries deleted");
        }
        Ok(slots.len())
    }

    /// Remove the entry in `slot`
    pub fn delete_slot(&mut self, slot: u16) -> Result<()> {
        if self.entry_at(slot).is_none() {
            return Err(StoreError::NotFound.into());
        }
        self.remove(slot)
    }
}
