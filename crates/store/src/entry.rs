//! Key-pair entries and their attributes

use zbsec_api::{IeeeAddr, Key128};
use zbsec_common::SecretBuffer;

/// Trust level of a link key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KeyAttribute {
    /// Installed but not yet confirmed by the peer
    Provisional = 0,
    /// Received while a primary key already exists, awaiting verification
    Unverified = 1,
    /// Confirmed by the peer
    Verified = 2,
    /// Application link key between two non-TC devices
    Application = 3,
}

impl KeyAttribute {
    /// Decode the two-bit field
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => KeyAttribute::Provisional,
            1 => KeyAttribute::Unverified,
            2 => KeyAttribute::Verified,
            _ => KeyAttribute::Application,
        }
    }

    /// Storage class of the attribute
    pub fn class(&self) -> KeyClass {
        match self {
            KeyAttribute::Unverified => KeyClass::Unverified,
            _ => KeyClass::Primary,
        }
    }
}

/// At most one entry of each class exists per peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyClass {
    /// Provisional, verified or application key
    Primary,
    /// Key waiting to replace the primary one
    Unverified,
}

/// How the current key was established after joining
///
/// Stored in the record's key update method field, so a CBKE-derived key
/// and a negotiated one can be told apart after a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum KeyUpdateMethod {
    /// Key never updated since joining (source unknown)
    #[default]
    NotUpdated = 0,
    /// Requested from the trust center
    KeyRequest = 1,
    /// Dynamic link key negotiation with the well-known secret
    UnauthenticatedKeyNegotiation = 2,
    /// Dynamic link key negotiation bound to a pre-shared secret
    AuthenticatedKeyNegotiation = 3,
    /// Certificate-based key establishment (CBKE, ECMQV)
    CertificateBased = 4,
    /// Hashed trust center link key restored after a TC swap
    HashedTclk = 7,
}

impl KeyUpdateMethod {
    /// Decode the three-bit field; values 5 and 6 are reserved
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0x07 {
            0 => Some(KeyUpdateMethod::NotUpdated),
            1 => Some(KeyUpdateMethod::KeyRequest),
            2 => Some(KeyUpdateMethod::UnauthenticatedKeyNegotiation),
            3 => Some(KeyUpdateMethod::AuthenticatedKeyNegotiation),
            4 => Some(KeyUpdateMethod::CertificateBased),
            7 => Some(KeyUpdateMethod::HashedTclk),
            _ => None,
        }
    }

    /// True for keys produced by a key negotiation
    pub fn is_negotiated(&self) -> bool {
        matches!(
            self,
            KeyUpdateMethod::UnauthenticatedKeyNegotiation
                | KeyUpdateMethod::AuthenticatedKeyNegotiation
        )
    }
}

/// How the device authenticated when it first joined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum InitialJoinAuth {
    /// No authentication token
    #[default]
    NoAuthentication = 0,
    /// Install code derived key
    InstallCode = 1,
    /// Key negotiation with the well-known secret
    AnonymousKeyNegotiation = 2,
    /// Key negotiation with an authentication token
    AuthenticatedKeyNegotiation = 3,
}

impl InitialJoinAuth {
    /// Decode the three-bit field
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0x07 {
            0 => Some(InitialJoinAuth::NoAuthentication),
            1 => Some(InitialJoinAuth::InstallCode),
            2 => Some(InitialJoinAuth::AnonymousKeyNegotiation),
            3 => Some(InitialJoinAuth::AuthenticatedKeyNegotiation),
            _ => None,
        }
    }
}

/// Unique per-pair key or the network-wide global key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ApsLinkKeyType {
    /// Key shared only by the two devices
    #[default]
    Unique = 0,
    /// Global trust center link key
    Global = 1,
}

/// Progress of a key negotiation with the peer
///
/// Volatile: not part of the persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NegotiationState {
    /// No negotiation
    #[default]
    None,
    /// Negotiation started
    Started,
    /// Waiting for key confirmation
    Verifying,
    /// Negotiation finished
    Complete,
    /// Trust center is interviewing the device
    DeviceInterview,
}

/// Attributes supplied with a new or updated key
#[derive(Debug, Clone, Default)]
pub struct EntryAttributes {
    /// Trust level, which also selects the storage class
    pub key_attribute: Option<KeyAttribute>,
    /// How the key was obtained
    pub key_source: KeyUpdateMethod,
    /// How the device first authenticated
    pub initial_join_auth: InitialJoinAuth,
    /// Unique or global
    pub aps_link_key_type: ApsLinkKeyType,
    /// APS frame counter synchronization support
    pub aps_frame_counter_sync_supported: bool,
    /// Key negotiation methods and secrets advertised by the peer
    pub negotiation_capabilities: Option<(u8, u8)>,
    /// Pre-shared passphrase for authenticated negotiation
    pub passphrase: Option<[u8; 16]>,
    /// Whether the passphrase may still be replaced
    pub passphrase_update_allowed: bool,
}

impl EntryAttributes {
    /// Attributes with the given trust level and defaults elsewhere
    pub fn with_attribute(attribute: KeyAttribute) -> Self {
        EntryAttributes {
            key_attribute: Some(attribute),
            passphrase_update_allowed: true,
            ..Default::default()
        }
    }

    pub(crate) fn attribute(&self) -> KeyAttribute {
        self.key_attribute.unwrap_or(KeyAttribute::Provisional)
    }
}

/// One link key shared with a peer
#[derive(Clone)]
pub struct KeyPairEntry {
    /// Peer long address
    pub peer_long_address: IeeeAddr,
    pub(crate) link_key: SecretBuffer<16>,
    /// Trust level
    pub key_attribute: KeyAttribute,
    /// How the key was obtained
    pub key_source: KeyUpdateMethod,
    /// How the peer first authenticated
    pub initial_join_auth: InitialJoinAuth,
    /// Progress of a negotiation with the peer
    pub negotiation_state: NegotiationState,
    /// Unique or global
    pub aps_link_key_type: ApsLinkKeyType,
    /// Next outgoing APS frame counter
    pub frame_counter_out: u32,
    /// Highest incoming APS frame counter accepted under this key; `None`
    /// until the first frame arrives
    pub frame_counter_in_highwater: Option<u32>,
    /// Supported key negotiation methods bitmask
    pub supported_negotiation_methods: u8,
    /// Supported pre-shared secrets bitmask
    pub supported_secrets: u8,
    /// Whether the two bitmasks above are known
    pub negotiation_capabilities_known: bool,
    pub(crate) passphrase: Option<SecretBuffer<16>>,
    /// Whether the passphrase may still be replaced
    pub passphrase_update_allowed: bool,
    /// APS frame counter synchronization support
    pub aps_frame_counter_sync_supported: bool,
    /// Persisted ceiling of reserved outgoing counters
    pub(crate) reserved_out: u32,
    /// Persisted floor covering every incoming counter accepted so far
    pub(crate) reserved_in: Option<u32>,
}

impl KeyPairEntry {
    pub(crate) fn new(address: IeeeAddr, key: &Key128, attrs: &EntryAttributes) -> Self {
        let (methods, secrets) = attrs.negotiation_capabilities.unwrap_or((0, 0));
        KeyPairEntry {
            peer_long_address: address,
            link_key: SecretBuffer::new(*key),
            key_attribute: attrs.attribute(),
            key_source: attrs.key_source,
            initial_join_auth: attrs.initial_join_auth,
            negotiation_state: NegotiationState::None,
            aps_link_key_type: attrs.aps_link_key_type,
            frame_counter_out: 0,
            frame_counter_in_highwater: None,
            supported_negotiation_methods: methods,
            supported_secrets: secrets,
            negotiation_capabilities_known: attrs.negotiation_capabilities.is_some(),
            passphrase: attrs.passphrase.map(SecretBuffer::new),
            passphrase_update_allowed: attrs.passphrase_update_allowed,
            aps_frame_counter_sync_supported: attrs.aps_frame_counter_sync_supported,
            reserved_out: 0,
            reserved_in: None,
        }
    }

    /// Entry that replaces `self` in the same class
    ///
    /// Frame counters survive only when the key itself is unchanged. A
    /// passphrase whose update is no longer allowed is kept.
    pub(crate) fn merged(&self, key: &Key128, attrs: &EntryAttributes) -> Self {
        let mut next = KeyPairEntry::new(self.peer_long_address, key, attrs);
        next.negotiation_state = self.negotiation_state;
        if self.link_key.expose() == key {
            next.frame_counter_out = self.frame_counter_out;
            next.frame_counter_in_highwater = self.frame_counter_in_highwater;
            next.reserved_out = self.reserved_out;
            next.reserved_in = self.reserved_in;
        }
        if !self.passphrase_update_allowed && self.passphrase.is_some() {
            next.passphrase = self.passphrase.clone();
            next.passphrase_update_allowed = false;
        }
        if attrs.negotiation_capabilities.is_none() && self.negotiation_capabilities_known {
            next.supported_negotiation_methods = self.supported_negotiation_methods;
            next.supported_secrets = self.supported_secrets;
            next.negotiation_capabilities_known = true;
        }
        next
    }

    /// The link key
    pub fn link_key(&self) -> &Key128 {
        self.link_key.expose()
    }

    /// The passphrase, if one is installed
    pub fn passphrase(&self) -> Option<&[u8; 16]> {
        self.passphrase.as_ref().map(|p| p.expose())
    }

    /// Storage class of the entry
    pub fn class(&self) -> KeyClass {
        self.key_attribute.class()
    }
}

impl core::fmt::Debug for KeyPairEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeyPairEntry")
            .field("peer", &self.peer_long_address)
            .field("attribute", &self.key_attribute)
            .field("source", &self.key_source)
            .field("negotiation_state", &self.negotiation_state)
            .field("frame_counter_out", &self.frame_counter_out)
            .field("frame_counter_in", &self.frame_counter_in_highwater)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEER: IeeeAddr = IeeeAddr::from_u64(0x0102_0304_0506_0708);

    #[test]
    fn classes() {
        assert_eq!(KeyAttribute::Unverified.class(), KeyClass::Unverified);
        for a in [
            KeyAttribute::Provisional,
            KeyAttribute::Verified,
            KeyAttribute::Application,
        ] {
            assert_eq!(a.class(), KeyClass::Primary);
        }
        assert_eq!(KeyUpdateMethod::from_bits(5), None);
        assert_eq!(KeyUpdateMethod::from_bits(7), Some(KeyUpdateMethod::HashedTclk));
    }

    #[test]
    fn merge_keeps_counters_for_same_key() {
        let attrs = EntryAttributes::with_attribute(KeyAttribute::Verified);
        let mut entry = KeyPairEntry::new(PEER, &[1; 16], &attrs);
        entry.frame_counter_out = 10;
        entry.frame_counter_in_highwater = Some(7);
        entry.reserved_in = Some(7 + 16);

        let same = entry.merged(&[1; 16], &attrs);
        assert_eq!((same.frame_counter_out, same.frame_counter_in_highwater), (10, Some(7)));
        assert_eq!(same.reserved_in, Some(23));

        let fresh = entry.merged(&[2; 16], &attrs);
        assert_eq!((fresh.frame_counter_out, fresh.frame_counter_in_highwater), (0, None));
        assert_eq!(fresh.reserved_in, None);
        assert_eq!(fresh.link_key(), &[2; 16]);
    }

    #[test]
    fn locked_passphrase_survives_merge() {
        let mut attrs = EntryAttributes::with_attribute(KeyAttribute::Provisional);
        attrs.passphrase = Some([9; 16]);
        attrs.passphrase_update_allowed = false;
        let entry = KeyPairEntry::new(PEER, &[1; 16], &attrs);

        let mut update = EntryAttributes::with_attribute(KeyAttribute::Verified);
        update.passphrase = Some([3; 16]);
        let merged = entry.merged(&[1; 16], &update);
        assert_eq!(merged.passphrase(), Some(&[9; 16]));
        assert!(!merged.passphrase_update_allowed);
    }
}
