//! Key negotiation methods and pre-shared secrets
//!
//! Both are advertised as bitmasks in the Supported Key Negotiation Methods
//! TLV and selected by bit index in the Selected Key Negotiation Method TLV.

use zbsec_api::{CurveId, HashType};

/// Key negotiation protocol, numbered by its bit in the methods mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KeyNegotiationMethod {
    /// Zigbee 3.0 static key request; no negotiation
    StaticKey = 0,
    /// SPEKE over Curve25519 with AES-MMO-128
    Curve25519AesMmo = 1,
    /// SPEKE over Curve25519 with SHA-256
    Curve25519Sha256 = 2,
    /// ECDHE over P-256 with SHA-256
    P256Sha256 = 3,
    /// Legacy sect283k1 suite, recognised but never negotiated
    Sect283k1 = 4,
}

/// Negotiable methods, strongest first
pub const METHOD_PREFERENCE: [KeyNegotiationMethod; 3] = [
    KeyNegotiationMethod::Curve25519Sha256,
    KeyNegotiationMethod::Curve25519AesMmo,
    KeyNegotiationMethod::P256Sha256,
];

impl KeyNegotiationMethod {
    /// Method with bit index `index`
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(KeyNegotiationMethod::StaticKey),
            1 => Some(KeyNegotiationMethod::Curve25519AesMmo),
            2 => Some(KeyNegotiationMethod::Curve25519Sha256),
            3 => Some(KeyNegotiationMethod::P256Sha256),
            4 => Some(KeyNegotiationMethod::Sect283k1),
            _ => None,
        }
    }

    /// Bit index in the methods mask
    pub fn index(&self) -> u8 {
        *self as u8
    }

    /// Curve the method runs on
    pub fn curve(&self) -> Option<CurveId> {
        match self {
            KeyNegotiationMethod::StaticKey => None,
            KeyNegotiationMethod::Curve25519AesMmo | KeyNegotiationMethod::Curve25519Sha256 => {
                Some(CurveId::Curve25519)
            }
            KeyNegotiationMethod::P256Sha256 => Some(CurveId::P256),
            KeyNegotiationMethod::Sect283k1 => Some(CurveId::Sect283k1),
        }
    }

    /// Hash used for every derivation of the method
    pub fn hash(&self) -> HashType {
        match self {
            KeyNegotiationMethod::Curve25519AesMmo | KeyNegotiationMethod::Sect283k1 => {
                HashType::AesMmo128
            }
            _ => HashType::Sha256,
        }
    }

    /// Whether this implementation can run the method
    pub fn is_negotiable(&self) -> bool {
        METHOD_PREFERENCE.contains(self)
    }
}

/// Bitmask of [`KeyNegotiationMethod`]s
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MethodSet(pub u8);

impl MethodSet {
    /// Every method this implementation negotiates
    pub fn negotiable() -> Self {
        METHOD_PREFERENCE.iter().copied().collect()
    }

    /// Whether `method` is in the set
    pub fn contains(&self, method: KeyNegotiationMethod) -> bool {
        self.0 & (1 << method.index()) != 0
    }

    /// Methods in both sets
    pub fn intersection(&self, other: MethodSet) -> MethodSet {
        MethodSet(self.0 & other.0)
    }

    /// Strongest negotiable method in both sets
    pub fn select(&self, peer: MethodSet) -> Option<KeyNegotiationMethod> {
        let common = self.intersection(peer);
        METHOD_PREFERENCE
            .iter()
            .copied()
            .find(|m| common.contains(*m))
    }
}

impl FromIterator<KeyNegotiationMethod> for MethodSet {
    fn from_iter<I: IntoIterator<Item = KeyNegotiationMethod>>(iter: I) -> Self {
        MethodSet(iter.into_iter().fold(0, |acc, m| acc | (1 << m.index())))
    }
}

/// Pre-shared secret binding a negotiation, numbered by its bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PresharedSecret {
    /// Authentication token obtained from the trust center
    AuthenticationToken = 0,
    /// Link key derived from the install code
    InstallCode = 1,
    /// PAKE passcode
    PakePasscode = 2,
    /// Zigbee Direct basic access key
    BasicAccessKey = 3,
    /// Zigbee Direct administrative access key
    AdminAccessKey = 4,
    /// Well-known secret, no authentication
    WellKnown = 5,
}

impl PresharedSecret {
    /// Secret with bit index `index`
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(PresharedSecret::AuthenticationToken),
            1 => Some(PresharedSecret::InstallCode),
            2 => Some(PresharedSecret::PakePasscode),
            3 => Some(PresharedSecret::BasicAccessKey),
            4 => Some(PresharedSecret::AdminAccessKey),
            5 => Some(PresharedSecret::WellKnown),
            _ => None,
        }
    }

    /// Bit index in the secrets mask
    pub fn index(&self) -> u8 {
        *self as u8
    }

    /// Whether the secret authenticates the peer
    pub fn is_authenticated(&self) -> bool {
        *self != PresharedSecret::WellKnown
    }
}

/// Bitmask of [`PresharedSecret`]s
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SecretSet(pub u8);

impl SecretSet {
    /// Whether `secret` is in the set
    pub fn contains(&self, secret: PresharedSecret) -> bool {
        self.0 & (1 << secret.index()) != 0
    }

    /// Secrets in both sets, lowest bit first; authenticated secrets come
    /// before the well-known one
    pub fn common(&self, peer: SecretSet) -> impl Iterator<Item = PresharedSecret> {
        let common = self.0 & peer.0;
        (0..8u8)
            .filter(move |i| common & (1 << i) != 0)
            .filter_map(PresharedSecret::from_index)
    }
}

impl FromIterator<PresharedSecret> for SecretSet {
    fn from_iter<I: IntoIterator<Item = PresharedSecret>>(iter: I) -> Self {
        SecretSet(iter.into_iter().fold(0, |acc, s| acc | (1 << s.index())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_order() {
        let all = MethodSet(0x1F);
        assert_eq!(all.select(all), Some(KeyNegotiationMethod::Curve25519Sha256));
        assert_eq!(
            all.select(MethodSet(0x02 | 0x08)),
            Some(KeyNegotiationMethod::Curve25519AesMmo)
        );
        assert_eq!(
            all.select(MethodSet(0x08)),
            Some(KeyNegotiationMethod::P256Sha256)
        );
    }

    #[test]
    fn legacy_and_static_never_selected() {
        let all = MethodSet(0x1F);
        assert_eq!(all.select(MethodSet(0x10)), None);
        assert_eq!(all.select(MethodSet(0x01)), None);
        assert!(!KeyNegotiationMethod::Sect283k1.is_negotiable());
        assert_eq!(MethodSet::negotiable(), MethodSet(0x0E));
    }

    #[test]
    fn secrets_prefer_authenticated() {
        let local: SecretSet = [PresharedSecret::WellKnown, PresharedSecret::InstallCode]
            .into_iter()
            .collect();
        let order: Vec<_> = local.common(SecretSet(0xFF)).collect();
        assert_eq!(
            order,
            vec![PresharedSecret::InstallCode, PresharedSecret::WellKnown]
        );
        assert_eq!(local.common(SecretSet(0x01)).next(), None);
    }
}
