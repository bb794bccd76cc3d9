//! Securing and unsecuring frames

use std::sync::Arc;

use tracing::{debug, trace, warn};
use zbsec_algorithms::CryptoEngine;
use zbsec_api::{AuthError, CryptoError, IeeeAddr, Key128, Result, WireError};
use zbsec_common::ct_eq;
use zbsec_params::zigbee::{DEFAULT_NWK_SECURITY_LEVEL, KEY_LOAD_HASH_INPUT, KEY_TRANSPORT_HASH_INPUT};
use zbsec_store::{KeyClass, KeyFilter, KeyPairStore};
use zeroize::Zeroizing;

use crate::control::KeyIdentifier;
use crate::header::{mac_nonce, AuxHeader, MacAuxHeader};
use crate::keys::{KeySelector, NetworkKeyTable, DEFAULT_NETWORK_KEY_SLOTS};
use crate::replay::{ReplayScope, ReplayTable, DEFAULT_REPLAY_CAPACITY};

/// Layer whose auxiliary header a frame carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLayer {
    /// Zigbee network layer
    Nwk,
    /// Zigbee application support sub-layer
    Aps,
    /// IEEE 802.15.4 MAC
    Mac,
}

/// Codec settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameConfig {
    /// Level applied to outgoing frames and substituted for an elided one;
    /// 4 to 7
    pub security_level: u8,
    /// Transmit a zero level in Zigbee auxiliary headers
    pub elide_security_level: bool,
    /// (source, key) pairs whose counters are tracked
    pub replay_capacity: usize,
    /// Network keys held at once
    pub network_key_slots: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        FrameConfig {
            security_level: DEFAULT_NWK_SECURITY_LEVEL,
            elide_security_level: true,
            replay_capacity: DEFAULT_REPLAY_CAPACITY,
            network_key_slots: DEFAULT_NETWORK_KEY_SLOTS,
        }
    }
}

impl FrameConfig {
    /// Reject settings the codec cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(4..=7).contains(&self.security_level) {
            return Err(CryptoError::InvalidParameter {
                context: "frame security level",
                reason: "level must be an encrypting level (4 to 7)",
            }
            .into());
        }
        if self.replay_capacity == 0 || self.network_key_slots == 0 {
            return Err(CryptoError::InvalidParameter {
                context: "frame codec tables",
                reason: "capacities must be non-zero",
            }
            .into());
        }
        Ok(())
    }
}

/// Where the secured part of a received frame starts and who sent it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncomingFrame {
    /// Layer of the auxiliary header
    pub layer: FrameLayer,
    /// Length of the unsecured header preceding it
    pub header_len: usize,
    /// Sender's long address, when the outer header resolves it
    pub source: Option<IeeeAddr>,
}

/// Authenticated and decrypted frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsecuredFrame {
    /// Header followed by the plaintext payload
    pub frame: Vec<u8>,
    /// Length of the header
    pub header_len: usize,
    /// Sender's long address
    pub source: IeeeAddr,
    /// Accepted frame counter
    pub frame_counter: u32,
    /// Key the frame was secured with
    pub key_id: KeyIdentifier,
    /// Network key sequence number, for network-key frames
    pub key_sequence: Option<u8>,
}

impl UnsecuredFrame {
    /// Plaintext payload
    pub fn payload(&self) -> &[u8] {
        &self.frame[self.header_len..]
    }
}

fn truncated(needed: usize, available: usize) -> zbsec_api::Error {
    WireError::Truncated {
        context: "secured frame",
        needed,
        available,
    }
    .into()
}

fn next_counter(counter: &mut u32) -> Result<u32> {
    if *counter == u32::MAX {
        return Err(AuthError::CounterExhausted.into());
    }
    let value = *counter;
    *counter += 1;
    Ok(value)
}

/// CCM* frame security codec
///
/// Owns the network key table with its per-key outgoing counters, the
/// outgoing MAC frame counter and the replay table for network-keyed
/// frames. Link keys, their outgoing counters and their incoming floors
/// live in the [`KeyPairStore`] passed to each call, so a new link key
/// starts with fresh counters and a restart keeps every floor.
pub struct FrameSecurityCodec {
    local: IeeeAddr,
    engine: Arc<CryptoEngine>,
    config: FrameConfig,
    network_keys: NetworkKeyTable,
    mac_counter: u32,
    replay: ReplayTable,
}

impl core::fmt::Debug for FrameSecurityCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameSecurityCodec")
            .field("local", &self.local)
            .field("config", &self.config)
            .field("network_keys", &self.network_keys)
            .field("replay_entries", &self.replay.len())
            .finish_non_exhaustive()
    }
}

impl FrameSecurityCodec {
    /// Codec for the device `local`
    pub fn new(local: IeeeAddr, engine: Arc<CryptoEngine>, config: FrameConfig) -> Result<Self> {
        config.validate()?;
        Ok(FrameSecurityCodec {
            local,
            engine,
            network_keys: NetworkKeyTable::new(config.network_key_slots),
            replay: ReplayTable::new(config.replay_capacity),
            config,
            mac_counter: 0,
        })
    }

    /// Active settings
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Network key table
    pub fn network_keys(&self) -> &NetworkKeyTable {
        &self.network_keys
    }

    /// Install a network key
    ///
    /// A new value under a sequence number restarts that key's outgoing
    /// counter and drops the incoming counters tracked under the old value.
    /// Reinstalling the value already held changes nothing.
    pub fn set_network_key(&mut self, sequence: u8, key: &Key128) -> Result<()> {
        let replaced = self
            .network_keys
            .get(sequence)
            .map_or(false, |held| !ct_eq(held, key));
        let dropped = self.network_keys.insert(sequence, key)?;
        for seq in dropped.into_iter().chain(replaced.then_some(sequence)) {
            let forgotten = self.replay.forget_key(seq);
            debug!(sequence = seq, forgotten, "network key counters released");
        }
        Ok(())
    }

    /// Switch the active network key
    ///
    /// Every key keeps its own outgoing counter, so switching back to a key
    /// used before continues where that key left off.
    pub fn switch_network_key(&mut self, sequence: u8) -> Result<()> {
        self.network_keys.switch(sequence)
    }

    /// Next frame counter of the active network key, 0 without one
    pub fn outgoing_counter(&self) -> u32 {
        self.network_keys
            .active_sequence()
            .and_then(|seq| self.network_keys.outgoing_counter(seq))
            .unwrap_or(0)
    }

    /// Move the active network key's outgoing counter forward, e.g. to a
    /// persisted value
    pub fn set_outgoing_counter(&mut self, counter: u32) -> Result<()> {
        let seq = self
            .network_keys
            .active_sequence()
            .ok_or(AuthError::UnknownKey)?;
        self.network_keys.advance_counter(seq, counter)
    }

    /// Incoming counter table
    pub fn replay_table(&self) -> &ReplayTable {
        &self.replay
    }

    /// Forget every counter tracked for `peer`
    pub fn forget_peer(&mut self, peer: IeeeAddr) -> usize {
        self.replay.forget_source(peer)
    }

    fn network_key(&self, selector: KeySelector) -> Result<(u8, Zeroizing<Key128>)> {
        let found = match selector {
            KeySelector::NetworkKey(seq) => self.network_keys.get(seq).map(|k| (seq, k)),
            _ => self.network_keys.active(),
        };
        found
            .map(|(seq, key)| (seq, Zeroizing::new(*key)))
            .ok_or_else(|| AuthError::UnknownKey.into())
    }

    fn derived_key(
        &self,
        store: &KeyPairStore,
        peer: IeeeAddr,
        key_id: KeyIdentifier,
    ) -> Result<Zeroizing<Key128>> {
        let entry = store
            .lookup(peer, KeyFilter::Class(KeyClass::Primary))
            .ok_or(AuthError::UnknownKey)?;
        let key = match key_id {
            KeyIdentifier::KeyTransport => self.engine.keyed_hash(entry.link_key(), KEY_TRANSPORT_HASH_INPUT)?,
            KeyIdentifier::KeyLoad => self.engine.keyed_hash(entry.link_key(), KEY_LOAD_HASH_INPUT)?,
            _ => *entry.link_key(),
        };
        Ok(Zeroizing::new(key))
    }

    /// Secure an outgoing frame
    ///
    /// Returns `header || aux header || ciphertext || MIC`. NWK and MAC
    /// frames need a network key; APS frames take any selector. The frame counter is consumed even if
    /// encryption then fails. Counter exhaustion fails `CounterExhausted`
    /// and must be answered with a key rotation.
    pub fn secure_frame(
        &mut self,
        store: &mut KeyPairStore,
        layer: FrameLayer,
        header: &[u8],
        payload: &[u8],
        selector: KeySelector,
    ) -> Result<Vec<u8>> {
        if layer == FrameLayer::Mac {
            return self.secure_mac(header, payload, selector);
        }
        let level = self.config.security_level;
        let (aux, key) = match selector {
            KeySelector::ActiveNetworkKey | KeySelector::NetworkKey(_) => {
                let (seq, key) = self.network_key(selector)?;
                let counter = self.network_keys.take_counter(seq)?;
                let aux = match layer {
                    FrameLayer::Nwk => AuxHeader::nwk(level, counter, self.local, seq),
                    _ => AuxHeader::aps_network(level, counter, None, seq),
                };
                (aux, key)
            }
            _ if layer == FrameLayer::Nwk => {
                return Err(CryptoError::InvalidParameter {
                    context: "NWK frame",
                    reason: "NWK frames are secured with a network key",
                }
                .into())
            }
            KeySelector::Link(peer) => {
                let key = self.derived_key(store, peer, KeyIdentifier::Data)?;
                let counter = store.next_outgoing_counter(peer)?;
                (AuxHeader::aps_link(level, KeyIdentifier::Data, counter, None), key)
            }
            KeySelector::KeyTransport(peer) | KeySelector::KeyLoad(peer) => {
                let key_id = if matches!(selector, KeySelector::KeyTransport(_)) {
                    KeyIdentifier::KeyTransport
                } else {
                    KeyIdentifier::KeyLoad
                };
                let key = self.derived_key(store, peer, key_id)?;
                let counter = store.next_outgoing_counter(peer)?;
                (AuxHeader::aps_link(level, key_id, counter, Some(self.local)), key)
            }
        };

        let mic = aux.control.mic();
        let mut out = Vec::with_capacity(header.len() + aux.encoded_len() + payload.len() + mic.len());
        out.extend_from_slice(header);
        aux.encode_into(&mut out);
        let sealed = self
            .engine
            .ccm_encrypt_and_authenticate(&key, &aux.nonce(self.local), mic, &out, payload)?;
        if self.config.elide_security_level {
            out[header.len()] &= !0x07;
        }
        out.extend_from_slice(&sealed);
        trace!(?layer, counter = aux.frame_counter, key_id = ?aux.control.key_id, "frame secured");
        Ok(out)
    }

    fn secure_mac(&mut self, header: &[u8], payload: &[u8], selector: KeySelector) -> Result<Vec<u8>> {
        let key_index = match selector {
            KeySelector::ActiveNetworkKey => None,
            KeySelector::NetworkKey(seq) => Some(seq),
            _ => {
                return Err(CryptoError::InvalidParameter {
                    context: "MAC frame",
                    reason: "MAC frames are secured with a network key",
                }
                .into())
            }
        };
        let (_, key) = self.network_key(selector)?;
        let counter = next_counter(&mut self.mac_counter)?;
        let aux = MacAuxHeader {
            level: self.config.security_level,
            frame_counter: counter,
            key_index,
        };
        let mic = aux.mic();
        let mut out = Vec::with_capacity(header.len() + aux.encoded_len() + payload.len() + mic.len());
        out.extend_from_slice(header);
        aux.encode_into(&mut out);
        let nonce = mac_nonce(self.local, counter, aux.level);
        let sealed = self
            .engine
            .ccm_encrypt_and_authenticate(&key, &nonce, mic, &out, payload)?;
        out.extend_from_slice(&sealed);
        trace!(counter, ?key_index, "MAC frame secured");
        Ok(out)
    }

    /// Authenticate and decrypt a received frame
    ///
    /// The counter must be strictly greater than the last one accepted for
    /// the same (source, key) pair. Counters are recorded only once the MIC
    /// verifies, so a forged frame cannot advance them. Link-key counters
    /// are checked and recorded through the store, which persists them. No
    /// plaintext is returned on failure.
    pub fn unsecure_frame(
        &mut self,
        store: &mut KeyPairStore,
        frame: &[u8],
        incoming: IncomingFrame,
    ) -> Result<UnsecuredFrame> {
        let header_len = incoming.header_len;
        if frame.len() < header_len {
            return Err(truncated(header_len, frame.len()));
        }
        if incoming.layer == FrameLayer::Mac {
            return self.unsecure_mac(frame, incoming);
        }

        let wire = AuxHeader::parse(&frame[header_len..])?;
        let mut aux = wire;
        match aux.control.level {
            0 => aux.control = aux.control.with_level(self.config.security_level),
            level if level != self.config.security_level => {
                debug!(peer = ?incoming.source, level, "frame security level differs from ours");
                return Err(WireError::InvalidFormat("unexpected security level").into());
            }
            _ => {}
        }
        if incoming.layer == FrameLayer::Nwk
            && (aux.control.key_id != KeyIdentifier::Network || aux.source.is_none())
        {
            return Err(WireError::InvalidFormat("NWK frame without network key header").into());
        }
        let source = aux
            .source
            .or(incoming.source)
            .ok_or(WireError::InvalidFormat("frame source unknown"))?;
        let body_at = header_len + aux.encoded_len();
        let mic = aux.control.mic();
        if frame.len() < body_at + mic.len() {
            return Err(truncated(body_at + mic.len(), frame.len()));
        }

        let mut aad = frame[..body_at].to_vec();
        aad[header_len] = aux.control_byte();
        let nonce = aux.nonce(source);
        let body = &frame[body_at..];
        let counter = aux.frame_counter;

        let plaintext = match (aux.control.key_id, aux.key_sequence) {
            (KeyIdentifier::Network, Some(seq)) => {
                let scope = ReplayScope::Network(seq);
                self.replay.check(source, scope, counter)?;
                let key = self.network_key(KeySelector::NetworkKey(seq))?.1;
                let plaintext = self.decrypt(&key, &nonce, mic, &aad, body, source)?;
                self.replay.accept(source, scope, counter)?;
                plaintext
            }
            (KeyIdentifier::Network, None) => {
                return Err(WireError::InvalidFormat("missing key sequence number").into())
            }
            (KeyIdentifier::Data, _) => {
                let (class, plaintext) = self.decrypt_with_link_keys(store, source, &nonce, mic, &aad, body)?;
                store.accept_incoming_counter(source, class, counter)?;
                plaintext
            }
            (key_id, _) => {
                let key = self.derived_key(store, source, key_id)?;
                let plaintext = self.decrypt(&key, &nonce, mic, &aad, body, source)?;
                store.accept_incoming_counter(source, KeyClass::Primary, counter)?;
                plaintext
            }
        };

        let mut out = Vec::with_capacity(header_len + plaintext.len());
        out.extend_from_slice(&frame[..header_len]);
        out.extend_from_slice(&plaintext);
        trace!(peer = %source, counter, key_id = ?aux.control.key_id, "frame unsecured");
        Ok(UnsecuredFrame {
            frame: out,
            header_len,
            source,
            frame_counter: counter,
            key_id: aux.control.key_id,
            key_sequence: aux.key_sequence,
        })
    }

    fn decrypt(
        &self,
        key: &Key128,
        nonce: &[u8; 13],
        mic: zbsec_api::MicLength,
        aad: &[u8],
        body: &[u8],
        source: IeeeAddr,
    ) -> Result<Zeroizing<Vec<u8>>> {
        self.engine
            .ccm_decrypt_and_authenticate(key, nonce, mic, aad, body)
            .map(Zeroizing::new)
            .map_err(|err| {
                warn!(peer = %source, error = %err, "frame rejected");
                err
            })
    }

    /// Try the peer's primary link key, then a key awaiting verification;
    /// returns the class of the key that authenticated the frame
    fn decrypt_with_link_keys(
        &self,
        store: &KeyPairStore,
        source: IeeeAddr,
        nonce: &[u8; 13],
        mic: zbsec_api::MicLength,
        aad: &[u8],
        body: &[u8],
    ) -> Result<(KeyClass, Zeroizing<Vec<u8>>)> {
        let candidates: Vec<(KeyClass, Zeroizing<Key128>)> = [KeyClass::Primary, KeyClass::Unverified]
            .into_iter()
            .filter_map(|class| {
                store
                    .lookup(source, KeyFilter::Class(class))
                    .map(|entry| (class, Zeroizing::new(*entry.link_key())))
            })
            .collect();
        if candidates.is_empty() {
            debug!(peer = %source, "no link key for sender");
            return Err(AuthError::UnknownKey.into());
        }
        for (class, key) in &candidates {
            if let Ok(plaintext) = self.engine.ccm_decrypt_and_authenticate(key, nonce, mic, aad, body) {
                return Ok((*class, Zeroizing::new(plaintext)));
            }
        }
        warn!(peer = %source, "frame rejected by every link key");
        Err(AuthError::AuthenticationFailed.into())
    }

    fn unsecure_mac(&mut self, frame: &[u8], incoming: IncomingFrame) -> Result<UnsecuredFrame> {
        let header_len = incoming.header_len;
        let aux = MacAuxHeader::parse(&frame[header_len..])?;
        if aux.level != self.config.security_level {
            return Err(WireError::InvalidFormat("unexpected security level").into());
        }
        let source = incoming
            .source
            .ok_or(WireError::InvalidFormat("frame source unknown"))?;
        let body_at = header_len + aux.encoded_len();
        let mic = aux.mic();
        if frame.len() < body_at + mic.len() {
            return Err(truncated(body_at + mic.len(), frame.len()));
        }
        let selector = match aux.key_index {
            Some(seq) => KeySelector::NetworkKey(seq),
            None => KeySelector::ActiveNetworkKey,
        };
        let (seq, key) = self.network_key(selector)?;
        let scope = ReplayScope::Mac(seq);
        self.replay.check(source, scope, aux.frame_counter)?;
        let nonce = mac_nonce(source, aux.frame_counter, aux.level);
        let plaintext = self.decrypt(&key, &nonce, mic, &frame[..body_at], &frame[body_at..], source)?;
        self.replay.accept(source, scope, aux.frame_counter)?;

        let mut out = Vec::with_capacity(header_len + plaintext.len());
        out.extend_from_slice(&frame[..header_len]);
        out.extend_from_slice(&plaintext);
        Ok(UnsecuredFrame {
            frame: out,
            header_len,
            source,
            frame_counter: aux.frame_counter,
            key_id: KeyIdentifier::Network,
            key_sequence: Some(seq),
        })
    }
}
