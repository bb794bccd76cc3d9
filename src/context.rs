//! Device-wide security state

use std::sync::Arc;

use rand::rngs::OsRng;
use tracing::{debug, info};
use zbsec_algorithms::CryptoEngine;
use zbsec_api::{IeeeAddr, Key128, Result};
use zbsec_dlk::{DlkManager, DlkOutcome, DlkState, EntropySource};
use zbsec_frame::{FrameLayer, FrameSecurityCodec, IncomingFrame, KeySelector, UnsecuredFrame};
use zbsec_store::{policy_by_name, EntryAttributes, KeyPairEntry, KeyPairStore, Persistence};
use zbsec_tlv::SupportedKeyNegotiationMethods;

use crate::config::SecurityConfig;
use crate::error::{SetupError, SetupResult};

/// Security state of one device: link keys, negotiations in flight,
/// network keys and frame counters
///
/// Owns the [`KeyPairStore`] and lends it to the negotiation manager and
/// the frame codec call by call. Link-key frame counters live in the store
/// entries, so a new link key starts with fresh counters and a restart
/// keeps the persisted floors.
pub struct SecurityContext {
    local: IeeeAddr,
    config: SecurityConfig,
    engine: Arc<CryptoEngine>,
    store: KeyPairStore,
    dlk: DlkManager,
    frames: FrameSecurityCodec,
}

impl core::fmt::Debug for SecurityContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SecurityContext")
            .field("local", &self.local)
            .field("backend", &self.engine.backend_name())
            .field("store", &self.store)
            .field("dlk", &self.dlk)
            .finish_non_exhaustive()
    }
}

impl SecurityContext {
    /// Context for `local`, restoring link keys from `persistence`
    pub fn new(
        local: IeeeAddr,
        config: SecurityConfig,
        persistence: Box<dyn Persistence>,
    ) -> SetupResult<Self> {
        Self::with_rng(local, config, persistence, Box::new(OsRng))
    }

    /// As [`new`](Self::new) with an explicit randomness source
    pub fn with_rng(
        local: IeeeAddr,
        config: SecurityConfig,
        persistence: Box<dyn Persistence>,
        rng: Box<dyn EntropySource>,
    ) -> SetupResult<Self> {
        config.validate()?;
        let policy = policy_by_name(&config.store.key_update_policy).ok_or_else(|| {
            SetupError::UnknownName {
                field: "store.key_update_policy",
                value: config.store.key_update_policy.clone(),
            }
        })?;
        let engine = Arc::new(config.engine()?);
        let store = KeyPairStore::restore(config.store.capacity, persistence)?
            .with_policy(policy)
            .with_counter_stride(config.store.counter_stride);
        let dlk = DlkManager::new(local, Arc::clone(&engine), config.dlk_config()?, rng);
        let frames = FrameSecurityCodec::new(local, Arc::clone(&engine), config.frame_config())?;
        info!(
            local = %local,
            backend = engine.backend_name(),
            entries = store.len(),
            policy = store.policy_name(),
            "security context ready"
        );
        Ok(SecurityContext {
            local,
            config,
            engine,
            store,
            dlk,
            frames,
        })
    }

    /// Our long address
    pub fn local_address(&self) -> IeeeAddr {
        self.local
    }

    /// Configuration in effect
    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    /// Shared crypto engine
    pub fn engine(&self) -> &CryptoEngine {
        &self.engine
    }

    /// Link keys
    pub fn store(&self) -> &KeyPairStore {
        &self.store
    }

    /// Negotiation manager
    pub fn negotiations(&self) -> &DlkManager {
        &self.dlk
    }

    /// Frame codec
    pub fn frames(&self) -> &FrameSecurityCodec {
        &self.frames
    }

    /// Capabilities to advertise to peers
    pub fn supported_methods(&self) -> SupportedKeyNegotiationMethods {
        self.dlk.supported_methods()
    }

    /// Negotiation state with `peer`
    pub fn negotiation_state(&self, peer: IeeeAddr) -> DlkState {
        self.dlk.state(peer)
    }

    /// Start negotiating a link key with `peer`; returns the frame to send
    pub fn start_negotiation(
        &mut self,
        peer: IeeeAddr,
        peer_capabilities: &SupportedKeyNegotiationMethods,
        now_ms: u64,
    ) -> Result<Vec<u8>> {
        self.dlk
            .initiate(&mut self.store, peer, peer_capabilities, now_ms)
    }

    /// Feed a negotiation message received from `peer`
    pub fn handle_negotiation(
        &mut self,
        peer: IeeeAddr,
        frame: &[u8],
        now_ms: u64,
    ) -> Result<DlkOutcome> {
        let outcome = self.dlk.receive(&mut self.store, peer, frame, now_ms)?;
        self.after_negotiation(peer, &outcome);
        Ok(outcome)
    }

    /// Run a deferred key agreement step for `peer`
    pub fn run_pending(&mut self, peer: IeeeAddr, now_ms: u64) -> Result<DlkOutcome> {
        let outcome = self.dlk.run_pending(&mut self.store, peer, now_ms)?;
        self.after_negotiation(peer, &outcome);
        Ok(outcome)
    }

    /// Expire overdue negotiations; returns the affected peers
    pub fn poll(&mut self, now_ms: u64) -> Vec<IeeeAddr> {
        self.dlk.poll_timeouts(&mut self.store, now_ms)
    }

    fn after_negotiation(&mut self, peer: IeeeAddr, outcome: &DlkOutcome) {
        if matches!(outcome, DlkOutcome::Complete { .. }) {
            info!(peer = %peer, "negotiated link key in use");
        }
    }

    /// Protect an outgoing frame
    pub fn secure_frame(
        &mut self,
        layer: FrameLayer,
        header: &[u8],
        payload: &[u8],
        selector: KeySelector,
    ) -> Result<Vec<u8>> {
        self.frames
            .secure_frame(&mut self.store, layer, header, payload, selector)
    }

    /// Authenticate and decrypt an incoming frame
    pub fn unsecure_frame(&mut self, frame: &[u8], incoming: IncomingFrame) -> Result<UnsecuredFrame> {
        self.frames.unsecure_frame(&mut self.store, frame, incoming)
    }

    /// Store a link key received out of band or by transport
    pub fn install_link_key(
        &mut self,
        peer: IeeeAddr,
        key: &Key128,
        attributes: &EntryAttributes,
    ) -> Result<&KeyPairEntry> {
        self.store.upsert(peer, key, attributes)
    }

    /// Mark the peer's pending key as verified
    pub fn verify_key(&mut self, peer: IeeeAddr) -> Result<&KeyPairEntry> {
        self.store.verify(peer)
    }

    /// Forget everything held for `peer`; returns the entries deleted
    pub fn remove_device(&mut self, peer: IeeeAddr) -> Result<usize> {
        self.dlk.cancel(peer);
        let forgotten = self.frames.forget_peer(peer);
        let deleted = self.store.delete_all_for(peer)?;
        debug!(peer = %peer, deleted, forgotten, "device removed");
        Ok(deleted)
    }

    /// Install a network key under `sequence`
    pub fn set_network_key(&mut self, sequence: u8, key: &Key128) -> Result<()> {
        self.frames.set_network_key(sequence, key)
    }

    /// Make the network key `sequence` the active one
    pub fn switch_network_key(&mut self, sequence: u8) -> Result<()> {
        info!(sequence, "switching network key");
        self.frames.switch_network_key(sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use zbsec_api::{AuthError, Error, NegotiationError, StoreError};
    use zbsec_store::{KeyAttribute, KeyFilter, LogStructuredMemory};

    const A: IeeeAddr = IeeeAddr::from_u64(0x0011_2233_4455_6677);
    const B: IeeeAddr = IeeeAddr::from_u64(0x8899_AABB_CCDD_EEFF);
    const APS_HEADER: [u8; 4] = [0x21, 0x10, 0x01, 0x00];

    fn context(local: IeeeAddr, seed: u64) -> SecurityContext {
        SecurityContext::with_rng(
            local,
            SecurityConfig::default(),
            Box::new(LogStructuredMemory::new()),
            Box::new(ChaCha20Rng::seed_from_u64(seed)),
        )
        .unwrap()
    }

    fn negotiate(a: &mut SecurityContext, b: &mut SecurityContext) {
        let caps = b.supported_methods();
        let request = a.start_negotiation(B, &caps, 0).unwrap();
        let DlkOutcome::Send(response) = b.handle_negotiation(A, &request, 1).unwrap() else {
            panic!("responder must answer");
        };
        let DlkOutcome::Send(confirm) = a.handle_negotiation(B, &response, 2).unwrap() else {
            panic!("initiator must confirm");
        };
        let DlkOutcome::Complete { reply: Some(reply) } = b.handle_negotiation(A, &confirm, 3).unwrap()
        else {
            panic!("responder must complete");
        };
        a.handle_negotiation(B, &reply, 4).unwrap();
    }

    fn aps_to(sender: &mut SecurityContext, peer: IeeeAddr, payload: &[u8]) -> Vec<u8> {
        sender
            .secure_frame(FrameLayer::Aps, &APS_HEADER, payload, KeySelector::Link(peer))
            .unwrap()
    }

    fn incoming(source: IeeeAddr) -> IncomingFrame {
        IncomingFrame {
            layer: FrameLayer::Aps,
            header_len: APS_HEADER.len(),
            source: Some(source),
        }
    }

    #[test]
    fn negotiated_key_protects_aps_frames() {
        let mut a = context(A, 1);
        let mut b = context(B, 2);
        negotiate(&mut a, &mut b);
        assert_eq!(a.negotiation_state(B), DlkState::Complete);
        assert_eq!(
            a.store().lookup(B, KeyFilter::Any).unwrap().key_attribute,
            KeyAttribute::Provisional
        );

        let payload = [0x5Au8; 20];
        let frame = aps_to(&mut a, B, &payload);
        let opened = b.unsecure_frame(&frame, incoming(A)).unwrap();
        assert_eq!(opened.payload(), payload);
        assert_eq!(
            b.unsecure_frame(&frame, incoming(A)).unwrap_err(),
            Error::Auth(AuthError::ReplayedCounter {
                counter: opened.frame_counter,
                last_accepted: opened.frame_counter
            })
        );
    }

    #[test]
    fn renegotiation_restarts_replay_tracking() {
        let mut a = context(A, 3);
        let mut b = context(B, 4);
        negotiate(&mut a, &mut b);
        let frame = aps_to(&mut a, B, b"first key");
        b.unsecure_frame(&frame, incoming(A)).unwrap();

        negotiate(&mut a, &mut b);
        let frame = aps_to(&mut a, B, b"second key");
        let opened = b.unsecure_frame(&frame, incoming(A)).unwrap();
        assert_eq!(opened.payload(), b"second key");
        assert_eq!(opened.frame_counter, 0);
    }

    #[test]
    fn installed_keys_and_removal() {
        let mut a = context(A, 5);
        let mut b = context(B, 6);
        let key = [0x42u8; 16];
        a.install_link_key(B, &key, &EntryAttributes::with_attribute(KeyAttribute::Verified))
            .unwrap();
        b.install_link_key(A, &key, &EntryAttributes::with_attribute(KeyAttribute::Provisional))
            .unwrap();
        assert_eq!(b.verify_key(A).unwrap().key_attribute, KeyAttribute::Verified);

        let frame = aps_to(&mut a, B, b"hello");
        assert_eq!(b.unsecure_frame(&frame, incoming(A)).unwrap().payload(), b"hello");

        assert_eq!(b.remove_device(A).unwrap(), 1);
        assert!(b.store().is_empty());
        assert_eq!(
            b.verify_key(A).unwrap_err(),
            Error::Store(StoreError::NotFound)
        );
    }

    #[test]
    fn timeouts_are_polled() {
        let mut a = context(A, 7);
        let b = context(B, 8);
        a.start_negotiation(B, &b.supported_methods(), 0).unwrap();
        let timeout = a.config().negotiation.step_timeout_ms;
        assert!(a.poll(timeout - 1).is_empty());
        assert_eq!(a.poll(timeout + 1), vec![B]);
        assert_eq!(
            a.negotiation_state(B),
            DlkState::Failed(NegotiationError::Timeout.into())
        );
        assert!(!a.negotiations().context(B).unwrap().holds_secrets());
        assert!(a.poll(timeout * 2).is_empty());
    }

    #[test]
    fn network_keys() {
        let mut a = context(A, 9);
        let mut b = context(B, 10);
        for ctx in [&mut a, &mut b] {
            ctx.set_network_key(0, &[0x11; 16]).unwrap();
            ctx.set_network_key(1, &[0x22; 16]).unwrap();
        }
        let nwk_header = [0x48, 0x02, 0x00, 0x00, 0x01, 0x00, 0x1E, 0x01];
        let frame = a
            .secure_frame(FrameLayer::Nwk, &nwk_header, b"route", KeySelector::ActiveNetworkKey)
            .unwrap();
        let incoming = IncomingFrame {
            layer: FrameLayer::Nwk,
            header_len: nwk_header.len(),
            source: None,
        };
        assert_eq!(b.unsecure_frame(&frame, incoming).unwrap().payload(), b"route");

        a.switch_network_key(1).unwrap();
        let frame = a
            .secure_frame(FrameLayer::Nwk, &nwk_header, b"route", KeySelector::ActiveNetworkKey)
            .unwrap();
        let opened = b.unsecure_frame(&frame, incoming).unwrap();
        assert_eq!(opened.key_sequence, Some(1));
        assert_eq!(opened.frame_counter, 0);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let mut config = SecurityConfig::default();
        config.store.key_update_policy = "r21".into();
        let err = SecurityContext::new(A, config, Box::new(LogStructuredMemory::new())).unwrap_err();
        assert!(matches!(err, SetupError::UnknownName { .. }));
    }
}
