//! Negotiation registry and state machine
//!
//! The manager keeps one [`NegotiationContext`] per peer. Starting a new
//! negotiation with a peer cancels and wipes the previous context.
//!
//! ```text
//!  initiator                                   responder
//!  Idle -> Started -> AwaitingPeerPublicPoint
//!            StartRequest(method, secret, Q_i) ->
//!                                              Started -> ComputingSharedSecret
//!                                  <- StartResponse(Q_r)   -> AwaitingConfirmation
//!  ComputingSharedSecret -> AwaitingConfirmation
//!            ConfirmRequest(tag_i)             ->
//!                                              Complete (key committed)
//!                                 <- ConfirmResponse(tag_r)
//!  Complete (key committed)
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::{CryptoRng, RngCore};
use tracing::{debug, info, warn};
use zbsec_algorithms::{CryptoEngine, KeyPair};
use zbsec_api::{CryptoError, Error, IeeeAddr, Key128, NegotiationError, Result, StoreError};
use zbsec_common::SecretBuffer;
use zbsec_params::zigbee::WELL_KNOWN_DLK_SECRET;
use zbsec_store::{
    EntryAttributes, InitialJoinAuth, KeyAttribute, KeyClass, KeyFilter, KeyPairStore,
    KeyUpdateMethod, NegotiationState,
};
use zbsec_tlv::{KeyNegotiationMacTag, PublicPoint, SelectedKeyNegotiationMethod, SupportedKeyNegotiationMethods};
use zeroize::Zeroizing;

use crate::context::{DlkState, NegotiationContext, Role};
use crate::derive::{self, TagInput, TagOrigin};
use crate::message::{point_tlv, DlkMessage};
use crate::method::{KeyNegotiationMethod, MethodSet, PresharedSecret, SecretSet};

/// Randomness for ephemeral keys
pub trait EntropySource: RngCore + CryptoRng + Send {}

impl<T: RngCore + CryptoRng + Send> EntropySource for T {}

/// Negotiation settings
#[derive(Debug, Clone)]
pub struct DlkConfig {
    /// Methods offered and accepted
    pub methods: MethodSet,
    /// Pre-shared secrets offered and accepted
    pub secrets: SecretSet,
    /// Time allowed for each step
    pub step_timeout_ms: u64,
    /// Concurrent negotiation contexts
    pub max_sessions: usize,
    /// Leave the key agreement step for [`DlkManager::run_pending`]
    pub deferred_crypto: bool,
}

impl Default for DlkConfig {
    fn default() -> Self {
        DlkConfig {
            methods: MethodSet::negotiable(),
            secrets: [
                PresharedSecret::AuthenticationToken,
                PresharedSecret::InstallCode,
                PresharedSecret::WellKnown,
            ]
            .into_iter()
            .collect(),
            step_timeout_ms: 10_000,
            max_sessions: 4,
            deferred_crypto: false,
        }
    }
}

/// Result of feeding a message to the manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DlkOutcome {
    /// Send this frame to the peer
    Send(Vec<u8>),
    /// The key agreement step is queued; call [`DlkManager::run_pending`]
    Pending,
    /// The link key was committed to the store
    Complete {
        /// Frame to send to the peer, if any
        reply: Option<Vec<u8>>,
    },
}

/// Key material for `secret` shared with `peer`, if this device holds it
///
/// The well-known secret is always available. The install-code secret is
/// the primary link key of a peer that joined with an install code, and
/// the remaining secrets use the passphrase stored for the peer.
pub fn preshared_key(
    store: &KeyPairStore,
    peer: IeeeAddr,
    secret: PresharedSecret,
) -> Option<SecretBuffer<16>> {
    match secret {
        PresharedSecret::WellKnown => Some(SecretBuffer::new(WELL_KNOWN_DLK_SECRET)),
        PresharedSecret::InstallCode => store
            .lookup(peer, KeyFilter::Class(KeyClass::Primary))
            .filter(|e| e.initial_join_auth == InitialJoinAuth::InstallCode)
            .map(|e| SecretBuffer::new(*e.link_key())),
        _ => store
            .lookup(peer, KeyFilter::Any)
            .and_then(|e| e.passphrase())
            .map(|p| SecretBuffer::new(*p)),
    }
}

fn mark_store(store: &mut KeyPairStore, peer: IeeeAddr, state: NegotiationState) {
    if store.lookup(peer, KeyFilter::Any).is_none() {
        return;
    }
    if let Err(err) = store.set_negotiation_state(peer, state) {
        debug!(peer = %peer, error = %err, "negotiation state not recorded");
    }
}

fn unexpected(state: DlkState) -> Error {
    NegotiationError::UnexpectedMessage {
        state: state.name(),
    }
    .into()
}

fn own_origin(role: Role) -> TagOrigin {
    match role {
        Role::Initiator => TagOrigin::Initiator,
        Role::Responder => TagOrigin::Responder,
    }
}

fn tag_input(ctx: &NegotiationContext, local: IeeeAddr, origin: TagOrigin) -> TagInput<'_> {
    if origin == own_origin(ctx.role) {
        TagInput {
            origin,
            own: local,
            peer: ctx.peer,
            own_point: &ctx.own_public,
            peer_point: &ctx.peer_public,
        }
    } else {
        TagInput {
            origin,
            own: ctx.peer,
            peer: local,
            own_point: &ctx.peer_public,
            peer_point: &ctx.own_public,
        }
    }
}

/// ECDH and every derivation up to the link key
fn agree(engine: &CryptoEngine, local: IeeeAddr, ctx: &mut NegotiationContext) -> Result<()> {
    let private = ctx
        .own_private
        .as_ref()
        .ok_or(NegotiationError::NoContext)?;
    let xk = engine.ecdh_shared_secret(ctx.curve, private.as_slice(), &ctx.peer_public)?;
    let ours = (local, ctx.own_public.as_slice());
    let theirs = (ctx.peer, ctx.peer_public.as_slice());
    let (initiator, responder) = match ctx.role {
        Role::Initiator => (ours, theirs),
        Role::Responder => (theirs, ours),
    };
    let session_id = derive::session_identifier(engine, ctx.hash, initiator, responder)?;
    let secret = derive::shared_secret(
        engine,
        ctx.hash,
        xk.as_slice(),
        &session_id,
        &ctx.generator_binding,
    )?;
    let key = derive::link_key(engine, ctx.hash, &secret)?;
    ctx.own_private = None;
    ctx.session_identifier = session_id;
    ctx.derived_secret = secret;
    ctx.derived_key = Some(key);
    Ok(())
}

fn commit(
    store: &mut KeyPairStore,
    peer: IeeeAddr,
    key: &Key128,
    secret: PresharedSecret,
    capabilities: Option<(u8, u8)>,
) -> Result<()> {
    let mut attrs = EntryAttributes::with_attribute(KeyAttribute::Provisional);
    attrs.negotiation_capabilities = capabilities;
    attrs.key_source = if secret.is_authenticated() {
        KeyUpdateMethod::AuthenticatedKeyNegotiation
    } else {
        KeyUpdateMethod::UnauthenticatedKeyNegotiation
    };
    match store.lookup(peer, KeyFilter::Class(KeyClass::Primary)) {
        Some(existing) => {
            attrs.initial_join_auth = existing.initial_join_auth;
            attrs.aps_link_key_type = existing.aps_link_key_type;
            attrs.aps_frame_counter_sync_supported = existing.aps_frame_counter_sync_supported;
            attrs.passphrase = existing.passphrase().copied();
            attrs.passphrase_update_allowed = existing.passphrase_update_allowed;
        }
        None => {
            attrs.initial_join_auth = if secret.is_authenticated() {
                InitialJoinAuth::AuthenticatedKeyNegotiation
            } else {
                InitialJoinAuth::AnonymousKeyNegotiation
            };
        }
    }
    store.upsert(peer, key, &attrs)?;
    Ok(())
}

/// Dynamic link key negotiation manager
pub struct DlkManager {
    local: IeeeAddr,
    engine: Arc<CryptoEngine>,
    config: DlkConfig,
    rng: Box<dyn EntropySource>,
    sessions: BTreeMap<IeeeAddr, NegotiationContext>,
}

impl core::fmt::Debug for DlkManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DlkManager")
            .field("local", &self.local)
            .field("config", &self.config)
            .field("sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}

impl DlkManager {
    /// Manager for the device with long address `local`
    pub fn new(
        local: IeeeAddr,
        engine: Arc<CryptoEngine>,
        config: DlkConfig,
        rng: Box<dyn EntropySource>,
    ) -> Self {
        DlkManager {
            local,
            engine,
            config,
            rng,
            sessions: BTreeMap::new(),
        }
    }

    /// Our long address
    pub fn local_address(&self) -> IeeeAddr {
        self.local
    }

    /// Active settings
    pub fn config(&self) -> &DlkConfig {
        &self.config
    }

    /// Capabilities to advertise in a Supported Key Negotiation Methods TLV
    pub fn supported_methods(&self) -> SupportedKeyNegotiationMethods {
        SupportedKeyNegotiationMethods {
            methods: self.config.methods.0,
            secrets: self.config.secrets.0,
            source: None,
        }
    }

    /// State of the negotiation with `peer`
    pub fn state(&self, peer: IeeeAddr) -> DlkState {
        self.sessions
            .get(&peer)
            .map_or(DlkState::Idle, NegotiationContext::state)
    }

    /// Context of the negotiation with `peer`
    pub fn context(&self, peer: IeeeAddr) -> Option<&NegotiationContext> {
        self.sessions.get(&peer)
    }

    /// Number of negotiations neither complete nor failed
    pub fn active_sessions(&self) -> usize {
        self.sessions
            .values()
            .filter(|c| !c.state.is_terminal())
            .count()
    }

    /// Drop the negotiation with `peer`, wiping its secrets
    pub fn cancel(&mut self, peer: IeeeAddr) -> bool {
        match self.sessions.remove(&peer) {
            Some(ctx) => {
                debug!(peer = %peer, state = ctx.state.name(), "key negotiation cancelled");
                true
            }
            None => false,
        }
    }

    fn install(&mut self, ctx: NegotiationContext) -> Result<()> {
        if let Some(previous) = self.sessions.remove(&ctx.peer) {
            if !previous.state.is_terminal() {
                debug!(peer = %ctx.peer, state = previous.state.name(), "previous negotiation replaced");
            }
        }
        if self.sessions.len() >= self.config.max_sessions {
            self.sessions.retain(|_, c| !c.state.is_terminal());
        }
        if self.sessions.len() >= self.config.max_sessions {
            warn!(peer = %ctx.peer, capacity = self.config.max_sessions, "no free negotiation context");
            return Err(StoreError::StoreFull {
                capacity: self.config.max_sessions,
            }
            .into());
        }
        self.sessions.insert(ctx.peer, ctx);
        Ok(())
    }

    /// Record a failure that happened before a context could be built
    fn reject(&mut self, peer: IeeeAddr, role: Role, reason: Error) -> Error {
        warn!(peer = %peer, error = %reason, "key negotiation failed");
        if let Err(err) = self.install(NegotiationContext::failed(peer, role, reason)) {
            debug!(peer = %peer, error = %err, "failure not recorded");
        }
        reason
    }

    /// Fail the live context of `peer`
    fn abort(&mut self, peer: IeeeAddr, reason: Error) -> Error {
        warn!(peer = %peer, error = %reason, "key negotiation failed");
        if let Some(ctx) = self.sessions.get_mut(&peer) {
            ctx.fail(reason);
        }
        reason
    }

    fn generate_ephemeral(&mut self, ctx: &mut NegotiationContext, psk: &[u8]) -> Result<()> {
        let generator = derive::generator(&self.engine, ctx.curve, ctx.hash, psk)?;
        let mut randomness = Zeroizing::new(vec![0u8; ctx.curve.random_input_len()]);
        self.rng.fill_bytes(&mut randomness);
        let KeyPair {
            private, public, ..
        } = match generator.point {
            Some(base) => self.engine.key_generation_with_base(&randomness, &base)?,
            None => self.engine.key_generation(ctx.curve, &randomness)?,
        };
        ctx.generator_binding = generator.binding;
        ctx.own_private = Some(private);
        ctx.own_public = public;
        Ok(())
    }

    /// Start a negotiation with `peer` as initiator
    ///
    /// Returns the start request to send. Fails `NoCommonMethod` when the
    /// peer shares no negotiable method or no secret we hold material for;
    /// the store is left untouched in that case.
    pub fn initiate(
        &mut self,
        store: &mut KeyPairStore,
        peer: IeeeAddr,
        peer_capabilities: &SupportedKeyNegotiationMethods,
        now_ms: u64,
    ) -> Result<Vec<u8>> {
        info!(
            peer = %peer,
            methods = peer_capabilities.methods,
            secrets = peer_capabilities.secrets,
            "starting key negotiation"
        );
        let no_common = NegotiationError::NoCommonMethod.into();
        let Some(method) = self.config.methods.select(MethodSet(peer_capabilities.methods)) else {
            return Err(self.reject(peer, Role::Initiator, no_common));
        };
        let chosen = self
            .config
            .secrets
            .common(SecretSet(peer_capabilities.secrets))
            .find_map(|s| preshared_key(store, peer, s).map(|k| (s, k)));
        let (Some(curve), Some((secret, psk))) = (method.curve(), chosen) else {
            return Err(self.reject(peer, Role::Initiator, no_common));
        };

        let mut ctx = NegotiationContext::new(peer, Role::Initiator, method, secret, curve);
        ctx.peer_capabilities = Some((peer_capabilities.methods, peer_capabilities.secrets));
        ctx.state = DlkState::Started;
        if let Err(err) = self.generate_ephemeral(&mut ctx, psk.as_slice()) {
            return Err(self.reject(peer, Role::Initiator, err));
        }
        ctx.state = DlkState::AwaitingPeerPublicPoint;
        ctx.deadline_ms = now_ms.saturating_add(self.config.step_timeout_ms);

        let request = DlkMessage::StartRequest {
            selected: SelectedKeyNegotiationMethod {
                source: self.local,
                method: method.index(),
                secret: secret.index(),
            },
            point: point_tlv(self.local, curve, &ctx.own_public),
        }
        .encode()?;
        self.install(ctx)?;
        mark_store(store, peer, NegotiationState::Started);
        debug!(peer = %peer, ?method, ?secret, "start key negotiation request built");
        Ok(request)
    }

    /// Process a message received from `peer`
    pub fn receive(
        &mut self,
        store: &mut KeyPairStore,
        peer: IeeeAddr,
        frame: &[u8],
        now_ms: u64,
    ) -> Result<DlkOutcome> {
        if self.sessions.get(&peer).map_or(false, |c| c.step_pending) {
            debug!(peer = %peer, "message rejected while a step is outstanding");
            return Err(NegotiationError::StepInProgress.into());
        }
        let message = DlkMessage::decode(frame).map_err(|err| {
            debug!(peer = %peer, error = %err, "malformed negotiation message");
            err
        })?;
        if message.source() != peer {
            return Err(zbsec_api::WireError::InvalidFormat("source does not match sender").into());
        }
        debug!(peer = %peer, message = message.name(), "negotiation message");
        match message {
            DlkMessage::StartRequest { selected, point } => {
                self.on_start_request(store, peer, &selected, point, now_ms)
            }
            DlkMessage::StartResponse { point } => self.on_start_response(store, peer, point, now_ms),
            DlkMessage::ConfirmRequest { tag } => {
                self.on_confirmation(store, peer, Role::Responder, &tag)
            }
            DlkMessage::ConfirmResponse { tag } => {
                self.on_confirmation(store, peer, Role::Initiator, &tag)
            }
        }
    }

    fn on_start_request(
        &mut self,
        store: &mut KeyPairStore,
        peer: IeeeAddr,
        selected: &SelectedKeyNegotiationMethod,
        point: PublicPoint,
        now_ms: u64,
    ) -> Result<DlkOutcome> {
        let no_common = NegotiationError::NoCommonMethod.into();
        let method = KeyNegotiationMethod::from_index(selected.method)
            .filter(|m| m.is_negotiable() && self.config.methods.contains(*m));
        let secret =
            PresharedSecret::from_index(selected.secret).filter(|s| self.config.secrets.contains(*s));
        let (Some(method), Some(secret)) = (method, secret) else {
            return Err(self.reject(peer, Role::Responder, no_common));
        };
        let (Some(curve), Some(psk)) = (method.curve(), preshared_key(store, peer, secret)) else {
            return Err(self.reject(peer, Role::Responder, no_common));
        };

        let mut ctx = NegotiationContext::new(peer, Role::Responder, method, secret, curve);
        ctx.state = DlkState::Started;
        if let Err(err) = self.generate_ephemeral(&mut ctx, psk.as_slice()) {
            return Err(self.reject(peer, Role::Responder, err));
        }
        ctx.state = DlkState::AwaitingPeerPublicPoint;
        if point.curve != curve || !self.engine.validate_public_key(curve, &point.point)? {
            return Err(self.reject(peer, Role::Responder, CryptoError::InvalidPeerKey.into()));
        }
        ctx.peer_public = point.point;
        ctx.state = DlkState::ComputingSharedSecret;
        ctx.deadline_ms = now_ms.saturating_add(self.config.step_timeout_ms);
        self.install(ctx)?;
        mark_store(store, peer, NegotiationState::Started);
        self.advance(store, peer, now_ms)
    }

    fn on_start_response(
        &mut self,
        store: &mut KeyPairStore,
        peer: IeeeAddr,
        point: PublicPoint,
        now_ms: u64,
    ) -> Result<DlkOutcome> {
        let engine = Arc::clone(&self.engine);
        let ctx = self
            .sessions
            .get_mut(&peer)
            .ok_or(NegotiationError::NoContext)?;
        if ctx.role != Role::Initiator || ctx.state != DlkState::AwaitingPeerPublicPoint {
            return Err(unexpected(ctx.state));
        }
        let valid = point.curve == ctx.curve
            && engine
                .validate_public_key(ctx.curve, &point.point)
                .unwrap_or(false);
        if !valid {
            return Err(self.abort(peer, CryptoError::InvalidPeerKey.into()));
        }
        ctx.peer_public = point.point;
        ctx.state = DlkState::ComputingSharedSecret;
        ctx.deadline_ms = now_ms.saturating_add(self.config.step_timeout_ms);
        self.advance(store, peer, now_ms)
    }

    fn advance(&mut self, store: &mut KeyPairStore, peer: IeeeAddr, now_ms: u64) -> Result<DlkOutcome> {
        if self.config.deferred_crypto {
            if let Some(ctx) = self.sessions.get_mut(&peer) {
                ctx.step_pending = true;
            }
            debug!(peer = %peer, "key agreement step queued");
            return Ok(DlkOutcome::Pending);
        }
        self.compute(store, peer, now_ms)
    }

    /// Run the queued key agreement step for `peer`
    pub fn run_pending(
        &mut self,
        store: &mut KeyPairStore,
        peer: IeeeAddr,
        now_ms: u64,
    ) -> Result<DlkOutcome> {
        let ctx = self
            .sessions
            .get(&peer)
            .ok_or(NegotiationError::NoContext)?;
        if !ctx.step_pending {
            return Err(unexpected(ctx.state));
        }
        self.compute(store, peer, now_ms)
    }

    fn compute(&mut self, store: &mut KeyPairStore, peer: IeeeAddr, now_ms: u64) -> Result<DlkOutcome> {
        let engine = Arc::clone(&self.engine);
        let local = self.local;
        let timeout = self.config.step_timeout_ms;
        let ctx = self
            .sessions
            .get_mut(&peer)
            .ok_or(NegotiationError::NoContext)?;
        ctx.step_pending = false;
        if ctx.state != DlkState::ComputingSharedSecret {
            return Err(unexpected(ctx.state));
        }
        if let Err(err) = agree(&engine, local, ctx) {
            return Err(self.abort(peer, err));
        }
        ctx.state = DlkState::AwaitingConfirmation;
        ctx.deadline_ms = now_ms.saturating_add(timeout);

        let frame = match ctx.role {
            Role::Initiator => {
                let key = ctx.derived_key.as_ref().ok_or(NegotiationError::NoContext)?;
                let mac = derive::confirmation_tag(
                    &engine,
                    ctx.hash,
                    key.as_slice(),
                    &tag_input(ctx, local, TagOrigin::Initiator),
                )?;
                DlkMessage::ConfirmRequest {
                    tag: KeyNegotiationMacTag {
                        source: local,
                        curve: ctx.curve,
                        mac,
                    },
                }
            }
            Role::Responder => DlkMessage::StartResponse {
                point: point_tlv(local, ctx.curve, &ctx.own_public),
            },
        }
        .encode()?;
        mark_store(store, peer, NegotiationState::Verifying);
        debug!(peer = %peer, "link key derived, awaiting confirmation");
        Ok(DlkOutcome::Send(frame))
    }

    fn on_confirmation(
        &mut self,
        store: &mut KeyPairStore,
        peer: IeeeAddr,
        role: Role,
        tag: &KeyNegotiationMacTag,
    ) -> Result<DlkOutcome> {
        let engine = Arc::clone(&self.engine);
        let local = self.local;
        let ctx = self
            .sessions
            .get_mut(&peer)
            .ok_or(NegotiationError::NoContext)?;
        if ctx.role != role || ctx.state != DlkState::AwaitingConfirmation {
            return Err(unexpected(ctx.state));
        }
        let key = ctx
            .derived_key
            .as_ref()
            .ok_or(NegotiationError::NoContext)?
            .clone();
        let peer_origin = match role {
            Role::Initiator => TagOrigin::Responder,
            Role::Responder => TagOrigin::Initiator,
        };
        let verified = derive::verify_tag(
            &engine,
            ctx.hash,
            key.as_slice(),
            &tag_input(ctx, local, peer_origin),
            &tag.mac,
        );
        match verified {
            Ok(true) => {}
            Ok(false) => {
                mark_store(store, peer, NegotiationState::None);
                return Err(self.abort(peer, NegotiationError::ConfirmationMismatch.into()));
            }
            Err(err) => return Err(self.abort(peer, err)),
        }

        let reply = match role {
            Role::Responder => {
                let mac = derive::confirmation_tag(
                    &engine,
                    ctx.hash,
                    key.as_slice(),
                    &tag_input(ctx, local, TagOrigin::Responder),
                )?;
                Some(
                    DlkMessage::ConfirmResponse {
                        tag: KeyNegotiationMacTag {
                            source: local,
                            curve: ctx.curve,
                            mac,
                        },
                    }
                    .encode()?,
                )
            }
            Role::Initiator => None,
        };

        let (secret, capabilities) = (ctx.secret, ctx.peer_capabilities);
        if let Err(err) = commit(store, peer, key.expose(), secret, capabilities) {
            return Err(self.abort(peer, err));
        }
        if let Some(ctx) = self.sessions.get_mut(&peer) {
            ctx.wipe();
            ctx.state = DlkState::Complete;
        }
        mark_store(store, peer, NegotiationState::Complete);
        info!(peer = %peer, ?secret, "key negotiation complete, provisional link key stored");
        Ok(DlkOutcome::Complete { reply })
    }

    /// Fail every negotiation whose step deadline has passed
    ///
    /// Returns the peers that timed out; their secrets are already wiped.
    pub fn poll_timeouts(&mut self, store: &mut KeyPairStore, now_ms: u64) -> Vec<IeeeAddr> {
        let mut expired = Vec::new();
        for (peer, ctx) in self.sessions.iter_mut() {
            if ctx.state.is_terminal() || now_ms < ctx.deadline_ms {
                continue;
            }
            debug!(peer = %peer, state = ctx.state.name(), "key negotiation timed out");
            ctx.fail(NegotiationError::Timeout.into());
            expired.push(*peer);
        }
        for peer in &expired {
            mark_store(store, *peer, NegotiationState::None);
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "expired key negotiations cancelled");
        }
        expired
    }
}
