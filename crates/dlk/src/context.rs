//! Per-peer negotiation context

use core::fmt;

use zbsec_api::{CurveId, Error, HashType, IeeeAddr};
use zbsec_common::SecretBuffer;
use zbsec_params::zigbee::DERIVED_KEY_SIZE;
use zeroize::{Zeroize, Zeroizing};

use crate::method::{KeyNegotiationMethod, PresharedSecret};

/// Side of the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Sent the start request
    Initiator,
    /// Answered it
    Responder,
}

/// Negotiation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DlkState {
    /// No negotiation with the peer
    Idle,
    /// Method selected
    Started,
    /// Ephemeral key generated, waiting for the peer's point
    AwaitingPeerPublicPoint,
    /// Peer point accepted; the key agreement step is due
    ComputingSharedSecret,
    /// Link key derived, waiting for the peer's tag
    AwaitingConfirmation,
    /// Tags matched and the key was committed
    Complete,
    /// Negotiation aborted
    Failed(Error),
}

impl DlkState {
    /// Name used in errors and logs
    pub fn name(&self) -> &'static str {
        match self {
            DlkState::Idle => "idle",
            DlkState::Started => "started",
            DlkState::AwaitingPeerPublicPoint => "awaiting peer public point",
            DlkState::ComputingSharedSecret => "computing shared secret",
            DlkState::AwaitingConfirmation => "awaiting confirmation",
            DlkState::Complete => "complete",
            DlkState::Failed(_) => "failed",
        }
    }

    /// Complete or failed
    pub fn is_terminal(&self) -> bool {
        matches!(self, DlkState::Complete | DlkState::Failed(_))
    }
}

/// State of one in-flight negotiation
///
/// Secret members are wiped when the context fails, completes, is
/// cancelled or dropped.
pub struct NegotiationContext {
    pub(crate) peer: IeeeAddr,
    pub(crate) role: Role,
    pub(crate) state: DlkState,
    pub(crate) method: KeyNegotiationMethod,
    pub(crate) secret: PresharedSecret,
    pub(crate) curve: CurveId,
    pub(crate) hash: HashType,
    pub(crate) peer_capabilities: Option<(u8, u8)>,
    pub(crate) generator_binding: Zeroizing<Vec<u8>>,
    pub(crate) own_private: Option<SecretBuffer<32>>,
    pub(crate) own_public: Vec<u8>,
    pub(crate) peer_public: Vec<u8>,
    pub(crate) session_identifier: Vec<u8>,
    pub(crate) derived_secret: Zeroizing<Vec<u8>>,
    pub(crate) derived_key: Option<SecretBuffer<DERIVED_KEY_SIZE>>,
    pub(crate) deadline_ms: u64,
    pub(crate) step_pending: bool,
}

impl NegotiationContext {
    pub(crate) fn new(
        peer: IeeeAddr,
        role: Role,
        method: KeyNegotiationMethod,
        secret: PresharedSecret,
        curve: CurveId,
    ) -> Self {
        NegotiationContext {
            peer,
            role,
            state: DlkState::Idle,
            method,
            secret,
            curve,
            hash: method.hash(),
            peer_capabilities: None,
            generator_binding: Zeroizing::new(Vec::new()),
            own_private: None,
            own_public: Vec::new(),
            peer_public: Vec::new(),
            session_identifier: Vec::new(),
            derived_secret: Zeroizing::new(Vec::new()),
            derived_key: None,
            deadline_ms: 0,
            step_pending: false,
        }
    }

    /// Context recording a negotiation that failed before a method was
    /// agreed
    pub(crate) fn failed(peer: IeeeAddr, role: Role, reason: Error) -> Self {
        let mut ctx = Self::new(
            peer,
            role,
            KeyNegotiationMethod::StaticKey,
            PresharedSecret::WellKnown,
            CurveId::Curve25519,
        );
        ctx.state = DlkState::Failed(reason);
        ctx
    }

    /// Peer address
    pub fn peer(&self) -> IeeeAddr {
        self.peer
    }

    /// Our side of the exchange
    pub fn role(&self) -> Role {
        self.role
    }

    /// Current state
    pub fn state(&self) -> DlkState {
        self.state
    }

    /// Negotiated method
    pub fn method(&self) -> KeyNegotiationMethod {
        self.method
    }

    /// Pre-shared secret binding the exchange
    pub fn secret(&self) -> PresharedSecret {
        self.secret
    }

    /// Curve of the exchange
    pub fn curve(&self) -> CurveId {
        self.curve
    }

    /// Hash of the exchange
    pub fn hash(&self) -> HashType {
        self.hash
    }

    /// Our ephemeral public point
    pub fn own_public_key(&self) -> &[u8] {
        &self.own_public
    }

    /// The peer's ephemeral public point, once received
    pub fn peer_public_key(&self) -> &[u8] {
        &self.peer_public
    }

    /// Session identifier, once derived
    pub fn session_identifier(&self) -> &[u8] {
        &self.session_identifier
    }

    /// Deadline of the current step on the injected clock
    pub fn deadline_ms(&self) -> u64 {
        self.deadline_ms
    }

    /// Whether the key agreement step is waiting to run
    pub fn step_pending(&self) -> bool {
        self.step_pending
    }

    /// Whether any private key, secret or derived key is still held
    pub fn holds_secrets(&self) -> bool {
        self.own_private.is_some()
            || self.derived_key.is_some()
            || !self.derived_secret.is_empty()
            || !self.generator_binding.is_empty()
    }

    /// Zeroize and release every secret member
    pub(crate) fn wipe(&mut self) {
        if let Some(mut private) = self.own_private.take() {
            private.zeroize();
        }
        if let Some(mut key) = self.derived_key.take() {
            key.zeroize();
        }
        self.derived_secret.zeroize();
        self.derived_secret.clear();
        self.generator_binding.zeroize();
        self.generator_binding.clear();
        self.step_pending = false;
    }

    /// Enter `Failed(reason)` and wipe
    pub(crate) fn fail(&mut self, reason: Error) {
        self.wipe();
        self.state = DlkState::Failed(reason);
    }
}

impl Drop for NegotiationContext {
    fn drop(&mut self) {
        self.wipe();
    }
}

impl fmt::Debug for NegotiationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NegotiationContext")
            .field("peer", &self.peer)
            .field("role", &self.role)
            .field("state", &self.state)
            .field("method", &self.method)
            .field("secret", &self.secret)
            .field("deadline_ms", &self.deadline_ms)
            .finish_non_exhaustive()
    }
}
