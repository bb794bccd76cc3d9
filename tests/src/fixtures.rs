//! Devices and persistence shared by the integration tests

use std::sync::{Arc, Mutex, PoisonError};

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing_subscriber::EnvFilter;
use zbsec::dlk::DlkOutcome;
use zbsec::prelude::*;
use zbsec::store::{LogStructuredMemory, Record};

/// Log shared between a store and the test that inspects or reboots it
#[derive(Debug, Clone, Default)]
pub struct SharedLog(Arc<Mutex<LogStructuredMemory>>);

impl SharedLog {
    /// Empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` on the underlying log
    pub fn with<T>(&self, f: impl FnOnce(&mut LogStructuredMemory) -> T) -> T {
        let mut log = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut log)
    }

    /// Copy of the log as a reboot would find it
    pub fn reboot(&self) -> LogStructuredMemory {
        self.with(|log| LogStructuredMemory::from_image(log.image().to_vec()))
    }

    /// Persistence handle for a store
    pub fn handle(&self) -> Box<dyn Persistence> {
        Box::new(self.clone())
    }
}

impl Persistence for SharedLog {
    fn write(&mut self, slot: u16, record: &Record) -> zbsec_api::Result<()> {
        self.with(|log| log.write(slot, record))
    }

    fn erase(&mut self, slot: u16) -> zbsec_api::Result<()> {
        self.with(|log| log.erase(slot))
    }

    fn load_all(&mut self) -> zbsec_api::Result<Vec<(u16, Record)>> {
        self.with(|log| log.load_all())
    }
}

/// Route `tracing` output through the test harness, filtered by `RUST_LOG`
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Security context with a seeded RNG and an in-memory log
pub fn device(local: IeeeAddr, seed: u64, config: SecurityConfig) -> (SecurityContext, SharedLog) {
    init_logging();
    let log = SharedLog::new();
    let ctx = SecurityContext::with_rng(
        local,
        config,
        log.handle(),
        Box::new(ChaCha20Rng::seed_from_u64(seed)),
    )
    .expect("default test configuration is valid");
    (ctx, log)
}

/// Messages exchanged by one negotiation
#[derive(Debug, Default)]
pub struct Transcript {
    /// Every frame in the order it was sent
    pub frames: Vec<Vec<u8>>,
}

/// Run a complete negotiation started by `initiator`
pub fn negotiate(
    initiator: &mut SecurityContext,
    responder: &mut SecurityContext,
    now_ms: u64,
) -> Result<Transcript> {
    let a = initiator.local_address();
    let b = responder.local_address();
    let mut transcript = Transcript::default();

    let request = initiator.start_negotiation(b, &responder.supported_methods(), now_ms)?;
    transcript.frames.push(request.clone());
    let mut to_responder = Some(request);
    let mut to_initiator = None;
    let mut clock = now_ms;
    loop {
        clock += 1;
        if let Some(frame) = to_responder.take() {
            match responder.handle_negotiation(a, &frame, clock)? {
                DlkOutcome::Send(reply) | DlkOutcome::Complete { reply: Some(reply) } => {
                    transcript.frames.push(reply.clone());
                    to_initiator = Some(reply);
                }
                DlkOutcome::Complete { reply: None } | DlkOutcome::Pending => {}
            }
        } else if let Some(frame) = to_initiator.take() {
            match initiator.handle_negotiation(b, &frame, clock)? {
                DlkOutcome::Send(reply) => {
                    transcript.frames.push(reply.clone());
                    to_responder = Some(reply);
                }
                DlkOutcome::Complete { reply } => {
                    if let Some(reply) = reply {
                        transcript.frames.push(reply);
                    }
                    return Ok(transcript);
                }
                DlkOutcome::Pending => {}
            }
        } else {
            return Ok(transcript);
        }
    }
}
