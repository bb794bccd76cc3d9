//! Persistence collaborator
//!
//! The store hands every mutation to a [`Persistence`] implementation as a
//! fixed-size record keyed by slot, before touching its in-memory table.
//! NVRAM drivers implement the trait on the target; [`LogStructuredMemory`]
//! is an in-memory implementation with the same crash semantics as an
//! append-only flash log.

use std::collections::BTreeMap;

use tracing::warn;
use zbsec_api::{Result, StoreError};

use crate::record::{Record, RECORD_SIZE};

/// Slot-addressed record storage
pub trait Persistence: Send {
    /// Durably write `record` into `slot`
    fn write(&mut self, slot: u16, record: &Record) -> Result<()>;

    /// Durably remove the record in `slot`
    fn erase(&mut self, slot: u16) -> Result<()>;

    /// Every live record, ordered by slot
    fn load_all(&mut self) -> Result<Vec<(u16, Record)>>;
}

const OP_WRITE: u8 = 0x01;
const OP_ERASE: u8 = 0x02;
const COMMIT_MARKER: u8 = 0xA5;

const OP_HEADER: usize = 3;
const WRITE_LEN: usize = OP_HEADER + RECORD_SIZE + 1;
const ERASE_LEN: usize = OP_HEADER + 1;

/// Append-only log with a commit marker after every operation
///
/// An operation becomes durable once its marker is written. When the log
/// is replayed, an operation without a marker (a write torn by power loss)
/// and anything after it is discarded, so each operation is either fully
/// applied or not at all.
#[derive(Debug, Default, Clone)]
pub struct LogStructuredMemory {
    log: Vec<u8>,
    failures_pending: usize,
}

impl LogStructuredMemory {
    /// Empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Reopen a log image, for example after a simulated reboot
    pub fn from_image(log: Vec<u8>) -> Self {
        LogStructuredMemory {
            log,
            failures_pending: 0,
        }
    }

    /// Raw log bytes
    pub fn image(&self) -> &[u8] {
        &self.log
    }

    /// Make the next `count` operations fail without writing anything
    pub fn fail_next(&mut self, count: usize) {
        self.failures_pending = count;
    }

    /// Append only the first `written` bytes of a record write, as a power
    /// loss in the middle of programming would
    pub fn write_torn(&mut self, slot: u16, record: &Record, written: usize) {
        let mut op = Self::encode_write(slot, record);
        op.truncate(written.min(WRITE_LEN - 1));
        self.log.extend_from_slice(&op);
    }

    /// Rewrite the log with one write per live record
    pub fn compact(&mut self) -> Result<()> {
        let live = self.replay();
        let mut log = Vec::with_capacity(live.len() * WRITE_LEN);
        for (slot, record) in &live {
            log.extend_from_slice(&Self::encode_write(*slot, record));
        }
        self.log = log;
        Ok(())
    }

    fn check_failure(&mut self, slot: u16) -> Result<()> {
        if self.failures_pending > 0 {
            self.failures_pending -= 1;
            return Err(StoreError::Persistence { slot }.into());
        }
        Ok(())
    }

    fn encode_write(slot: u16, record: &Record) -> Vec<u8> {
        let mut op = Vec::with_capacity(WRITE_LEN);
        op.push(OP_WRITE);
        op.extend_from_slice(&slot.to_le_bytes());
        op.extend_from_slice(record);
        op.push(COMMIT_MARKER);
        op
    }

    /// Apply committed operations; truncates the log at the first torn one
    fn replay(&mut self) -> BTreeMap<u16, Record> {
        let mut live = BTreeMap::new();
        let mut offset = 0;
        while offset < self.log.len() {
            let rest = &self.log[offset..];
            let len = match rest[0] {
                OP_WRITE => WRITE_LEN,
                OP_ERASE => ERASE_LEN,
                _ => 0,
            };
            if len == 0 || rest.len() < len || rest[len - 1] != COMMIT_MARKER {
                break;
            }
            let slot = u16::from_le_bytes([rest[1], rest[2]]);
            if rest[0] == OP_WRITE {
                let mut record = [0u8; RECORD_SIZE];
                record.copy_from_slice(&rest[OP_HEADER..OP_HEADER + RECORD_SIZE]);
                live.insert(slot, record);
            } else {
                live.remove(&slot);
            }
            offset += len;
        }
        if offset < self.log.len() {
            warn!(
                discarded = self.log.len() - offset,
                "discarding uncommitted tail of the key-pair log"
            );
            self.log.truncate(offset);
        }
        live
    }
}

impl Persistence for LogStructuredMemory {
    fn write(&mut self, slot: u16, record: &Record) -> Result<()> {
        self.check_failure(slot)?;
        let op = Self::encode_write(slot, record);
        self.log.extend_from_slice(&op);
        Ok(())
    }

    fn erase(&mut self, slot: u16) -> Result<()> {
        self.check_failure(slot)?;
        self.log.push(OP_ERASE);
        self.log.extend_from_slice(&slot.to_le_bytes());
        self.log.push(COMMIT_MARKER);
        Ok(())
    }

    fn load_all(&mut self) -> Result<Vec<(u16, Record)>> {
        Ok(self.replay().into_iter().collect())
    }
}
