//! Persisted key-pair record
//!
//! Fixed 52-byte little-endian layout:
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0 | 8 | device address |
//! | 8 | 16 | link key |
//! | 24 | 16 | passphrase (zero when absent) |
//! | 40 | 2 | flags |
//! | 42 | 1 | supported key negotiation methods |
//! | 43 | 1 | supported pre-shared secrets |
//! | 44 | 4 | outgoing frame counter reservation |
//! | 48 | 4 | incoming frame counter floor |
//!
//! The first 44 bytes match the r23 NVRAM key-pair record. Flag bits:
//! 0-2 key update method, 3-5 initial join authentication, 6-7 key
//! attribute, 8 passphrase update allowed, 9 APS link key type, 10 methods
//! present, 11 APS frame counter sync, 12 passphrase present, 13 incoming
//! counter floor present, 14-15 reserved and always zero.

use byteorder::{ByteOrder, LittleEndian};
use zbsec_api::{IeeeAddr, Result, StoreError};
use zbsec_common::SecretBuffer;
use zeroize::Zeroize;

use crate::entry::{
    ApsLinkKeyType, InitialJoinAuth, KeyAttribute, KeyPairEntry, KeyUpdateMethod,
    NegotiationState,
};

/// Encoded record size
pub const RECORD_SIZE: usize = 52;

/// Size of the r23-compatible prefix
pub const NVRAM_PREFIX_SIZE: usize = 44;

const ADDRESS: usize = 0;
const LINK_KEY: usize = 8;
const PASSPHRASE: usize = 24;
const FLAGS: usize = 40;
const METHODS: usize = 42;
const SECRETS: usize = 43;
const COUNTER_OUT: usize = 44;
const COUNTER_IN: usize = 48;

const UPDATE_METHOD_SHIFT: u16 = 0;
const JOIN_AUTH_SHIFT: u16 = 3;
const ATTRIBUTE_SHIFT: u16 = 6;
const PASSPHRASE_UPDATE_ALLOWED: u16 = 1 << 8;
const GLOBAL_LINK_KEY: u16 = 1 << 9;
const METHODS_PRESENT: u16 = 1 << 10;
const FRAME_COUNTER_SYNC: u16 = 1 << 11;
const PASSPHRASE_PRESENT: u16 = 1 << 12;
const INCOMING_FLOOR_PRESENT: u16 = 1 << 13;
const RESERVED_MASK: u16 = 0xC000;

/// One encoded record
pub type Record = [u8; RECORD_SIZE];

fn flags_of(entry: &KeyPairEntry) -> u16 {
    let mut flags = ((entry.key_source as u16) << UPDATE_METHOD_SHIFT)
        | ((entry.initial_join_auth as u16) << JOIN_AUTH_SHIFT)
        | ((entry.key_attribute as u16) << ATTRIBUTE_SHIFT);
    if entry.passphrase_update_allowed {
        flags |= PASSPHRASE_UPDATE_ALLOWED;
    }
    if entry.aps_link_key_type == ApsLinkKeyType::Global {
        flags |= GLOBAL_LINK_KEY;
    }
    if entry.negotiation_capabilities_known {
        flags |= METHODS_PRESENT;
    }
    if entry.aps_frame_counter_sync_supported {
        flags |= FRAME_COUNTER_SYNC;
    }
    if entry.passphrase.is_some() {
        flags |= PASSPHRASE_PRESENT;
    }
    if entry.reserved_in.is_some() {
        flags |= INCOMING_FLOOR_PRESENT;
    }
    flags
}

/// Encode an entry; the counter fields carry the reservation ceiling and
/// the persisted incoming floor rather than the live counters
pub fn encode(entry: &KeyPairEntry) -> Record {
    let mut out = [0u8; RECORD_SIZE];
    out[ADDRESS..LINK_KEY].copy_from_slice(&entry.peer_long_address.to_le_bytes());
    out[LINK_KEY..PASSPHRASE].copy_from_slice(entry.link_key.expose());
    if let Some(passphrase) = &entry.passphrase {
        out[PASSPHRASE..FLAGS].copy_from_slice(passphrase.expose());
    }
    LittleEndian::write_u16(&mut out[FLAGS..METHODS], flags_of(entry));
    out[METHODS] = entry.supported_negotiation_methods;
    out[SECRETS] = entry.supported_secrets;
    LittleEndian::write_u32(&mut out[COUNTER_OUT..COUNTER_IN], entry.reserved_out);
    LittleEndian::write_u32(&mut out[COUNTER_IN..], entry.reserved_in.unwrap_or(0));
    out
}

/// Decode a record read back from slot `slot`
///
/// The live outgoing counter resumes at the persisted reservation ceiling,
/// skipping every value that may have been used before the restart. The
/// incoming high-water mark resumes at the persisted floor, which lies at
/// or above every counter accepted before the restart.
pub fn decode(slot: u16, record: &Record) -> Result<KeyPairEntry> {
    let corrupt = || StoreError::CorruptRecord { slot };

    let flags = LittleEndian::read_u16(&record[FLAGS..METHODS]);
    if flags & RESERVED_MASK != 0 {
        return Err(corrupt().into());
    }
    let address = IeeeAddr::from_le_slice(&record[ADDRESS..LINK_KEY]).ok_or_else(corrupt)?;
    if address.is_zero() {
        return Err(corrupt().into());
    }
    let key_source =
        KeyUpdateMethod::from_bits((flags >> UPDATE_METHOD_SHIFT) as u8).ok_or_else(corrupt)?;
    let initial_join_auth =
        InitialJoinAuth::from_bits((flags >> JOIN_AUTH_SHIFT) as u8).ok_or_else(corrupt)?;
    let key_attribute = KeyAttribute::from_bits((flags >> ATTRIBUTE_SHIFT) as u8);

    let mut key = [0u8; 16];
    key.copy_from_slice(&record[LINK_KEY..PASSPHRASE]);
    let link_key = SecretBuffer::new(key);
    key.zeroize();

    let passphrase = if flags & PASSPHRASE_PRESENT != 0 {
        Some(SecretBuffer::from_slice(&record[PASSPHRASE..FLAGS])?)
    } else {
        None
    };

    let reserved_out = LittleEndian::read_u32(&record[COUNTER_OUT..COUNTER_IN]);
    let reserved_in = if flags & INCOMING_FLOOR_PRESENT != 0 {
        Some(LittleEndian::read_u32(&record[COUNTER_IN..]))
    } else {
        None
    };
    Ok(KeyPairEntry {
        peer_long_address: address,
        link_key,
        key_attribute,
        key_source,
        initial_join_auth,
        negotiation_state: NegotiationState::None,
        aps_link_key_type: if flags & GLOBAL_LINK_KEY != 0 {
            ApsLinkKeyType::Global
        } else {
            ApsLinkKeyType::Unique
        },
        frame_counter_out: reserved_out,
        frame_counter_in_highwater: reserved_in,
        supported_negotiation_methods: record[METHODS],
        supported_secrets: record[SECRETS],
        negotiation_capabilities_known: flags & METHODS_PRESENT != 0,
        passphrase,
        passphrase_update_allowed: flags & PASSPHRASE_UPDATE_ALLOWED != 0,
        aps_frame_counter_sync_supported: flags & FRAME_COUNTER_SYNC != 0,
        reserved_out,
        reserved_in,
    })
}
