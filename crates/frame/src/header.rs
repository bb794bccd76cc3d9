//! Auxiliary security headers and CCM* nonces
//!
//! Zigbee NWK and APS frames carry
//!
//! ```text
//!  sec_ctrl(1) || frame_counter(4, LE) || [source(8, LE)] || [key_seq(1)]
//! ```
//!
//! where the source is present when the extended nonce bit is set and the
//! key sequence number when the frame is secured with a network key. The
//! IEEE 802.15.4 MAC header has its own layout, see [`MacAuxHeader`].

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use zbsec_api::{IeeeAddr, MicLength, Result, WireError};
use zbsec_params::utils::symmetric::CCM_NONCE_SIZE;

use crate::control::{KeyIdentifier, SecurityControl};

/// CCM* nonce of a Zigbee NWK or APS frame
///
/// `source(8, LE) || frame_counter(4, LE) || security_control(1)`
pub fn zigbee_nonce(source: IeeeAddr, frame_counter: u32, control: u8) -> [u8; CCM_NONCE_SIZE] {
    let mut nonce = [0u8; CCM_NONCE_SIZE];
    nonce[..8].copy_from_slice(&source.to_le_bytes());
    LittleEndian::write_u32(&mut nonce[8..12], frame_counter);
    nonce[12] = control;
    nonce
}

/// CCM* nonce of an IEEE 802.15.4 MAC frame
///
/// `source(8, BE) || frame_counter(4, BE) || security_level(1)`
pub fn mac_nonce(source: IeeeAddr, frame_counter: u32, level: u8) -> [u8; CCM_NONCE_SIZE] {
    let mut nonce = [0u8; CCM_NONCE_SIZE];
    nonce[..8].copy_from_slice(&source.to_be_bytes());
    BigEndian::write_u32(&mut nonce[8..12], frame_counter);
    nonce[12] = level & 0x07;
    nonce
}

fn truncated(needed: usize, available: usize) -> zbsec_api::Error {
    WireError::Truncated {
        context: "auxiliary security header",
        needed,
        available,
    }
    .into()
}

/// Zigbee auxiliary security header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuxHeader {
    /// Security control; the extended nonce bit follows `source`
    pub control: SecurityControl,
    /// Frame counter
    pub frame_counter: u32,
    /// Source address, when carried
    pub source: Option<IeeeAddr>,
    /// Network key sequence number, when secured with a network key
    pub key_sequence: Option<u8>,
}

impl AuxHeader {
    /// NWK frame header; always carries the source
    pub fn nwk(level: u8, frame_counter: u32, source: IeeeAddr, key_sequence: u8) -> Self {
        AuxHeader {
            control: SecurityControl::new(level, KeyIdentifier::Network, true),
            frame_counter,
            source: Some(source),
            key_sequence: Some(key_sequence),
        }
    }

    /// APS frame secured with a network key
    pub fn aps_network(
        level: u8,
        frame_counter: u32,
        source: Option<IeeeAddr>,
        key_sequence: u8,
    ) -> Self {
        AuxHeader {
            control: SecurityControl::new(level, KeyIdentifier::Network, source.is_some()),
            frame_counter,
            source,
            key_sequence: Some(key_sequence),
        }
    }

    /// APS frame secured with a link key or a key derived from one
    pub fn aps_link(
        level: u8,
        key_id: KeyIdentifier,
        frame_counter: u32,
        source: Option<IeeeAddr>,
    ) -> Self {
        AuxHeader {
            control: SecurityControl::new(level, key_id, source.is_some()),
            frame_counter,
            source,
            key_sequence: None,
        }
    }

    /// Encoded size
    pub fn encoded_len(&self) -> usize {
        5 + self.source.map_or(0, |_| 8) + self.key_sequence.map_or(0, |_| 1)
    }

    /// Control byte as encoded, with the extended nonce bit matching
    /// `source`
    pub fn control_byte(&self) -> u8 {
        SecurityControl {
            extended_nonce: self.source.is_some(),
            ..self.control
        }
        .to_byte()
    }

    /// Append the wire form to `out`
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.control_byte());
        let mut counter = [0u8; 4];
        LittleEndian::write_u32(&mut counter, self.frame_counter);
        out.extend_from_slice(&counter);
        if let Some(source) = self.source {
            out.extend_from_slice(&source.to_le_bytes());
        }
        if let Some(seq) = self.key_sequence {
            out.push(seq);
        }
    }

    /// Parse the header at the start of `buffer`
    pub fn parse(buffer: &[u8]) -> Result<Self> {
        let (&byte, rest) = buffer.split_first().ok_or_else(|| truncated(5, 0))?;
        let control = SecurityControl::from_byte(byte)?;
        let needed = 5
            + if control.extended_nonce { 8 } else { 0 }
            + if control.key_id == KeyIdentifier::Network { 1 } else { 0 };
        if buffer.len() < needed {
            return Err(truncated(needed, buffer.len()));
        }
        let frame_counter = LittleEndian::read_u32(&rest[..4]);
        let mut at = 4;
        let source = if control.extended_nonce {
            at += 8;
            IeeeAddr::from_le_slice(&rest[4..12])
        } else {
            None
        };
        let key_sequence = (control.key_id == KeyIdentifier::Network).then(|| rest[at]);
        Ok(AuxHeader {
            control,
            frame_counter,
            source,
            key_sequence,
        })
    }

    /// CCM* nonce for this header sent by `source`
    pub fn nonce(&self, source: IeeeAddr) -> [u8; CCM_NONCE_SIZE] {
        zigbee_nonce(source, self.frame_counter, self.control_byte())
    }
}

/// IEEE 802.15.4 auxiliary security header
///
/// ```text
///  sec_ctrl(1) || frame_counter(4, LE) || [key_index(1)]
/// ```
///
/// Only implicit keys (key id mode 0) and a one-byte key index (mode 1)
/// are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacAuxHeader {
    /// Security level, 0 to 7
    pub level: u8,
    /// Frame counter
    pub frame_counter: u32,
    /// Key index of key id mode 1
    pub key_index: Option<u8>,
}

impl MacAuxHeader {
    /// MIC carried by frames of this level
    pub fn mic(&self) -> MicLength {
        MicLength::from_security_level(self.level)
    }

    /// Encoded size
    pub fn encoded_len(&self) -> usize {
        5 + self.key_index.map_or(0, |_| 1)
    }

    /// Append the wire form to `out`
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        let mode = if self.key_index.is_some() { 1 } else { 0 };
        out.push((self.level & 0x07) | (mode << 3));
        let mut counter = [0u8; 4];
        LittleEndian::write_u32(&mut counter, self.frame_counter);
        out.extend_from_slice(&counter);
        if let Some(index) = self.key_index {
            out.push(index);
        }
    }

    /// Parse the header at the start of `buffer`
    pub fn parse(buffer: &[u8]) -> Result<Self> {
        let &byte = buffer.first().ok_or_else(|| truncated(5, 0))?;
        if byte & 0xE0 != 0 {
            return Err(WireError::InvalidFormat("reserved MAC security control bits set").into());
        }
        let key_index = match (byte >> 3) & 0x03 {
            0 => false,
            1 => true,
            _ => return Err(WireError::InvalidFormat("unsupported MAC key identifier mode").into()),
        };
        let needed = if key_index { 6 } else { 5 };
        if buffer.len() < needed {
            return Err(truncated(needed, buffer.len()));
        }
        Ok(MacAuxHeader {
            level: byte & 0x07,
            frame_counter: LittleEndian::read_u32(&buffer[1..5]),
            key_index: key_index.then(|| buffer[5]),
        })
    }
}
