//! Negotiation messages
//!
//! A message is one command byte followed by a TLV sequence. The TLV part
//! must pass [`general_processing`] before any element is decoded.

use zbsec_api::{CurveId, IeeeAddr, Result, WireError};
use zbsec_tlv::{
    general_processing, tags, KeyNegotiationMacTag, PublicPoint, SelectedKeyNegotiationMethod,
    TlvPayload,
};

/// Command byte of a start request
pub const START_KEY_NEGOTIATION_REQ: u8 = 0x01;
/// Command byte of a start response
pub const START_KEY_NEGOTIATION_RSP: u8 = 0x02;
/// Command byte of the initiator's confirmation
pub const CONFIRM_KEY_REQ: u8 = 0x03;
/// Command byte of the responder's confirmation
pub const CONFIRM_KEY_RSP: u8 = 0x04;

/// One message of the exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DlkMessage {
    /// Initiator's selection and ephemeral point
    StartRequest {
        /// Selected method and secret
        selected: SelectedKeyNegotiationMethod,
        /// Initiator's public point
        point: PublicPoint,
    },
    /// Responder's ephemeral point
    StartResponse {
        /// Responder's public point
        point: PublicPoint,
    },
    /// Initiator's confirmation tag
    ConfirmRequest {
        /// Tag with the `KC_2_U` preamble
        tag: KeyNegotiationMacTag,
    },
    /// Responder's confirmation tag
    ConfirmResponse {
        /// Tag with the `KC_2_V` preamble
        tag: KeyNegotiationMacTag,
    },
}

fn find_point(buffer: &[u8]) -> Result<PublicPoint> {
    [
        tags::DIRECT_CURVE25519_PUBLIC_POINT,
        tags::DIRECT_P256_PUBLIC_POINT,
        tags::KEY_NEGOTIATION_CURVE25519_POINT,
    ]
    .into_iter()
    .find_map(|tag| PublicPoint::find(tag, buffer).ok())
    .ok_or_else(|| WireError::NotFound(tags::DIRECT_CURVE25519_PUBLIC_POINT).into())
}

fn find_tag(buffer: &[u8]) -> Result<KeyNegotiationMacTag> {
    KeyNegotiationMacTag::find(tags::MAC_TAG_CURVE25519, buffer)
        .or_else(|_| KeyNegotiationMacTag::find(tags::MAC_TAG_P256, buffer))
}

impl DlkMessage {
    /// Command byte
    pub fn command(&self) -> u8 {
        match self {
            DlkMessage::StartRequest { .. } => START_KEY_NEGOTIATION_REQ,
            DlkMessage::StartResponse { .. } => START_KEY_NEGOTIATION_RSP,
            DlkMessage::ConfirmRequest { .. } => CONFIRM_KEY_REQ,
            DlkMessage::ConfirmResponse { .. } => CONFIRM_KEY_RSP,
        }
    }

    /// Device that sent the message, as carried in its TLVs
    pub fn source(&self) -> IeeeAddr {
        match self {
            DlkMessage::StartRequest { selected, .. } => selected.source,
            DlkMessage::StartResponse { point } => point.source,
            DlkMessage::ConfirmRequest { tag } | DlkMessage::ConfirmResponse { tag } => tag.source,
        }
    }

    /// Short name for logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            DlkMessage::StartRequest { .. } => "start key negotiation request",
            DlkMessage::StartResponse { .. } => "start key negotiation response",
            DlkMessage::ConfirmRequest { .. } => "confirm key request",
            DlkMessage::ConfirmResponse { .. } => "confirm key response",
        }
    }

    /// Wire encoding
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = vec![self.command()];
        match self {
            DlkMessage::StartRequest { selected, point } => {
                selected.write_to(&mut out)?;
                point.write_to(&mut out)?;
            }
            DlkMessage::StartResponse { point } => point.write_to(&mut out)?,
            DlkMessage::ConfirmRequest { tag } | DlkMessage::ConfirmResponse { tag } => {
                tag.write_to(&mut out)?
            }
        }
        Ok(out)
    }

    /// Validate and decode a received message
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let (&command, body) = frame.split_first().ok_or(WireError::Truncated {
            context: "negotiation command",
            needed: 1,
            available: 0,
        })?;
        general_processing(body)?;
        match command {
            START_KEY_NEGOTIATION_REQ => Ok(DlkMessage::StartRequest {
                selected: SelectedKeyNegotiationMethod::find(
                    tags::SELECTED_KEY_NEGOTIATION_METHOD,
                    body,
                )?,
                point: find_point(body)?,
            }),
            START_KEY_NEGOTIATION_RSP => Ok(DlkMessage::StartResponse {
                point: find_point(body)?,
            }),
            CONFIRM_KEY_REQ => Ok(DlkMessage::ConfirmRequest {
                tag: find_tag(body)?,
            }),
            CONFIRM_KEY_RSP => Ok(DlkMessage::ConfirmResponse {
                tag: find_tag(body)?,
            }),
            _ => Err(WireError::InvalidFormat("unknown negotiation command").into()),
        }
    }
}

/// Public point TLV value for `curve`
pub(crate) fn point_tlv(source: IeeeAddr, curve: CurveId, point: &[u8]) -> PublicPoint {
    PublicPoint {
        source,
        curve,
        point: point.to_vec(),
    }
}
