//! Typed payloads of the TLVs used by key negotiation
//!
//! Decoders expect a buffer that already passed
//! [`general_processing`](crate::general_processing) but still check the
//! lengths they rely on, so they never index out of bounds.

use zbsec_api::{CurveId, IeeeAddr, Result, WireError};

use crate::codec::{find_tlv, write_tlv, TlvView};
use crate::tags;

const EUI64_SIZE: usize = 8;

/// A TLV with a typed payload
pub trait TlvPayload: Sized {
    /// Tag this value is written under
    fn tag(&self) -> u8;

    /// Append the payload bytes (no header)
    fn encode_payload(&self, out: &mut Vec<u8>);

    /// Parse from a TLV view
    fn decode(view: &TlvView<'_>) -> Result<Self>;

    /// Append header and payload to `buffer`
    fn write_to(&self, buffer: &mut Vec<u8>) -> Result<()> {
        let mut payload = Vec::new();
        self.encode_payload(&mut payload);
        write_tlv(buffer, self.tag(), &payload)
    }

    /// Find the TLV under `tag` in `buffer` and decode it
    fn find(tag: u8, buffer: &[u8]) -> Result<Self> {
        let view = find_tlv(tag, buffer).ok_or(WireError::NotFound(tag))?;
        Self::decode(&view)
    }
}

fn expect_len(view: &TlvView<'_>, context: &'static str, needed: usize) -> Result<()> {
    if view.payload.len() < needed {
        return Err(WireError::Truncated {
            context,
            needed,
            available: view.payload.len(),
        }
        .into());
    }
    Ok(())
}

fn eui64(bytes: &[u8]) -> Result<IeeeAddr> {
    IeeeAddr::from_le_slice(bytes).ok_or_else(|| {
        WireError::Truncated {
            context: "EUI64",
            needed: EUI64_SIZE,
            available: bytes.len(),
        }
        .into()
    })
}

/// Key negotiation methods and pre-shared secrets a device supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportedKeyNegotiationMethods {
    /// Key negotiation protocol bitmask
    pub methods: u8,
    /// Pre-shared secret bitmask
    pub secrets: u8,
    /// Source device, present when relayed
    pub source: Option<IeeeAddr>,
}

impl TlvPayload for SupportedKeyNegotiationMethods {
    fn tag(&self) -> u8 {
        tags::SUPPORTED_KEY_NEGOTIATION_METHODS
    }

    fn encode_payload(&self, out: &mut Vec<u8>) {
        out.push(self.methods);
        out.push(self.secrets);
        if let Some(source) = self.source {
            out.extend_from_slice(&source.to_le_bytes());
        }
    }

    fn decode(view: &TlvView<'_>) -> Result<Self> {
        expect_len(view, "supported key negotiation methods", 2)?;
        let source = if view.payload.len() > 2 {
            Some(eui64(&view.payload[2..])?)
        } else {
            None
        };
        Ok(SupportedKeyNegotiationMethods {
            methods: view.payload[0],
            secrets: view.payload[1],
            source,
        })
    }
}

/// Method and secret chosen by the initiator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectedKeyNegotiationMethod {
    /// Initiating device
    pub source: IeeeAddr,
    /// Selected protocol (bit index of the methods mask)
    pub method: u8,
    /// Selected pre-shared secret (bit index of the secrets mask)
    pub secret: u8,
}

impl TlvPayload for SelectedKeyNegotiationMethod {
    fn tag(&self) -> u8 {
        tags::SELECTED_KEY_NEGOTIATION_METHOD
    }

    fn encode_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.source.to_le_bytes());
        out.push(self.method);
        out.push(self.secret);
    }

    fn decode(view: &TlvView<'_>) -> Result<Self> {
        expect_len(view, "selected key negotiation method", EUI64_SIZE + 2)?;
        Ok(SelectedKeyNegotiationMethod {
            source: eui64(view.payload)?,
            method: view.payload[EUI64_SIZE],
            secret: view.payload[EUI64_SIZE + 1],
        })
    }
}

/// Ephemeral public point of one side of a negotiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicPoint {
    /// Sending device
    pub source: IeeeAddr,
    /// Curve of the point
    pub curve: CurveId,
    /// Wire encoding of the point
    pub point: Vec<u8>,
}

impl PublicPoint {
    /// Tag carrying a point on `curve`
    pub fn tag_for(curve: CurveId) -> u8 {
        match curve {
            CurveId::Curve25519 => tags::DIRECT_CURVE25519_PUBLIC_POINT,
            _ => tags::DIRECT_P256_PUBLIC_POINT,
        }
    }
}

impl TlvPayload for PublicPoint {
    fn tag(&self) -> u8 {
        Self::tag_for(self.curve)
    }

    fn encode_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.source.to_le_bytes());
        out.extend_from_slice(&self.point);
    }

    fn decode(view: &TlvView<'_>) -> Result<Self> {
        let curve = match view.tag {
            tags::DIRECT_P256_PUBLIC_POINT => CurveId::P256,
            tags::DIRECT_CURVE25519_PUBLIC_POINT | tags::KEY_NEGOTIATION_CURVE25519_POINT => {
                CurveId::Curve25519
            }
            _ => return Err(WireError::InvalidFormat("not a public point TLV").into()),
        };
        expect_len(view, "public point", EUI64_SIZE + curve.public_key_len())?;
        Ok(PublicPoint {
            source: eui64(view.payload)?,
            curve,
            point: view.payload[EUI64_SIZE..EUI64_SIZE + curve.public_key_len()].to_vec(),
        })
    }
}

/// Key confirmation tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNegotiationMacTag {
    /// Sending device
    pub source: IeeeAddr,
    /// Curve of the negotiation the tag confirms
    pub curve: CurveId,
    /// Tag bytes, 16 or 32 depending on the hash
    pub mac: Vec<u8>,
}

impl KeyNegotiationMacTag {
    /// Tag carrying a confirmation for `curve`
    pub fn tag_for(curve: CurveId) -> u8 {
        match curve {
            CurveId::Curve25519 => tags::MAC_TAG_CURVE25519,
            _ => tags::MAC_TAG_P256,
        }
    }
}

impl TlvPayload for KeyNegotiationMacTag {
    fn tag(&self) -> u8 {
        Self::tag_for(self.curve)
    }

    fn encode_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.source.to_le_bytes());
        out.extend_from_slice(&self.mac);
    }

    fn decode(view: &TlvView<'_>) -> Result<Self> {
        let curve = match view.tag {
            tags::MAC_TAG_P256 => CurveId::P256,
            tags::MAC_TAG_CURVE25519 => CurveId::Curve25519,
            _ => return Err(WireError::InvalidFormat("not a MAC tag TLV").into()),
        };
        expect_len(view, "MAC tag", EUI64_SIZE + 16)?;
        Ok(KeyNegotiationMacTag {
            source: eui64(view.payload)?,
            curve,
            mac: view.payload[EUI64_SIZE..].to_vec(),
        })
    }
}

/// 128-bit symmetric passphrase
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricPassphrase(pub [u8; 16]);

impl core::fmt::Debug for SymmetricPassphrase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SymmetricPassphrase([REDACTED])")
    }
}

impl TlvPayload for SymmetricPassphrase {
    fn tag(&self) -> u8 {
        tags::SYMMETRIC_PASSPHRASE
    }

    fn encode_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0);
    }

    fn decode(view: &TlvView<'_>) -> Result<Self> {
        let raw: [u8; 16] = view
            .payload
            .try_into()
            .map_err(|_| WireError::InvalidFormat("passphrase must be 16 bytes"))?;
        Ok(SymmetricPassphrase(raw))
    }
}

/// Device IEEE address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceEui64(pub IeeeAddr);

impl TlvPayload for DeviceEui64 {
    fn tag(&self) -> u8 {
        tags::DEVICE_EUI64
    }

    fn encode_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0.to_le_bytes());
    }

    fn decode(view: &TlvView<'_>) -> Result<Self> {
        Ok(DeviceEui64(eui64(view.payload)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::general_processing;
    use zbsec_api::Error;

    const A: IeeeAddr = IeeeAddr::from_u64(0x0011_2233_4455_6677);

    #[test]
    fn key_negotiation_request_layout() {
        let mut buf = Vec::new();
        SelectedKeyNegotiationMethod {
            source: A,
            method: 2,
            secret: 5,
        }
        .write_to(&mut buf)
        .unwrap();
        PublicPoint {
            source: A,
            curve: CurveId::Curve25519,
            point: vec![0x42; 32],
        }
        .write_to(&mut buf)
        .unwrap();

        assert_eq!(&buf[..4], &[0x00, 10, 0x77, 0x66]);
        assert_eq!(&buf[10..12], &[2, 5]);
        assert_eq!(&buf[12..14], &[tags::DIRECT_CURVE25519_PUBLIC_POINT, 40]);
        assert_eq!(buf.len(), 12 + 42);
        general_processing(&buf).unwrap();

        let point = PublicPoint::find(tags::DIRECT_CURVE25519_PUBLIC_POINT, &buf).unwrap();
        assert_eq!(point.source, A);
        assert_eq!(point.point, vec![0x42; 32]);
        let selected =
            SelectedKeyNegotiationMethod::find(tags::SELECTED_KEY_NEGOTIATION_METHOD, &buf).unwrap();
        assert_eq!((selected.method, selected.secret), (2, 5));
    }

    #[test]
    fn supported_methods_optional_source() {
        let short = SupportedKeyNegotiationMethods {
            methods: 0x06,
            secrets: 0x20,
            source: None,
        };
        let mut buf = Vec::new();
        short.write_to(&mut buf).unwrap();
        assert_eq!(buf, vec![0x29, 2, 0x06, 0x20]);
        assert_eq!(
            SupportedKeyNegotiationMethods::find(tags::SUPPORTED_KEY_NEGOTIATION_METHODS, &buf)
                .unwrap(),
            short
        );

        let long = SupportedKeyNegotiationMethods {
            source: Some(A),
            ..short
        };
        let mut buf = Vec::new();
        long.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), 12);
        assert_eq!(
            SupportedKeyNegotiationMethods::find(tags::SUPPORTED_KEY_NEGOTIATION_METHODS, &buf)
                .unwrap(),
            long
        );
    }

    #[test]
    fn missing_and_mismatched() {
        assert_eq!(
            SymmetricPassphrase::find(tags::SYMMETRIC_PASSPHRASE, &[]).unwrap_err(),
            Error::Wire(WireError::NotFound(tags::SYMMETRIC_PASSPHRASE))
        );
        let view = TlvView {
            tag: tags::DEVICE_EUI64,
            payload: &[0u8; 40],
            offset: 0,
        };
        assert!(PublicPoint::decode(&view).is_err());
        let short = TlvView {
            tag: tags::DIRECT_P256_PUBLIC_POINT,
            payload: &[0u8; 40],
            offset: 0,
        };
        assert!(matches!(
            PublicPoint::decode(&short),
            Err(Error::Wire(WireError::Truncated { .. }))
        ));
    }

    #[test]
    fn passphrase_debug_is_redacted() {
        let pass = SymmetricPassphrase([9; 16]);
        assert_eq!(format!("{:?}", pass), "SymmetricPassphrase([REDACTED])");
        let mut buf = Vec::new();
        pass.write_to(&mut buf).unwrap();
        assert_eq!(SymmetricPassphrase::find(tags::SYMMETRIC_PASSPHRASE, &buf).unwrap(), pass);
    }
}
