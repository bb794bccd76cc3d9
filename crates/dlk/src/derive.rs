//! Derivations of the dynamic link key negotiation
//!
//! For a negotiation with hash `H`, pre-shared secret `psk`, initiator
//! `(A_i, Q_i)` and responder `(A_r, Q_r)`:
//!
//! - Curve25519 generator `G`: the first `u = H'(psk || ctr)` (top bit
//!   cleared) that is a usable base point, `H'` being SHA-256 or the
//!   concatenation `MMO(psk || ctr || 0) || MMO(psk || ctr || 1)`.
//!   P-256 keeps its standard generator and binds `G = H(psk)` into the
//!   secret instead.
//! - session identifier `I = H(A_i || Q_i || A_r || Q_r)`
//! - shared secret `s = H(x_k || I || G)` with `x_k` the ECDH result
//! - link key `K = HKDF-Expand(s, "ZigbeeDLK", 16)` for SHA-256 and
//!   `K = MMO(s)` for AES-MMO
//! - confirmation tag `HMAC_K(preamble || own || peer || Q_own || Q_peer)`

use zbsec_algorithms::ec::x25519;
use zbsec_algorithms::CryptoEngine;
use zbsec_api::{CryptoError, CurveId, HashType, IeeeAddr, Result};
use zbsec_common::{ct_eq, SecretBuffer};
use zbsec_params::curves::CURVE25519_SIZE;
use zbsec_params::zigbee::{
    DERIVED_KEY_SIZE, DLK_KDF_INFO, MAC_PREAMBLE_INITIATOR, MAC_PREAMBLE_RESPONDER,
    MAC_PREAMBLE_SIZE,
};
use zeroize::Zeroizing;

/// Generator input of a negotiation
pub struct Generator {
    /// Curve25519 base point; `None` selects the standard P-256 generator
    pub point: Option<[u8; CURVE25519_SIZE]>,
    /// Bytes of `G` bound into the shared secret
    pub binding: Zeroizing<Vec<u8>>,
}

fn speke_candidate(
    engine: &CryptoEngine,
    hash: HashType,
    psk: &[u8],
    counter: u8,
) -> Result<Zeroizing<[u8; CURVE25519_SIZE]>> {
    let mut input = Zeroizing::new(Vec::with_capacity(psk.len() + 2));
    input.extend_from_slice(psk);
    input.push(counter);
    let mut u = Zeroizing::new([0u8; CURVE25519_SIZE]);
    match hash {
        HashType::Sha256 => u.copy_from_slice(&engine.sha256(&input)?),
        HashType::AesMmo128 => {
            for (half, chunk) in u.chunks_mut(16).enumerate() {
                input.push(half as u8);
                chunk.copy_from_slice(&engine.aes_mmo_128(&input)?);
                input.pop();
            }
        }
    }
    u[CURVE25519_SIZE - 1] &= 0x7F;
    Ok(u)
}

/// Generator derived from the pre-shared secret
pub fn generator(
    engine: &CryptoEngine,
    curve: CurveId,
    hash: HashType,
    psk: &[u8],
) -> Result<Generator> {
    match curve {
        CurveId::Curve25519 => {
            for counter in 0..=u8::MAX {
                let u = speke_candidate(engine, hash, psk, counter)?;
                if x25519::is_usable_base_point(&u) {
                    return Ok(Generator {
                        point: Some(*u),
                        binding: Zeroizing::new(u.to_vec()),
                    });
                }
            }
            Err(CryptoError::InvalidParameter {
                context: "SPEKE generator",
                reason: "no usable point for the secret",
            }
            .into())
        }
        CurveId::P256 => Ok(Generator {
            point: None,
            binding: Zeroizing::new(engine.hash(hash, psk)?),
        }),
        other => Err(CryptoError::UnsupportedCurve(other).into()),
    }
}

/// Session identifier `I`; the initiator's address and point come first
pub fn session_identifier(
    engine: &CryptoEngine,
    hash: HashType,
    initiator: (IeeeAddr, &[u8]),
    responder: (IeeeAddr, &[u8]),
) -> Result<Vec<u8>> {
    let mut input = Vec::with_capacity(16 + initiator.1.len() + responder.1.len());
    for (addr, point) in [initiator, responder] {
        input.extend_from_slice(&addr.to_le_bytes());
        input.extend_from_slice(point);
    }
    engine.hash(hash, &input)
}

/// Shared secret `s = H(x_k || I || G)`
pub fn shared_secret(
    engine: &CryptoEngine,
    hash: HashType,
    xk: &[u8],
    session_id: &[u8],
    binding: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let mut input = Zeroizing::new(Vec::with_capacity(xk.len() + session_id.len() + binding.len()));
    input.extend_from_slice(xk);
    input.extend_from_slice(session_id);
    input.extend_from_slice(binding);
    Ok(Zeroizing::new(engine.hash(hash, &input)?))
}

/// Link key from the shared secret
pub fn link_key(
    engine: &CryptoEngine,
    hash: HashType,
    secret: &[u8],
) -> Result<SecretBuffer<DERIVED_KEY_SIZE>> {
    match hash {
        HashType::Sha256 => {
            let okm = engine.hkdf_expand(secret, DLK_KDF_INFO, DERIVED_KEY_SIZE)?;
            SecretBuffer::from_slice(&okm)
        }
        HashType::AesMmo128 => Ok(SecretBuffer::new(engine.aes_mmo_128(secret)?)),
    }
}

/// Which side produced a confirmation tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOrigin {
    /// `KC_2_U`
    Initiator,
    /// `KC_2_V`
    Responder,
}

impl TagOrigin {
    fn preamble(&self) -> &'static [u8; MAC_PREAMBLE_SIZE] {
        match self {
            TagOrigin::Initiator => &MAC_PREAMBLE_INITIATOR,
            TagOrigin::Responder => &MAC_PREAMBLE_RESPONDER,
        }
    }
}

/// Addresses and points of a tag, from the producer's point of view
#[derive(Debug, Clone, Copy)]
pub struct TagInput<'a> {
    /// Producer of the tag
    pub origin: TagOrigin,
    /// Producer's address
    pub own: IeeeAddr,
    /// Other side's address
    pub peer: IeeeAddr,
    /// Producer's public point
    pub own_point: &'a [u8],
    /// Other side's public point
    pub peer_point: &'a [u8],
}

/// Key confirmation tag
pub fn confirmation_tag(
    engine: &CryptoEngine,
    hash: HashType,
    key: &[u8],
    input: &TagInput<'_>,
) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(
        MAC_PREAMBLE_SIZE + 16 + input.own_point.len() + input.peer_point.len(),
    );
    data.extend_from_slice(input.origin.preamble());
    data.extend_from_slice(&input.own.to_le_bytes());
    data.extend_from_slice(&input.peer.to_le_bytes());
    data.extend_from_slice(input.own_point);
    data.extend_from_slice(input.peer_point);
    engine.hmac(hash, key, &data)
}

/// Recompute a received tag and compare in constant time
pub fn verify_tag(
    engine: &CryptoEngine,
    hash: HashType,
    key: &[u8],
    input: &TagInput<'_>,
    received: &[u8],
) -> Result<bool> {
    let expected = confirmation_tag(engine, hash, key, input)?;
    Ok(ct_eq(&expected, received))
}
