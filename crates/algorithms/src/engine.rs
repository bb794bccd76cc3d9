//! Engine facade over a [`CryptoBackend`]
//!
//! The engine owns the backend chosen at startup and layers the
//! constructions every backend shares on top of it: AES-MMO, the Zigbee
//! keyed hash, HKDF, curve point validation and key generation. A backend
//! only has to supply the primitives of the trait.

use rand::{CryptoRng, RngCore};
use zbsec_api::{CryptoBackend, CryptoError, CurveId, HashType, Key128, MicLength, Result};
use zbsec_common::{ct_is_zero, SecretBuffer};
use zbsec_params::curves::{CURVE25519_SIZE, P256_RAW_POINT_SIZE, P256_SCALAR_SIZE};
use zbsec_params::utils::hash::AES_MMO_OUTPUT_SIZE;
use zbsec_params::zigbee::SHARED_SECRET_SIZE;
use zeroize::{Zeroize, Zeroizing};

use crate::backend::SoftwareBackend;
use crate::ec::p256::{self, Scalar};
use crate::ec::{ecmqv, ecqv, x25519};
use crate::hash::AesMmo;
use crate::kdf::{hkdf_expand_with, hkdf_extract_with};
use crate::mac::keyed_hash::{hmac_mmo_with, validate_install_code};

/// Ephemeral or static key pair
pub struct KeyPair {
    /// Curve the pair belongs to
    pub curve: CurveId,
    /// Private scalar (clamped for Curve25519)
    pub private: SecretBuffer<32>,
    /// Public key in wire encoding
    pub public: Vec<u8>,
}

impl core::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeyPair")
            .field("curve", &self.curve)
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N]> {
    bytes.try_into().map_err(|_| {
        CryptoError::InvalidKeyLength {
            expected: N,
            actual: bytes.len(),
        }
        .into()
    })
}

fn require_supported(curve: CurveId) -> Result<()> {
    if !curve.is_supported() {
        return Err(CryptoError::UnsupportedCurve(curve).into());
    }
    Ok(())
}

/// Primitive crypto engine
pub struct CryptoEngine {
    backend: Box<dyn CryptoBackend>,
}

impl core::fmt::Debug for CryptoEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CryptoEngine")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl Default for CryptoEngine {
    fn default() -> Self {
        Self::software()
    }
}

impl CryptoEngine {
    /// Engine over an explicit backend
    pub fn new(backend: Box<dyn CryptoBackend>) -> Self {
        CryptoEngine { backend }
    }

    /// Engine over the bundled software backend
    pub fn software() -> Self {
        Self::new(Box::new(SoftwareBackend::new()))
    }

    /// Name of the active backend
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// The active backend
    pub fn backend(&self) -> &dyn CryptoBackend {
        self.backend.as_ref()
    }

    /// Encrypt one AES-128 block
    pub fn aes128_encrypt_block(&self, key: &Key128, plaintext: &[u8; 16]) -> Result<[u8; 16]> {
        let mut block = *plaintext;
        self.backend.aes128_encrypt_block(key, &mut block)?;
        Ok(block)
    }

    /// Decrypt one AES-128 block
    pub fn aes128_decrypt_block(&self, key: &Key128, ciphertext: &[u8; 16]) -> Result<[u8; 16]> {
        let mut block = *ciphertext;
        self.backend.aes128_decrypt_block(key, &mut block)?;
        Ok(block)
    }

    /// SHA-256 digest
    pub fn sha256(&self, input: &[u8]) -> Result<[u8; 32]> {
        self.backend.sha256(input)
    }

    /// HMAC-SHA-256 tag
    pub fn hmac_sha256(&self, key: &[u8], input: &[u8]) -> Result<[u8; 32]> {
        self.backend.hmac_sha256(key, input)
    }

    /// AES-MMO-128 digest
    pub fn aes_mmo_128(&self, input: &[u8]) -> Result<[u8; AES_MMO_OUTPUT_SIZE]> {
        let backend = self.backend.as_ref();
        let mut hasher = AesMmo::with_cipher(|key: &Key128, block: &mut [u8; 16]| {
            backend.aes128_encrypt_block(key, block)
        });
        hasher.update(input)?;
        hasher.finalize()
    }

    /// Digest with the hash of a negotiation method
    pub fn hash(&self, hash: HashType, input: &[u8]) -> Result<Vec<u8>> {
        match hash {
            HashType::Sha256 => Ok(self.sha256(input)?.to_vec()),
            HashType::AesMmo128 => Ok(self.aes_mmo_128(input)?.to_vec()),
        }
    }

    /// HMAC with the hash of a negotiation method
    pub fn hmac(&self, hash: HashType, key: &[u8], input: &[u8]) -> Result<Vec<u8>> {
        match hash {
            HashType::Sha256 => Ok(self.hmac_sha256(key, input)?.to_vec()),
            HashType::AesMmo128 => Ok(self.hmac_mmo(key, input)?.to_vec()),
        }
    }

    /// HMAC over AES-MMO
    pub fn hmac_mmo(&self, key: &[u8], input: &[u8]) -> Result<[u8; AES_MMO_OUTPUT_SIZE]> {
        hmac_mmo_with(|data| self.aes_mmo_128(data), key, input)
    }

    /// Zigbee keyed hash of one byte, deriving key-transport and key-load keys
    pub fn keyed_hash(&self, key: &Key128, input: u8) -> Result<Key128> {
        self.hmac_mmo(key, &[input])
    }

    /// Link key from an install code (CRC included)
    pub fn install_code_key(&self, code: &[u8]) -> Result<Key128> {
        validate_install_code(code)?;
        self.aes_mmo_128(code)
    }

    /// HKDF-Extract with HMAC-SHA-256
    pub fn hkdf_extract(&self, salt: &[u8], ikm: &[u8]) -> Result<[u8; 32]> {
        hkdf_extract_with(|k, m| self.hmac_sha256(k, m), salt, ikm)
    }

    /// HKDF-Expand with HMAC-SHA-256; `length <= 255 * 32`
    pub fn hkdf_expand(&self, prk: &[u8], info: &[u8], length: usize) -> Result<Zeroizing<Vec<u8>>> {
        hkdf_expand_with(|k, m| self.hmac_sha256(k, m), prk, info, length)
    }

    /// CCM* encryption, returns `ciphertext || mic`
    pub fn ccm_encrypt_and_authenticate(
        &self,
        key: &Key128,
        nonce: &[u8; 13],
        mic: MicLength,
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        self.backend
            .ccm_encrypt_and_authenticate(key, nonce, mic, aad, plaintext)
    }

    /// CCM* decryption; `AuthenticationFailed` releases no plaintext
    pub fn ccm_decrypt_and_authenticate(
        &self,
        key: &Key128,
        nonce: &[u8; 13],
        mic: MicLength,
        aad: &[u8],
        ciphertext_and_mic: &[u8],
    ) -> Result<Vec<u8>> {
        self.backend
            .ccm_decrypt_and_authenticate(key, nonce, mic, aad, ciphertext_and_mic)
    }

    /// Range, curve-equation and subgroup validation of a public key
    ///
    /// A point of the wrong length is invalid; a curve this build cannot
    /// compute on fails with `UnsupportedCurve`.
    pub fn validate_public_key(&self, curve: CurveId, point: &[u8]) -> Result<bool> {
        require_supported(curve)?;
        Ok(match curve {
            CurveId::P256 => match <&[u8; P256_RAW_POINT_SIZE]>::try_from(point) {
                Ok(raw) => p256::validate_public_key(raw),
                Err(_) => false,
            },
            _ => match <&[u8; CURVE25519_SIZE]>::try_from(point) {
                Ok(raw) => x25519::validate_public_key(raw),
                Err(_) => false,
            },
        })
    }

    /// ECDH shared secret
    ///
    /// The peer key is validated before any scalar multiplication and an
    /// all-zero result is rejected.
    pub fn ecdh_shared_secret(
        &self,
        curve: CurveId,
        private: &[u8],
        public: &[u8],
    ) -> Result<SecretBuffer<SHARED_SECRET_SIZE>> {
        require_supported(curve)?;
        if !self.validate_public_key(curve, public)? {
            return Err(CryptoError::InvalidPeerKey.into());
        }
        let mut scalar: [u8; 32] = fixed(private)?;
        let shared = match curve {
            CurveId::P256 => self.backend.p256_ecdh(&scalar, &fixed(public)?),
            _ => self.backend.x25519(&scalar, &fixed(public)?),
        };
        scalar.zeroize();
        let shared = SecretBuffer::new(shared?);
        if ct_is_zero(shared.as_slice()) {
            return Err(CryptoError::InvalidPeerKey.into());
        }
        Ok(shared)
    }

    /// Key pair from caller-supplied randomness
    ///
    /// Exactly `curve.random_input_len()` bytes are required: 64 for P-256
    /// (reduced modulo the order), 32 for Curve25519 (clamped).
    pub fn key_generation(&self, curve: CurveId, randomness: &[u8]) -> Result<KeyPair> {
        require_supported(curve)?;
        match curve {
            CurveId::P256 => {
                let mut wide: [u8; 2 * P256_SCALAR_SIZE] = fixed(randomness)?;
                let scalar = Scalar::from_wide(&wide);
                wide.zeroize();
                if scalar.is_zero() {
                    return Err(CryptoError::InvalidPrivateKey.into());
                }
                let private = SecretBuffer::new(scalar.to_be_bytes());
                let public = self.backend.p256_mul_base(private.expose())?;
                Ok(KeyPair {
                    curve,
                    private,
                    public: public.to_vec(),
                })
            }
            _ => self.key_generation_with_base(randomness, &x25519::base_point()),
        }
    }

    /// Curve25519 key pair over a caller-chosen generator
    ///
    /// Used by password-bound negotiation, where the generator is derived
    /// from the shared secret. The generator must pass
    /// [`x25519::is_usable_base_point`].
    pub fn key_generation_with_base(
        &self,
        randomness: &[u8],
        base: &[u8; CURVE25519_SIZE],
    ) -> Result<KeyPair> {
        let mut raw: [u8; CURVE25519_SIZE] = fixed(randomness)?;
        if !x25519::is_usable_base_point(base) {
            raw.zeroize();
            return Err(CryptoError::InvalidParameter {
                context: "Curve25519 generator",
                reason: "not a usable base point",
            }
            .into());
        }
        let private = SecretBuffer::new(x25519::clamp(&raw));
        raw.zeroize();
        let public = self.backend.x25519(private.expose(), base)?;
        Ok(KeyPair {
            curve: CurveId::Curve25519,
            private,
            public: public.to_vec(),
        })
    }

    /// Key pair from an RNG
    pub fn generate_key_pair<R: RngCore + CryptoRng>(
        &self,
        curve: CurveId,
        rng: &mut R,
    ) -> Result<KeyPair> {
        require_supported(curve)?;
        let mut randomness = Zeroizing::new(vec![0u8; curve.random_input_len()]);
        rng.fill_bytes(&mut randomness);
        self.key_generation(curve, &randomness)
    }

    /// ECQV public key of a certificate subject; `cert` is the encoded
    /// certificate whose SHA-256 hash gives `e`
    pub fn ecqv_public_key(
        &self,
        cert: &[u8],
        reconstruction_point: &[u8],
        ca_public_key: &[u8],
    ) -> Result<[u8; P256_RAW_POINT_SIZE]> {
        let e = self.sha256(cert)?;
        ecqv::reconstruct_public_key(&e, &fixed(reconstruction_point)?, &fixed(ca_public_key)?)
    }

    /// ECQV private key of a certificate subject
    pub fn ecqv_private_key(
        &self,
        cert: &[u8],
        request_private: &[u8],
        reconstruction_value: &[u8],
    ) -> Result<SecretBuffer<P256_SCALAR_SIZE>> {
        let e = self.sha256(cert)?;
        ecqv::reconstruct_private_key(&e, &fixed(request_private)?, &fixed(reconstruction_value)?)
    }

    /// ECMQV shared secret over P-256
    pub fn ecmqv_shared_secret(
        &self,
        own: &ecmqv::MqvKeys<'_>,
        peer_static: &[u8],
        peer_ephemeral: &[u8],
    ) -> Result<SecretBuffer<SHARED_SECRET_SIZE>> {
        let z = ecmqv::shared_secret(own, &fixed(peer_static)?, &fixed(peer_ephemeral)?)?;
        Ok(SecretBuffer::new(z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use zbsec_api::Error;

    #[test]
    fn unsupported_curves() {
        let engine = CryptoEngine::software();
        for curve in [CurveId::Sect163k1, CurveId::Sect283k1] {
            assert_eq!(
                engine.key_generation(curve, &[1u8; 36]).unwrap_err(),
                Error::Crypto(CryptoError::UnsupportedCurve(curve))
            );
            assert!(engine.validate_public_key(curve, &[0u8; 37]).is_err());
        }
    }

    #[test]
    fn randomness_length_is_exact() {
        let engine = CryptoEngine::software();
        assert_eq!(
            engine.key_generation(CurveId::P256, &[1u8; 32]).unwrap_err(),
            Error::Crypto(CryptoError::InvalidKeyLength {
                expected: 64,
                actual: 32
            })
        );
        assert!(engine.key_generation(CurveId::Curve25519, &[1u8; 64]).is_err());
        assert_eq!(
            engine
                .key_generation(CurveId::P256, &[1u8; 64])
                .unwrap()
                .public
                .len(),
            64
        );
    }

    #[test]
    fn ecdh_symmetry_on_both_curves() {
        let engine = CryptoEngine::software();
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        for curve in [CurveId::P256, CurveId::Curve25519] {
            let a = engine.generate_key_pair(curve, &mut rng).unwrap();
            let b = engine.generate_key_pair(curve, &mut rng).unwrap();
            let ab = engine
                .ecdh_shared_secret(curve, a.private.as_slice(), &b.public)
                .unwrap();
            let ba = engine
                .ecdh_shared_secret(curve, b.private.as_slice(), &a.public)
                .unwrap();
            assert!(ab.ct_eq(&ba));
        }
    }

    #[test]
    fn invalid_peer_never_multiplied() {
        let engine = CryptoEngine::software();
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let a = engine.generate_key_pair(CurveId::Curve25519, &mut rng).unwrap();
        let err = engine
            .ecdh_shared_secret(CurveId::Curve25519, a.private.as_slice(), &[0u8; 32])
            .unwrap_err();
        assert_eq!(err, Error::Crypto(CryptoError::InvalidPeerKey));
        assert!(!engine
            .validate_public_key(CurveId::P256, &[0u8; 63])
            .unwrap());
    }

    #[test]
    fn mmo_and_keyed_hash_on_engine() {
        let engine = CryptoEngine::software();
        let code = hex::decode("83FED3407A939723A5C639B26916D505C3B5").unwrap();
        assert_eq!(
            hex::encode(engine.install_code_key(&code).unwrap()),
            "66b6900981e1ee3ca4206b6b861c02bb"
        );
        let key: Key128 = hex::decode("404142434445464748494A4B4C4D4E4F")
            .unwrap()
            .try_into()
            .unwrap();
        assert_eq!(
            hex::encode_upper(engine.keyed_hash(&key, 0xC0).unwrap()),
            "4512807BF94CB3400F0E2C25FB76E999"
        );
    }

    /// CA-side issuance: `P_U = k_U*G + k*G`, `r = e*k + d_CA`
    fn issue(
        engine: &CryptoEngine,
        ca_private: &[u8; 32],
        request_private: &[u8; 32],
        subject: u64,
    ) -> (Vec<u8>, [u8; 64], [u8; 32]) {
        let k = Scalar::from_u64(subject ^ 0x5A5A_5A5A).to_be_bytes();
        let request_public = p256::mul_base(request_private).unwrap();
        let p_u = p256::ProjectivePoint::from(p256::AffinePoint::from_raw(&request_public).unwrap())
            .add(&p256::ProjectivePoint::from(
                p256::AffinePoint::from_raw(&p256::mul_base(&k).unwrap()).unwrap(),
            ))
            .to_affine()
            .unwrap()
            .to_raw();
        let mut cert = subject.to_be_bytes().to_vec();
        cert.extend_from_slice(&p_u);
        let e = Scalar::from_be_bytes_reduced(&engine.sha256(&cert).unwrap());
        let r = e
            .mul(&Scalar::from_be_bytes(&k).unwrap())
            .add(&Scalar::from_be_bytes(ca_private).unwrap())
            .to_be_bytes();
        (cert, p_u, r)
    }

    #[test]
    fn certificate_keys_feed_ecmqv() {
        let engine = CryptoEngine::software();
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let ca_private = Scalar::from_u64(0x00CA_00CA_00CA).to_be_bytes();
        let ca_public = p256::mul_base(&ca_private).unwrap();

        let mut parties = Vec::new();
        for (subject, request) in [(0x0011_2233_4455_6677u64, 0xA11CEu64), (0x8899_AABB_CCDD_EEFF, 0xB0B)] {
            let request = Scalar::from_u64(request).to_be_bytes();
            let (cert, p_u, r) = issue(&engine, &ca_private, &request, subject);
            let private = engine.ecqv_private_key(&cert, &request, &r).unwrap();
            let public = engine.ecqv_public_key(&cert, &p_u, &ca_public).unwrap();
            assert!(ecqv::verify_key_pair(private.expose(), &public).unwrap());
            // the hash covers the whole certificate
            let mut altered = cert.clone();
            altered[0] ^= 1;
            assert_ne!(engine.ecqv_public_key(&altered, &p_u, &ca_public).unwrap(), public);

            let ephemeral = engine.generate_key_pair(CurveId::P256, &mut rng).unwrap();
            parties.push((private, public, ephemeral));
        }
        assert!(engine.ecqv_public_key(b"cert", &[0u8; 63], &ca_public).is_err());

        let (a, b) = (&parties[0], &parties[1]);
        let secret = |own: &(SecretBuffer<32>, [u8; 64], KeyPair), peer: &(SecretBuffer<32>, [u8; 64], KeyPair)| {
            let ephemeral_public: [u8; 64] = own.2.public.as_slice().try_into().unwrap();
            let keys = ecmqv::MqvKeys {
                static_private: own.0.expose(),
                ephemeral_private: own.2.private.expose(),
                ephemeral_public: &ephemeral_public,
            };
            engine.ecmqv_shared_secret(&keys, &peer.1, &peer.2.public).unwrap()
        };
        assert!(secret(a, b).ct_eq(&secret(b, a)));
        assert!(engine.ecmqv_shared_secret(
            &ecmqv::MqvKeys {
                static_private: a.0.expose(),
                ephemeral_private: a.2.private.expose(),
                ephemeral_public: &[0u8; 64],
            },
            &b.1,
            &b.2.public[..32],
        )
        .is_err());
    }

    #[test]
    fn custom_generator_rejected_when_unusable() {
        let engine = CryptoEngine::software();
        let mut small = [0u8; 32];
        small[0] = 1;
        assert!(engine.key_generation_with_base(&[7u8; 32], &small).is_err());
        let pair = engine
            .key_generation_with_base(&[7u8; 32], &x25519::base_point())
            .unwrap();
        assert!(engine
            .validate_public_key(CurveId::Curve25519, &pair.public)
            .unwrap());
    }
}
