//! CCM* (IEEE 802.15.4 Annex B, Zigbee Annex A)
//!
//! CCM with a 13-byte nonce, a 2-byte length field and a MIC of 0, 4, 8 or
//! 16 bytes. A zero-length MIC gives encryption without authentication, the
//! extension CCM* adds over RFC 3610.

use zbsec_api::{MicLength, Result};
use zbsec_common::ct_eq;
use zbsec_params::utils::symmetric::{
    AES_BLOCK_SIZE, CCM_LENGTH_FIELD_SIZE, CCM_MAX_MESSAGE_SIZE, CCM_NONCE_SIZE,
};
use zeroize::{Zeroize, Zeroizing};

use crate::block::Aes128;
use crate::error::validate;

/// Associated data must stay below `2^16 - 2^8` to use the 2-byte encoding
const MAX_AAD_SIZE: usize = 0xFEFF;

/// CCM* over the software AES
pub struct CcmStar {
    cipher: Aes128,
    mic: MicLength,
}

impl CcmStar {
    /// Bind a key schedule and a MIC length
    pub fn new(cipher: Aes128, mic: MicLength) -> Self {
        CcmStar { cipher, mic }
    }

    fn check_lengths(aad: &[u8], message_len: usize) -> Result<()> {
        validate::max_length("CCM* associated data", aad.len(), MAX_AAD_SIZE)?;
        validate::max_length("CCM* message", message_len, CCM_MAX_MESSAGE_SIZE)
    }

    /// Counter block `A_i`
    fn counter_block(nonce: &[u8; CCM_NONCE_SIZE], i: u16) -> [u8; AES_BLOCK_SIZE] {
        let mut a = [0u8; AES_BLOCK_SIZE];
        a[0] = (CCM_LENGTH_FIELD_SIZE - 1) as u8;
        a[1..1 + CCM_NONCE_SIZE].copy_from_slice(nonce);
        a[14..].copy_from_slice(&i.to_be_bytes());
        a
    }

    /// CBC-MAC over `B_0 || encoded aad || message`, truncated to the MIC
    fn authenticate(
        &self,
        nonce: &[u8; CCM_NONCE_SIZE],
        aad: &[u8],
        message: &[u8],
    ) -> [u8; AES_BLOCK_SIZE] {
        let m = self.mic.len();
        let mut x = [0u8; AES_BLOCK_SIZE];
        x[0] = (if aad.is_empty() { 0 } else { 0x40 })
            | ((((m as u8).saturating_sub(2)) / 2) << 3)
            | (CCM_LENGTH_FIELD_SIZE - 1) as u8;
        x[1..1 + CCM_NONCE_SIZE].copy_from_slice(nonce);
        x[14..].copy_from_slice(&(message.len() as u16).to_be_bytes());
        self.cipher.encrypt_block(&mut x);

        if !aad.is_empty() {
            let mut encoded = Zeroizing::new(Vec::with_capacity(aad.len() + 2));
            encoded.extend_from_slice(&(aad.len() as u16).to_be_bytes());
            encoded.extend_from_slice(aad);
            self.mac_blocks(&mut x, &encoded);
        }
        self.mac_blocks(&mut x, message);
        x
    }

    /// Chain zero-padded blocks of `data` into the CBC-MAC state
    fn mac_blocks(&self, x: &mut [u8; AES_BLOCK_SIZE], data: &[u8]) {
        for chunk in data.chunks(AES_BLOCK_SIZE) {
            for (xi, d) in x.iter_mut().zip(chunk) {
                *xi ^= d;
            }
            self.cipher.encrypt_block(x);
        }
    }

    /// XOR the CTR keystream starting at `A_1` into `data`
    fn apply_keystream(&self, nonce: &[u8; CCM_NONCE_SIZE], data: &mut [u8]) {
        let mut counter = 1u16;
        for chunk in data.chunks_mut(AES_BLOCK_SIZE) {
            let mut s = Self::counter_block(nonce, counter);
            self.cipher.encrypt_block(&mut s);
            for (d, k) in chunk.iter_mut().zip(s.iter()) {
                *d ^= k;
            }
            s.zeroize();
            counter = counter.wrapping_add(1);
        }
    }

    /// Encrypted MIC `U = T XOR S_0`, truncated to the MIC length
    fn encrypted_tag(&self, nonce: &[u8; CCM_NONCE_SIZE], mut tag: [u8; AES_BLOCK_SIZE]) -> Vec<u8> {
        let mut s0 = Self::counter_block(nonce, 0);
        self.cipher.encrypt_block(&mut s0);
        for (t, s) in tag.iter_mut().zip(s0.iter()) {
            *t ^= s;
        }
        s0.zeroize();
        let out = tag[..self.mic.len()].to_vec();
        tag.zeroize();
        out
    }

    /// Encrypt `plaintext` and append the encrypted MIC
    pub fn encrypt(&self, nonce: &[u8; CCM_NONCE_SIZE], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        Self::check_lengths(aad, plaintext.len())?;

        let mut out = Vec::with_capacity(plaintext.len() + self.mic.len());
        out.extend_from_slice(plaintext);
        self.apply_keystream(nonce, &mut out);

        if !self.mic.is_empty() {
            let tag = self.authenticate(nonce, aad, plaintext);
            out.extend_from_slice(&self.encrypted_tag(nonce, tag));
        }
        Ok(out)
    }

    /// Verify and decrypt `ciphertext || mic`
    ///
    /// The plaintext is only released after the MIC verifies; on failure the
    /// scratch copy is wiped.
    pub fn decrypt(
        &self,
        nonce: &[u8; CCM_NONCE_SIZE],
        aad: &[u8],
        ciphertext_and_mic: &[u8],
    ) -> Result<Vec<u8>> {
        let m = self.mic.len();
        validate::min_length("CCM* ciphertext", ciphertext_and_mic.len(), m)?;
        let (ciphertext, received) = ciphertext_and_mic.split_at(ciphertext_and_mic.len() - m);
        Self::check_lengths(aad, ciphertext.len())?;

        let mut plaintext = Zeroizing::new(ciphertext.to_vec());
        self.apply_keystream(nonce, &mut plaintext);

        if m > 0 {
            let tag = self.authenticate(nonce, aad, &plaintext);
            let expected = Zeroizing::new(self.encrypted_tag(nonce, tag));
            validate::authentication(ct_eq(&expected[..], received))?;
        }
        Ok(core::mem::take(&mut *plaintext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(hex_str: &str) -> [u8; 16] {
        hex::decode(hex_str).unwrap().try_into().unwrap()
    }

    fn nonce(hex_str: &str) -> [u8; 13] {
        hex::decode(hex_str).unwrap().try_into().unwrap()
    }

    #[test]
    fn rfc3610_packet_vector_1() {
        let k = key("C0C1C2C3C4C5C6C7C8C9CACBCCCDCECF");
        let n = nonce("00000003020100A0A1A2A3A4A5");
        let aad = hex::decode("0001020304050607").unwrap();
        let pt = hex::decode("08090A0B0C0D0E0F101112131415161718191A1B1C1D1E").unwrap();

        let ccm = CcmStar::new(Aes128::new(&k), MicLength::M8);
        let ct = ccm.encrypt(&n, &aad, &pt).unwrap();
        assert_eq!(
            hex::encode_upper(&ct),
            "588C979A61C663D2F066D0C2C0F989806D5F6B61DAC38417E8D12CFDF926E0"
        );
        assert_eq!(ccm.decrypt(&n, &aad, &ct).unwrap(), pt);
    }

    #[test]
    fn encryption_only_level() {
        let k = [0x11u8; 16];
        let n = [0x22u8; 13];
        let ccm = CcmStar::new(Aes128::new(&k), MicLength::M0);
        let ct = ccm.encrypt(&n, b"header", b"payload").unwrap();
        assert_eq!(ct.len(), 7);
        assert_eq!(ccm.decrypt(&n, b"other header", &ct).unwrap(), b"payload");
    }

    #[test]
    fn tamper_detected() {
        let k = [0x11u8; 16];
        let n = [0x22u8; 13];
        for mic in [MicLength::M4, MicLength::M8, MicLength::M16] {
            let ccm = CcmStar::new(Aes128::new(&k), mic);
            let mut ct = ccm.encrypt(&n, b"hdr", b"twenty byte payload!").unwrap();
            assert_eq!(ct.len(), 20 + mic.len());
            ct[3] ^= 0x01;
            let err = ccm.decrypt(&n, b"hdr", &ct).unwrap_err();
            assert!(err.is_authentication_failure());
        }
    }

    #[test]
    fn aad_only_authentication() {
        let ccm = CcmStar::new(Aes128::new(&[3u8; 16]), MicLength::M4);
        let n = [4u8; 13];
        let tag = ccm.encrypt(&n, b"beacon", b"").unwrap();
        assert_eq!(tag.len(), 4);
        assert!(ccm.decrypt(&n, b"beacon", &tag).unwrap().is_empty());
        assert!(ccm.decrypt(&n, b"beacoN", &tag).is_err());
    }

    #[test]
    fn short_input_rejected() {
        let ccm = CcmStar::new(Aes128::new(&[3u8; 16]), MicLength::M8);
        assert!(ccm.decrypt(&[0u8; 13], b"", &[0u8; 7]).is_err());
    }
}
