//! AES-MMO-128, the Matyas-Meyer-Oseas hash of the Zigbee specification
//!
//! `H_0 = 0`, `H_j = E(H_{j-1}, M_j) XOR M_j` over 16-byte blocks. The
//! message is padded with a single `1` bit, zero bits up to `n - 16` bits
//! modulo the block size and the 16-bit big-endian bit length. Messages
//! whose bit length does not fit in 16 bits use the long form: zero fill to
//! `n - 48` bits, a 32-bit bit length, then 16 zero bits.
//!
//! The block cipher is supplied by the caller so the engine can run the
//! hash on whichever backend it was configured with.

use zbsec_api::{CryptoError, Key128, Result};
use zbsec_common::EphemeralSecret;
use zbsec_params::utils::hash::{
    AES_MMO_MAX_INPUT, AES_MMO_OUTPUT_SIZE, AES_MMO_SHORT_FORM_MAX_BITS,
};
use zbsec_params::utils::symmetric::AES_BLOCK_SIZE;
use zeroize::Zeroize;

use crate::block::Aes128;

/// Incremental AES-MMO state
///
/// `E` is `(key, block) -> Result<()>`, encrypting `block` in place.
pub struct AesMmo<E>
where
    E: FnMut(&Key128, &mut [u8; 16]) -> Result<()>,
{
    encrypt: E,
    chain: EphemeralSecret<[u8; AES_BLOCK_SIZE]>,
    buffer: EphemeralSecret<[u8; AES_BLOCK_SIZE]>,
    buffer_idx: usize,
    total_bytes: usize,
}

impl<E> AesMmo<E>
where
    E: FnMut(&Key128, &mut [u8; 16]) -> Result<()>,
{
    /// Start a hash over the given block cipher
    pub fn with_cipher(encrypt: E) -> Self {
        AesMmo {
            encrypt,
            chain: EphemeralSecret::new([0u8; AES_BLOCK_SIZE]),
            buffer: EphemeralSecret::new([0u8; AES_BLOCK_SIZE]),
            buffer_idx: 0,
            total_bytes: 0,
        }
    }

    fn process_block(&mut self, block: &[u8; AES_BLOCK_SIZE]) -> Result<()> {
        let mut out = *block;
        let key: Key128 = *self.chain;
        (self.encrypt)(&key, &mut out)?;
        for (h, (o, m)) in self.chain.iter_mut().zip(out.iter().zip(block.iter())) {
            *h = o ^ m;
        }
        out.zeroize();
        Ok(())
    }

    /// Absorb more input
    pub fn update(&mut self, mut input: &[u8]) -> Result<()> {
        let total = self.total_bytes.saturating_add(input.len());
        if total > AES_MMO_MAX_INPUT {
            return Err(CryptoError::HashInputTooLarge(total).into());
        }
        self.total_bytes = total;

        while !input.is_empty() {
            let fill = core::cmp::min(input.len(), AES_BLOCK_SIZE - self.buffer_idx);
            self.buffer[self.buffer_idx..self.buffer_idx + fill].copy_from_slice(&input[..fill]);
            self.buffer_idx += fill;
            input = &input[fill..];
            if self.buffer_idx == AES_BLOCK_SIZE {
                let block = *self.buffer;
                self.process_block(&block)?;
                self.buffer_idx = 0;
            }
        }
        Ok(())
    }

    /// Pad and produce the digest
    pub fn finalize(mut self) -> Result<[u8; AES_MMO_OUTPUT_SIZE]> {
        let bit_len = (self.total_bytes as u64) * 8;
        let mut trailer = [0u8; 6];
        let trailer = if bit_len <= AES_MMO_SHORT_FORM_MAX_BITS {
            trailer[..2].copy_from_slice(&(bit_len as u16).to_be_bytes());
            &trailer[..2]
        } else {
            trailer[..4].copy_from_slice(&(bit_len as u32).to_be_bytes());
            &trailer[..]
        };

        self.absorb_padding(0x80)?;
        while self.buffer_idx != AES_BLOCK_SIZE - trailer.len() {
            self.absorb_padding(0x00)?;
        }
        for &b in trailer {
            self.absorb_padding(b)?;
        }
        debug_assert_eq!(self.buffer_idx, 0);
        Ok(*self.chain)
    }

    fn absorb_padding(&mut self, byte: u8) -> Result<()> {
        self.buffer[self.buffer_idx] = byte;
        self.buffer_idx += 1;
        if self.buffer_idx == AES_BLOCK_SIZE {
            let block = *self.buffer;
            self.process_block(&block)?;
            self.buffer_idx = 0;
        }
        Ok(())
    }
}

/// One-shot AES-MMO over the bundled software AES
pub fn aes_mmo_128(input: &[u8]) -> Result<[u8; AES_MMO_OUTPUT_SIZE]> {
    let mut hasher = AesMmo::with_cipher(|key: &Key128, block: &mut [u8; 16]| {
        Aes128::new(key).encrypt_block(block);
        Ok(())
    });
    hasher.update(input)?;
    hasher.finalize()
}
