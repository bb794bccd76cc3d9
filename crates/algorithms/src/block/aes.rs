//! AES-128 block cipher (FIPS 197)
//!
//! Every primitive of the security core above the block level (AES-MMO,
//! the keyed hash, CCM*) is built from this one cipher, so it is written to
//! avoid secret-indexed table lookups: the S-box is computed arithmetically
//! as an inversion in GF(2^8) followed by the affine map.

use core::sync::atomic::{compiler_fence, Ordering};

use byteorder::{BigEndian, ByteOrder};
use zbsec_api::Key128;
use zbsec_common::SecretBuffer;
use zbsec_params::utils::symmetric::AES_BLOCK_SIZE;
use zeroize::{Zeroize, ZeroizeOnDrop};

const ROUNDS: usize = 10;
const ROUND_KEY_BYTES: usize = (ROUNDS + 1) * AES_BLOCK_SIZE;

/// Round constants for key expansion
const RCON: [u32; 11] = [
    0x00000000, 0x01000000, 0x02000000, 0x04000000, 0x08000000, 0x10000000, 0x20000000,
    0x40000000, 0x80000000, 0x1b000000, 0x36000000,
];

/// Multiply in GF(2^8) modulo x^8 + x^4 + x^3 + x + 1 without branches
#[inline(always)]
fn gf_mul(mut a: u8, mut b: u8) -> u8 {
    let mut p = 0u8;
    for _ in 0..8 {
        let mask = (b & 1).wrapping_neg();
        p ^= a & mask;
        let carry = (a >> 7).wrapping_neg();
        a = (a << 1) ^ (carry & 0x1b);
        b >>= 1;
    }
    p
}

/// `x^254`, the multiplicative inverse for non-zero `x` and 0 for 0
#[inline(always)]
fn gf_inv(x: u8) -> u8 {
    let x2 = gf_mul(x, x);
    let x4 = gf_mul(x2, x2);
    let x8 = gf_mul(x4, x4);
    let x16 = gf_mul(x8, x8);
    let x32 = gf_mul(x16, x16);
    let x64 = gf_mul(x32, x32);
    let x128 = gf_mul(x64, x64);
    let mut y = gf_mul(x128, x64);
    y = gf_mul(y, x32);
    y = gf_mul(y, x16);
    y = gf_mul(y, x8);
    y = gf_mul(y, x4);
    gf_mul(y, x2)
}

#[inline(always)]
fn sbox(x: u8) -> u8 {
    let i = gf_inv(x);
    i ^ i.rotate_left(1) ^ i.rotate_left(2) ^ i.rotate_left(3) ^ i.rotate_left(4) ^ 0x63
}

#[inline(always)]
fn inv_sbox(x: u8) -> u8 {
    let y = x ^ 0x63;
    gf_inv(y.rotate_left(1) ^ y.rotate_left(3) ^ y.rotate_left(6))
}

#[inline(always)]
fn sub_word(word: u32) -> u32 {
    let mut bytes = [0u8; 4];
    BigEndian::write_u32(&mut bytes, word);
    for b in bytes.iter_mut() {
        *b = sbox(*b);
    }
    BigEndian::read_u32(&bytes)
}

#[inline(always)]
fn xtime(byte: u8) -> u8 {
    (byte << 1) ^ ((byte >> 7).wrapping_neg() & 0x1b)
}

/// AES-128 with an expanded, zeroizing key schedule
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Aes128 {
    round_keys: SecretBuffer<ROUND_KEY_BYTES>,
}

impl Aes128 {
    /// Expand `key` into the round key schedule
    pub fn new(key: &Key128) -> Self {
        let mut words = [0u32; 4 * (ROUNDS + 1)];
        for (i, chunk) in key.chunks_exact(4).enumerate() {
            words[i] = BigEndian::read_u32(chunk);
        }
        for i in 4..words.len() {
            let mut temp = words[i - 1];
            if i % 4 == 0 {
                temp = sub_word(temp.rotate_left(8)) ^ RCON[i / 4];
            }
            words[i] = words[i - 4] ^ temp;
        }

        let mut schedule = [0u8; ROUND_KEY_BYTES];
        for (word, out) in words.iter().zip(schedule.chunks_exact_mut(4)) {
            BigEndian::write_u32(out, *word);
        }
        words.zeroize();

        let round_keys = SecretBuffer::new(schedule);
        schedule.zeroize();
        Aes128 { round_keys }
    }

    fn round_key(&self, round: usize) -> &[u8] {
        &self.round_keys.as_slice()[round * AES_BLOCK_SIZE..(round + 1) * AES_BLOCK_SIZE]
    }

    fn add_round_key(state: &mut [u8; 16], round_key: &[u8]) {
        for (s, k) in state.iter_mut().zip(round_key) {
            *s ^= k;
        }
    }

    fn sub_bytes(state: &mut [u8; 16]) {
        for byte in state.iter_mut() {
            *byte = sbox(*byte);
        }
        compiler_fence(Ordering::SeqCst);
    }

    fn inv_sub_bytes(state: &mut [u8; 16]) {
        for byte in state.iter_mut() {
            *byte = inv_sbox(*byte);
        }
        compiler_fence(Ordering::SeqCst);
    }

    /// Row `r` of column `c` lives at `state[4 * c + r]`
    fn shift_rows(state: &mut [u8; 16]) {
        let t = *state;
        for c in 0..4 {
            for r in 1..4 {
                state[4 * c + r] = t[4 * ((c + r) % 4) + r];
            }
        }
    }

    fn inv_shift_rows(state: &mut [u8; 16]) {
        let t = *state;
        for c in 0..4 {
            for r in 1..4 {
                state[4 * ((c + r) % 4) + r] = t[4 * c + r];
            }
        }
    }

    fn mix_columns(state: &mut [u8; 16]) {
        for col in state.chunks_exact_mut(4) {
            let (s0, s1, s2, s3) = (col[0], col[1], col[2], col[3]);
            col[0] = xtime(s0) ^ xtime(s1) ^ s1 ^ s2 ^ s3;
            col[1] = s0 ^ xtime(s1) ^ xtime(s2) ^ s2 ^ s3;
            col[2] = s0 ^ s1 ^ xtime(s2) ^ xtime(s3) ^ s3;
            col[3] = xtime(s0) ^ s0 ^ s1 ^ s2 ^ xtime(s3);
        }
    }

    fn inv_mix_columns(state: &mut [u8; 16]) {
        for col in state.chunks_exact_mut(4) {
            let (s0, s1, s2, s3) = (col[0], col[1], col[2], col[3]);
            col[0] = gf_mul(s0, 14) ^ gf_mul(s1, 11) ^ gf_mul(s2, 13) ^ gf_mul(s3, 9);
            col[1] = gf_mul(s0, 9) ^ gf_mul(s1, 14) ^ gf_mul(s2, 11) ^ gf_mul(s3, 13);
            col[2] = gf_mul(s0, 13) ^ gf_mul(s1, 9) ^ gf_mul(s2, 14) ^ gf_mul(s3, 11);
            col[3] = gf_mul(s0, 11) ^ gf_mul(s1, 13) ^ gf_mul(s2, 9) ^ gf_mul(s3, 14);
        }
    }

    /// Encrypt one block in place
    pub fn encrypt_block(&self, block: &mut [u8; 16]) {
        Self::add_round_key(block, self.round_key(0));
        for round in 1..ROUNDS {
            Self::sub_bytes(block);
            Self::shift_rows(block);
            Self::mix_columns(block);
            Self::add_round_key(block, self.round_key(round));
        }
        Self::sub_bytes(block);
        Self::shift_rows(block);
        Self::add_round_key(block, self.round_key(ROUNDS));
    }

    /// Decrypt one block in place
    pub fn decrypt_block(&self, block: &mut [u8; 16]) {
        Self::add_round_key(block, self.round_key(ROUNDS));
        for round in (1..ROUNDS).rev() {
            Self::inv_shift_rows(block);
            Self::inv_sub_bytes(block);
            Self::add_round_key(block, self.round_key(round));
            Self::inv_mix_columns(block);
        }
        Self::inv_shift_rows(block);
        Self::inv_sub_bytes(block);
        Self::add_round_key(block, self.round_key(0));
    }
}
