//! SHA-256 (FIPS 180-4)

use core::sync::atomic::{compiler_fence, Ordering};

use byteorder::{BigEndian, ByteOrder};
use zbsec_common::{EphemeralSecret, ZeroizeGuard};
use zbsec_params::utils::hash::{SHA256_BLOCK_SIZE, SHA256_OUTPUT_SIZE};
use zeroize::Zeroize;

const K256: [u32; 64] = [
    0x428a2f98, 0x71374491, 0xb5c0fbcf, 0xe9b5dba5, 0x3956c25b, 0x59f111f1, 0x923f82a4, 0xab1c5ed5,
    0xd807aa98, 0x12835b01, 0x243185be, 0x550c7dc3, 0x72be5d74, 0x80deb1fe, 0x9bdc06a7, 0xc19bf174,
    0xe49b69c1, 0xefbe4786, 0x0fc19dc6, 0x240ca1cc, 0x2de92c6f, 0x4a7484aa, 0x5cb0a9dc, 0x76f988da,
    0x983e5152, 0xa831c66d, 0xb00327c8, 0xbf597fc7, 0xc6e00bf3, 0xd5a79147, 0x06ca6351, 0x14292967,
    0x27b70a85, 0x2e1b2138, 0x4d2c6dfc, 0x53380d13, 0x650a7354, 0x766a0abb, 0x81c2c92e, 0x92722c85,
    0xa2bfe8a1, 0xa81a664b, 0xc24b8b70, 0xc76c51a3, 0xd192e819, 0xd6990624, 0xf40e3585, 0x106aa070,
    0x19a4c116, 0x1e376c08, 0x2748774c, 0x34b0bcb5, 0x391c0cb3, 0x4ed8aa4a, 0x5b9cca4f, 0x682e6ff3,
    0x748f82ee, 0x78a5636f, 0x84c87814, 0x8cc70208, 0x90befffa, 0xa4506ceb, 0xbef9a3f7, 0xc67178f2,
];

const INITIAL_STATE: [u32; 8] = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
];

/// Incremental SHA-256 state
#[derive(Clone, Zeroize)]
pub struct Sha256 {
    state: [u32; 8],
    buffer: [u8; SHA256_BLOCK_SIZE],
    buffer_idx: usize,
    total_bytes: u64,
}

impl Drop for Sha256 {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl Default for Sha256 {
    fn default() -> Self {
        Self::new()
    }
}

impl Sha256 {
    /// Fresh state
    pub fn new() -> Self {
        Sha256 {
            state: INITIAL_STATE,
            buffer: [0u8; SHA256_BLOCK_SIZE],
            buffer_idx: 0,
            total_bytes: 0,
        }
    }

    /// One-shot digest
    pub fn digest(input: &[u8]) -> [u8; SHA256_OUTPUT_SIZE] {
        let mut hasher = Self::new();
        hasher.update(input);
        hasher.finalize()
    }

    /// Absorb more input
    pub fn update(&mut self, mut input: &[u8]) -> &mut Self {
        while !input.is_empty() {
            let fill = core::cmp::min(input.len(), SHA256_BLOCK_SIZE - self.buffer_idx);
            self.buffer[self.buffer_idx..self.buffer_idx + fill].copy_from_slice(&input[..fill]);
            self.buffer_idx += fill;
            input = &input[fill..];
            if self.buffer_idx == SHA256_BLOCK_SIZE {
                let block = self.buffer;
                Self::compress(&mut self.state, &block);
                self.total_bytes += SHA256_BLOCK_SIZE as u64;
                self.buffer_idx = 0;
            }
        }
        self
    }

    /// Pad, produce the digest and wipe the state
    pub fn finalize(&mut self) -> [u8; SHA256_OUTPUT_SIZE] {
        self.total_bytes += self.buffer_idx as u64;
        let bit_len = self.total_bytes.wrapping_mul(8);

        self.buffer[self.buffer_idx] = 0x80;
        if self.buffer_idx >= 56 {
            self.buffer[self.buffer_idx + 1..].fill(0);
            let block = self.buffer;
            Self::compress(&mut self.state, &block);
            self.buffer = [0u8; SHA256_BLOCK_SIZE];
        } else {
            self.buffer[self.buffer_idx + 1..56].fill(0);
        }
        BigEndian::write_u64(&mut self.buffer[56..], bit_len);
        let block = self.buffer;
        Self::compress(&mut self.state, &block);

        let mut out = [0u8; SHA256_OUTPUT_SIZE];
        BigEndian::write_u32_into(&self.state, &mut out);
        self.zeroize();
        out
    }

    fn compress(state: &mut [u32; 8], block: &[u8; SHA256_BLOCK_SIZE]) {
        let mut w = EphemeralSecret::new([0u32; 64]);
        compiler_fence(Ordering::SeqCst);

        BigEndian::read_u32_into(block, &mut w[..16]);
        for i in 16..64 {
            let s0 = w[i - 15].rotate_right(7) ^ w[i - 15].rotate_right(18) ^ (w[i - 15] >> 3);
            let s1 = w[i - 2].rotate_right(17) ^ w[i - 2].rotate_right(19) ^ (w[i - 2] >> 10);
            w[i] = w[i - 16]
                .wrapping_add(s0)
                .wrapping_add(w[i - 7])
                .wrapping_add(s1);
        }

        let mut working = *state;
        let mut v = ZeroizeGuard::new(&mut working);
        for i in 0..64 {
            let [a, b, c, d, e, f, g, h] = *v;
            let s1 = e.rotate_right(6) ^ e.rotate_right(11) ^ e.rotate_right(25);
            let ch = (e & f) ^ ((!e) & g);
            let temp1 = h
                .wrapping_add(s1)
                .wrapping_add(ch)
                .wrapping_add(K256[i])
                .wrapping_add(w[i]);
            let s0 = a.rotate_right(2) ^ a.rotate_right(13) ^ a.rotate_right(22);
            let maj = (a & b) ^ (a & c) ^ (b & c);
            let temp2 = s0.wrapping_add(maj);
            *v = [
                temp1.wrapping_add(temp2),
                a,
                b,
                c,
                d.wrapping_add(temp1),
                e,
                f,
                g,
            ];
        }

        for (s, x) in state.iter_mut().zip(v.iter()) {
            *s = s.wrapping_add(*x);
        }
        compiler_fence(Ordering::SeqCst);
    }
}
