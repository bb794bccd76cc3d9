//! Constants for hash functions

/// Output size of SHA-256 in bytes
pub const SHA256_OUTPUT_SIZE: usize = 32;

/// Internal block size of SHA-256 in bytes
pub const SHA256_BLOCK_SIZE: usize = 64;

/// Output size of AES-MMO-128 in bytes
pub const AES_MMO_OUTPUT_SIZE: usize = 16;

/// Largest AES-MMO input in bytes: `2^(2n-3) - 1` with `n = 16`
pub const AES_MMO_MAX_INPUT: usize = (1 << (2 * 16 - 3)) - 1;

/// Longest message, in bits, that still uses the 16-bit length padding
pub const AES_MMO_SHORT_FORM_MAX_BITS: u64 = (1 << 16) - 1;
