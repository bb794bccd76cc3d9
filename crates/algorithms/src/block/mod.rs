//! Block ciphers

pub mod aes;

pub use aes::Aes128;
