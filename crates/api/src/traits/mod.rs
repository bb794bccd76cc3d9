//! Strategy traits implemented by interchangeable components

pub mod backend;

pub use backend::{CryptoBackend, MicLength};
