//! Authenticated encryption

pub mod ccm_star;

pub use ccm_star::CcmStar;
