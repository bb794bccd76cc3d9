//! Constant values for the zbsec security core
//!
//! Curve domain parameters, primitive sizes and the fixed values the Zigbee
//! security clauses define (well-known keys, keyed-hash inputs, key
//! confirmation preambles).

#![no_std]
#![forbid(unsafe_code)]

pub mod curves;
pub mod utils;
pub mod zigbee;
