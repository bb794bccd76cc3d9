//! Integration tests, conformance vectors and benchmarks for zbsec
pub mod fixtures;
pub mod vectors;
