//! rimport benchmarking suite
//!
//! Benchmarks for namespace matching, fingerprinting and the artifact cache.

pub mod common;

pub use common::*;
