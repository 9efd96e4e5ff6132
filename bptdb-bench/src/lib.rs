//! bptdb Benchmark Library
//!
//! Tree factories and key/value generators shared by the criterion benches.

pub mod config;
pub mod data_gen;
pub mod stores;
