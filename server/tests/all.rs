//! Integration test aggregator
//!
//! Drives the server end to end over an in-memory duplex stream. Individual
//! test modules are declared in `suite/mod.rs`.

mod common;
mod suite;
