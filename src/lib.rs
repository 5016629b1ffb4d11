//! Matter Accessory Bridge library.
//!
//! Binds accessories (relays, blind motors, wall buttons) to Matter
//! endpoints and serves them, optionally as bridged nodes behind one
//! aggregator.

#![recursion_limit = "256"]

pub mod accessory;
pub mod callback;
pub mod config;
pub mod device;
pub mod error;
pub mod matter;
pub mod simulation;
