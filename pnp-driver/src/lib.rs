//! # pnp-driver: pick-and-place machine CLI
//!
//! Loads a TOML machine description, connects to a firenodejs
//! controller through `pnp-core` and runs one action: probe, home,
//! move, actuate, read or write a firmware parameter, or capture
//! camera frames.

pub mod config;
pub mod service;
