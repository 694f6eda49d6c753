//! JSON payloads of the Ramify web API.
//!
//! Field names are camelCase on the wire.

pub mod branch;
pub mod error;
