//! Domain and database models for Ramify backends.
//!
//! ## Identifiers
//! Trackers, projects, fields and accounts are identified by the 64-bit
//! primary keys of their rows. A branch is a tracker whose origin is set.

pub mod actor;
pub mod branch;
pub mod bus;
pub mod db;
pub mod job;
pub mod rewrite;
pub mod tracker;
