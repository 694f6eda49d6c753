//! Types shared by Ramify backends and API clients.

pub mod branch;
