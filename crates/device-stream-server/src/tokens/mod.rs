//! Capability tokens for the event stream.

pub mod manager;

pub use manager::{Token, TokenManager};
