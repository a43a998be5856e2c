//! API handlers for Sharegate.
//!
//! `share` holds the token-gated access subsystem; `health` and `root` are the
//! operational endpoints.

pub mod health;
pub mod root;
pub mod share;
