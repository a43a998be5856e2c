//! Token-gated access to shared reports.
//!
//! Flow Overview:
//! 1) `resolver` maps the share token to its active record.
//! 2) `gate` checks passwords and owns the lockout state machine.
//! 3) `credential` mints and checks the signed, path-scoped unlock cookie.
//! 4) `render` fetches the document once access is established.
//!
//! Security: only the resource id is logged; tokens, passwords and signatures never are.

pub mod credential;
pub mod error;
pub mod gate;
pub mod render;
pub mod resolver;
pub mod state;
pub mod storage;
pub mod types;
pub mod unlock;
pub mod view;

#[cfg(test)]
pub(crate) mod memory;
#[cfg(test)]
mod tests;

pub use credential::{UnlockSigner, is_request_unlocked};
pub use error::ShareError;
pub use gate::{GatePolicy, PasswordGate, Verdict};
pub use render::{HttpReportRenderer, ReportRenderer};
pub use state::ShareState;
pub use storage::{PgShareStore, ShareStore};
