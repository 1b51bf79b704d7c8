//! Structured logging for ProxPanel.
//!
//! Subscriber setup with optional rolling NDJSON files, plus
//! masking of secrets in terminal output.

pub mod logger;
pub mod redact;

pub use logger::{env_filter, init_logger};
pub use redact::mask_token;
