pub mod audit;
pub mod denial;
pub mod token;

pub use audit::{RbacAction, RbacAuditEntry, RbacAuditLog, RbacAuditQuery, RoleDiff, role_diff};
pub use denial::{AuditDenialSink, drain_denial_writer, spawn_denial_writer};
pub use token::{digests_match, generate_api_token, hash_token};
