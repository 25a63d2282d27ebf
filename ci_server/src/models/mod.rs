//! Data models: inbound payloads, content snapshots and status values.

pub mod comment_kind;
pub mod content;
pub mod hooks;
pub mod jenkins;
pub mod repo;
pub mod status;
