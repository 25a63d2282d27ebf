//! Bridge services: remote clients, content classification, policy and scheduling.

pub mod classifier;
pub mod content_service;
pub mod github_service;
pub mod issue_service;
pub mod jenkins_service;
pub mod notification_service;
pub mod policy;
pub mod reconciler;
pub mod scheduler;
pub mod status_service;
