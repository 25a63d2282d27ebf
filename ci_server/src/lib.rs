//! ci-bridge: a webhook bridge between GitHub and Jenkins.
//!
//! GitHub pull request and issue deliveries drive DCO sign-off checks,
//! mergeability checks, triage labels and bot comments, and schedule Jenkins
//! jobs for the commits under review. Jenkins build notifications are
//! mirrored back onto the commits as statuses.
//!
//! The bridge keeps no state between requests; every decision is recomputed
//! from live GitHub and Jenkins data.

pub mod config;
pub mod error;
pub mod fakes;
pub mod metrics;
pub mod models;
pub mod routes;
pub mod services;
