//! Error taxonomy for the bridge.
//!
//! Policy outcomes (unsigned commits, merge conflicts) are not errors; they
//! are returned as ordinary values by the policy engine. Everything here
//! aborts the current event or, for configuration misses, a single sub-build.

use std::fmt;

use thiserror::Error;

/// The remote system a request was sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    GitHub,
    Jenkins,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::GitHub => "github",
            Service::Jenkins => "jenkins",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-2xx response or transport failure from GitHub or Jenkins.
#[derive(Debug, Clone, Error)]
#[error("{service} request to {url} failed: {reason}")]
pub struct RemoteError {
    pub service: Service,
    pub url: String,
    /// HTTP status, when the remote answered at all.
    pub status: Option<u16>,
    pub reason: String,
}

impl RemoteError {
    pub fn new(service: Service, url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            service,
            url: url.into(),
            status: None,
            reason: reason.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }

    pub(crate) fn from_reqwest(service: Service, url: &str, err: reqwest::Error) -> Self {
        let mut e = Self::new(service, url, err.to_string());
        e.status = err.status().map(|s| s.as_u16());
        e
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Several independent remote calls failed; all of them are kept.
    #[error("{} remote calls failed: {}", .0.len(), join_errors(.0))]
    RemoteBatch(Vec<RemoteError>),

    /// No matching Build, unparsable repo name, or an invalid build table.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An inbound body that does not have the expected shape.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

impl BridgeError {
    pub fn config(msg: impl Into<String>) -> Self {
        BridgeError::Configuration(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        BridgeError::MalformedPayload(msg.into())
    }

    /// Collapse a list of remote failures into one error, or `None` when empty.
    pub fn from_batch(mut errors: Vec<RemoteError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop().map(BridgeError::Remote),
            _ => Some(BridgeError::RemoteBatch(errors)),
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::MalformedPayload(err.to_string())
    }
}

fn join_errors(errors: &[RemoteError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
