use std::fmt;

use thiserror::Error;

/// Failure of a single RemoteStore call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(String),
    #[error("session is not authorized")]
    Unauthorized,
    #[error("rejected: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl RemoteError {
    /// Maps a non-success HTTP status and the envelope message to the taxonomy.
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        let message = message.unwrap_or_else(|| format!("http status {status}"));
        match status {
            401 | 403 => RemoteError::Unauthorized,
            404 => RemoteError::NotFound(message),
            400 | 422 => RemoteError::Validation(message),
            409 => RemoteError::Conflict(message),
            _ => RemoteError::Server { status, message },
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, RemoteError::Unauthorized)
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            RemoteError::from_status(status.as_u16(), None)
        } else {
            RemoteError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        RemoteError::Malformed(err.to_string())
    }
}

/// Which affordance a mutation came from. An entity may have several
/// different mutations in flight, but never two of the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
    Toggle,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationKind::Create => write!(f, "create"),
            MutationKind::Update => write!(f, "update"),
            MutationKind::Delete => write!(f, "delete"),
            MutationKind::Toggle => write!(f, "toggle"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("content cannot be empty")]
    EmptyContent,
    #[error("list is not loaded")]
    NotLoaded,
    #[error("{id} already has a {kind} in flight")]
    InFlight { id: String, kind: MutationKind },
}

impl ControllerError {
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            ControllerError::Remote(err) => Some(err),
            _ => None,
        }
    }
}
