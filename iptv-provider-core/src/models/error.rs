use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

/// Errors surfaced by provider operations.
///
/// Every failure of `start`/`stop` goes through this one type. `NotStarted`
/// is the odd one out: it signals a caller bug (unbalanced start/stop), not a
/// runtime condition, see [`ProviderError::is_contract_violation`].
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no channel selected")]
    NoChannelSelected,

    #[error("provider in use")]
    InUse,

    #[error("provider not started")]
    NotStarted,

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("registry rejected stream: {0}")]
    Registry(#[from] RegistryError),

    #[error("acquisition timed out after {secs}s")]
    Timeout { secs: f64 },

    #[error("invalid provider options: {0}")]
    InvalidOptions(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProviderError {
    /// True for errors caused by broken call discipline rather than by
    /// the backend or the current load.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::NotStarted)
    }

    pub fn is_recoverable(&self) -> bool {
        !self.is_contract_violation()
    }
}

/// Opaque backend failure, forwarded to the caller untouched.
pub struct BackendError(Box<dyn StdError + Send + Sync + 'static>);

impl BackendError {
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Box::new(error))
    }

    /// Build an error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self(message.into())
    }

    /// Borrow the backend's own error, e.g. to downcast it.
    pub fn inner(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.0.as_ref()
    }

    pub fn into_inner(self) -> Box<dyn StdError + Send + Sync + 'static> {
        self.0
    }
}

impl fmt::Debug for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl StdError for BackendError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

impl From<std::io::Error> for BackendError {
    fn from(error: std::io::Error) -> Self {
        Self::new(error)
    }
}

/// Reasons a [`StreamRegistry`](crate::traits::stream_registry::StreamRegistry)
/// can refuse a registration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("channel limit of {limit} reached")]
    CapacityExceeded { limit: usize },

    #[error("{0}")]
    Rejected(String),
}
