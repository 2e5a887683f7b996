use thiserror::Error;

/// A type alias for handling `Result`s with `Error`
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a proxy transaction
///
/// None of these are fatal. Every failure is logged where it happens and
/// returned to the direct caller only; nothing is ever forwarded to the
/// [`Agent`](crate::agent::Agent).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The engine refused to create a transaction context.
    #[error("Engine context creation failed: {0}")]
    EngineCreation(String),

    /// The operation needs an engine context and none exists yet.
    #[error("Transaction not started")]
    NotStarted,

    /// An engine context already exists for this transaction.
    #[error("Transaction already started")]
    AlreadyStarted,

    /// The transaction was terminated and cannot be used anymore.
    #[error("Transaction terminated")]
    Terminated,

    /// The engine rejected a delivery or a query on a live context.
    #[error("Engine error: {0}")]
    Engine(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Report an engine failure as a context creation failure.
    pub(crate) fn into_creation_error(self) -> Self {
        match self {
            Error::EngineCreation(_) => self,
            other => Error::EngineCreation(other.to_string()),
        }
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Engine(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Engine(s)
    }
}
