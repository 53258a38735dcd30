//! Error kinds surfaced by the LQTP client core.
//!
//! Modeled directly on `hdbconnect`'s `HdbError`: one variant per failure
//! kind, enough context on each to reconstruct the condition, and no
//! silent swallowing of the underlying cause.

use thiserror::Error;

/// The crate's `Result` alias.
pub type LbResult<T> = Result<T, LbError>;

/// A list specifying categories of [`LbError`].
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LbError {
    /// A required connection-string key was missing or a present key was
    /// malformed (e.g. `url` is not a valid URL).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The initial HTTP handshake failed, or the connection became fatal
    /// before the handshake completed.
    #[error("connect error: {0}")]
    Connect(String),

    /// A wire-level codec error: a truncated or malformed buffer.
    #[error("wire protocol error: {0}")]
    Wire(String),

    /// The server sent an `Error` envelope or a per-request error payload.
    #[error("server error: {message}")]
    Server {
        /// The server's UTF-8 error message.
        message: String,
    },

    /// `Send` did not receive a response within the 3 second deadline.
    #[error("timed out waiting for response to request {request_id}")]
    Timeout {
        /// The request id that timed out.
        request_id: String,
    },

    /// `Pool::get` failed to find or create a connection after its retry
    /// budget was exhausted.
    #[error("no available connections")]
    PoolExhausted,

    /// An operation was attempted on an already-closed connection or pool.
    #[error("connection is closed")]
    Closed,

    /// A host-value could not be converted into a wire `Parameter`.
    #[error("unsupported parameter type: {0}")]
    Parameter(String),

    /// Transport-level I/O failure (reading or writing the duplex stream).
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// The underlying HTTP client failed outside of a clean stream read/write.
    #[error("HTTP transport error")]
    Http(#[from] reqwest::Error),
}

impl LbError {
    pub(crate) fn wire<S: Into<String>>(msg: S) -> Self {
        LbError::Wire(msg.into())
    }

    pub(crate) fn connect<S: Into<String>>(msg: S) -> Self {
        LbError::Connect(msg.into())
    }

    pub(crate) fn configuration<S: Into<String>>(msg: S) -> Self {
        LbError::Configuration(msg.into())
    }
}
