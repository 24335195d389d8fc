//! Error taxonomy for the gateway core.
//!
//! Remote-call failures are classified into a small closed set so the
//! protocol boundary can map them to HTTP results in exactly one place.

use thiserror::Error;

/// Failure of an outbound call against the remote storage service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Transport-level failure (connection refused, timeout, 5xx).
    ///
    /// Safe for the protocol layer to retry; never retried internally.
    #[error("remote service unavailable: {0}")]
    Unavailable(String),

    /// The service rejected the current session.
    ///
    /// Triggers one refresh-and-retry via [`run_with_session`](crate::session::run_with_session);
    /// a second rejection propagates.
    #[error("remote session expired or rejected")]
    AuthExpired,

    /// The requested path does not exist server-side (or access is
    /// denied - the two are deliberately indistinguishable).
    #[error("remote path not found")]
    NotFound,

    /// The service returned listing metadata the adapter could not
    /// decode with the declared encoding. Never papered over with
    /// lossy replacement characters.
    #[error("malformed remote metadata: {0}")]
    BadMetadata(String),
}

/// A human challenge demanded by the remote service during login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// Opaque token identifying this challenge on the service side.
    pub code: String,
    /// Where the human-readable challenge (e.g. a CAPTCHA image) lives.
    pub prompt_url: String,
}

/// Failure of the credential exchange with the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Username/password rejected outright.
    #[error("authentication rejected by remote service")]
    Failed,

    /// The service demands an out-of-band human response (CAPTCHA).
    ///
    /// Surfaced as its own kind so the caller can decide to prompt a
    /// human or abort; never silently retried.
    #[error("remote service requires interactive challenge response")]
    InteractionRequired(Challenge),
}

/// Top-level error for resolution and content operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// A remote call failed after the retry-once policy was exhausted.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Re-authentication during a retry failed.
    #[error("re-authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Content was requested for a collection node.
    #[error("resource is a collection, not a file")]
    IsCollection,
}

/// Result alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
