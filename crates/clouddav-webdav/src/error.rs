//! Error handling and mapping for the WebDAV frontend.
//!
//! The core crate reports [`GatewayError`]; this module converts those
//! into the `FsError` values dav-server turns into HTTP status codes.

use clouddav_core::{GatewayError, RemoteError};
use dav_server::fs::FsError;
use std::io;
use thiserror::Error;

/// Errors raised by the WebDAV frontend outside request handling.
#[derive(Debug, Error)]
pub enum WebDavError {
    /// Gateway-level failure (remote service or authentication).
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// IO error from the HTTP server.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for WebDAV frontend operations.
pub type WebDavResult<T> = Result<T, WebDavError>;

/// Converts a gateway error to a dav-server FsError.
///
/// `AuthExpired` maps to `GeneralFailure` rather than an auth status:
/// the session layer has already retried once by the time an expiry
/// reaches this boundary, so a second one is a real failure.
#[allow(clippy::needless_pass_by_value)]
pub fn gateway_error_to_fs_error(e: GatewayError) -> FsError {
    match e {
        GatewayError::Remote(RemoteError::NotFound) => FsError::NotFound,
        GatewayError::Remote(
            RemoteError::Unavailable(_) | RemoteError::AuthExpired | RemoteError::BadMetadata(_),
        ) => FsError::GeneralFailure,
        GatewayError::Auth(_) => FsError::GeneralFailure,
        GatewayError::IsCollection => FsError::Forbidden,
    }
}

/// Converts a remote error from an open content stream to FsError.
#[allow(clippy::needless_pass_by_value)]
pub fn remote_error_to_fs_error(e: RemoteError) -> FsError {
    gateway_error_to_fs_error(GatewayError::Remote(e))
}
