//! Outbound interface to the remote cloud-storage service.
//!
//! Everything service-specific (REST endpoints, cookie handshakes,
//! CAPTCHA exchange) lives behind [`RemoteClient`]; the rest of the
//! core only ever sees sessions, raw listing entries and byte streams.

use crate::error::{AuthError, Challenge, RemoteError};
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::pin::Pin;

/// A boxed download body stream.
///
/// `Sync` as well as `Send`: the protocol layer stores open downloads
/// inside `DavFile` handles, which `dav-server` requires to be
/// shareable between threads.
pub type DownloadStream = Pin<Box<dyn Stream<Item = Result<Bytes, RemoteError>> + Send + Sync>>;

/// Authenticated credential bundle for one remote account.
///
/// Immutable once built; replaced wholesale by a refresh, never
/// partially mutated. Shared read-only across concurrent requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Account identifier (username) this session belongs to.
    pub account: String,
    /// Opaque credential blob (cookie jar or equivalent).
    pub credential: String,
    /// Service tokens accompanying the credential on each call.
    pub tokens: BTreeMap<String, String>,
}

/// Declared encoding of textual fields in raw listing metadata.
///
/// Both supported services declare UTF-8 today; the adapter still
/// decodes through this enum so a differently-encoded service cannot
/// silently corrupt names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// UTF-8 encoded text.
    Utf8,
}

impl TextEncoding {
    /// Decode raw bytes per the declared encoding.
    pub fn decode(self, raw: &[u8]) -> Result<String, RemoteError> {
        match self {
            TextEncoding::Utf8 => String::from_utf8(raw.to_vec()).map_err(|_| {
                RemoteError::BadMetadata(format!(
                    "name is not valid UTF-8: {:?}",
                    String::from_utf8_lossy(raw)
                ))
            }),
        }
    }
}

/// One child entry exactly as the remote service reported it.
///
/// The display name is kept as raw bytes; decoding happens in the
/// listing adapter using the client's declared [`TextEncoding`].
#[derive(Debug, Clone)]
pub struct RawEntry {
    /// Display name as raw bytes.
    pub name: Vec<u8>,
    /// Absolute path in the remote service's own representation.
    pub path: String,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Whether this entry is a directory.
    pub is_dir: bool,
    /// Creation time, seconds since the Unix epoch.
    pub ctime: i64,
    /// Modification time, seconds since the Unix epoch.
    pub mtime: i64,
}

/// An in-progress streaming download from the remote service.
pub struct RemoteDownload {
    /// Total length, when the transport reported one.
    pub length: Option<u64>,
    /// Whether the transport natively serves byte-range fetches.
    pub supports_range: bool,
    /// The response body. Forward-only; dropping it closes the
    /// underlying connection.
    pub body: DownloadStream,
}

impl std::fmt::Debug for RemoteDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteDownload")
            .field("length", &self.length)
            .field("supports_range", &self.supports_range)
            .finish_non_exhaustive()
    }
}

/// Client for one remote cloud-storage service.
///
/// Object-safe so the core can hold it as `Arc<dyn RemoteClient>`;
/// methods return boxed futures in the same style `dav-server` uses
/// for its filesystem traits.
pub trait RemoteClient: Send + Sync + 'static {
    /// Exchange username/password for a fresh [`Session`].
    fn authenticate<'a>(
        &'a self,
        username: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, Result<Session, AuthError>>;

    /// Answer a previously issued interactive challenge.
    fn submit_challenge<'a>(
        &'a self,
        challenge: &'a Challenge,
        response: &'a str,
    ) -> BoxFuture<'a, Result<Session, AuthError>>;

    /// List the children of a remote directory.
    fn list_directory<'a>(
        &'a self,
        session: &'a Session,
        path: &'a str,
    ) -> BoxFuture<'a, Result<Vec<RawEntry>, RemoteError>>;

    /// Open a streaming download of a remote file.
    fn open_download<'a>(
        &'a self,
        session: &'a Session,
        path: &'a str,
    ) -> BoxFuture<'a, Result<RemoteDownload, RemoteError>>;

    /// Fetch the service-generated streaming-playlist manifest for a
    /// remote video file.
    fn playlist_payload<'a>(
        &'a self,
        session: &'a Session,
        path: &'a str,
    ) -> BoxFuture<'a, Result<String, RemoteError>>;

    /// Encoding the service declares for textual listing fields.
    fn text_encoding(&self) -> TextEncoding {
        TextEncoding::Utf8
    }
}
