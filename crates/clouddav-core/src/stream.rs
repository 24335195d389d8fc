//! Lazily-read content for resolved resources.
//!
//! Plain files stream straight from the remote download body without
//! ever materializing the whole object. Derived playlists are the one
//! exception: their payload is fetched in full at open time, because
//! the WebDAV layer needs a Content-Length before it starts streaming.

use crate::error::{GatewayError, GatewayResult, RemoteError};
use crate::remote::{RemoteClient, RemoteDownload};
use crate::resolver::ResourceNode;
use crate::session::{run_with_session, SessionStore};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::sync::Arc;
use tracing::debug;

/// Readable content of a resolved file resource.
pub enum GatewayContent {
    /// Sequential, single-pass stream of a remote download.
    Remote(RemoteReader),
    /// In-memory derived payload, freely seekable.
    Derived(DerivedReader),
}

/// Forward-only reader over a remote download body.
///
/// Dropping the reader drops the body stream and with it the
/// underlying connection, so an aborted request leaks nothing.
pub struct RemoteReader {
    download: RemoteDownload,
    pending: Bytes,
    position: u64,
    exhausted: bool,
}

/// Reader over an in-memory derived payload.
pub struct DerivedReader {
    payload: Bytes,
    position: u64,
}

impl GatewayContent {
    /// Total length, when known.
    ///
    /// Remote streams know it only if the transport reported one;
    /// derived payloads always know it (fetched eagerly at open).
    pub fn len(&self) -> Option<u64> {
        match self {
            GatewayContent::Remote(r) => r.download.length,
            GatewayContent::Derived(d) => Some(d.payload.len() as u64),
        }
    }

    /// True when the total length is known to be zero.
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Current read offset.
    pub fn position(&self) -> u64 {
        match self {
            GatewayContent::Remote(r) => r.position,
            GatewayContent::Derived(d) => d.position,
        }
    }

    /// Whether random-access seeking is available.
    ///
    /// Remote streams advertise it only when the transport natively
    /// serves byte ranges; a truncated read is never papered over.
    pub fn supports_seek(&self) -> bool {
        match self {
            GatewayContent::Remote(r) => r.download.supports_range,
            GatewayContent::Derived(_) => true,
        }
    }

    /// Move the read offset. Returns the new offset, or `None` when
    /// this content is forward-only and `pos` is not the current
    /// offset.
    pub fn seek_to(&mut self, pos: u64) -> Option<u64> {
        match self {
            GatewayContent::Remote(r) => (pos == r.position).then_some(pos),
            GatewayContent::Derived(d) => {
                d.position = pos.min(d.payload.len() as u64);
                Some(d.position)
            }
        }
    }

    /// Read up to `count` bytes.
    ///
    /// Returns exactly `count` bytes unless the end of the content is
    /// reached first; an empty result means end-of-stream.
    pub async fn read(&mut self, count: usize) -> Result<Bytes, RemoteError> {
        match self {
            GatewayContent::Remote(r) => r.read(count).await,
            GatewayContent::Derived(d) => Ok(d.read(count)),
        }
    }
}

impl std::fmt::Debug for GatewayContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayContent::Remote(r) => f
                .debug_struct("GatewayContent::Remote")
                .field("length", &r.download.length)
                .field("position", &r.position)
                .finish(),
            GatewayContent::Derived(d) => f
                .debug_struct("GatewayContent::Derived")
                .field("length", &d.payload.len())
                .field("position", &d.position)
                .finish(),
        }
    }
}

impl RemoteReader {
    fn new(download: RemoteDownload) -> Self {
        Self {
            download,
            pending: Bytes::new(),
            position: 0,
            exhausted: false,
        }
    }

    async fn read(&mut self, count: usize) -> Result<Bytes, RemoteError> {
        let mut out = BytesMut::with_capacity(count.min(64 * 1024));
        while out.len() < count {
            if !self.pending.is_empty() {
                let take = (count - out.len()).min(self.pending.len());
                out.extend_from_slice(&self.pending.split_to(take));
                continue;
            }
            if self.exhausted {
                break;
            }
            match self.download.body.next().await {
                Some(Ok(chunk)) => self.pending = chunk,
                Some(Err(e)) => return Err(e),
                None => self.exhausted = true,
            }
        }
        self.position += out.len() as u64;
        Ok(out.freeze())
    }
}

impl DerivedReader {
    fn read(&mut self, count: usize) -> Bytes {
        let start = (self.position as usize).min(self.payload.len());
        let end = start.saturating_add(count).min(self.payload.len());
        self.position = end as u64;
        self.payload.slice(start..end)
    }
}

/// Opens content streams for resolved resources.
pub struct ContentOpener {
    client: Arc<dyn RemoteClient>,
    sessions: Arc<SessionStore>,
}

impl ContentOpener {
    /// Create an opener over a remote client and its session store.
    pub fn new(client: Arc<dyn RemoteClient>, sessions: Arc<SessionStore>) -> Self {
        Self { client, sessions }
    }

    /// Open the content of a resolved resource.
    ///
    /// Plain files start a streaming download; derived playlists fetch
    /// their payload in full. Collections have no content.
    pub async fn open(&self, node: &ResourceNode) -> GatewayResult<GatewayContent> {
        match node {
            ResourceNode::Collection(_) => Err(GatewayError::IsCollection),
            ResourceNode::PlainFile(file) => {
                debug!(path = %file.entry.remote_path, size = file.entry.size, "opening remote download");
                let download = run_with_session(&self.sessions, |session| {
                    let client = Arc::clone(&self.client);
                    let path = file.entry.remote_path.clone();
                    async move { client.open_download(&session, &path).await }
                })
                .await?;
                Ok(GatewayContent::Remote(RemoteReader::new(download)))
            }
            ResourceNode::DerivedStream(derived) => {
                debug!(source = %derived.source.remote_path, "generating derived playlist payload");
                let manifest = run_with_session(&self.sessions, |session| {
                    let client = Arc::clone(&self.client);
                    let path = derived.source.remote_path.clone();
                    async move { client.playlist_payload(&session, &path).await }
                })
                .await?;
                Ok(GatewayContent::Derived(DerivedReader {
                    payload: Bytes::from(manifest.into_bytes()),
                    position: 0,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{CollectionNode, Resolver};
    use crate::cache::DirCache;
    use crate::config::GatewayConfig;
    use crate::listing::ListingAdapter;
    use crate::session::{Login, SessionStore};
    use crate::testing::FakeRemote;

    async fn gateway_over(
        remote: &Arc<FakeRemote>,
    ) -> (Resolver, ContentOpener) {
        let sessions = Arc::new(
            SessionStore::connect(
                remote.clone(),
                Login {
                    username: "user".to_string(),
                    password: "pw".to_string(),
                    credential_file: None,
                },
                None,
            )
            .await
            .unwrap(),
        );
        let config = GatewayConfig::default();
        let cache = Arc::new(DirCache::new(config.cache_ttl, config.cache_max_entries));
        let resolver = Resolver::new(
            ListingAdapter::new(remote.clone(), Arc::clone(&sessions)),
            cache,
            config,
        );
        let opener = ContentOpener::new(remote.clone(), sessions);
        (resolver, opener)
    }

    #[tokio::test]
    async fn chunked_reads_concatenate_to_the_full_body() {
        let body: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let remote = Arc::new(FakeRemote::new());
        remote.add_file("/blob.bin", body.as_slice());

        let (resolver, opener) = gateway_over(&remote).await;
        let node = resolver.resolve("/blob.bin").await.unwrap().unwrap();

        // One unbounded read.
        let mut whole = opener.open(&node).await.unwrap();
        let all = whole.read(usize::MAX).await.unwrap();
        assert_eq!(all.as_ref(), body.as_slice());
        assert!(whole.read(1).await.unwrap().is_empty());

        // Arbitrary chunk sizes, concatenated.
        let mut chunked = opener.open(&node).await.unwrap();
        let mut collected = Vec::new();
        for chunk_size in [1usize, 7, 64, 1000, 100_000] {
            let chunk = chunked.read(chunk_size).await.unwrap();
            if chunk.is_empty() {
                break;
            }
            collected.extend_from_slice(&chunk);
            if collected.len() < 10_000 {
                assert_eq!(chunk.len(), chunk_size.min(10_000 - (collected.len() - chunk.len())));
            }
        }
        while collected.len() < body.len() {
            let chunk = chunked.read(512).await.unwrap();
            assert!(!chunk.is_empty());
            collected.extend_from_slice(&chunk);
        }
        assert_eq!(collected, body);
    }

    #[tokio::test]
    async fn remote_stream_is_forward_only() {
        let remote = Arc::new(FakeRemote::new());
        remote.add_file("/a.txt", b"abcdef".as_slice());
        let (resolver, opener) = gateway_over(&remote).await;
        let node = resolver.resolve("/a.txt").await.unwrap().unwrap();

        let mut content = opener.open(&node).await.unwrap();
        assert!(!content.supports_seek());
        assert_eq!(content.len(), Some(6));
        content.read(2).await.unwrap();
        // Seeking to the current offset is a no-op; anywhere else is refused.
        assert_eq!(content.seek_to(2), Some(2));
        assert_eq!(content.seek_to(0), None);
    }

    #[tokio::test]
    async fn derived_payload_is_fetched_eagerly_and_seekable() {
        let remote = Arc::new(FakeRemote::new());
        remote.add_sized_file("/movie.mp4", 600 * 1024 * 1024);
        let (resolver, opener) = gateway_over(&remote).await;
        let node = resolver.resolve("/movie.m3u8").await.unwrap().unwrap();

        let mut content = opener.open(&node).await.unwrap();
        let len = content.len().expect("derived length known at open");
        assert!(len > 0);
        assert!(content.supports_seek());

        let head = content.read(7).await.unwrap();
        assert_eq!(head.as_ref(), b"#EXTM3U");
        assert_eq!(content.seek_to(0), Some(0));
        let again = content.read(7).await.unwrap();
        assert_eq!(again.as_ref(), b"#EXTM3U");
    }

    #[tokio::test]
    async fn opening_a_collection_is_an_error() {
        let remote = Arc::new(FakeRemote::new());
        let (_, opener) = gateway_over(&remote).await;
        let node = ResourceNode::Collection(CollectionNode {
            path: "/".to_string(),
        });
        assert_eq!(
            opener.open(&node).await.unwrap_err(),
            GatewayError::IsCollection
        );
    }
}
