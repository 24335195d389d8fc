//! Virtual path resolution.
//!
//! Walks a virtual path one segment at a time against cached (or
//! freshly fetched) directory listings and produces a typed
//! [`ResourceNode`]. This is the single place where a remote
//! "not found" is downgraded to an absent result; every other remote
//! failure propagates.

use crate::cache::DirCache;
use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult, RemoteError};
use crate::listing::{DirectoryListing, ListingAdapter, ListingEntry};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace};

/// A directory in the virtual hierarchy.
#[derive(Debug, Clone)]
pub struct CollectionNode {
    /// Absolute virtual path ("/" for the root).
    pub path: String,
}

/// A real remote file.
#[derive(Debug, Clone)]
pub struct FileNode {
    /// Absolute virtual path of the file.
    pub path: String,
    /// The listing entry backing this file.
    pub entry: ListingEntry,
}

/// A synthesized playlist view of a large remote video file.
///
/// Carries the entry of its *source* file; the payload is generated on
/// demand and never persisted.
#[derive(Debug, Clone)]
pub struct DerivedNode {
    /// Absolute virtual path of the synthetic resource.
    pub path: String,
    /// Synthetic display name (source stem + playlist extension).
    pub name: String,
    /// The real file the payload is derived from.
    pub source: ListingEntry,
}

/// A resolved resource. Built per request, never cached (only the
/// underlying listings are).
#[derive(Debug, Clone)]
pub enum ResourceNode {
    /// A directory.
    Collection(CollectionNode),
    /// A real remote file.
    PlainFile(FileNode),
    /// A synthesized streaming-playlist file.
    DerivedStream(DerivedNode),
}

impl ResourceNode {
    /// Absolute virtual path of this resource.
    pub fn path(&self) -> &str {
        match self {
            ResourceNode::Collection(c) => &c.path,
            ResourceNode::PlainFile(f) => &f.path,
            ResourceNode::DerivedStream(d) => &d.path,
        }
    }

    /// True for collections.
    pub fn is_collection(&self) -> bool {
        matches!(self, ResourceNode::Collection(_))
    }
}

/// Normalize a client-supplied path to "/" or "/a/b" form.
///
/// Empty segments (doubled or trailing slashes) are discarded.
pub fn normalize_path(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 1);
    for segment in raw.split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Resolves virtual paths to typed resource nodes.
pub struct Resolver {
    adapter: ListingAdapter,
    cache: Arc<DirCache>,
    config: GatewayConfig,
    /// Path of the previous resolution request; a repeat invalidates
    /// the cache for that path (heuristic for "a write just happened
    /// here" coming from the protocol layer).
    last_path: Mutex<Option<String>>,
}

impl Resolver {
    /// Create a resolver over an adapter and a shared listing cache.
    pub fn new(adapter: ListingAdapter, cache: Arc<DirCache>, config: GatewayConfig) -> Self {
        Self {
            adapter,
            cache,
            config,
            last_path: Mutex::new(None),
        }
    }

    /// The shared directory cache.
    pub fn cache(&self) -> &Arc<DirCache> {
        &self.cache
    }

    /// Resolve a virtual path.
    ///
    /// Returns `Ok(None)` when any segment fails to match - a missing
    /// path and one that exists but denies access are deliberately
    /// indistinguishable.
    pub async fn resolve(&self, raw_path: &str) -> GatewayResult<Option<ResourceNode>> {
        let path = normalize_path(raw_path);
        self.note_request(&path);
        trace!(path = %path, "resolving virtual path");

        if path == "/" {
            return Ok(Some(ResourceNode::Collection(CollectionNode {
                path,
            })));
        }

        let mut parent = "/".to_string();
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        for (depth, segment) in segments.iter().enumerate() {
            let listing = match self.listing_at(&parent).await {
                Ok(listing) => listing,
                Err(GatewayError::Remote(RemoteError::NotFound)) => return Ok(None),
                Err(e) => return Err(e),
            };
            let terminal = depth + 1 == segments.len();

            match listing.find(segment) {
                Some(entry) if entry.is_dir => {
                    if terminal {
                        return Ok(Some(ResourceNode::Collection(CollectionNode {
                            path: entry.remote_path.clone(),
                        })));
                    }
                    parent = entry.remote_path.clone();
                }
                Some(entry) => {
                    if terminal {
                        return Ok(Some(ResourceNode::PlainFile(FileNode {
                            path: entry.remote_path.clone(),
                            entry: entry.clone(),
                        })));
                    }
                    // A file in the middle of the path.
                    return Ok(None);
                }
                None => {
                    if terminal
                        && let Some(source) = self.synthesize(&listing, segment)
                    {
                        debug!(name = %segment, source = %source.name, "synthesized derived playlist");
                        return Ok(Some(ResourceNode::DerivedStream(DerivedNode {
                            path: path.clone(),
                            name: (*segment).to_string(),
                            source,
                        })));
                    }
                    return Ok(None);
                }
            }
        }
        Ok(None)
    }

    /// The listing of a collection, via the cache.
    ///
    /// Used by the protocol layer for directory enumeration so that
    /// `read_dir` and `resolve` share fetches.
    pub async fn listing_of(
        &self,
        collection: &CollectionNode,
    ) -> GatewayResult<Arc<DirectoryListing>> {
        self.listing_at(&collection.path).await
    }

    async fn listing_at(&self, path: &str) -> GatewayResult<Arc<DirectoryListing>> {
        if let Some(listing) = self.cache.get(path) {
            return Ok(listing);
        }
        let listing = self.adapter.list(path).await?;
        self.cache.put(path.to_string(), Arc::clone(&listing));
        Ok(listing)
    }

    /// Pick the synthesis source for a virtual playlist name, if the
    /// directory qualifies.
    ///
    /// When several video files share the stem, the largest wins.
    fn synthesize(&self, listing: &DirectoryListing, name: &str) -> Option<ListingEntry> {
        if listing.len() > self.config.synthesis_max_members {
            return None;
        }
        let suffix = format!(".{}", self.config.playlist_extension);
        let stem = name.strip_suffix(suffix.as_str())?;

        listing
            .entries()
            .iter()
            .filter(|e| !e.is_dir && e.size >= self.config.derived_min_size)
            .filter(|e| e.stem() == stem)
            .filter(|e| {
                e.extension()
                    .is_some_and(|ext| self.config.is_video_extension(ext))
            })
            .max_by_key(|e| e.size)
            .cloned()
    }

    /// Record the requested path; two consecutive requests for the same
    /// path drop its cache entry before resolution.
    fn note_request(&self, path: &str) {
        let mut last = self.last_path.lock();
        if last.as_deref() == Some(path) {
            debug!(path, "path requested twice in a row, invalidating cache entry");
            self.cache.invalidate(path);
        } else {
            *last = Some(path.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Login, SessionStore};
    use crate::testing::FakeRemote;
    use std::time::Duration;

    const MIB: u64 = 1024 * 1024;

    async fn resolver_with(
        remote: &Arc<FakeRemote>,
        config: GatewayConfig,
    ) -> Resolver {
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
        let cache = Arc::new(DirCache::new(config.cache_ttl, config.cache_max_entries));
        let adapter = ListingAdapter::new(remote.clone(), sessions);
        Resolver::new(adapter, cache, config)
    }

    async fn default_resolver(remote: &Arc<FakeRemote>) -> Resolver {
        resolver_with(remote, GatewayConfig::default()).await
    }

    #[test]
    fn normalize_collapses_slashes() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("/a//b/"), "/a/b");
        assert_eq!(normalize_path("a/b"), "/a/b");
    }

    #[tokio::test]
    async fn root_resolves_without_a_remote_call() {
        let remote = Arc::new(FakeRemote::new());
        let resolver = default_resolver(&remote).await;
        let node = resolver.resolve("/").await.unwrap().unwrap();
        assert!(node.is_collection());
        assert_eq!(remote.list_calls("/"), 0);
    }

    #[tokio::test]
    async fn resolves_nested_file() {
        let remote = Arc::new(FakeRemote::new());
        remote.add_dir("/docs");
        remote.add_file("/docs/report.txt", b"hello".as_slice());

        let resolver = default_resolver(&remote).await;
        let node = resolver.resolve("/docs/report.txt").await.unwrap().unwrap();
        let ResourceNode::PlainFile(file) = node else {
            panic!("expected a file node");
        };
        assert_eq!(file.entry.name, "report.txt");
        assert_eq!(file.entry.size, 5);
        assert_eq!(file.path, "/docs/report.txt");
    }

    #[tokio::test]
    async fn missing_path_at_any_depth_is_absent_not_an_error() {
        let remote = Arc::new(FakeRemote::new());
        remote.add_dir("/docs");

        let resolver = default_resolver(&remote).await;
        assert!(resolver.resolve("/nope").await.unwrap().is_none());
        assert!(resolver.resolve("/docs/nope").await.unwrap().is_none());
        assert!(resolver.resolve("/nope/deeper/still").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_in_the_middle_of_a_path_is_absent() {
        let remote = Arc::new(FakeRemote::new());
        remote.add_file("/notes.txt", b"x".as_slice());
        let resolver = default_resolver(&remote).await;
        assert!(resolver.resolve("/notes.txt/child").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn repeated_resolution_hits_the_cache() {
        let remote = Arc::new(FakeRemote::new());
        remote.add_dir("/docs");
        remote.add_file("/docs/a.txt", b"x".as_slice());

        let resolver = default_resolver(&remote).await;
        resolver.resolve("/docs/a.txt").await.unwrap().unwrap();
        resolver.resolve("/docs").await.unwrap().unwrap();
        // "/" and "/docs" were each listed exactly once.
        assert_eq!(remote.list_calls("/"), 1);
        assert_eq!(remote.list_calls("/docs"), 1);
    }

    #[tokio::test]
    async fn same_path_twice_in_a_row_invalidates_its_listing() {
        let remote = Arc::new(FakeRemote::new());
        remote.add_dir("/docs");

        let resolver = default_resolver(&remote).await;
        // Warm the listing of /docs by resolving a child.
        resolver.resolve("/docs/x").await.unwrap();
        assert_eq!(remote.list_calls("/docs"), 1);

        // Two consecutive requests for the same path distrust the
        // cached listing of that path.
        resolver.resolve("/docs").await.unwrap();
        resolver.resolve("/docs").await.unwrap();
        resolver.resolve("/docs/x").await.unwrap();
        assert_eq!(remote.list_calls("/docs"), 2);
    }

    #[tokio::test]
    async fn invalidation_forces_a_fresh_listing() {
        let remote = Arc::new(FakeRemote::new());
        remote.add_dir("/docs");
        let resolver = default_resolver(&remote).await;

        resolver.resolve("/docs").await.unwrap();
        assert_eq!(remote.list_calls("/"), 1);
        resolver.cache().invalidate("/");
        resolver.resolve("/docs").await.unwrap();
        assert_eq!(remote.list_calls("/"), 2);
    }

    #[tokio::test]
    async fn expired_listing_is_refetched() {
        let remote = Arc::new(FakeRemote::new());
        remote.add_dir("/docs");
        let config = GatewayConfig {
            cache_ttl: Duration::from_millis(20),
            ..GatewayConfig::default()
        };
        let resolver = resolver_with(&remote, config).await;

        resolver.resolve("/docs").await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        resolver.resolve("/docs").await.unwrap();
        assert_eq!(remote.list_calls("/"), 2);
    }

    #[tokio::test]
    async fn playlist_name_synthesizes_from_large_video() {
        let remote = Arc::new(FakeRemote::new());
        remote.add_sized_file("/movie.mp4", 600 * MIB);
        remote.add_file("/cover.jpg", b"img".as_slice());
        remote.add_file("/notes.txt", b"txt".as_slice());

        let resolver = default_resolver(&remote).await;
        let node = resolver.resolve("/movie.m3u8").await.unwrap().unwrap();
        let ResourceNode::DerivedStream(derived) = node else {
            panic!("expected a derived node");
        };
        assert_eq!(derived.source.name, "movie.mp4");
        assert_eq!(derived.name, "movie.m3u8");
    }

    #[tokio::test]
    async fn synthesis_prefers_the_largest_matching_source() {
        let remote = Arc::new(FakeRemote::new());
        remote.add_sized_file("/movie.mp4", 600 * MIB);
        remote.add_sized_file("/movie.mkv", 900 * MIB);

        let resolver = default_resolver(&remote).await;
        let node = resolver.resolve("/movie.m3u8").await.unwrap().unwrap();
        let ResourceNode::DerivedStream(derived) = node else {
            panic!("expected a derived node");
        };
        assert_eq!(derived.source.name, "movie.mkv");
    }

    #[tokio::test]
    async fn synthesis_skipped_for_small_files() {
        let remote = Arc::new(FakeRemote::new());
        remote.add_sized_file("/movie.mp4", 100 * MIB);
        let resolver = default_resolver(&remote).await;
        assert!(resolver.resolve("/movie.m3u8").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn synthesis_skipped_in_large_directories() {
        let remote = Arc::new(FakeRemote::new());
        remote.add_sized_file("/movie.mp4", 600 * MIB);
        for i in 0..10 {
            remote.add_file(format!("/extra{i}.txt").as_str(), b"x".as_slice());
        }

        // 11 members exceeds the synthesis cap of 10.
        let resolver = default_resolver(&remote).await;
        assert!(resolver.resolve("/movie.m3u8").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn literal_entries_win_over_synthesis() {
        let remote = Arc::new(FakeRemote::new());
        remote.add_sized_file("/movie.mp4", 600 * MIB);
        remote.add_file("/movie.m3u8", b"#EXTM3U\nreal".as_slice());

        let resolver = default_resolver(&remote).await;
        let node = resolver.resolve("/movie.m3u8").await.unwrap().unwrap();
        assert!(matches!(node, ResourceNode::PlainFile(_)));
    }
}
