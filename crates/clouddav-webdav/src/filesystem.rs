//! WebDAV filesystem implementation for the cloud-storage gateway.
//!
//! This module provides the `DavFileSystem` trait implementation that
//! wraps the core resolver and content opener to expose a remote
//! account via WebDAV. The share is read-only: every mutating verb is
//! answered with `Forbidden`, but still invalidates the listing cache
//! for the touched paths so a client that writes through another
//! channel sees fresh state on the next request.

use crate::dir_entry::CloudDavDirEntry;
use crate::error::{gateway_error_to_fs_error, WebDavError, WebDavResult};
use crate::file::CloudDavFile;
use crate::metadata::{CloudDavMetaData, CollectionMetaData};
use clouddav_core::resolver::{CollectionNode, ResourceNode};
use clouddav_core::{
    ContentOpener, DirCache, GatewayConfig, GatewayError, ListingAdapter, Login, RemoteClient,
    Resolver, SessionStore,
};
use clouddav_core::session::ChallengeHandler;
use dav_server::davpath::DavPath;
use dav_server::fs::{
    DavDirEntry, DavFile, DavFileSystem, DavMetaData, FsError, FsFuture, FsStream, OpenOptions,
    ReadDirMeta,
};
use futures::stream;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, instrument, trace};

/// WebDAV filesystem backed by a remote cloud-storage account.
///
/// Cheap to clone; all state is shared through `Arc`s so dav-server
/// can clone one instance per request.
#[derive(Clone)]
pub struct CloudDav {
    resolver: Arc<Resolver>,
    opener: Arc<ContentOpener>,
}

impl CloudDav {
    /// Build a filesystem over an already-connected session store.
    pub fn new(
        client: Arc<dyn RemoteClient>,
        sessions: Arc<SessionStore>,
        config: GatewayConfig,
    ) -> Self {
        let cache = Arc::new(DirCache::new(config.cache_ttl, config.cache_max_entries));
        let adapter = ListingAdapter::new(Arc::clone(&client), Arc::clone(&sessions));
        let resolver = Arc::new(Resolver::new(adapter, cache, config));
        let opener = Arc::new(ContentOpener::new(client, sessions));
        Self { resolver, opener }
    }

    /// Log in to the remote service and build a filesystem.
    pub async fn connect(
        client: Arc<dyn RemoteClient>,
        login: Login,
        on_challenge: Option<ChallengeHandler>,
        config: GatewayConfig,
    ) -> WebDavResult<Self> {
        let sessions = SessionStore::connect(Arc::clone(&client), login, on_challenge)
            .await
            .map_err(GatewayError::from)
            .map_err(WebDavError::from)?;
        Ok(Self::new(client, Arc::new(sessions), config))
    }

    /// The resolver backing this filesystem.
    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    /// Parse a WebDAV path to a virtual path string.
    ///
    /// `DavPath` stores the percent-decoded request path; listing
    /// names are decoded text, so matching has to happen on the
    /// decoded form, not on the re-encoded URL string.
    fn parse_path(path: &DavPath) -> String {
        let path_str = String::from_utf8_lossy(path.as_bytes());
        let normalized = path_str.trim_start_matches('/').trim_end_matches('/');
        trace!(raw_path = %path_str, normalized = %normalized, "parse_path");
        if normalized.is_empty() {
            "/".to_string()
        } else {
            format!("/{normalized}")
        }
    }

    fn parent_of(path: &str) -> &str {
        match path.trim_end_matches('/').rsplit_once('/') {
            Some(("", _)) | None => "/",
            Some((parent, _)) => parent,
        }
    }

    async fn resolve(&self, path: &str) -> Result<ResourceNode, FsError> {
        match self.resolver.resolve(path).await {
            Ok(Some(node)) => Ok(node),
            Ok(None) => Err(FsError::NotFound),
            Err(e) => Err(gateway_error_to_fs_error(e)),
        }
    }

    async fn node_metadata(&self, node: &ResourceNode) -> Result<CloudDavMetaData, FsError> {
        match node {
            ResourceNode::Collection(c) if c.path == "/" => Ok(CloudDavMetaData::root()),
            ResourceNode::Collection(c) => {
                // The node itself carries no times; its entry lives in
                // the parent's listing, which is almost always cached
                // by the resolution that produced the node.
                let parent = CollectionNode {
                    path: Self::parent_of(&c.path).to_string(),
                };
                let listing = self
                    .resolver
                    .listing_of(&parent)
                    .await
                    .map_err(gateway_error_to_fs_error)?;
                let name = c.path.rsplit('/').next().unwrap_or_default();
                Ok(listing.find(name).map_or_else(
                    || {
                        CloudDavMetaData::Collection(CollectionMetaData {
                            created: SystemTime::UNIX_EPOCH,
                            modified: SystemTime::UNIX_EPOCH,
                        })
                    },
                    CloudDavMetaData::from_entry,
                ))
            }
            ResourceNode::PlainFile(f) => Ok(CloudDavMetaData::from_entry(&f.entry)),
            ResourceNode::DerivedStream(d) => Ok(CloudDavMetaData::derived(&d.source)),
        }
    }

    /// A mutating verb touched `path`: drop the cached listings it
    /// could have changed, then refuse the operation.
    fn reject_write(&self, path: &str) -> FsError {
        debug!(path = %path, "rejecting write operation on read-only share");
        let cache = self.resolver.cache();
        cache.invalidate(path);
        cache.invalidate(Self::parent_of(path));
        FsError::Forbidden
    }
}

impl DavFileSystem for CloudDav {
    #[instrument(level = "debug", skip(self, options), fields(path = %path.as_url_string()))]
    fn open<'a>(
        &'a self,
        path: &'a DavPath,
        options: OpenOptions,
    ) -> FsFuture<'a, Box<dyn DavFile>> {
        Box::pin(async move {
            let virtual_path = Self::parse_path(path);

            if options.write || options.append || options.truncate || options.create_new {
                return Err(self.reject_write(&virtual_path));
            }

            let node = match self.resolve(&virtual_path).await {
                Ok(node) => node,
                // `create` arrives combined with read on some clients;
                // only refuse it when the resource doesn't exist yet.
                Err(FsError::NotFound) if options.create => {
                    return Err(self.reject_write(&virtual_path));
                }
                Err(e) => return Err(e),
            };

            let content = self
                .opener
                .open(&node)
                .await
                .map_err(gateway_error_to_fs_error)?;
            // The transport-reported length wins when present (derived
            // payloads only know theirs after generation); a length-less
            // download falls back to the listing size.
            let metadata = match content.len() {
                Some(len) => self.node_metadata(&node).await?.with_len(len),
                None => self.node_metadata(&node).await?,
            };
            debug!(path = %virtual_path, length = metadata.len(), "opened content stream");
            Ok(Box::new(CloudDavFile::new(content, metadata)) as Box<dyn DavFile>)
        })
    }

    #[instrument(level = "debug", skip(self), fields(path = %path.as_url_string()))]
    fn read_dir<'a>(
        &'a self,
        path: &'a DavPath,
        _: ReadDirMeta,
    ) -> FsFuture<'a, FsStream<Box<dyn DavDirEntry>>> {
        Box::pin(async move {
            let virtual_path = Self::parse_path(path);
            let node = self.resolve(&virtual_path).await?;
            let ResourceNode::Collection(collection) = node else {
                return Err(FsError::Forbidden);
            };

            let listing = self
                .resolver
                .listing_of(&collection)
                .await
                .map_err(gateway_error_to_fs_error)?;

            let entries: Vec<Box<dyn DavDirEntry>> = listing
                .entries()
                .iter()
                .cloned()
                .map(|e| Box::new(CloudDavDirEntry::new(e)) as Box<dyn DavDirEntry>)
                .collect();
            trace!(count = entries.len(), "directory entries found");

            Ok(Box::pin(stream::iter(entries.into_iter().map(Ok))) as FsStream<_>)
        })
    }

    #[instrument(level = "debug", skip(self), fields(path = %path.as_url_string()))]
    fn metadata<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, Box<dyn DavMetaData>> {
        Box::pin(async move {
            let virtual_path = Self::parse_path(path);
            let node = self.resolve(&virtual_path).await?;
            let meta = self.node_metadata(&node).await?;
            Ok(Box::new(meta) as Box<dyn DavMetaData>)
        })
    }

    #[instrument(level = "debug", skip(self), fields(path = %path.as_url_string()))]
    fn create_dir<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, ()> {
        Box::pin(async move { Err(self.reject_write(&Self::parse_path(path))) })
    }

    #[instrument(level = "debug", skip(self), fields(path = %path.as_url_string()))]
    fn remove_dir<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, ()> {
        Box::pin(async move { Err(self.reject_write(&Self::parse_path(path))) })
    }

    #[instrument(level = "debug", skip(self), fields(path = %path.as_url_string()))]
    fn remove_file<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, ()> {
        Box::pin(async move { Err(self.reject_write(&Self::parse_path(path))) })
    }

    #[instrument(level = "debug", skip(self), fields(from = %from.as_url_string(), to = %to.as_url_string()))]
    fn rename<'a>(&'a self, from: &'a DavPath, to: &'a DavPath) -> FsFuture<'a, ()> {
        Box::pin(async move {
            self.reject_write(&Self::parse_path(from));
            Err(self.reject_write(&Self::parse_path(to)))
        })
    }

    #[instrument(level = "debug", skip(self), fields(from = %from.as_url_string(), to = %to.as_url_string()))]
    fn copy<'a>(&'a self, from: &'a DavPath, to: &'a DavPath) -> FsFuture<'a, ()> {
        Box::pin(async move {
            let _ = Self::parse_path(from);
            Err(self.reject_write(&Self::parse_path(to)))
        })
    }

    fn have_props<'a>(
        &'a self,
        _path: &'a DavPath,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = bool> + Send + 'a>> {
        // We don't support WebDAV properties beyond the basics
        Box::pin(async { false })
    }
}
