//! WebDAV directory entry implementation for gateway listings.

use crate::metadata::CloudDavMetaData;
use clouddav_core::ListingEntry;
use dav_server::fs::{DavDirEntry, DavMetaData, FsFuture};

/// One child of a remote directory, as served to WebDAV clients.
///
/// Derived playlists are resolvable by name but deliberately never
/// appear here: only entries the remote service actually reported are
/// listed.
#[derive(Debug, Clone)]
pub struct CloudDavDirEntry {
    entry: ListingEntry,
}

impl CloudDavDirEntry {
    /// Wrap a normalized listing entry.
    pub fn new(entry: ListingEntry) -> Self {
        Self { entry }
    }
}

impl DavDirEntry for CloudDavDirEntry {
    fn name(&self) -> Vec<u8> {
        self.entry.name.as_bytes().to_vec()
    }

    fn metadata(&self) -> FsFuture<'_, Box<dyn DavMetaData>> {
        let meta = CloudDavMetaData::from_entry(&self.entry);
        Box::pin(async move { Ok(Box::new(meta) as Box<dyn DavMetaData>) })
    }

    fn is_dir(&self) -> FsFuture<'_, bool> {
        let is_dir = self.entry.is_dir;
        Box::pin(async move { Ok(is_dir) })
    }

    fn is_file(&self) -> FsFuture<'_, bool> {
        let is_file = !self.entry.is_dir;
        Box::pin(async move { Ok(is_file) })
    }

    fn is_symlink(&self) -> FsFuture<'_, bool> {
        Box::pin(async { Ok(false) })
    }
}
