//! WebDAV metadata for gateway resources.
//!
//! This module provides the `DavMetaData` trait implementation for
//! remote collections, files and derived playlists.

use clouddav_core::ListingEntry;
use dav_server::fs::{DavMetaData, FsError};
use std::time::SystemTime;

/// Metadata for a gateway resource.
#[derive(Debug, Clone)]
pub enum CloudDavMetaData {
    /// The virtual root collection.
    Root,
    /// A remote directory.
    Collection(CollectionMetaData),
    /// A remote file.
    File(FileMetaData),
    /// A derived playlist. Its payload is generated on open, so
    /// PROPFIND reports zero length; GET responds with the real size.
    Derived(DerivedMetaData),
}

/// Metadata for a remote directory.
#[derive(Debug, Clone)]
pub struct CollectionMetaData {
    /// Creation time as reported by the remote service.
    pub created: SystemTime,
    /// Modification time as reported by the remote service.
    pub modified: SystemTime,
}

/// Metadata for a remote file.
#[derive(Debug, Clone)]
pub struct FileMetaData {
    /// Size in bytes.
    pub size: u64,
    /// Creation time as reported by the remote service.
    pub created: SystemTime,
    /// Modification time as reported by the remote service.
    pub modified: SystemTime,
}

/// Metadata for a derived playlist.
#[derive(Debug, Clone)]
pub struct DerivedMetaData {
    /// Size in bytes; zero until the payload has been generated.
    pub size: u64,
    /// Modification time of the synthesis source.
    pub modified: SystemTime,
}

impl CloudDavMetaData {
    /// Metadata for the virtual root.
    pub fn root() -> Self {
        CloudDavMetaData::Root
    }

    /// Metadata from a normalized listing entry.
    pub fn from_entry(entry: &ListingEntry) -> Self {
        if entry.is_dir {
            CloudDavMetaData::Collection(CollectionMetaData {
                created: entry.created,
                modified: entry.modified,
            })
        } else {
            CloudDavMetaData::File(FileMetaData {
                size: entry.size,
                created: entry.created,
                modified: entry.modified,
            })
        }
    }

    /// Metadata for a derived playlist synthesized from `source`.
    pub fn derived(source: &ListingEntry) -> Self {
        CloudDavMetaData::Derived(DerivedMetaData {
            size: 0,
            modified: source.modified,
        })
    }

    /// Same metadata with the length replaced, keeping the timestamps.
    /// Used by open handles once the real payload size is known.
    #[must_use]
    pub fn with_len(mut self, len: u64) -> Self {
        match &mut self {
            CloudDavMetaData::File(f) => f.size = len,
            CloudDavMetaData::Derived(d) => d.size = len,
            CloudDavMetaData::Root | CloudDavMetaData::Collection(_) => {}
        }
        self
    }
}

impl DavMetaData for CloudDavMetaData {
    fn len(&self) -> u64 {
        match self {
            CloudDavMetaData::Root | CloudDavMetaData::Collection(_) => 0,
            CloudDavMetaData::File(f) => f.size,
            CloudDavMetaData::Derived(d) => d.size,
        }
    }

    fn modified(&self) -> Result<SystemTime, FsError> {
        let time = match self {
            CloudDavMetaData::Root => SystemTime::now(),
            CloudDavMetaData::Collection(c) => c.modified,
            CloudDavMetaData::File(f) => f.modified,
            CloudDavMetaData::Derived(d) => d.modified,
        };
        Ok(time)
    }

    fn is_dir(&self) -> bool {
        matches!(
            self,
            CloudDavMetaData::Root | CloudDavMetaData::Collection(_)
        )
    }

    fn is_file(&self) -> bool {
        matches!(
            self,
            CloudDavMetaData::File(_) | CloudDavMetaData::Derived(_)
        )
    }

    fn is_symlink(&self) -> bool {
        false
    }

    fn created(&self) -> Result<SystemTime, FsError> {
        match self {
            CloudDavMetaData::Root => Ok(SystemTime::now()),
            CloudDavMetaData::Collection(c) => Ok(c.created),
            CloudDavMetaData::File(f) => Ok(f.created),
            // Derived entries have no remote counterpart to date.
            CloudDavMetaData::Derived(d) => Ok(d.modified),
        }
    }

    fn accessed(&self) -> Result<SystemTime, FsError> {
        // The remote services don't report access times.
        self.modified()
    }

    fn status_changed(&self) -> Result<SystemTime, FsError> {
        self.modified()
    }

    fn executable(&self) -> Result<bool, FsError> {
        Ok(false)
    }
}
