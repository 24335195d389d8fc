//! Directory listings and their normalization from raw remote metadata.
//!
//! The adapter boundary is where service-specific field shapes die:
//! everything past here sees only [`ListingEntry`]. Names are decoded
//! explicitly with the service's declared encoding and compared
//! byte-for-byte afterwards - no case folding, no unicode
//! normalization.

use crate::error::GatewayError;
use crate::remote::{RawEntry, RemoteClient};
use crate::session::{run_with_session, SessionStore};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Normalized metadata for one child of a remote directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Display name, unique within its listing.
    pub name: String,
    /// Absolute path in the remote service's representation.
    pub remote_path: String,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Creation time.
    pub created: SystemTime,
    /// Modification time.
    pub modified: SystemTime,
}

impl ListingEntry {
    /// The extension of the display name (lowercase-insensitive
    /// matching is the caller's job), if any.
    pub fn extension(&self) -> Option<&str> {
        self.name.rsplit_once('.').map(|(_, ext)| ext)
    }

    /// The display name without its extension.
    pub fn stem(&self) -> &str {
        self.name
            .rsplit_once('.')
            .map_or(self.name.as_str(), |(stem, _)| stem)
    }
}

/// The children of one remote directory, name-unique and unordered.
///
/// Replaced, never mutated, on refresh; shared by `Arc` from the cache.
#[derive(Debug, Clone, Default)]
pub struct DirectoryListing {
    entries: Vec<ListingEntry>,
}

impl DirectoryListing {
    /// Build a listing, dropping entries whose names collide.
    ///
    /// Duplicate names cannot be represented in a filesystem
    /// hierarchy; the first occurrence wins.
    pub fn new(entries: Vec<ListingEntry>) -> Self {
        let mut seen: Vec<&str> = Vec::with_capacity(entries.len());
        let mut unique = Vec::with_capacity(entries.len());
        for entry in &entries {
            if seen.contains(&entry.name.as_str()) {
                warn!(name = %entry.name, "dropping duplicate listing entry");
                continue;
            }
            seen.push(entry.name.as_str());
            unique.push(entry.clone());
        }
        Self { entries: unique }
    }

    /// Find an entry by exact byte match of its display name.
    pub fn find(&self, name: &str) -> Option<&ListingEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// All entries.
    pub fn entries(&self) -> &[ListingEntry] {
        &self.entries
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the directory has no members.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn epoch_time(seconds: i64) -> SystemTime {
    if seconds <= 0 {
        UNIX_EPOCH
    } else {
        UNIX_EPOCH + Duration::from_secs(seconds as u64)
    }
}

/// Fetches directory listings from the remote service and normalizes
/// them into [`DirectoryListing`]s.
pub struct ListingAdapter {
    client: Arc<dyn RemoteClient>,
    sessions: Arc<SessionStore>,
}

impl ListingAdapter {
    /// Create an adapter over a remote client and its session store.
    pub fn new(client: Arc<dyn RemoteClient>, sessions: Arc<SessionStore>) -> Self {
        Self { client, sessions }
    }

    /// List a remote directory.
    ///
    /// Runs under the centralized retry-once-on-auth-expiry policy.
    /// Fails with `RemoteError::NotFound` when the path does not exist
    /// server-side, `RemoteError::Unavailable` on transport failure.
    pub async fn list(&self, path: &str) -> Result<Arc<DirectoryListing>, GatewayError> {
        let raw = run_with_session(&self.sessions, |session| {
            let client = Arc::clone(&self.client);
            let path = path.to_string();
            async move { client.list_directory(&session, &path).await }
        })
        .await?;

        debug!(path, count = raw.len(), "fetched remote listing");
        let encoding = self.client.text_encoding();
        let mut entries = Vec::with_capacity(raw.len());
        for entry in raw {
            entries.push(self.normalize(entry, encoding)?);
        }
        Ok(Arc::new(DirectoryListing::new(entries)))
    }

    fn normalize(
        &self,
        raw: RawEntry,
        encoding: crate::remote::TextEncoding,
    ) -> Result<ListingEntry, GatewayError> {
        let name = encoding.decode(&raw.name)?;
        Ok(ListingEntry {
            name,
            remote_path: raw.path,
            size: raw.size,
            is_dir: raw.is_dir,
            created: epoch_time(raw.ctime),
            modified: epoch_time(raw.mtime),
        })
    }
}
