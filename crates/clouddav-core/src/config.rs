//! Gateway configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default directory-listing cache TTL (30 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// Default directory-listing cache capacity.
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 10;

/// Default minimum source size for playlist synthesis (500 MiB).
pub const DEFAULT_DERIVED_MIN_SIZE: u64 = 500 * 1024 * 1024;

/// Default directory-size cap above which playlist synthesis is skipped.
pub const DEFAULT_SYNTHESIS_MAX_MEMBERS: usize = 10;

/// Tunables for caching and derived-resource synthesis.
///
/// All fields carry reference defaults via [`Default`]; the struct
/// round-trips through serde so it can be embedded in a config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Maximum age before a cached directory listing is treated as absent.
    #[serde(with = "humantime_serde")]
    pub cache_ttl: Duration,

    /// Maximum number of cached directory listings; the least recently
    /// used entry is evicted when the bound is exceeded.
    pub cache_max_entries: usize,

    /// File extensions (lowercase, without dot) eligible as playlist
    /// synthesis sources.
    pub video_extensions: Vec<String>,

    /// Extension (without dot) of the synthesized virtual playlist name.
    pub playlist_extension: String,

    /// Minimum source file size for playlist synthesis.
    pub derived_min_size: u64,

    /// Directories with more members than this never synthesize
    /// playlist names, bounding the per-lookup scan cost.
    pub synthesis_max_members: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            video_extensions: ["avi", "mp4", "mkv", "mov"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            playlist_extension: "m3u8".to_string(),
            derived_min_size: DEFAULT_DERIVED_MIN_SIZE,
            synthesis_max_members: DEFAULT_SYNTHESIS_MAX_MEMBERS,
        }
    }
}

impl GatewayConfig {
    /// True if `ext` names a recognized video extension.
    pub fn is_video_extension(&self, ext: &str) -> bool {
        self.video_extensions
            .iter()
            .any(|v| v.eq_ignore_ascii_case(ext))
    }
}
