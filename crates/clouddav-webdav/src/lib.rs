//! WebDAV frontend for the clouddav gateway.
//!
//! This crate exposes a remote cloud-storage account as a read-only
//! WebDAV share:
//! 1. A local HTTP server implements the WebDAV protocol via
//!    `dav-server`
//! 2. Users mount it with macOS Finder (Cmd+K), Windows Explorer, or
//!    davfs2 on Linux
//! 3. The server translates WebDAV requests into gateway operations:
//!    cached directory listings, streamed downloads, and synthesized
//!    streaming playlists
//!
//! # Example
//!
//! ```ignore
//! use clouddav_core::{GatewayConfig, Login};
//! use clouddav_webdav::{CloudDav, ServerConfig, WebDavServer};
//!
//! let fs = CloudDav::connect(client, login, None, GatewayConfig::default()).await?;
//! let server = WebDavServer::start(fs, ServerConfig::default()).await?;
//! println!("Mount via: {}", server.url());
//! ```
//!
//! # Security
//!
//! By default, the server binds to localhost (127.0.0.1) only.
//! No authentication is required since only local connections are
//! accepted; the remote-service credentials never leave the gateway.

mod dir_entry;
mod error;
mod file;
mod filesystem;
mod metadata;
mod server;

// Public exports
pub use error::{WebDavError, WebDavResult};
pub use filesystem::CloudDav;
pub use server::{ServerConfig, WebDavServer};
