//! Core gateway logic for exposing a remote cloud-storage account as a
//! filesystem tree.
//!
//! The crate is service-agnostic: everything that talks to a concrete
//! cloud service lives behind the [`remote::RemoteClient`] trait. On
//! top of that boundary sit the pieces a WebDAV (or any other) facade
//! composes:
//!
//! - [`session::SessionStore`] — holds the authenticated session and
//!   refreshes it transparently when the service rejects it
//! - [`cache::DirCache`] — TTL + LRU cache of directory listings
//! - [`listing::ListingAdapter`] — fetches and normalizes raw listings
//! - [`resolver::Resolver`] — maps virtual paths to resource nodes,
//!   including derived streaming playlists that have no remote
//!   counterpart
//! - [`stream::ContentOpener`] — opens readable content for a resolved
//!   node
//!
//! [`testing::FakeRemote`] is an in-memory [`remote::RemoteClient`] for
//! integration tests.

pub mod cache;
pub mod config;
pub mod error;
pub mod listing;
pub mod remote;
pub mod resolver;
pub mod session;
pub mod stream;
pub mod testing;

pub use cache::DirCache;
pub use config::GatewayConfig;
pub use error::{AuthError, Challenge, GatewayError, GatewayResult, RemoteError};
pub use listing::{DirectoryListing, ListingAdapter, ListingEntry};
pub use remote::{DownloadStream, RawEntry, RemoteClient, RemoteDownload, Session, TextEncoding};
pub use resolver::{ResourceNode, Resolver};
pub use session::{ChallengeHandler, Login, SessionStore, run_with_session};
pub use stream::{ContentOpener, GatewayContent};
