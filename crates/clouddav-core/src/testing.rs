//! In-memory test double for a remote cloud-storage service.
//!
//! [`FakeRemote`] implements [`RemoteClient`] over a hashmap tree and
//! records call counts, so tests can assert exactly how often the
//! gateway hit the "network". It lives in the public API so dependent
//! crates can drive their integration tests with it.

use crate::error::{AuthError, Challenge, RemoteError};
use crate::remote::{RawEntry, RemoteClient, RemoteDownload, Session};
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream;
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Fixed timestamp stamped on every fake entry.
const FAKE_TIME: i64 = 1_700_000_000;

/// Chunk size used when streaming fake file bodies.
const CHUNK: usize = 4096;

#[derive(Debug, Clone)]
struct FakeEntry {
    name: Vec<u8>,
    path: String,
    size: u64,
    is_dir: bool,
}

#[derive(Debug, Clone)]
struct FakeFile {
    content: Bytes,
    declared_size: u64,
    /// Whether `open_download` reports a total length. Some transports
    /// stream chunked bodies without one.
    report_length: bool,
}

#[derive(Debug, Default)]
struct FakeState {
    /// Listing per directory path. Root is always present.
    dirs: BTreeMap<String, Vec<FakeEntry>>,
    files: BTreeMap<String, FakeFile>,
    /// Pending interactive challenge, if any. Cleared once answered.
    challenge: Option<String>,
    /// Number of upcoming listing calls to reject as expired.
    expire_remaining: usize,
    authenticate_calls: usize,
    challenge_calls: usize,
    list_calls: BTreeMap<String, usize>,
}

/// In-memory stand-in for a remote service.
#[derive(Debug)]
pub struct FakeRemote {
    state: Mutex<FakeState>,
}

impl Default for FakeRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeRemote {
    /// Create a fake with an empty root directory.
    pub fn new() -> Self {
        let mut state = FakeState::default();
        state.dirs.insert("/".to_string(), Vec::new());
        Self {
            state: Mutex::new(state),
        }
    }

    fn add_entry(state: &mut FakeState, path: &str, size: u64, is_dir: bool) {
        let (parent, name) = match path.rsplit_once('/') {
            Some(("", name)) => ("/", name),
            Some((parent, name)) => (parent, name),
            None => ("/", path),
        };
        state.dirs.entry(parent.to_string()).or_default().push(FakeEntry {
            name: name.as_bytes().to_vec(),
            path: path.to_string(),
            size,
            is_dir,
        });
    }

    /// Register an empty directory at `path`.
    pub fn add_dir(&self, path: &str) {
        let mut state = self.state.lock();
        Self::add_entry(&mut state, path, 0, true);
        state.dirs.entry(path.to_string()).or_default();
    }

    /// Register a file at `path` with the given content.
    pub fn add_file(&self, path: &str, content: &[u8]) {
        let mut state = self.state.lock();
        Self::add_entry(&mut state, path, content.len() as u64, false);
        state.files.insert(
            path.to_string(),
            FakeFile {
                content: Bytes::copy_from_slice(content),
                declared_size: content.len() as u64,
                report_length: true,
            },
        );
    }

    /// Register a file at `path` whose download stream does not report
    /// a total length, like a chunked transfer.
    pub fn add_unsized_file(&self, path: &str, content: &[u8]) {
        let mut state = self.state.lock();
        Self::add_entry(&mut state, path, content.len() as u64, false);
        state.files.insert(
            path.to_string(),
            FakeFile {
                content: Bytes::copy_from_slice(content),
                declared_size: content.len() as u64,
                report_length: false,
            },
        );
    }

    /// Register a file at `path` that reports `size` bytes without
    /// carrying an actual body. Useful for large-file metadata tests.
    pub fn add_sized_file(&self, path: &str, size: u64) {
        let mut state = self.state.lock();
        Self::add_entry(&mut state, path, size, false);
        state.files.insert(
            path.to_string(),
            FakeFile {
                content: Bytes::new(),
                declared_size: size,
                report_length: true,
            },
        );
    }

    /// Add an entry under `parent` whose display name is raw bytes,
    /// bypassing UTF-8.
    pub fn add_raw_name(&self, parent: &str, name: Vec<u8>) {
        let mut state = self.state.lock();
        let path = format!(
            "{}/{}",
            parent.trim_end_matches('/'),
            String::from_utf8_lossy(&name)
        );
        state.dirs.entry(parent.to_string()).or_default().push(FakeEntry {
            name,
            path,
            size: 0,
            is_dir: false,
        });
    }

    /// Make the next login round require an interactive challenge
    /// with the given code.
    pub fn require_challenge(&self, code: &str) {
        self.state.lock().challenge = Some(code.to_string());
    }

    /// Reject the next `times` listing calls as session-expired.
    pub fn expire_session_times(&self, times: usize) {
        self.state.lock().expire_remaining = times;
    }

    /// Number of `authenticate` calls seen so far.
    pub fn authenticate_calls(&self) -> usize {
        self.state.lock().authenticate_calls
    }

    /// Number of `submit_challenge` calls seen so far.
    pub fn challenge_calls(&self) -> usize {
        self.state.lock().challenge_calls
    }

    /// Number of `list_directory` calls seen for `path`.
    pub fn list_calls(&self, path: &str) -> usize {
        self.state.lock().list_calls.get(path).copied().unwrap_or(0)
    }

    fn session_for(account: &str) -> Session {
        Session {
            account: account.to_string(),
            credential: "fake-cookie".to_string(),
            tokens: BTreeMap::from([("token".to_string(), "t-0".to_string())]),
        }
    }
}

impl RemoteClient for FakeRemote {
    fn authenticate<'a>(
        &'a self,
        username: &'a str,
        _password: &'a str,
    ) -> BoxFuture<'a, Result<Session, AuthError>> {
        let result = {
            let mut state = self.state.lock();
            state.authenticate_calls += 1;
            match &state.challenge {
                Some(code) => Err(AuthError::InteractionRequired(Challenge {
                    code: code.clone(),
                    prompt_url: format!("https://fake.invalid/challenge/{code}"),
                })),
                None => Ok(Self::session_for(username)),
            }
        };
        Box::pin(async move { result })
    }

    fn submit_challenge<'a>(
        &'a self,
        _challenge: &'a Challenge,
        response: &'a str,
    ) -> BoxFuture<'a, Result<Session, AuthError>> {
        let result = {
            let mut state = self.state.lock();
            state.challenge_calls += 1;
            if response.is_empty() {
                Err(AuthError::Failed)
            } else {
                state.challenge = None;
                Ok(Self::session_for("user"))
            }
        };
        Box::pin(async move { result })
    }

    fn list_directory<'a>(
        &'a self,
        _session: &'a Session,
        path: &'a str,
    ) -> BoxFuture<'a, Result<Vec<RawEntry>, RemoteError>> {
        let result = {
            let mut state = self.state.lock();
            *state.list_calls.entry(path.to_string()).or_insert(0) += 1;
            if state.expire_remaining > 0 {
                state.expire_remaining -= 1;
                Err(RemoteError::AuthExpired)
            } else {
                match state.dirs.get(path) {
                    Some(entries) => Ok(entries
                        .iter()
                        .map(|e| RawEntry {
                            name: e.name.clone(),
                            path: e.path.clone(),
                            size: e.size,
                            is_dir: e.is_dir,
                            ctime: FAKE_TIME,
                            mtime: FAKE_TIME,
                        })
                        .collect()),
                    None => Err(RemoteError::NotFound),
                }
            }
        };
        Box::pin(async move { result })
    }

    fn open_download<'a>(
        &'a self,
        _session: &'a Session,
        path: &'a str,
    ) -> BoxFuture<'a, Result<RemoteDownload, RemoteError>> {
        let result = {
            let state = self.state.lock();
            match state.files.get(path) {
                Some(file) => {
                    let chunks: Vec<Result<Bytes, RemoteError>> = file
                        .content
                        .chunks(CHUNK)
                        .map(|c| Ok(Bytes::copy_from_slice(c)))
                        .collect();
                    Ok(RemoteDownload {
                        length: file.report_length.then_some(file.declared_size),
                        supports_range: false,
                        body: Box::pin(stream::iter(chunks)),
                    })
                }
                None => Err(RemoteError::NotFound),
            }
        };
        Box::pin(async move { result })
    }

    fn playlist_payload<'a>(
        &'a self,
        _session: &'a Session,
        path: &'a str,
    ) -> BoxFuture<'a, Result<String, RemoteError>> {
        let result = {
            let state = self.state.lock();
            if state.files.contains_key(path) {
                Ok(format!(
                    "#EXTM3U\n#EXT-X-VERSION:3\n#EXTINF:-1,{path}\nhttps://fake.invalid/stream{path}\n#EXT-X-ENDLIST\n"
                ))
            } else {
                Err(RemoteError::NotFound)
            }
        };
        Box::pin(async move { result })
    }
}
