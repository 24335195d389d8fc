//! Session ownership and the retry-once re-authentication policy.
//!
//! The [`SessionStore`] is the only holder of the authenticated
//! [`Session`]; every outbound remote call borrows the current session
//! through [`run_with_session`], which centralizes the
//! refresh-and-retry-once behavior instead of sprinkling it at call
//! sites.

use crate::error::{AuthError, Challenge, GatewayError, RemoteError};
use crate::remote::{RemoteClient, Session};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Login inputs for one remote account.
#[derive(Debug, Clone)]
pub struct Login {
    /// Account username.
    pub username: String,
    /// Account password.
    pub password: String,
    /// Optional on-disk credential file. Read at startup; rewritten
    /// after every fresh authentication.
    pub credential_file: Option<PathBuf>,
}

/// Callback answering an interactive challenge (e.g. typing a CAPTCHA).
///
/// Returning `None` aborts authentication with
/// [`AuthError::InteractionRequired`].
pub type ChallengeHandler = Box<dyn Fn(&Challenge) -> Option<String> + Send + Sync>;

/// On-disk shape of the persisted credential file.
#[derive(Debug, Serialize, Deserialize)]
struct CredentialFile {
    credential: String,
    tokens: BTreeMap<String, String>,
}

/// Owner of the authenticated session for one remote account.
///
/// The session is shared read-only as `Arc<Session>` and replaced
/// wholesale on refresh; the lock is only held for the pointer swap,
/// never across a network call.
pub struct SessionStore {
    client: Arc<dyn RemoteClient>,
    login: Login,
    on_challenge: Option<ChallengeHandler>,
    current: RwLock<Arc<Session>>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("account", &self.login.username)
            .field("credential_file", &self.login.credential_file)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Establish a session: reuse the persisted credential file when it
    /// parses, otherwise run a fresh credential exchange.
    ///
    /// A missing or unparsable credential file is not an error; it just
    /// forces the fresh exchange.
    pub async fn connect(
        client: Arc<dyn RemoteClient>,
        login: Login,
        on_challenge: Option<ChallengeHandler>,
    ) -> Result<Self, AuthError> {
        let store = Self {
            client,
            login,
            on_challenge,
            current: RwLock::new(Arc::new(Session {
                account: String::new(),
                credential: String::new(),
                tokens: BTreeMap::new(),
            })),
        };

        if let Some(session) = store.load_persisted() {
            info!(account = %store.login.username, "reusing persisted session");
            *store.current.write() = Arc::new(session);
        } else {
            store.refresh().await?;
        }
        Ok(store)
    }

    /// The current session. Cheap; taken per outbound call.
    pub fn current(&self) -> Arc<Session> {
        Arc::clone(&self.current.read())
    }

    /// Run the credential exchange again and swap in the new session.
    ///
    /// An interactive challenge is answered through the configured
    /// handler exactly once; with no handler (or a declined prompt) the
    /// challenge propagates as [`AuthError::InteractionRequired`].
    pub async fn refresh(&self) -> Result<Arc<Session>, AuthError> {
        debug!(account = %self.login.username, "authenticating against remote service");
        let session = match self
            .client
            .authenticate(&self.login.username, &self.login.password)
            .await
        {
            Ok(session) => session,
            Err(AuthError::InteractionRequired(challenge)) => {
                let Some(handler) = &self.on_challenge else {
                    return Err(AuthError::InteractionRequired(challenge));
                };
                let Some(response) = handler(&challenge) else {
                    return Err(AuthError::InteractionRequired(challenge));
                };
                debug!("submitting interactive challenge response");
                self.client.submit_challenge(&challenge, &response).await?
            }
            Err(e) => return Err(e),
        };

        let session = Arc::new(session);
        self.persist(&session);
        *self.current.write() = Arc::clone(&session);
        info!(account = %session.account, "remote session established");
        Ok(session)
    }

    fn load_persisted(&self) -> Option<Session> {
        let path = self.login.credential_file.as_ref()?;
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no persisted credentials");
                return None;
            }
        };
        match serde_json::from_slice::<CredentialFile>(&raw) {
            Ok(file) => Some(Session {
                account: self.login.username.clone(),
                credential: file.credential,
                tokens: file.tokens,
            }),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unparsable credential file");
                None
            }
        }
    }

    /// Persistence failures are logged, never fatal: the session still
    /// works for this process lifetime.
    fn persist(&self, session: &Session) {
        let Some(path) = &self.login.credential_file else {
            return;
        };
        let file = CredentialFile {
            credential: session.credential.clone(),
            tokens: session.tokens.clone(),
        };
        let result = serde_json::to_vec_pretty(&file)
            .map_err(std::io::Error::other)
            .and_then(|raw| std::fs::write(path, raw));
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "failed to persist credentials");
        }
    }
}

/// Run one outbound remote call with the retry-once-on-auth-expiry
/// policy.
///
/// On [`RemoteError::AuthExpired`] the session is refreshed and the
/// call retried exactly once; a second expiry, any other remote error,
/// or a refresh failure propagates.
pub async fn run_with_session<T, F, Fut>(
    store: &SessionStore,
    op: F,
) -> Result<T, GatewayError>
where
    F: Fn(Arc<Session>) -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    match op(store.current()).await {
        Err(RemoteError::AuthExpired) => {
            debug!("session rejected, refreshing and retrying once");
            let session = store.refresh().await?;
            op(session).await.map_err(GatewayError::from)
        }
        other => other.map_err(GatewayError::from),
    }
}
