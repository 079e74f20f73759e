use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::auth::{AuthEvents, TokenStore};
use crate::config::Config;

/// Profile of the authenticated user, fetched from the backend.
/// Held in memory only; rebuilt on every restore or login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: String,
}

/// Derived session state. Never persisted directly; reconstructed from the
/// stored token pair plus a profile fetch.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub authenticated: bool,
    pub user: Option<UserProfile>,
}

impl Session {
    fn authenticated(user: UserProfile) -> Self {
        Self {
            authenticated: true,
            user: Some(user),
        }
    }

    fn anonymous() -> Self {
        Self::default()
    }
}

/// Login/logout and restore-on-startup orchestration over the token store
/// and the request gateway.
#[derive(Clone)]
pub struct SessionManager {
    client: ApiClient,
    store: Arc<TokenStore>,
}

impl SessionManager {
    /// Wire up the store, event registry, and gateway from a config.
    pub fn new(config: &Config, events: AuthEvents) -> Result<Self> {
        let store = Arc::new(TokenStore::open(&config.storage_dir)?);
        let client = ApiClient::new(config, Arc::clone(&store), events)?;
        Ok(Self { client, store })
    }

    /// The gateway this manager wired up, for application request traffic.
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Rebuild the session from the persisted token pair at process start.
    ///
    /// A single profile fetch goes through the gateway; an expired access
    /// token is upgraded by its built-in refresh along the way. If that
    /// fails, the stored pair is dead and the store is cleared.
    pub async fn restore(&self) -> Result<Session> {
        if self.store.get().is_none() {
            debug!("No persisted tokens, starting anonymous");
            return Ok(Session::anonymous());
        }

        match self.client.fetch_me().await {
            Ok(user) => {
                info!(username = %user.username, "Session restored");
                Ok(Session::authenticated(user))
            }
            Err(err) => {
                warn!(error = %err, "Session restore failed, clearing stored tokens");
                self.store.clear()?;
                Ok(Session::anonymous())
            }
        }
    }

    /// Authenticate with the backend and establish a session.
    ///
    /// Invalid credentials surface as `ApiError::InvalidCredentials` with the
    /// backend's message when it provides one.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        let pair = self.client.login_tokens(username, password).await?;
        self.store.set(pair)?;

        let user = self.client.fetch_me().await?;
        info!(username = %user.username, "Logged in");
        Ok(Session::authenticated(user))
    }

    /// Drop the session and forget the stored tokens.
    pub fn logout(&self) -> Result<Session> {
        self.store.clear()?;
        info!("Logged out");
        Ok(Session::anonymous())
    }
}
