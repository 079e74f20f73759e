//! Request gateway for the JWT-protected backend.
//!
//! `ApiClient` attaches the stored access token to outbound requests,
//! detects authorization failures, and drives the refresh protocol before
//! retrying the original call exactly once.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::{AuthEvents, TokenPair, TokenStore, UserProfile};
use crate::config::Config;

use super::{ApiError, AuthError};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Login endpoint (issues an access/refresh pair)
const LOGIN_PATH: &str = "/auth/jwt/create/";

/// Refresh endpoint (exchanges a refresh token for a new access token)
const REFRESH_PATH: &str = "/auth/jwt/refresh/";

/// Verify endpoint (checks an access token without fetching anything)
const VERIFY_PATH: &str = "/auth/jwt/verify/";

/// Profile endpoint for the authenticated user
const ME_PATH: &str = "/auth/users/me/";

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

/// Request gateway with transparent token refresh.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    store: Arc<TokenStore>,
    events: AuthEvents,
    /// Coalesces concurrent refresh attempts: at most one refresh call is in
    /// flight; callers that hit a 401 while it runs wait here for its outcome.
    refresh_gate: Arc<tokio::sync::Mutex<()>>,
}

impl ApiClient {
    /// Create a new gateway over the given token store and event registry.
    pub fn new(config: &Config, store: Arc<TokenStore>, events: AuthEvents) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            store,
            events,
            refresh_gate: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ===== Protocol core =====

    /// Send a request through the refresh protocol, returning the raw
    /// response.
    ///
    /// The access token (when present) is attached as a bearer header. On a
    /// 401 the gateway refreshes the access token and re-dispatches once; a
    /// second 401 is returned to the caller unchanged. Responses with other
    /// statuses pass through untouched.
    pub async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Response> {
        // Per-call retry flag: each logical call gets exactly one refresh
        // attempt, so a refresh endpoint that itself 401s cannot loop.
        let mut retried = false;

        loop {
            let access = self.store.access_token();
            let response = self.dispatch(&method, path, body, access.as_deref()).await?;

            if response.status() == StatusCode::UNAUTHORIZED && !retried {
                retried = true;
                debug!(path, "Received 401, attempting token refresh");
                self.ensure_fresh_access(access.as_deref()).await?;
                continue;
            }

            return Ok(response);
        }
    }

    async fn dispatch(
        &self,
        method: &Method,
        path: &str,
        body: Option<&Value>,
        access: Option<&str>,
    ) -> Result<Response> {
        let mut request = self.client.request(method.clone(), self.url(path));
        if let Some(token) = access {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        request
            .send()
            .await
            .map_err(|e| ApiError::Transport(e).into())
    }

    /// Make sure the store holds an access token newer than `stale_access`.
    ///
    /// Serialized on the refresh gate. After acquiring it, the store is
    /// re-read: if a concurrent call already swapped the token in, no second
    /// refresh call is made. On refresh failure the store is cleared and
    /// subscribers are notified before the error is surfaced.
    async fn ensure_fresh_access(&self, stale_access: Option<&str>) -> Result<()> {
        let _gate = self.refresh_gate.lock().await;

        if let Some(current) = self.store.access_token() {
            if stale_access != Some(current.as_str()) {
                debug!("Access token already refreshed by a concurrent call");
                return Ok(());
            }
        }

        let refresh = self
            .store
            .refresh_token()
            .ok_or(ApiError::Auth(AuthError::MissingRefreshToken))?;

        match self.request_refresh(&refresh).await {
            Ok(access) => {
                self.store.replace_access(&access)?;
                info!("Access token refreshed");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Token refresh failed, clearing session");
                self.store.clear()?;
                self.events.notify_session_expired();
                Err(ApiError::Auth(err).into())
            }
        }
    }

    /// Call the refresh endpoint. Sent without a bearer header; the refresh
    /// token in the body is the only credential.
    async fn request_refresh(&self, refresh: &str) -> std::result::Result<String, AuthError> {
        let response = self
            .client
            .post(self.url(REFRESH_PATH))
            .json(&serde_json::json!({ "refresh": refresh }))
            .send()
            .await
            .map_err(AuthError::RefreshTransport)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::RefreshRejected(format!(
                "status {}: {}",
                status,
                ApiError::truncate_body(&body)
            )));
        }

        let parsed: RefreshResponse = response.json().await.map_err(AuthError::RefreshTransport)?;
        Ok(parsed.access)
    }

    // ===== Typed wrappers =====

    /// GET `path` through the protocol and deserialize the JSON response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(Method::GET, path, None).await?;
        let response = Self::check_response(response).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", path))
    }

    /// POST a JSON body to `path` through the protocol and deserialize the
    /// response.
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body).context("Failed to serialize request body")?;
        let response = self.send(Method::POST, path, Some(&body)).await?;
        let response = Self::check_response(response).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", path))
    }

    /// Check if response is successful, returning a typed error with body if not.
    async fn check_response(response: Response) -> Result<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    // ===== Auth endpoints =====

    /// Exchange credentials for a token pair.
    ///
    /// A 400/401 response is a credential rejection; its `detail` message is
    /// surfaced as `ApiError::InvalidCredentials`.
    pub async fn login_tokens(&self, username: &str, password: &str) -> Result<TokenPair> {
        let response = self
            .client
            .post(self.url(LOGIN_PATH))
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await
            .map_err(ApiError::Transport)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::invalid_credentials(&body).into());
        }

        let response = Self::check_response(response).await?;
        response
            .json()
            .await
            .context("Failed to parse login response")
    }

    /// Ask the backend whether `token` is currently valid.
    pub async fn verify(&self, token: &str) -> Result<bool> {
        let response = self
            .client
            .post(self.url(VERIFY_PATH))
            .json(&serde_json::json!({ "token": token }))
            .send()
            .await
            .map_err(ApiError::Transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::BAD_REQUEST {
            return Ok(false);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, &body).into())
    }

    /// Fetch the authenticated user's profile through the gateway, so an
    /// expired access token is refreshed transparently.
    pub async fn fetch_me(&self) -> Result<UserProfile> {
        self.get(ME_PATH).await
    }
}
