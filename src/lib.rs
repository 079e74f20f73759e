//! Client-side JWT session management.
//!
//! This crate provides the authentication core for applications talking to a
//! JWT-secured backend (djoser-style endpoints):
//!
//! - [`auth::TokenStore`]: durable storage for the access/refresh token pair
//! - [`api::ApiClient`]: request gateway that attaches the bearer token,
//!   transparently refreshes it on 401, and retries the call exactly once
//! - [`auth::AuthEvents`]: observer registry notified when the session
//!   becomes permanently invalid (refresh rejected)
//! - [`auth::SessionManager`]: login/logout and restore-on-startup
//!   orchestration over the pieces above
//!
//! Concurrent calls that hit an expired access token share a single refresh
//! request; the gateway never issues more than one refresh at a time.

pub mod api;
pub mod auth;
pub mod config;

pub use api::{ApiClient, ApiError, AuthError};
pub use auth::{AuthEvents, Session, SessionManager, Subscription, TokenPair, TokenStore, UserProfile};
pub use config::Config;
