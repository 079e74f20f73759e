//! Session state: token persistence, auth-failure events, and
//! login/restore/logout orchestration.
//!
//! This module provides:
//! - `TokenStore`: durable storage for the access/refresh token pair
//! - `AuthEvents`: observer registry for unrecoverable auth failure
//! - `SessionManager`: rebuilds the session at startup and handles
//!   login/logout
//!
//! Tokens are opaque bearer credentials; expiry is the server's business and
//! is observed only through 401 responses.

pub mod events;
pub mod session;
pub mod store;

pub use events::{AuthEvents, Subscription};
pub use session::{Session, SessionManager, UserProfile};
pub use store::{TokenPair, TokenStore};
