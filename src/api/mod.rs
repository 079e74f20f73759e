//! Request gateway for the JWT-protected backend.
//!
//! This module provides the `ApiClient` for talking to the identity-protected
//! API. The client injects the stored bearer token into each request,
//! refreshes it transparently on 401 (coalescing concurrent refreshes into a
//! single call), and retries the original request exactly once.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::{ApiError, AuthError};
