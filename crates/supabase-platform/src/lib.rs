//! HTTP client for a Supabase-compatible platform.
//!
//! One [`PlatformClient`] covers the two HTTP surfaces the todo client uses:
//! - GoTrue auth (`/auth/v1/*`): sign-up, password sign-in, refresh, user, logout
//! - PostgREST data (`/rest/v1/<table>`): select, insert, update, delete
//!
//! It also derives the realtime websocket URL; the socket itself lives in the
//! `realtime-feed` crate.

mod auth;
mod client;
mod error;
mod rest;

pub use auth::{AuthSession, AuthUser};
pub use client::PlatformClient;
pub use error::{extract_error_message, PlatformError, PlatformResult};
pub use rest::eq;
