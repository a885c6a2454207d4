//! Request extractors.
//!
//! - [`auth::AuthUser`] -- resolves the caller's recipient identity from a
//!   JWT Bearer token.

pub mod auth;
