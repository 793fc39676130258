//! Who is talking to the engine, and where they sit.
//!
//! 1. **Authentication**: resolving a participant handshake token
//!    ([`Authenticator`])
//! 2. **Admin gate**: checking the admin credential ([`AdminGate`])
//! 3. **Check-in**: binding a participant to a table by its QR token
//!    ([`CheckInDesk`]) and verifying session ownership for later calls
//!
//! Duelhall does not design an authentication protocol; tokens are opaque
//! here and only the trait implementation knows what they mean.

#![allow(async_fn_in_trait)]

mod admin;
mod auth;
mod desk;
mod error;

pub use admin::{AdminGate, StaticAdminKey};
pub use auth::{Authenticator, NumericTokenAuthenticator};
pub use desk::{CheckIn, CheckInDesk, owned_session};
pub use error::SessionError;
