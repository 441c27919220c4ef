//! `atrium-tokens` — credential issuance and the rotating refresh lifecycle.
//!
//! The issuer runs the resolution engine at login, refresh, and
//! organization-switch time, freezes the result into signed access-credential
//! claims, and manages the persisted refresh credential. Claims are
//! deliberately not invalidated when grants change before expiry; the short
//! access TTL bounds the staleness window.

pub mod issuer;
pub mod refresh;

pub use issuer::{ClientInfo, CredentialIssuer, CredentialPair};
pub use refresh::{
    generate_raw_token, hash_token, InMemoryRefreshTokenStore, RefreshToken, RefreshTokenStore,
};
