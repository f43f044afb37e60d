//! Verification of Firebase ID tokens and session cookies.
//!
//! Tokens are checked structurally and against the expected project before
//! their signature is verified with Google's rotating public keys, which are
//! cached for as long as the certificate endpoint's `cache-control` allows.

pub mod auth;
pub mod claims;
pub mod config;
pub mod error;
pub mod extractors;
pub mod jose;
pub mod keys;
pub mod project;
pub mod validation;
pub mod verifier;

pub use auth::FirebaseAuth;
pub use claims::DecodedToken;
pub use config::{TokenInfo, VerifierProfile};
pub use error::{AuthError, AuthErrorCode, AuthResult};
pub use extractors::{IdTokenAuth, SessionCookieAuth, SESSION_COOKIE_NAME};
pub use keys::{PublicKeyCache, PublicKeyFetcher, PublicKeySet};
pub use project::{EnvProjectId, ProjectIdResolver};
pub use verifier::TokenVerifier;
