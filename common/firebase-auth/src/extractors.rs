use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::{request::Parts, HeaderMap};

use crate::auth::FirebaseAuth;
use crate::claims::DecodedToken;
use crate::error::{AuthError, AuthResult};

/// The only cookie Firebase Hosting forwards to backends.
pub const SESSION_COOKIE_NAME: &str = "__session";

/// Verified ID token taken from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct IdTokenAuth {
    pub token: DecodedToken,
    pub raw: String,
}

/// Verified session cookie taken from the `__session` cookie.
#[derive(Debug, Clone)]
pub struct SessionCookieAuth {
    pub token: DecodedToken,
    pub raw: String,
}

impl IdTokenAuth {
    pub fn uid(&self) -> &str {
        &self.token.uid
    }
}

impl SessionCookieAuth {
    pub fn uid(&self) -> &str {
        &self.token.uid
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for IdTokenAuth
where
    Arc<FirebaseAuth>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = Arc::<FirebaseAuth>::from_ref(state);

        let raw = bearer_id_token(&parts.headers)?;
        let token = auth.verify_id_token(&raw).await?;

        Ok(Self { token, raw })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionCookieAuth
where
    Arc<FirebaseAuth>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = Arc::<FirebaseAuth>::from_ref(state);

        let raw = find_cookie(&parts.headers, SESSION_COOKIE_NAME).ok_or_else(|| {
            AuthError::InvalidArgument(format!("{SESSION_COOKIE_NAME} cookie missing."))
        })?;
        let token = auth.verify_session_cookie(&raw).await?;

        Ok(Self { token, raw })
    }
}

/// ID token from `Authorization: Bearer <token>`; the scheme is case-insensitive.
fn bearer_id_token(headers: &HeaderMap) -> AuthResult<String> {
    let value = headers.get(AUTHORIZATION).ok_or_else(|| {
        AuthError::InvalidArgument(
            "No Firebase ID token was passed. Send one in the Authorization header as \"Bearer <ID token>\"."
                .to_string(),
        )
    })?;

    let malformed = || {
        AuthError::InvalidArgument(
            "Authorization header must carry a Firebase ID token as \"Bearer <ID token>\"."
                .to_string(),
        )
    };
    let (scheme, token) = value
        .to_str()
        .map_err(|_| malformed())?
        .trim()
        .split_once(' ')
        .ok_or_else(malformed)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("Bearer") || token.is_empty() {
        return Err(malformed());
    }

    Ok(token.to_owned())
}

fn find_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_owned())
}
