use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{AuthError, AuthResult};

/// Verified claims of a Firebase ID token or session cookie.
///
/// Serializes as the verified claim set plus a `uid` field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedToken {
    /// Normalized subject id, copied from `sub`.
    pub uid: String,
    #[serde(flatten)]
    pub claims: Map<String, Value>,
}

impl DecodedToken {
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    pub fn audience(&self) -> Option<&str> {
        self.str_claim("aud")
    }

    pub fn issuer(&self) -> Option<&str> {
        self.str_claim("iss")
    }

    pub fn subject(&self) -> &str {
        &self.uid
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.time_claim("iat")
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.time_claim("exp")
    }

    /// When the end user last signed in.
    pub fn auth_time(&self) -> Option<DateTime<Utc>> {
        self.time_claim("auth_time")
    }

    pub fn email(&self) -> Option<&str> {
        self.str_claim("email")
    }

    pub fn email_verified(&self) -> Option<bool> {
        self.claims.get("email_verified").and_then(Value::as_bool)
    }

    pub fn phone_number(&self) -> Option<&str> {
        self.str_claim("phone_number")
    }

    pub fn picture(&self) -> Option<&str> {
        self.str_claim("picture")
    }

    pub fn sign_in_provider(&self) -> Option<&str> {
        self.firebase()
            .and_then(|firebase| firebase.get("sign_in_provider"))
            .and_then(Value::as_str)
    }

    /// Identity Platform tenant the user belongs to, if any.
    pub fn tenant(&self) -> Option<&str> {
        self.firebase()
            .and_then(|firebase| firebase.get("tenant"))
            .and_then(Value::as_str)
    }

    /// Provider id to identifiers, e.g. `"email" -> ["jane@example.com"]`.
    pub fn identities(&self) -> Option<&Map<String, Value>> {
        self.firebase()
            .and_then(|firebase| firebase.get("identities"))
            .and_then(Value::as_object)
    }

    fn firebase(&self) -> Option<&Map<String, Value>> {
        self.claims.get("firebase").and_then(Value::as_object)
    }

    fn str_claim(&self, name: &str) -> Option<&str> {
        self.claims.get(name).and_then(Value::as_str)
    }

    fn time_claim(&self, name: &str) -> Option<DateTime<Utc>> {
        let seconds = self.claims.get(name).and_then(Value::as_i64)?;
        Utc.timestamp_opt(seconds, 0).single()
    }
}

impl TryFrom<Value> for DecodedToken {
    type Error = AuthError;

    fn try_from(value: Value) -> AuthResult<Self> {
        let claims = match value {
            Value::Object(claims) => claims,
            other => {
                return Err(AuthError::Internal(format!(
                    "Unexpected decoded token. Expected an object but got: '{other}'"
                )))
            }
        };

        let uid = claims
            .get("sub")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| {
                AuthError::Internal("Verified token has no string \"sub\" claim.".to_string())
            })?;

        Ok(Self { uid, claims })
    }
}
