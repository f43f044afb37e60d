use std::env;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AuthResult;

/// Environment variables consulted for the Firebase project id, in order.
pub const PROJECT_ID_ENV_VARS: &[&str] = &["GOOGLE_CLOUD_PROJECT", "GCLOUD_PROJECT"];

/// Supplies the project id tokens must have been issued for.
///
/// `Ok(None)` means no project id is known; verification then fails with an
/// invalid credential error. Errors are passed through to the caller.
#[async_trait]
pub trait ProjectIdResolver: Send + Sync {
    async fn project_id(&self) -> AuthResult<Option<String>>;
}

#[async_trait]
impl ProjectIdResolver for String {
    async fn project_id(&self) -> AuthResult<Option<String>> {
        Ok(Some(self.clone()))
    }
}

#[async_trait]
impl ProjectIdResolver for &'static str {
    async fn project_id(&self) -> AuthResult<Option<String>> {
        Ok(Some((*self).to_string()))
    }
}

#[async_trait]
impl ProjectIdResolver for Option<String> {
    async fn project_id(&self) -> AuthResult<Option<String>> {
        Ok(self.clone())
    }
}

#[async_trait]
impl<T: ProjectIdResolver + ?Sized> ProjectIdResolver for Arc<T> {
    async fn project_id(&self) -> AuthResult<Option<String>> {
        self.as_ref().project_id().await
    }
}

/// Reads the project id from the environment on every call.
#[derive(Debug, Clone)]
pub struct EnvProjectId {
    variables: Vec<String>,
}

impl EnvProjectId {
    pub fn new() -> Self {
        Self::from_vars(PROJECT_ID_ENV_VARS.iter().copied())
    }

    /// Consult `variables` in order instead of the defaults.
    pub fn from_vars<I, S>(variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            variables: variables.into_iter().map(Into::into).collect(),
        }
    }

    pub fn lookup(&self) -> Option<String> {
        self.variables
            .iter()
            .find_map(|key| env::var(key).ok().and_then(|value| normalize_optional(&value)))
    }
}

impl Default for EnvProjectId {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProjectIdResolver for EnvProjectId {
    async fn project_id(&self) -> AuthResult<Option<String>> {
        Ok(self.lookup())
    }
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
