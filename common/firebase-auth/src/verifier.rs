use std::sync::Arc;

use reqwest::Client;
use tracing::debug;

use crate::claims::DecodedToken;
use crate::config::VerifierProfile;
use crate::error::{AuthError, AuthResult};
use crate::jose::{decode_unverified, verify_signature, SignatureFailure};
use crate::keys::{PublicKeyCache, PublicKeyFetcher};
use crate::project::ProjectIdResolver;
use crate::validation::validate_claims;

/// Verifies one kind of Firebase JWT (ID token or session cookie).
///
/// Cloning is cheap and clones share the public key cache.
#[derive(Clone)]
pub struct TokenVerifier {
    profile: Arc<VerifierProfile>,
    keys: PublicKeyCache,
    leeway_seconds: u64,
}

impl TokenVerifier {
    pub fn new(profile: VerifierProfile) -> Self {
        Self::with_client(profile, Client::new())
    }

    /// Fetch certificates through `client` (proxy, timeouts, ...).
    pub fn with_client(profile: VerifierProfile, client: Client) -> Self {
        let fetcher = PublicKeyFetcher::with_client(client, profile.certificate_url());
        Self {
            profile: Arc::new(profile),
            keys: PublicKeyCache::new(fetcher),
            leeway_seconds: 0,
        }
    }

    /// Verifier for Firebase ID tokens.
    pub fn id_token() -> Self {
        Self::new(VerifierProfile::id_token())
    }

    /// Verifier for Firebase session cookies.
    pub fn session_cookie() -> Self {
        Self::new(VerifierProfile::session_cookie())
    }

    /// Allowed clock skew when checking `exp`.
    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    pub fn profile(&self) -> &VerifierProfile {
        &self.profile
    }

    pub fn key_cache(&self) -> &PublicKeyCache {
        &self.keys
    }

    pub async fn verify<R>(&self, token: &str, resolver: &R) -> AuthResult<DecodedToken>
    where
        R: ProjectIdResolver + ?Sized,
    {
        let info = self.profile.token_info();
        if token.is_empty() {
            return Err(AuthError::InvalidArgument(format!(
                "First argument to {} must be a {} string.",
                info.verify_api_name, info.jwt_name
            )));
        }

        let project_id = resolver
            .project_id()
            .await?
            .filter(|project_id| !project_id.is_empty())
            .ok_or_else(|| {
                AuthError::InvalidCredential(format!(
                    "Must initialize app with a cert credential or set your Firebase project ID as the GOOGLE_CLOUD_PROJECT environment variable to call {}.",
                    info.verify_api_name
                ))
            })?;

        self.verify_with_project_id(token, &project_id).await
    }

    pub async fn verify_with_project_id(
        &self,
        token: &str,
        project_id: &str,
    ) -> AuthResult<DecodedToken> {
        let decoded = decode_unverified(token);
        let kid = validate_claims(&self.profile, decoded.as_ref(), project_id)?;

        let keys = self.keys.keys().await?;
        let Some((kid, pem)) = kid.and_then(|kid| keys.get(kid).map(|pem| (kid, pem))) else {
            let info = self.profile.token_info();
            return Err(AuthError::InvalidArgument(format!(
                "{} has \"kid\" claim which does not correspond to a known public key. Most likely the {} is expired, so get a fresh token from your client app and try again.",
                info.jwt_name, info.short_name
            )));
        };

        let claims = verify_signature(token, pem, self.profile.algorithm(), self.leeway_seconds)
            .map_err(|failure| self.signature_error(failure))?;
        let verified = DecodedToken::try_from(claims)?;
        debug!(kid, project_id, "verified {}", self.profile.token_info().short_name);
        Ok(verified)
    }

    fn signature_error(&self, failure: SignatureFailure) -> AuthError {
        let info = self.profile.token_info();
        match failure {
            SignatureFailure::Expired => {
                let code = info.expired_error_code;
                code.with_message(format!(
                    "{} has expired. Get a fresh {} from your client app and try again ({}).{}",
                    info.jwt_name,
                    info.short_name,
                    code.code(),
                    self.profile.docs_suffix()
                ))
            }
            SignatureFailure::InvalidSignature => AuthError::InvalidArgument(format!(
                "{} has invalid signature.{}",
                info.jwt_name,
                self.profile.docs_suffix()
            )),
            SignatureFailure::Other(message) => AuthError::InvalidArgument(message),
        }
    }
}
