use std::sync::Arc;

use reqwest::Client;

use crate::claims::DecodedToken;
use crate::config::VerifierProfile;
use crate::error::AuthResult;
use crate::project::ProjectIdResolver;
use crate::verifier::TokenVerifier;

/// Entry point bundling the ID token and session cookie verifiers with the
/// project id they check against.
#[derive(Clone)]
pub struct FirebaseAuth {
    id_tokens: TokenVerifier,
    session_cookies: TokenVerifier,
    project: Arc<dyn ProjectIdResolver>,
}

impl FirebaseAuth {
    pub fn new(project: impl ProjectIdResolver + 'static) -> Self {
        Self::with_client(project, Client::new())
    }

    /// Both verifiers share `client` for certificate downloads.
    pub fn with_client(project: impl ProjectIdResolver + 'static, client: Client) -> Self {
        Self::from_verifiers(
            TokenVerifier::with_client(VerifierProfile::id_token(), client.clone()),
            TokenVerifier::with_client(VerifierProfile::session_cookie(), client),
            project,
        )
    }

    pub fn from_verifiers(
        id_tokens: TokenVerifier,
        session_cookies: TokenVerifier,
        project: impl ProjectIdResolver + 'static,
    ) -> Self {
        Self {
            id_tokens,
            session_cookies,
            project: Arc::new(project),
        }
    }

    pub fn id_token_verifier(&self) -> &TokenVerifier {
        &self.id_tokens
    }

    pub fn session_cookie_verifier(&self) -> &TokenVerifier {
        &self.session_cookies
    }

    pub async fn verify_id_token(&self, id_token: &str) -> AuthResult<DecodedToken> {
        self.id_tokens.verify(id_token, self.project.as_ref()).await
    }

    pub async fn verify_session_cookie(&self, session_cookie: &str) -> AuthResult<DecodedToken> {
        self.session_cookies
            .verify(session_cookie, self.project.as_ref())
            .await
    }
}
