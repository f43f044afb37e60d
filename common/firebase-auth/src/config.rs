use std::str::FromStr;

use jsonwebtoken::Algorithm;
use reqwest::Url;

use crate::error::{AuthError, AuthErrorCode, AuthResult};

/// Algorithm Google signs ID tokens and session cookies with.
pub const ALGORITHM_RS256: &str = "RS256";

/// Certificates for the keys that sign Firebase ID tokens.
pub const CLIENT_CERT_URL: &str =
    "https://www.googleapis.com/robot/v1/metadata/x509/securetoken@system.gserviceaccount.com";
/// Public keys for Firebase session cookies.
pub const SESSION_COOKIE_CERT_URL: &str =
    "https://www.googleapis.com/identitytoolkit/v3/relyingparty/publicKeys";

pub const ID_TOKEN_ISSUER_PREFIX: &str = "https://securetoken.google.com/";
pub const SESSION_COOKIE_ISSUER_PREFIX: &str = "https://session.firebase.google.com/";

/// Audience carried by Firebase custom tokens.
pub const CUSTOM_TOKEN_AUDIENCE: &str =
    "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit";

/// User facing information about one kind of Firebase JWT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    /// Documentation explaining how to obtain this kind of token.
    pub url: String,
    /// Name of the public verification call, used in error messages.
    pub verify_api_name: String,
    /// Full display name, e.g. "Firebase ID token".
    pub jwt_name: String,
    /// Short display name, e.g. "ID token".
    pub short_name: String,
    /// Error kind reported when the token has expired.
    pub expired_error_code: AuthErrorCode,
}

impl TokenInfo {
    pub fn id_token() -> Self {
        Self {
            url: "https://firebase.google.com/docs/auth/admin/verify-id-tokens".to_string(),
            verify_api_name: "verifyIdToken()".to_string(),
            jwt_name: "Firebase ID token".to_string(),
            short_name: "ID token".to_string(),
            expired_error_code: AuthErrorCode::IdTokenExpired,
        }
    }

    pub fn session_cookie() -> Self {
        Self {
            url: "https://firebase.google.com/docs/auth/admin/manage-cookies".to_string(),
            verify_api_name: "verifySessionCookie()".to_string(),
            jwt_name: "Firebase session cookie".to_string(),
            short_name: "session cookie".to_string(),
            expired_error_code: AuthErrorCode::SessionCookieExpired,
        }
    }

    fn validate(&self) -> AuthResult<()> {
        if Url::parse(&self.url).is_err() {
            return Err(config_error(
                "The provided JWT verification documentation URL is invalid.",
            ));
        }
        if self.verify_api_name.is_empty() {
            return Err(config_error(
                "The JWT verify API name must be a non-empty string.",
            ));
        }
        if self.jwt_name.is_empty() {
            return Err(config_error(
                "The JWT public full name must be a non-empty string.",
            ));
        }
        if self.short_name.is_empty() {
            return Err(config_error(
                "The JWT public short name must be a non-empty string.",
            ));
        }
        if !self.expired_error_code.is_expiry() {
            return Err(config_error(
                "The JWT expiration error code must be a token expiry error kind.",
            ));
        }
        Ok(())
    }
}

/// Everything a [`TokenVerifier`](crate::TokenVerifier) needs to know about
/// the kind of token it checks. Only constructible through validation.
#[derive(Debug, Clone)]
pub struct VerifierProfile {
    certificate_url: String,
    algorithm_name: String,
    algorithm: Algorithm,
    issuer_prefix: String,
    token_info: TokenInfo,
    article: &'static str,
}

impl VerifierProfile {
    /// Validate and assemble a profile. The first invalid field fails the
    /// whole construction.
    pub fn new(
        certificate_url: impl Into<String>,
        algorithm: impl Into<String>,
        issuer_prefix: impl Into<String>,
        token_info: TokenInfo,
    ) -> AuthResult<Self> {
        let certificate_url = certificate_url.into();
        let algorithm_name = algorithm.into();
        let issuer_prefix = issuer_prefix.into();

        if Url::parse(&certificate_url).is_err() {
            return Err(config_error(
                "The provided public client certificate URL is an invalid URL.",
            ));
        }
        if algorithm_name.is_empty() {
            return Err(config_error("The provided JWT algorithm is an empty string."));
        }
        let algorithm = parse_algorithm(&algorithm_name)?;
        if Url::parse(&issuer_prefix).is_err() {
            return Err(config_error("The provided JWT issuer is an invalid URL."));
        }
        token_info.validate()?;

        let article = article_for(&token_info.short_name);
        Ok(Self {
            certificate_url,
            algorithm_name,
            algorithm,
            issuer_prefix,
            token_info,
            article,
        })
    }

    /// Profile for Firebase ID tokens.
    pub fn id_token() -> Self {
        Self::known(CLIENT_CERT_URL, ID_TOKEN_ISSUER_PREFIX, TokenInfo::id_token())
    }

    /// Profile for Firebase session cookies.
    pub fn session_cookie() -> Self {
        Self::known(
            SESSION_COOKIE_CERT_URL,
            SESSION_COOKIE_ISSUER_PREFIX,
            TokenInfo::session_cookie(),
        )
    }

    fn known(certificate_url: &str, issuer_prefix: &str, token_info: TokenInfo) -> Self {
        let article = article_for(&token_info.short_name);
        Self {
            certificate_url: certificate_url.to_string(),
            algorithm_name: ALGORITHM_RS256.to_string(),
            algorithm: Algorithm::RS256,
            issuer_prefix: issuer_prefix.to_string(),
            token_info,
            article,
        }
    }

    /// Same profile, fetching keys from a different endpoint.
    pub fn with_certificate_url(self, url: impl Into<String>) -> AuthResult<Self> {
        Self::new(url, self.algorithm_name, self.issuer_prefix, self.token_info)
    }

    pub fn certificate_url(&self) -> &str {
        &self.certificate_url
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn algorithm_name(&self) -> &str {
        &self.algorithm_name
    }

    pub fn issuer_prefix(&self) -> &str {
        &self.issuer_prefix
    }

    pub fn token_info(&self) -> &TokenInfo {
        &self.token_info
    }

    /// Issuer a token for `project_id` must carry.
    pub fn expected_issuer(&self, project_id: &str) -> String {
        format!("{}{}", self.issuer_prefix, project_id)
    }

    /// "an ID token", "a session cookie".
    pub(crate) fn short_name_with_article(&self) -> String {
        format!("{} {}", self.article, self.token_info.short_name)
    }

    /// Trailing pointer to the documentation, appended to most messages.
    pub(crate) fn docs_suffix(&self) -> String {
        format!(
            " See {} for details on how to retrieve {}.",
            self.token_info.url,
            self.short_name_with_article()
        )
    }

    pub(crate) fn project_mismatch_hint(&self) -> String {
        format!(
            " Make sure the {} comes from the same Firebase project as the service account used to authenticate this SDK.",
            self.token_info.short_name
        )
    }
}

fn parse_algorithm(name: &str) -> AuthResult<Algorithm> {
    let algorithm = Algorithm::from_str(name)
        .map_err(|_| config_error(format!("The provided JWT algorithm '{name}' is not supported.")))?;
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Err(config_error(format!(
            "The provided JWT algorithm '{name}' must be an asymmetric algorithm."
        ))),
        other => Ok(other),
    }
}

fn article_for(short_name: &str) -> &'static str {
    match short_name.chars().next() {
        Some(first) if "aeiouAEIOU".contains(first) => "an",
        _ => "a",
    }
}

fn config_error(message: impl Into<String>) -> AuthError {
    AuthError::Configuration(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_config_error(result: AuthResult<VerifierProfile>, needle: &str) {
        match result {
            Err(AuthError::Configuration(message)) => {
                assert!(message.contains(needle), "unexpected message: {message}")
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn built_in_profiles_pass_validation() {
        for profile in [VerifierProfile::id_token(), VerifierProfile::session_cookie()] {
            let rebuilt = VerifierProfile::new(
                profile.certificate_url(),
                profile.algorithm_name(),
                profile.issuer_prefix(),
                profile.token_info().clone(),
            )
            .expect("built-in profile is valid");
            assert_eq!(rebuilt.algorithm(), Algorithm::RS256);
            assert_eq!(rebuilt.short_name_with_article(), profile.short_name_with_article());
        }
    }

    #[test]
    fn article_follows_short_name() {
        assert_eq!(VerifierProfile::id_token().short_name_with_article(), "an ID token");
        assert_eq!(
            VerifierProfile::session_cookie().short_name_with_article(),
            "a session cookie"
        );
    }

    #[test]
    fn rejects_invalid_certificate_url() {
        let result = VerifierProfile::new("not a url", "RS256", ID_TOKEN_ISSUER_PREFIX, TokenInfo::id_token());
        assert_config_error(result, "certificate URL");
    }

    #[test]
    fn rejects_empty_and_unknown_algorithms() {
        let result = VerifierProfile::new(CLIENT_CERT_URL, "", ID_TOKEN_ISSUER_PREFIX, TokenInfo::id_token());
        assert_config_error(result, "empty string");

        let result = VerifierProfile::new(CLIENT_CERT_URL, "rs256", ID_TOKEN_ISSUER_PREFIX, TokenInfo::id_token());
        assert_config_error(result, "not supported");

        let result = VerifierProfile::new(CLIENT_CERT_URL, "HS256", ID_TOKEN_ISSUER_PREFIX, TokenInfo::id_token());
        assert_config_error(result, "asymmetric");
    }

    #[test]
    fn rejects_invalid_issuer() {
        let result = VerifierProfile::new(CLIENT_CERT_URL, "RS256", "securetoken", TokenInfo::id_token());
        assert_config_error(result, "issuer");
    }

    #[test]
    fn rejects_incomplete_token_info() {
        let mut info = TokenInfo::id_token();
        info.url = "docs".into();
        let result = VerifierProfile::new(CLIENT_CERT_URL, "RS256", ID_TOKEN_ISSUER_PREFIX, info);
        assert_config_error(result, "documentation URL");

        let mut info = TokenInfo::id_token();
        info.verify_api_name.clear();
        let result = VerifierProfile::new(CLIENT_CERT_URL, "RS256", ID_TOKEN_ISSUER_PREFIX, info);
        assert_config_error(result, "verify API name");

        let mut info = TokenInfo::id_token();
        info.jwt_name.clear();
        let result = VerifierProfile::new(CLIENT_CERT_URL, "RS256", ID_TOKEN_ISSUER_PREFIX, info);
        assert_config_error(result, "full name");

        let mut info = TokenInfo::id_token();
        info.short_name.clear();
        let result = VerifierProfile::new(CLIENT_CERT_URL, "RS256", ID_TOKEN_ISSUER_PREFIX, info);
        assert_config_error(result, "short name");

        let mut info = TokenInfo::id_token();
        info.expired_error_code = AuthErrorCode::InvalidArgument;
        let result = VerifierProfile::new(CLIENT_CERT_URL, "RS256", ID_TOKEN_ISSUER_PREFIX, info);
        assert_config_error(result, "expiration error code");
    }

    #[test]
    fn certificate_url_override_is_validated() {
        let profile = VerifierProfile::id_token()
            .with_certificate_url("http://127.0.0.1:9000/certs")
            .expect("valid override");
        assert_eq!(profile.certificate_url(), "http://127.0.0.1:9000/certs");
        assert_eq!(profile.expected_issuer("demo"), "https://securetoken.google.com/demo");

        assert_config_error(
            VerifierProfile::id_token().with_certificate_url("::"),
            "certificate URL",
        );
    }
}
