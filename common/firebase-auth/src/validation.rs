use serde_json::Value;

use crate::config::{VerifierProfile, CUSTOM_TOKEN_AUDIENCE};
use crate::error::{AuthError, AuthResult};
use crate::jose::UnverifiedToken;

/// Longest `sub` claim Firebase will issue, in UTF-16 code units.
pub const MAX_SUBJECT_LENGTH: usize = 128;

/// Structural and claim checks that need no key material.
///
/// Runs the checks in a fixed order and stops at the first failure. On
/// success returns the token's `kid` for key lookup, or `None` when the
/// header carries a `kid` that is not a string and so names no key.
pub fn validate_claims<'a>(
    profile: &VerifierProfile,
    token: Option<&'a UnverifiedToken>,
    project_id: &str,
) -> AuthResult<Option<&'a str>> {
    let info = profile.token_info();
    let docs = profile.docs_suffix();
    let reject = |message: String| Err(AuthError::InvalidArgument(message + &docs));

    let Some(token) = token else {
        return reject(format!(
            "Decoding {} failed. Make sure you passed the entire string JWT which represents {}.",
            info.jwt_name,
            profile.short_name_with_article()
        ));
    };

    if !token.header.contains_key("kid") {
        let message = if is_custom_token(token) {
            format!(
                "{} expects {}, but was given a custom token.",
                info.verify_api_name,
                profile.short_name_with_article()
            )
        } else if is_legacy_custom_token(token) {
            format!(
                "{} expects {}, but was given a legacy custom token.",
                info.verify_api_name,
                profile.short_name_with_article()
            )
        } else {
            format!("{} has no \"kid\" claim.", info.jwt_name)
        };
        return reject(message);
    }
    let kid = token.header_str("kid");

    let algorithm = token.header.get("alg");
    if algorithm.and_then(Value::as_str) != Some(profile.algorithm_name()) {
        return reject(format!(
            "{} has incorrect algorithm. Expected \"{}\" but got \"{}\".",
            info.jwt_name,
            profile.algorithm_name(),
            display_claim(algorithm)
        ));
    }

    let audience = token.payload.get("aud");
    if audience.and_then(Value::as_str) != Some(project_id) {
        return reject(format!(
            "{} has incorrect \"aud\" (audience) claim. Expected \"{}\" but got \"{}\".{}",
            info.jwt_name,
            project_id,
            display_claim(audience),
            profile.project_mismatch_hint()
        ));
    }

    let expected_issuer = profile.expected_issuer(project_id);
    let issuer = token.payload.get("iss");
    if issuer.and_then(Value::as_str) != Some(expected_issuer.as_str()) {
        return reject(format!(
            "{} has incorrect \"iss\" (issuer) claim. Expected \"{}\" but got \"{}\".{}",
            info.jwt_name,
            expected_issuer,
            display_claim(issuer),
            profile.project_mismatch_hint()
        ));
    }

    match token.payload.get("sub") {
        Some(Value::String(subject)) if subject.is_empty() => reject(format!(
            "{} has an empty string \"sub\" (subject) claim.",
            info.jwt_name
        )),
        Some(Value::String(subject)) if subject.encode_utf16().count() > MAX_SUBJECT_LENGTH => {
            reject(format!(
                "{} has \"sub\" (subject) claim longer than {} characters.",
                info.jwt_name, MAX_SUBJECT_LENGTH
            ))
        }
        Some(Value::String(_)) => Ok(kid),
        _ => reject(format!("{} has no \"sub\" (subject) claim.", info.jwt_name)),
    }
}

fn is_custom_token(token: &UnverifiedToken) -> bool {
    token.payload_str("aud") == Some(CUSTOM_TOKEN_AUDIENCE)
}

// Pre-v3 custom tokens: HS256 with the uid nested under `d`.
fn is_legacy_custom_token(token: &UnverifiedToken) -> bool {
    let version_zero = token
        .payload
        .get("v")
        .and_then(Value::as_f64)
        .is_some_and(|version| version == 0.0);
    let has_uid = token
        .payload
        .get("d")
        .and_then(Value::as_object)
        .is_some_and(|data| data.contains_key("uid"));
    token.header_str("alg") == Some("HS256") && version_zero && has_uid
}

fn display_claim(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}
