//! Thin layer over the JOSE primitives: a structural decode that never checks
//! the signature, and signature verification against a PEM encoded key.

use std::collections::HashSet;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, get_current_timestamp, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};

/// Header and payload of a JWT whose signature has not been checked.
#[derive(Debug, Clone, PartialEq)]
pub struct UnverifiedToken {
    pub header: Map<String, Value>,
    pub payload: Map<String, Value>,
}

impl UnverifiedToken {
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.header.get(name).and_then(Value::as_str)
    }

    pub fn payload_str(&self, name: &str) -> Option<&str> {
        self.payload.get(name).and_then(Value::as_str)
    }
}

/// Decode the header and payload segments of `token`.
///
/// Returns `None` for anything that is not three dot separated segments with
/// JSON object header and payload. The signature segment may be empty.
pub fn decode_unverified(token: &str) -> Option<UnverifiedToken> {
    let mut segments = token.split('.');
    let header = segments.next()?;
    let payload = segments.next()?;
    let _signature = segments.next()?;
    if segments.next().is_some() || header.is_empty() || payload.is_empty() {
        return None;
    }

    Some(UnverifiedToken {
        header: decode_segment(header)?,
        payload: decode_segment(payload)?,
    })
}

fn decode_segment(segment: &str) -> Option<Map<String, Value>> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .ok()?;
    match serde_json::from_slice(&bytes).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Why the crypto layer refused a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureFailure {
    /// Signature is fine but `exp` has passed.
    Expired,
    /// Malformed token or a signature that does not match the key.
    InvalidSignature,
    /// Anything else, with the crypto layer's own message.
    Other(String),
}

impl From<jsonwebtoken::errors::Error> for SignatureFailure {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        match value.kind() {
            ErrorKind::ExpiredSignature => SignatureFailure::Expired,
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidToken
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => SignatureFailure::InvalidSignature,
            _ => SignatureFailure::Other(value.to_string()),
        }
    }
}

/// Verify `token` with the PEM key material, accepting only `algorithm`.
///
/// Audience and issuer are checked by the caller, so only the signature and
/// the time based claims are validated here. `nbf` is enforced when present,
/// and a token is expired from the second `exp + leeway` is reached.
pub fn verify_signature(
    token: &str,
    pem: &str,
    algorithm: Algorithm,
    leeway_seconds: u64,
) -> Result<Value, SignatureFailure> {
    let key = decoding_key(pem, algorithm)?;

    let mut validation = Validation::new(algorithm);
    validation.validate_aud = false;
    validation.validate_nbf = true;
    validation.required_spec_claims = HashSet::new();
    validation.leeway = leeway_seconds;

    let data = decode::<Value>(token, &key, &validation)?;

    // jsonwebtoken only rejects `exp < now - leeway`; `exp == now` is expired too.
    let expired = data
        .claims
        .get("exp")
        .and_then(Value::as_f64)
        .is_some_and(|exp| has_expired(exp, get_current_timestamp(), leeway_seconds));
    if expired {
        return Err(SignatureFailure::Expired);
    }
    Ok(data.claims)
}

fn has_expired(exp: f64, now: u64, leeway_seconds: u64) -> bool {
    now as f64 >= exp + leeway_seconds as f64
}

fn decoding_key(pem: &str, algorithm: Algorithm) -> Result<DecodingKey, SignatureFailure> {
    let bytes = pem.as_bytes();
    let key = match algorithm {
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => DecodingKey::from_rsa_pem(bytes),
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(bytes),
        Algorithm::EdDSA => DecodingKey::from_ed_pem(bytes),
        other => {
            return Err(SignatureFailure::Other(format!(
                "algorithm {other:?} cannot be verified with a public key"
            )))
        }
    };
    key.map_err(|err| SignatureFailure::Other(err.to_string()))
}
