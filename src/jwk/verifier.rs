use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::Algorithm;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::cache::KeyCache;
use super::config::AuthenticatorConfig;
use super::error::{VerificationError, VerificationResult};

/// The JOSE header fields the verifier looks at.
///
/// `alg` stays a raw string so that `none` and other unknown values are
/// reported as unsupported rather than as a malformed token. `kid` is kept
/// untyped: a non-string value counts as a missing key id.
#[derive(Debug, Deserialize)]
struct TokenHeader {
    alg: String,
    kid: Option<Value>,
}

/// Registered claims checked by the verifier. Everything else is ignored.
///
/// `iss` and `sub` are kept untyped so that a value of the wrong JSON type
/// fails at its own check instead of making the whole token malformed.
#[derive(Debug, Deserialize)]
struct TokenClaims {
    iss: Option<Value>,
    sub: Option<Value>,
    exp: Option<f64>,
}

/// A token split into its compact-serialization parts.
struct ParsedToken<'a> {
    header: TokenHeader,
    claims: TokenClaims,
    signing_input: &'a str,
    signature: &'a str,
}

impl<'a> ParsedToken<'a> {
    fn parse(token: &'a str) -> VerificationResult<ParsedToken<'a>> {
        let mut parts = token.split('.');
        let (Some(header), Some(claims), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(VerificationError::MalformedToken);
        };

        BASE64_URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| VerificationError::MalformedToken)?;

        Ok(ParsedToken {
            header: decode_segment(header)?,
            claims: decode_segment(claims)?,
            signing_input: &token[..header.len() + 1 + claims.len()],
            signature,
        })
    }
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> VerificationResult<T> {
    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| VerificationError::MalformedToken)?;
    serde_json::from_slice(&bytes).map_err(|_| VerificationError::MalformedToken)
}

/// HMAC algorithms would let a published public key double as a shared
/// secret, so they are refused whatever the configuration says.
fn is_symmetric(alg: Algorithm) -> bool {
    matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

/// Verifies bearer tokens against the cached provider keys.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    issuer: String,
    allowed_algorithms: Vec<Algorithm>,
}

impl TokenVerifier {
    /// Takes the expected issuer and the algorithm allow-list from `config`.
    pub fn new(config: &AuthenticatorConfig) -> TokenVerifier {
        TokenVerifier {
            issuer: config.issuer().to_owned(),
            allowed_algorithms: config.allowed_algorithms().to_vec(),
        }
    }

    /// Verifies `token` and returns its subject.
    ///
    /// Checks run in a fixed order and the first failure is returned:
    /// structure, algorithm, key id, signature, issuer, expiration, subject.
    /// An unknown `kid` does not trigger a key refresh.
    pub fn verify(&self, token: &str, keys: &KeyCache) -> VerificationResult<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        self.verify_at(token, keys, now)
    }

    pub(crate) fn verify_at(
        &self,
        token: &str,
        keys: &KeyCache,
        now: f64,
    ) -> VerificationResult<String> {
        let ParsedToken {
            header,
            claims,
            signing_input,
            signature,
        } = ParsedToken::parse(token)?;

        let alg = Algorithm::from_str(&header.alg)
            .ok()
            .filter(|alg| !is_symmetric(*alg) && self.allowed_algorithms.contains(alg))
            .ok_or_else(|| VerificationError::UnsupportedAlgorithm(header.alg.clone()))?;

        let kid = header
            .kid
            .as_ref()
            .and_then(Value::as_str)
            .ok_or(VerificationError::MissingKeyIdentifier)?;

        let public_key = keys
            .lookup(kid)
            .ok_or_else(|| VerificationError::UnknownSigningKey(kid.to_owned()))?;

        let valid = jsonwebtoken::crypto::verify(
            signature,
            signing_input.as_bytes(),
            public_key.decoding_key(),
            alg,
        )
        .unwrap_or(false);
        if !valid {
            return Err(VerificationError::InvalidSignature);
        }

        if claims.iss.as_ref().and_then(Value::as_str) != Some(self.issuer.as_str()) {
            return Err(VerificationError::IssuerMismatch);
        }

        let exp = claims.exp.ok_or(VerificationError::ExpirationRequired)?;
        if exp < now {
            return Err(VerificationError::TokenExpired);
        }

        match claims.sub.as_ref().and_then(Value::as_str) {
            Some(sub) if !sub.trim().is_empty() => Ok(sub.to_owned()),
            _ => Err(VerificationError::SubjectMissing),
        }
    }
}
