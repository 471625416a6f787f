//! Shared helpers for unit tests: RSA test keys, JWKS documents and signed
//! tokens.

use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use openssl::rsa::Rsa;
use serde::Serialize;
use serde_json::{json, Value};

use crate::jwk::{SigningKey, SigningKeySet};

pub(crate) const ISSUER: &str = "https://cognito-idp.eu-west-2.amazonaws.com/eu-west-2_test";

static PRIMARY: LazyLock<TestKey> = LazyLock::new(|| TestKey::generate("primary-kid"));
static SECONDARY: LazyLock<TestKey> = LazyLock::new(|| TestKey::generate("secondary-kid"));
static ROTATED: LazyLock<TestKey> = LazyLock::new(|| TestKey::generate("rotated-kid"));

/// An RSA key pair with its `kid`, generated once per test binary.
pub(crate) struct TestKey {
    kid: &'static str,
    n: String,
    e: String,
    encoding_key: EncodingKey,
}

impl TestKey {
    fn generate(kid: &'static str) -> TestKey {
        let rsa = Rsa::generate(2048).expect("Failed to generate RSA key");
        let private_pem = rsa
            .private_key_to_pem()
            .expect("Failed to export private key");

        TestKey {
            kid,
            n: BASE64_URL_SAFE_NO_PAD.encode(rsa.n().to_vec()),
            e: BASE64_URL_SAFE_NO_PAD.encode(rsa.e().to_vec()),
            encoding_key: EncodingKey::from_rsa_pem(&private_pem)
                .expect("Failed to create encoding key"),
        }
    }

    pub(crate) fn primary() -> &'static TestKey {
        &PRIMARY
    }

    pub(crate) fn secondary() -> &'static TestKey {
        &SECONDARY
    }

    pub(crate) fn rotated() -> &'static TestKey {
        &ROTATED
    }

    pub(crate) fn kid(&self) -> &'static str {
        self.kid
    }

    pub(crate) fn jwk(&self) -> Value {
        json!({
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            "kid": self.kid,
            "n": self.n,
            "e": self.e,
        })
    }

    pub(crate) fn signing_key(&self) -> SigningKey {
        SigningKey::new(
            self.kid,
            DecodingKey::from_rsa_components(&self.n, &self.e)
                .expect("Failed to create decoding key"),
        )
    }

    /// RS256 token with this key's `kid` in the header.
    pub(crate) fn sign(&self, claims: &impl Serialize) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.to_owned());
        self.sign_with_header(&header, claims)
    }

    pub(crate) fn sign_with_header(&self, header: &Header, claims: &impl Serialize) -> String {
        encode(header, claims, &self.encoding_key).expect("Failed to sign token")
    }

    /// RS256-signs arbitrary JSON header and claims, for headers that
    /// [`Header`] cannot express.
    pub(crate) fn sign_raw(&self, header: &Value, claims: &Value) -> String {
        let signing_input = format!(
            "{}.{}",
            BASE64_URL_SAFE_NO_PAD.encode(header.to_string()),
            BASE64_URL_SAFE_NO_PAD.encode(claims.to_string()),
        );
        let signature = jsonwebtoken::crypto::sign(
            signing_input.as_bytes(),
            &self.encoding_key,
            Algorithm::RS256,
        )
        .expect("Failed to sign token");
        format!("{signing_input}.{signature}")
    }
}

pub(crate) fn jwks(keys: &[&TestKey]) -> Value {
    json!({ "keys": keys.iter().map(|key| key.jwk()).collect::<Vec<_>>() })
}

pub(crate) fn key_set(keys: &[&TestKey]) -> SigningKeySet {
    SigningKeySet::new(keys.iter().map(|key| key.signing_key()))
}

pub(crate) fn now_as_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Cognito-shaped ID token claims, valid for one hour.
pub(crate) fn valid_claims(sub: &str) -> Value {
    let now = now_as_secs();
    json!({
        "sub": sub,
        "iss": ISSUER,
        "aud": "app-client-id",
        "token_use": "id",
        "email": "someone@example.com",
        "iat": now,
        "exp": now + 3600,
    })
}

/// Assembles a compact token from raw JSON parts and an arbitrary signature.
pub(crate) fn raw_token(header: &Value, claims: &Value, signature: &[u8]) -> String {
    format!(
        "{}.{}.{}",
        BASE64_URL_SAFE_NO_PAD.encode(header.to_string()),
        BASE64_URL_SAFE_NO_PAD.encode(claims.to_string()),
        BASE64_URL_SAFE_NO_PAD.encode(signature),
    )
}
