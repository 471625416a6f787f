//! Helpers shared by the integration tests: an RSA signing key and a mocked
//! key-set endpoint.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use base64::Engine;
use httpmock::Method::GET;
use httpmock::MockServer;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use openssl::rsa::Rsa;
use rand::Rng;
use serde_json::{json, Value};
use wardrobe_api::jwk::AuthenticatorConfig;
use wardrobe_api::Authenticator;

pub const ISSUER: &str = "https://cognito-idp.eu-west-2.amazonaws.com/eu-west-2_integration";

pub struct SigningKeyPair {
    pub kid: String,
    n: String,
    e: String,
    encoding_key: EncodingKey,
}

impl SigningKeyPair {
    pub fn generate() -> SigningKeyPair {
        let rsa = Rsa::generate(2048).expect("Failed to generate RSA key");
        let pem = rsa.private_key_to_pem().expect("Failed to export private key");

        SigningKeyPair {
            kid: format!("kid-{:016x}", rand::thread_rng().gen::<u64>()),
            n: BASE64_URL_SAFE_NO_PAD.encode(rsa.n().to_vec()),
            e: BASE64_URL_SAFE_NO_PAD.encode(rsa.e().to_vec()),
            encoding_key: EncodingKey::from_rsa_pem(&pem).expect("Failed to create encoding key"),
        }
    }

    pub fn jwks(&self) -> Value {
        json!({
            "keys": [{
                "kty": "RSA",
                "alg": "RS256",
                "use": "sig",
                "kid": self.kid,
                "n": self.n,
                "e": self.e,
            }]
        })
    }

    pub fn token_for(&self, sub: &str) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone());
        encode(&header, &claims(sub), &self.encoding_key).expect("Failed to sign token")
    }
}

pub fn claims(sub: &str) -> Value {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    json!({
        "sub": sub,
        "iss": ISSUER,
        "token_use": "id",
        "iat": now,
        "exp": now + 3600,
    })
}

/// A subject that no other test run will reuse.
pub fn random_subject() -> String {
    format!("user-{:08x}", rand::thread_rng().gen::<u32>())
}

/// Serves `key`'s key set and builds an [`Authenticator`] against it.
pub async fn authenticator(server: &MockServer, key: &SigningKeyPair) -> Authenticator {
    server
        .mock_async(|when, then| {
            when.method(GET).path("/.well-known/jwks.json");
            then.status(200).json_body(key.jwks());
        })
        .await;

    let config = AuthenticatorConfig::new(ISSUER, server.url("/.well-known/jwks.json"))
        .expect("Failed to build config");
    Authenticator::new(config)
        .await
        .expect("Failed to create authenticator")
}
