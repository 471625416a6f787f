use std::sync::{Arc, PoisonError, RwLock};

use jsonwebtoken::jwk::JwkSet;
use tracing::*;
use url::Url;

use super::config::AuthenticatorConfig;
use super::error::{ConfigError, KeySetError};
use super::key::{SigningKey, SigningKeySet};

/// Concurrently readable cache of the identity provider's signing keys.
///
/// The current [`SigningKeySet`] lives behind an `Arc` that is replaced
/// wholesale on refresh. The lock only guards the pointer: readers clone the
/// `Arc` and release the lock before doing any work, and the writer takes it
/// only for the swap itself, never across the network call.
pub struct KeyCache {
    jwks_url: Url,
    http: reqwest::Client,
    current: RwLock<Arc<SigningKeySet>>,
}

impl KeyCache {
    /// Creates a cache with an empty snapshot. Nothing is fetched yet.
    pub fn new(config: &AuthenticatorConfig) -> Result<KeyCache, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(config.fetch_timeout())
            .build()
            .map_err(ConfigError::HttpClient)?;

        Ok(KeyCache {
            jwks_url: config.jwks_url().clone(),
            http,
            current: RwLock::new(Arc::new(SigningKeySet::default())),
        })
    }

    /// Fetches the key set and swaps it in as the current snapshot.
    ///
    /// On failure the previous snapshot stays in place untouched.
    pub async fn fetch_and_replace(&self) -> Result<Arc<SigningKeySet>, KeySetError> {
        let snapshot = Arc::new(self.fetch().await?);
        self.replace(Arc::clone(&snapshot));
        info!(
            jwks_url = %self.jwks_url,
            kid_count = snapshot.len(),
            "Fetched signing key set"
        );
        Ok(snapshot)
    }

    async fn fetch(&self) -> Result<SigningKeySet, KeySetError> {
        let unreachable = |source| KeySetError::KeySourceUnreachable {
            url: self.jwks_url.to_string(),
            source,
        };
        let malformed = |reason: String| KeySetError::KeySourceMalformed {
            url: self.jwks_url.to_string(),
            reason,
        };

        let response = self
            .http
            .get(self.jwks_url.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(unreachable)?;

        let body = response.bytes().await.map_err(unreachable)?;

        let set: JwkSet =
            serde_json::from_slice(&body).map_err(|e| malformed(e.to_string()))?;

        let snapshot = SigningKeySet::from_jwk_set(&set).map_err(malformed)?;
        if snapshot.is_empty() {
            warn!(jwks_url = %self.jwks_url, "Key set source published no usable keys");
        }
        Ok(snapshot)
    }

    /// Atomically installs `snapshot` as the current key set.
    pub(crate) fn replace(&self, snapshot: Arc<SigningKeySet>) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = snapshot;
    }

    /// The snapshot readers currently observe.
    pub fn snapshot(&self) -> Arc<SigningKeySet> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&current)
    }

    /// Resolves a key by `kid` from the current snapshot.
    pub fn lookup(&self, kid: &str) -> Option<Arc<SigningKey>> {
        self.snapshot().get(kid)
    }

    /// Address the key set is fetched from.
    pub fn jwks_url(&self) -> &Url {
        &self.jwks_url
    }
}

#[cfg(test)]
impl KeyCache {
    pub(crate) fn with_snapshot(
        config: &AuthenticatorConfig,
        snapshot: SigningKeySet,
    ) -> KeyCache {
        let cache = KeyCache::new(config).unwrap();
        cache.replace(Arc::new(snapshot));
        cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{self, TestKey};
    use httpmock::Method::GET;
    use httpmock::MockServer;

    fn config_for(server: &MockServer) -> AuthenticatorConfig {
        AuthenticatorConfig::new(testutil::ISSUER, server.url("/jwks.json")).unwrap()
    }

    #[actix_rt::test]
    async fn fetch_and_replace_installs_new_snapshot() {
        let server = MockServer::start_async().await;
        let key = TestKey::primary();
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/jwks.json");
                then.status(200).json_body(testutil::jwks(&[key]));
            })
            .await;

        let cache = KeyCache::new(&config_for(&server)).unwrap();
        assert!(cache.snapshot().is_empty());

        let snapshot = cache.fetch_and_replace().await.unwrap();

        mock.assert_async().await;
        assert_eq!(snapshot.len(), 1);
        assert!(cache.lookup(key.kid()).is_some());
        assert!(cache.lookup("zzz").is_none());
    }

    #[actix_rt::test]
    async fn non_success_status_is_unreachable_and_keeps_snapshot() {
        let server = MockServer::start_async().await;
        let key = TestKey::primary();
        let config = config_for(&server);
        let cache = KeyCache::with_snapshot(&config, testutil::key_set(&[key]));
        let before = cache.snapshot();

        server
            .mock_async(|when, then| {
                when.method(GET).path("/jwks.json");
                then.status(503);
            })
            .await;

        let err = cache.fetch_and_replace().await.unwrap_err();

        assert!(
            matches!(err, KeySetError::KeySourceUnreachable { .. }),
            "Expected KeySourceUnreachable, got {err:?}"
        );
        assert!(Arc::ptr_eq(&before, &cache.snapshot()));
        assert!(cache.lookup(key.kid()).is_some());
    }

    #[actix_rt::test]
    async fn connection_failure_is_unreachable() {
        let config =
            AuthenticatorConfig::new(testutil::ISSUER, "http://127.0.0.1:9/jwks.json").unwrap();
        let cache = KeyCache::new(&config).unwrap();

        let err = cache.fetch_and_replace().await.unwrap_err();

        assert!(matches!(err, KeySetError::KeySourceUnreachable { .. }), "{err:?}");
        assert!(cache.snapshot().is_empty());
    }

    #[actix_rt::test]
    async fn unparsable_body_is_malformed_and_keeps_snapshot() {
        let server = MockServer::start_async().await;
        let key = TestKey::primary();
        let config = config_for(&server);
        let cache = KeyCache::with_snapshot(&config, testutil::key_set(&[key]));
        let before = cache.snapshot();

        server
            .mock_async(|when, then| {
                when.method(GET).path("/jwks.json");
                then.status(200).body("<html>not a key set</html>");
            })
            .await;

        let err = cache.fetch_and_replace().await.unwrap_err();

        assert!(
            matches!(err, KeySetError::KeySourceMalformed { .. }),
            "Expected KeySourceMalformed, got {err:?}"
        );
        assert!(Arc::ptr_eq(&before, &cache.snapshot()));
    }

    #[actix_rt::test]
    async fn unusable_key_material_rejects_whole_set() {
        let server = MockServer::start_async().await;
        let key = TestKey::primary();
        let config = config_for(&server);
        let cache = KeyCache::with_snapshot(&config, testutil::key_set(&[key]));

        let mut body = testutil::jwks(&[TestKey::secondary()]);
        body["keys"]
            .as_array_mut()
            .unwrap()
            .push(serde_json::json!({
                "kty": "RSA", "alg": "RS256", "kid": "broken", "n": "***", "e": "AQAB"
            }));

        server
            .mock_async(|when, then| {
                when.method(GET).path("/jwks.json");
                then.status(200).json_body(body);
            })
            .await;

        let err = cache.fetch_and_replace().await.unwrap_err();

        assert!(matches!(err, KeySetError::KeySourceMalformed { .. }), "{err:?}");
        assert!(cache.lookup(key.kid()).is_some());
        assert!(cache.lookup(TestKey::secondary().kid()).is_none());
    }

    fn sorted_kids<'a>(kids: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut kids: Vec<String> = kids.into_iter().map(str::to_owned).collect();
        kids.sort();
        kids
    }

    #[test]
    fn readers_never_observe_mixed_snapshots() {
        let config = AuthenticatorConfig::new(testutil::ISSUER, "http://localhost/jwks").unwrap();
        let first = testutil::key_set(&[TestKey::primary(), TestKey::secondary()]);
        let cache = KeyCache::with_snapshot(&config, first);

        let generations = [
            sorted_kids([TestKey::primary().kid(), TestKey::secondary().kid()]),
            sorted_kids([TestKey::primary().kid(), TestKey::rotated().kid()]),
        ];

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for round in 0..2_000 {
                    let next = if round % 2 == 0 {
                        [TestKey::primary(), TestKey::rotated()]
                    } else {
                        [TestKey::primary(), TestKey::secondary()]
                    };
                    cache.replace(Arc::new(testutil::key_set(&next)));
                }
            });

            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..2_000 {
                        let snapshot = cache.snapshot();
                        let kids = sorted_kids(snapshot.kids());
                        assert!(
                            generations.contains(&kids),
                            "observed torn snapshot: {kids:?}"
                        );
                    }
                });
            }
        });
    }
}
