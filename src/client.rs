use std::sync::Arc;

use tokio::{
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::*;

use crate::jwk::{AuthenticatorConfig, KeyCache, TokenVerifier};
use crate::VerifiedIdentity;

/// Handle to the background key refresh; aborts the task when dropped.
struct RefreshTask(JoinHandle<()>);

impl Drop for RefreshTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Authenticator is responsible for verifying bearer tokens issued by the
/// identity provider and keeping its public keys up to date by periodically
/// fetching them.
///
/// Clones share the key cache and the refresh task. The task is aborted once
/// the last clone is dropped.
#[derive(Clone)]
pub struct Authenticator {
    config: Arc<AuthenticatorConfig>,
    verifier: TokenVerifier,
    keys: Arc<KeyCache>,
    _refresh: Arc<RefreshTask>,
}

impl Authenticator {
    /// Create a new Authenticator with an initial key fetch.
    ///
    /// Fails if the initial fetch fails, since no token could be verified.
    /// Must be called from within a Tokio runtime.
    pub async fn new(config: AuthenticatorConfig) -> crate::Result<Self> {
        let keys = Arc::new(KeyCache::new(&config)?);

        if let Err(err) = keys.fetch_and_replace().await {
            error!("Error fetching initial signing key set: {err}");
            return Err(err.into());
        }

        let refresh = Self::start_key_update(Arc::clone(&keys), &config);

        Ok(Self {
            verifier: TokenVerifier::new(&config),
            config: Arc::new(config),
            keys,
            _refresh: Arc::new(refresh),
        })
    }

    /// Verifies a bearer token and returns the identity of its subject.
    pub fn verify(&self, token: &str) -> crate::Result<VerifiedIdentity> {
        match self.verifier.verify(token, &self.keys) {
            Ok(user_id) => Ok(VerifiedIdentity::new(user_id)),
            Err(err) => {
                warn!("JWT validation failed: {err}");
                Err(err.into())
            }
        }
    }

    /// The configuration this authenticator was built with.
    pub fn config(&self) -> &AuthenticatorConfig {
        &self.config
    }

    /// The shared signing key cache.
    pub fn key_cache(&self) -> &KeyCache {
        &self.keys
    }

    /// Spawns a background task that refreshes the key set on a fixed interval.
    ///
    /// Each fetch is awaited before the next tick is taken and missed ticks
    /// are skipped, so refreshes never overlap. Failures keep the previous
    /// key set and the loop carries on.
    fn start_key_update(keys: Arc<KeyCache>, config: &AuthenticatorConfig) -> RefreshTask {
        let period = config.refresh_interval();

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick fires immediately; the initial fetch already ran.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                debug!("Refreshing signing key set from {}", keys.jwks_url());
                match keys.fetch_and_replace().await {
                    Ok(_) => debug!("Signing key set refreshed. Next refresh in {period:?}"),
                    Err(err) => {
                        warn!("Failed to refresh signing key set: {err}");
                        warn!("Keeping previous keys, retrying in {period:?}");
                    }
                }
            }
        });

        RefreshTask(task)
    }

    #[cfg(test)]
    pub(crate) fn refresh_task_finished(&self) -> bool {
        self._refresh.0.is_finished()
    }

    /// Authenticator over a fixed key set, without a refresh loop.
    #[cfg(test)]
    pub(crate) fn with_key_set(keys: crate::jwk::SigningKeySet) -> Self {
        let config =
            AuthenticatorConfig::new(crate::testutil::ISSUER, "http://localhost/jwks.json")
                .unwrap();
        Self {
            verifier: TokenVerifier::new(&config),
            keys: Arc::new(KeyCache::with_snapshot(&config, keys)),
            config: Arc::new(config),
            _refresh: Arc::new(RefreshTask(tokio::spawn(async {}))),
        }
    }
}
