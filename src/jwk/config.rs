use std::{env, ops::Deref, time::Duration};

use jsonwebtoken::Algorithm;
use url::Url;

use super::error::ConfigError;

/// Interval between scheduled key-set refreshes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Upper bound for a single key-set HTTP fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// The expected `iss` claim of every accepted token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issuer(String);

impl Issuer {
    /// A trimmed, non-blank issuer.
    pub fn new(issuer: impl AsRef<str>) -> Result<Issuer, ConfigError> {
        let issuer = issuer.as_ref().trim();
        if issuer.is_empty() {
            return Err(ConfigError::MissingField("issuer"));
        }
        Ok(Issuer(issuer.to_owned()))
    }

    /// Issuer of an AWS Cognito user pool.
    pub fn cognito(
        region: impl AsRef<str>,
        user_pool_id: impl AsRef<str>,
    ) -> Result<Issuer, ConfigError> {
        let region = non_empty("region", region.as_ref())?;
        let user_pool_id = non_empty("user_pool_id", user_pool_id.as_ref())?;
        Ok(Issuer(format!(
            "https://cognito-idp.{region}.amazonaws.com/{user_pool_id}"
        )))
    }
}

impl Deref for Issuer {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        self.0.as_str()
    }
}

/// Static configuration of the authenticator.
///
/// Immutable once built; every setter validates and returns a new value, so an
/// invalid configuration can never reach [`crate::Authenticator::new`].
#[derive(Debug, Clone)]
pub struct AuthenticatorConfig {
    issuer: Issuer,
    jwks_url: Url,
    allowed_algorithms: Vec<Algorithm>,
    refresh_interval: Duration,
    fetch_timeout: Duration,
}

impl AuthenticatorConfig {
    /// Expected `iss` claim.
    pub const ENV_ISSUER: &'static str = "AUTH_ISSUER";
    /// Key-set address, required together with [`Self::ENV_ISSUER`].
    pub const ENV_JWKS_URL: &'static str = "AUTH_JWKS_URL";
    /// Optional refresh interval in whole seconds.
    pub const ENV_REFRESH_INTERVAL: &'static str = "AUTH_REFRESH_INTERVAL_SECS";
    /// Cognito region, used when no explicit issuer is set.
    pub const ENV_REGION: &'static str = "AWS_REGION";
    /// Cognito user pool id, used with [`Self::ENV_REGION`].
    pub const ENV_USER_POOL_ID: &'static str = "COGNITO_USER_POOL_ID";

    /// Configuration for an arbitrary issuer and key-set address, with RS256
    /// only, a five minute refresh interval and a ten second fetch timeout.
    pub fn new(
        issuer: impl AsRef<str>,
        jwks_url: impl AsRef<str>,
    ) -> Result<AuthenticatorConfig, ConfigError> {
        Ok(AuthenticatorConfig {
            issuer: Issuer::new(issuer)?,
            jwks_url: parse_jwks_url(jwks_url.as_ref())?,
            allowed_algorithms: vec![Algorithm::RS256],
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        })
    }

    /// Configuration for tokens issued by an AWS Cognito user pool.
    ///
    /// The key set is read from the pool's `.well-known/jwks.json`.
    pub fn for_cognito(
        region: impl AsRef<str>,
        user_pool_id: impl AsRef<str>,
    ) -> Result<AuthenticatorConfig, ConfigError> {
        let issuer = Issuer::cognito(region, user_pool_id)?;
        let jwks_url = format!("{}/.well-known/jwks.json", &*issuer);
        Ok(AuthenticatorConfig {
            jwks_url: parse_jwks_url(&jwks_url)?,
            issuer,
            allowed_algorithms: vec![Algorithm::RS256],
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        })
    }

    /// Reads the configuration from the process environment.
    ///
    /// `AUTH_ISSUER` and `AUTH_JWKS_URL` take precedence; otherwise the
    /// Cognito pool named by `AWS_REGION` and `COGNITO_USER_POOL_ID` is used.
    pub fn from_env() -> Result<AuthenticatorConfig, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<AuthenticatorConfig, ConfigError> {
        let config = match (lookup(Self::ENV_ISSUER), lookup(Self::ENV_JWKS_URL)) {
            (Some(issuer), Some(jwks_url)) => Self::new(issuer, jwks_url)?,
            (Some(_), None) => return Err(ConfigError::MissingField(Self::ENV_JWKS_URL)),
            _ => {
                let region = lookup(Self::ENV_REGION)
                    .ok_or(ConfigError::MissingField(Self::ENV_REGION))?;
                let pool = lookup(Self::ENV_USER_POOL_ID)
                    .ok_or(ConfigError::MissingField(Self::ENV_USER_POOL_ID))?;
                Self::for_cognito(region, pool)?
            }
        };

        match lookup(Self::ENV_REFRESH_INTERVAL) {
            Some(value) => {
                let secs = value.trim().parse::<u64>().map_err(|_| {
                    ConfigError::InvalidEnvValue {
                        name: Self::ENV_REFRESH_INTERVAL,
                        value: value.clone(),
                    }
                })?;
                config.with_refresh_interval(Duration::from_secs(secs))
            }
            None => Ok(config),
        }
    }

    /// Replaces the allow-list of header algorithms.
    ///
    /// Symmetric algorithms may be listed but are still rejected at
    /// verification time.
    pub fn with_allowed_algorithms(
        mut self,
        algorithms: impl IntoIterator<Item = Algorithm>,
    ) -> Result<AuthenticatorConfig, ConfigError> {
        let algorithms: Vec<Algorithm> = algorithms.into_iter().collect();
        if algorithms.is_empty() {
            return Err(ConfigError::NoAllowedAlgorithms);
        }
        self.allowed_algorithms = algorithms;
        Ok(self)
    }

    /// Sets the time between scheduled key-set refreshes. Must be non-zero.
    pub fn with_refresh_interval(
        mut self,
        interval: Duration,
    ) -> Result<AuthenticatorConfig, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::ZeroDuration("refresh_interval"));
        }
        self.refresh_interval = interval;
        Ok(self)
    }

    /// Sets the timeout of a single key-set fetch. Must be non-zero.
    pub fn with_fetch_timeout(
        mut self,
        timeout: Duration,
    ) -> Result<AuthenticatorConfig, ConfigError> {
        if timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("fetch_timeout"));
        }
        self.fetch_timeout = timeout;
        Ok(self)
    }

    /// Expected `iss` claim.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Key-set address.
    pub fn jwks_url(&self) -> &Url {
        &self.jwks_url
    }

    /// Header algorithms accepted by the verifier.
    pub fn allowed_algorithms(&self) -> &[Algorithm] {
        &self.allowed_algorithms
    }

    /// Time between scheduled key-set refreshes.
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Timeout of a single key-set fetch.
    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }
}

fn non_empty<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::MissingField(field));
    }
    Ok(value)
}

fn parse_jwks_url(value: &str) -> Result<Url, ConfigError> {
    let value = non_empty("jwks_url", value)?;
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidJwksUrl {
        url: value.to_owned(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidJwksUrl {
            url: value.to_owned(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}
