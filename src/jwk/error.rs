use thiserror::Error;

pub(super) type VerificationResult<T> = std::result::Result<T, VerificationError>;

/// Errors that can occur during token verification.
///
/// Every variant is terminal for the request that produced it: the caller
/// has to obtain a new token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// The token is not a three-part compact JWT with decodable segments.
    #[error("token is malformed")]
    MalformedToken,

    /// The header algorithm is not allowed, or is symmetric.
    #[error("signing method {0} is not allowed")]
    UnsupportedAlgorithm(String),

    /// The token is missing the `kid` header.
    #[error("token does not have a 'kid' header")]
    MissingKeyIdentifier,

    /// No key in the current key set matches the `kid` header.
    #[error("public key with KID '{0}' not found")]
    UnknownSigningKey(String),

    /// The signature does not verify against the resolved public key.
    #[error("token signature is invalid")]
    InvalidSignature,

    /// The `iss` claim differs from the configured issuer.
    #[error("token has invalid issuer")]
    IssuerMismatch,

    /// The token carries no `exp` claim.
    #[error("token is missing required claim: exp claim is required")]
    ExpirationRequired,

    /// The `exp` claim lies in the past.
    #[error("token is expired")]
    TokenExpired,

    /// The `sub` claim is absent or blank.
    #[error("User ID not found in token")]
    SubjectMissing,
}

/// Errors raised while fetching the signing key set from the identity provider.
#[derive(Debug, thiserror::Error)]
pub enum KeySetError {
    /// Transport failure or a non-2xx response from the key-set endpoint.
    #[error("key set source {url} is unreachable: {source}")]
    KeySourceUnreachable {
        /// Key-set address that was requested.
        url: String,
        /// Underlying transport or status error.
        #[source]
        source: reqwest::Error,
    },

    /// The response body is not a usable JSON Web Key Set.
    #[error("key set from {url} is malformed: {reason}")]
    KeySourceMalformed {
        /// Key-set address that was requested.
        url: String,
        /// Why the body was refused.
        reason: String,
    },
}

/// Invalid authenticator configuration, detected at construction time.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required setting is empty or whitespace.
    #[error("'{0}' must not be empty")]
    MissingField(&'static str),

    /// The key-set address is not an absolute http(s) URL.
    #[error("invalid key set URL '{url}': {reason}")]
    InvalidJwksUrl {
        /// The rejected value.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The algorithm allow-list is empty.
    #[error("at least one signature algorithm must be allowed")]
    NoAllowedAlgorithms,

    /// A duration setting is zero.
    #[error("'{0}' must be greater than zero")]
    ZeroDuration(&'static str),

    /// An environment variable holds a value that cannot be parsed.
    #[error("environment variable {name} has invalid value '{value}'")]
    InvalidEnvValue {
        /// Variable name.
        name: &'static str,
        /// Its unparsable value.
        value: String,
    },

    /// The HTTP client used for key-set fetches could not be built.
    #[error("failed to build key set HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}
