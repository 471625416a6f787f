/// A crate-wide result type alias using the custom [`Error`] enum.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for authenticator failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The authenticator configuration is invalid.
    #[error(transparent)]
    ConfigError(#[from] crate::jwk::ConfigError),

    /// Errors that occur while fetching or parsing the provider's public keys.
    #[error(transparent)]
    KeySetError(#[from] crate::jwk::KeySetError),

    /// Errors that occur during JWT verification or claim validation.
    #[error(transparent)]
    VerificationError(#[from] crate::jwk::VerificationError),
}
