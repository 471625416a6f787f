use serde::Serialize;

/// The outcome of a successful token verification.
///
/// The authentication middleware stores one of these in the request
/// extensions; handlers obtain it through its [`FromRequest`] impl and must
/// use [`VerifiedIdentity::user_id`] as the tenant key for every storage call.
///
/// [`FromRequest`]: actix_web::FromRequest
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerifiedIdentity {
    /// Subject (`sub`) of the verified token.
    user_id: String,
}

impl VerifiedIdentity {
    pub(crate) fn new(user_id: String) -> VerifiedIdentity {
        VerifiedIdentity { user_id }
    }

    /// The tenant key for storage calls.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}
