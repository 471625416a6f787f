//! Request authentication for protected routes.
//!
//! [`authenticate`] is meant to be installed with
//! [`actix_web::middleware::from_fn`]. It reads the `Authorization` header,
//! verifies the bearer token with the [`Authenticator`] registered as
//! application data and, on success, stores the [`VerifiedIdentity`] in the
//! request extensions before calling the next service. Every failure ends the
//! request with `401 Unauthorized` and a short plain-text reason.

use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header::{self, ContentType, HeaderMap};
use actix_web::middleware::Next;
use actix_web::{web, HttpMessage, HttpResponse, ResponseError};
use actix_web_httpauth::headers::www_authenticate::bearer::{Bearer, Error as BearerError};
use actix_web_httpauth::headers::www_authenticate::WwwAuthenticate;
use tracing::*;

use crate::jwk::VerificationError;
use crate::Authenticator;

/// Realm advertised in `WWW-Authenticate` challenges.
pub const REALM: &str = "wardrobe";

/// Problems with the `Authorization` header itself, found before any token
/// verification takes place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthorizationHeaderError {
    /// No `Authorization` header, or an empty one.
    #[error("Authorization header required")]
    Missing,

    /// Anything other than `Bearer <token>`.
    #[error("Authorization header must be in format 'Bearer <token>'")]
    Malformed,
}

/// Extracts the credential from an `Authorization: Bearer <token>` header.
///
/// The value must split on single spaces into exactly two parts, the first
/// being `Bearer` in any letter case.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthorizationHeaderError> {
    let value = match headers.get(header::AUTHORIZATION) {
        Some(value) if !value.is_empty() => value,
        _ => return Err(AuthorizationHeaderError::Missing),
    };

    let value = value
        .to_str()
        .map_err(|_| AuthorizationHeaderError::Malformed)?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(AuthorizationHeaderError::Malformed),
    }
}

/// Authentication middleware for protected scopes.
///
/// ```no_run
/// use actix_web::{middleware::from_fn, web, App};
/// use wardrobe_api::middleware::authenticate;
///
/// let app = App::new().service(
///     web::scope("/clothes").wrap(from_fn(authenticate)),
/// );
/// ```
pub async fn authenticate<B>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, actix_web::Error>
where
    B: MessageBody + 'static,
{
    let Some(auth) = req.app_data::<web::Data<Authenticator>>().cloned() else {
        error!("Authenticator is not registered as application data");
        let response = HttpResponse::InternalServerError().body("Authentication is not configured");
        return Ok(req.into_response(response).map_into_right_body());
    };

    let verified = bearer_token(req.headers()).map(|token| auth.verify(token));

    let identity = match verified {
        Err(err) => {
            debug!("Rejecting request to {}: {err}", req.path());
            let response = unauthorized(header_challenge_error(err), err.to_string());
            return Ok(req.into_response(response).map_into_right_body());
        }
        Ok(Err(err)) => {
            return Ok(req.into_response(err.error_response()).map_into_right_body());
        }
        Ok(Ok(identity)) => identity,
    };

    debug!(user_id = identity.user_id(), "Authenticated request to {}", req.path());
    req.extensions_mut().insert(identity);

    next.call(req).await.map(ServiceResponse::map_into_left_body)
}

fn header_challenge_error(err: AuthorizationHeaderError) -> Option<BearerError> {
    match err {
        // RFC 6750 3.1: no error code when the request carries no credentials.
        AuthorizationHeaderError::Missing => None,
        AuthorizationHeaderError::Malformed => Some(BearerError::InvalidRequest),
    }
}

/// The 401 response for a token that failed verification.
pub(crate) fn invalid_token(err: &VerificationError) -> HttpResponse {
    let message = match err {
        VerificationError::SubjectMissing => err.to_string(),
        other => format!("Invalid token: {other}"),
    };
    unauthorized(Some(BearerError::InvalidToken), message)
}

fn unauthorized(error: Option<BearerError>, message: String) -> HttpResponse {
    let builder = Bearer::build().realm(REALM);
    let challenge = match error {
        Some(error) => builder.error(error).error_description(message.clone()),
        None => builder,
    }
    .finish();

    HttpResponse::Unauthorized()
        .insert_header(WwwAuthenticate(challenge))
        .content_type(ContentType::plaintext())
        .body(message)
}
