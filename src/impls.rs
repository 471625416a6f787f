use actix_web::error::InternalError;
use actix_web::http::StatusCode;
use actix_web::{dev, FromRequest, HttpMessage, HttpRequest, HttpResponse, ResponseError};
use futures::future::{err, ok, Ready};

use crate::jwk::KeySetError;
use crate::{Error, VerifiedIdentity};

fn status_code_from_http_err(err: &reqwest::Error) -> StatusCode {
    if err.is_timeout() {
        return StatusCode::GATEWAY_TIMEOUT;
    }
    StatusCode::BAD_GATEWAY // Upstream key source failures
}

impl ResponseError for Error {
    fn error_response(&self) -> HttpResponse {
        match self {
            Error::VerificationError(err) => crate::middleware::invalid_token(err),
            _ => HttpResponse::build(self.status_code()).body(self.to_string()),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,

            Error::KeySetError(err) => match err {
                KeySetError::KeySourceUnreachable { source, .. } => {
                    status_code_from_http_err(source)
                }
                KeySetError::KeySourceMalformed { .. } => StatusCode::BAD_GATEWAY,
            },

            // Every token failure is terminal for the request; the caller
            // needs a new token.
            Error::VerificationError(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

impl FromRequest for VerifiedIdentity {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        match req.extensions().get::<VerifiedIdentity>() {
            Some(identity) => ok(identity.clone()),
            None => err(missing_identity()),
        }
    }
}

/// The handler was reached without passing through the authentication
/// middleware, so there is no tenant to scope storage calls to.
fn missing_identity() -> actix_web::Error {
    let response = HttpResponse::Unauthorized().body("UserID not provided");
    InternalError::from_response("missing_identity", response).into()
}
