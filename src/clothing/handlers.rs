use actix_web::http::{header::ContentType, StatusCode};
use actix_web::middleware::from_fn;
use actix_web::{web, HttpResponse, ResponseError};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::*;

use super::{Clothing, ClothingRepository, RepositoryError, ValidationError};
use crate::middleware::authenticate;
use crate::VerifiedIdentity;

/// Envelope for successful JSON responses.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Always `true`; failures are rendered by [`ApiError`].
    pub success: bool,
    /// The payload.
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// Wraps `data` in a successful envelope.
    pub fn new(data: T) -> ApiResponse<T> {
        ApiResponse {
            success: true,
            data,
        }
    }
}

/// Request failures of the clothing routes, rendered as plain text.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 400: no request body.
    #[error("Request body must not be empty or missing")]
    EmptyBody,

    /// 400: the body is not a JSON object.
    #[error("Request body must be JSON")]
    NotJson,

    /// 400: a required field is absent.
    #[error("Invalid request body, missing '{0}'")]
    MissingField(&'static str),

    /// 400: the body has fields a clothing item does not, or of the wrong type.
    #[error("Invalid request body, superfluous fields {0}")]
    UnknownFields(String),

    /// 400: the item breaks a clothing rule.
    #[error("Invalid request body, breaks validation rule: {0}")]
    Validation(#[from] ValidationError),

    /// 400: the path id is blank.
    #[error("Missing 'id' parameter")]
    MissingId,

    /// 400: the body names a different item than the path.
    #[error("Body has Id = {body}, but id = {path}, resulting is mismatch")]
    IdMismatch {
        /// Id from the body.
        body: String,
        /// Id from the path.
        path: String,
    },

    /// 404: the caller has no item with this id.
    #[error("Clothing item not found for ID {0}")]
    NotFound(String),

    /// 500: the repository failed.
    #[error("{message}")]
    Storage {
        /// Text sent to the client.
        message: String,
        /// Logged cause.
        #[source]
        source: RepositoryError,
    },
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .content_type(ContentType::plaintext())
            .body(self.to_string())
    }
}

/// Maps a repository failure to a 500 carrying `message`, logging the cause.
fn storage_error(message: impl Into<String>) -> impl FnOnce(RepositoryError) -> ApiError {
    let message = message.into();
    move |source| {
        error!("{message}: {source}");
        ApiError::Storage { message, source }
    }
}

/// Returns the first required clothing field absent from `fields`.
pub fn missing_required_field(fields: &Map<String, Value>) -> Option<&'static str> {
    Clothing::REQUIRED_FIELDS
        .into_iter()
        .find(|field| !fields.contains_key(*field))
}

/// Parses a create or update body and checks the item rules.
fn parse_clothing(body: &[u8]) -> Result<Clothing, ApiError> {
    if body.is_empty() {
        return Err(ApiError::EmptyBody);
    }

    let fields: Map<String, Value> =
        serde_json::from_slice(body).map_err(|_| ApiError::NotJson)?;

    if let Some(field) = missing_required_field(&fields) {
        return Err(ApiError::MissingField(field));
    }

    let clothing: Clothing = serde_json::from_value(Value::Object(fields))
        .map_err(|err| ApiError::UnknownFields(err.to_string()))?;
    clothing.validate()?;

    Ok(clothing)
}

fn item_id(raw: &str) -> Result<&str, ApiError> {
    match raw.trim() {
        "" => Err(ApiError::MissingId),
        id => Ok(id),
    }
}

fn ensure_exists(
    repo: &dyn ClothingRepository,
    user_id: &str,
    id: &str,
    failure: impl Into<String>,
) -> Result<(), ApiError> {
    match repo.exists(user_id, id) {
        Ok(true) => Ok(()),
        Ok(false) => Err(ApiError::NotFound(id.to_owned())),
        Err(err) => Err(storage_error(failure)(err)),
    }
}

/// `GET /clothes`
pub async fn list_clothing(
    identity: VerifiedIdentity,
    repo: web::Data<dyn ClothingRepository>,
) -> Result<HttpResponse, ApiError> {
    let items = repo
        .get_all(identity.user_id())
        .map_err(storage_error("Error getting clothing items"))?;

    Ok(HttpResponse::Ok().json(ApiResponse::new(items)))
}

/// `POST /clothes`
pub async fn create_clothing(
    identity: VerifiedIdentity,
    repo: web::Data<dyn ClothingRepository>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let clothing = parse_clothing(&body)?;

    let saved = repo
        .save(identity.user_id(), clothing)
        .map_err(storage_error("Error saving clothing item"))?;

    info!(user_id = identity.user_id(), id = %saved.id, "Created clothing item");
    Ok(HttpResponse::Created().json(ApiResponse::new(saved)))
}

/// `GET /clothes/{id}`
pub async fn get_clothing(
    identity: VerifiedIdentity,
    repo: web::Data<dyn ClothingRepository>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = item_id(&path)?;
    let failure = format!("Unable to get clothing for ID {id}");

    ensure_exists(&**repo, identity.user_id(), id, failure.clone())?;
    let item = repo
        .get_by_id(identity.user_id(), id)
        .map_err(storage_error(failure))?;

    Ok(HttpResponse::Ok().json(ApiResponse::new(item)))
}

/// `PUT`, `PATCH` or `POST /clothes/{id}`
///
/// Replaces the whole item. The owner is always the caller, whatever the
/// body says.
pub async fn update_clothing(
    identity: VerifiedIdentity,
    repo: web::Data<dyn ClothingRepository>,
    path: web::Path<String>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let id = item_id(&path)?;
    let mut clothing = parse_clothing(&body)?;

    if !clothing.id.is_empty() && clothing.id != id {
        return Err(ApiError::IdMismatch {
            body: clothing.id,
            path: id.to_owned(),
        });
    }
    clothing.id = id.to_owned();
    clothing.user_id = identity.user_id().to_owned();

    ensure_exists(&**repo, identity.user_id(), id, "Error updating clothing item")?;
    let updated = repo
        .update(identity.user_id(), clothing)
        .map_err(storage_error("Error updating clothing item"))?;

    info!(user_id = identity.user_id(), id, "Updated clothing item");
    Ok(HttpResponse::Ok().json(ApiResponse::new(updated)))
}

/// `DELETE /clothes/{id}`
pub async fn delete_clothing(
    identity: VerifiedIdentity,
    repo: web::Data<dyn ClothingRepository>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = item_id(&path)?;
    let failure = format!("Unable to delete clothing for ID {id}");

    ensure_exists(&**repo, identity.user_id(), id, failure.clone())?;
    repo.delete(identity.user_id(), id)
        .map_err(storage_error(failure))?;

    info!(user_id = identity.user_id(), id, "Deleted clothing item");
    Ok(HttpResponse::NoContent().finish())
}

/// Registers the authenticated `/clothes` scope.
///
/// Expects an [`Authenticator`](crate::Authenticator) and a
/// `web::Data<dyn ClothingRepository>` in the application data. Unsupported
/// methods on a known path get `405 Method Not Allowed`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/clothes")
            .wrap(from_fn(authenticate))
            .service(
                web::resource("")
                    .route(web::get().to(list_clothing))
                    .route(web::post().to(create_clothing)),
            )
            .service(
                web::resource("/{id}")
                    .route(web::get().to(get_clothing))
                    .route(web::post().to(update_clothing))
                    .route(web::put().to(update_clothing))
                    .route(web::patch().to(update_clothing))
                    .route(web::delete().to(delete_clothing)),
            ),
    );
}
