//! # wardrobe-api
//!
//! A multi-tenant clothing inventory service for `actix-web`. Every request to
//! the inventory routes must carry a bearer token issued by the configured
//! identity provider; the token's subject becomes the tenant key for storage.
//!
//! Tokens are verified against the provider's published signing keys, which
//! are fetched once at startup and refreshed in the background.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use actix_web::{web, App, HttpServer};
//! use wardrobe_api::clothing::{self, ClothingRepository, InMemoryClothingRepository};
//! use wardrobe_api::jwk::AuthenticatorConfig;
//! use wardrobe_api::Authenticator;
//!
//! #[actix_web::main]
//! async fn main() -> std::io::Result<()> {
//!     let config = AuthenticatorConfig::for_cognito("eu-west-2", "eu-west-2_abc123").unwrap();
//!     let auth = Authenticator::new(config).await.unwrap(); // Don't forget to handle this error
//!
//!     let repo: Arc<dyn ClothingRepository> = Arc::new(InMemoryClothingRepository::new());
//!     let repo = web::Data::from(repo);
//!
//!     HttpServer::new(move || {
//!         App::new()
//!             .app_data(web::Data::new(auth.clone()))
//!             .app_data(repo.clone())
//!             .configure(clothing::configure)
//!     })
//!     .bind(("127.0.0.1", 8080))?
//!     .run()
//!     .await
//! }
//! ```

mod client;
mod error;
mod impls;
mod user;

pub mod clothing;
pub mod jwk;
pub mod middleware;

#[cfg(test)]
mod testutil;

pub use client::*;
pub use error::*;
pub use user::*;
