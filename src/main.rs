//! `wardrobe-api` server: the `/clothes` inventory behind bearer-token
//! authentication.

use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpServer};
use tracing::*;
use tracing_subscriber::EnvFilter;
use wardrobe_api::clothing::{self, ClothingRepository, InMemoryClothingRepository};
use wardrobe_api::jwk::AuthenticatorConfig;
use wardrobe_api::Authenticator;

const DEFAULT_PORT: u16 = 8080;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const KEEP_ALIVE: Duration = Duration::from_secs(10);

fn port() -> Result<u16, String> {
    match env::var("PORT") {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| format!("PORT must be a port number, got '{value}'")),
        Err(_) => Ok(DEFAULT_PORT),
    }
}

#[actix_web::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port = match port() {
        Ok(port) => port,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let config = match AuthenticatorConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("Invalid authentication configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    let auth = match Authenticator::new(config).await {
        Ok(auth) => web::Data::new(auth),
        Err(err) => {
            error!("Unable to start authenticator: {err}");
            return ExitCode::FAILURE;
        }
    };

    let repo: Arc<dyn ClothingRepository> = Arc::new(InMemoryClothingRepository::new());
    let repo = web::Data::from(repo);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(auth.clone())
            .app_data(repo.clone())
            .configure(clothing::configure)
    })
    .client_request_timeout(REQUEST_TIMEOUT)
    .keep_alive(KEEP_ALIVE)
    .bind(("0.0.0.0", port));

    let server = match server {
        Ok(server) => server,
        Err(err) => {
            error!("Unable to bind port {port}: {err}");
            return ExitCode::FAILURE;
        }
    };

    info!("Server starting on port {port}");
    match server.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Server error: {err}");
            ExitCode::FAILURE
        }
    }
}
