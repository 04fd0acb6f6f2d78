#[macro_use]
extern crate rocket;

use std::sync::Arc;

use error::BackendError;
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedHeaders, AllowedOrigins};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::config::{Config, StorageKind};
use crate::data::user::db::seed_admin;
use crate::route::mount_api;
use crate::security::Security;
use crate::store::{MemoryStore, MongoStore, Store};

pub mod config;
pub mod data;
pub mod error;
pub mod resp;
pub mod role;
pub mod route;
pub mod security;
pub mod store;
pub mod util;

/// Loads configuration, connects the configured store and builds the server.
pub async fn create(log_level: Option<Level>) -> Result<Rocket<Build>, BackendError> {
    if let Some(l) = log_level {
        let subscriber = FmtSubscriber::builder().with_max_level(l).finish();

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Unable to set global logger: {}", err);
        };
    }

    tracing::info!("Reading .env file...");
    if dotenv::dotenv().is_err() {
        tracing::warn!("Unable to load .env file.");
    }

    tracing::info!("Loading configuration...");
    let c = match Config::load_or_default() {
        Ok(c) => {
            tracing::info!("Configuration loaded.");
            c
        }
        Err(other) => {
            tracing::error!("Configuration error: {}", other);
            return Err(other.into());
        }
    };

    let store: Store = match c.storage {
        StorageKind::Mongodb => {
            match MongoStore::connect(&c.mongodb_uri, &c.mongodb_db).await {
                Ok(it) => Arc::new(it),
                Err(e) => {
                    tracing::error!("Unable to connect to MongoDB: {}", e);
                    return Err(e.into());
                }
            }
        }
        StorageKind::Memory => {
            tracing::warn!("Using in-memory storage. Data won't survive a restart.");
            Arc::new(MemoryStore::new())
        }
    };

    build(c, store).await
}

fn cors_options(c: &Config) -> rocket_cors::CorsOptions {
    rocket_cors::CorsOptions {
        allowed_origins: AllowedOrigins::some_exact(c.cors_origins.as_slice()),
        allowed_methods: vec![
            Method::Get,
            Method::Post,
            Method::Put,
            Method::Delete,
            Method::Options,
        ]
        .into_iter()
        .map(From::from)
        .collect(),
        allowed_headers: AllowedHeaders::some(&["Origin", "Content-Type", "Authorization"]),
        expose_headers: ["Content-Length"].iter().map(ToString::to_string).collect(),
        allow_credentials: true,
        ..Default::default()
    }
}

/// Builds the server over an already connected store.
pub async fn build(c: Config, store: Store) -> Result<Rocket<Build>, BackendError> {
    tracing::info!("Checking administrator account...");
    seed_admin(store.as_ref(), &c.admin).await?;

    tracing::info!("Initializing token keys...");
    let security = Security::load(&c);

    tracing::info!("Setting up CORS...");
    let cors = cors_options(&c).to_cors()?;

    tracing::info!("Starting HTTP server on {}:{}...", c.address, c.port);
    let figment = rocket::Config::figment()
        .merge(("address", c.address.clone()))
        .merge(("port", c.port));

    let r = rocket::custom(figment)
        .manage(c)
        .manage(store)
        .manage(security)
        .attach(cors);

    Ok(mount_api(r))
}
