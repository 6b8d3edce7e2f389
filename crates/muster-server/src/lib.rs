//! Muster Registry Server
//!
//! Fleet-registration backend: clients (machines running VM workloads)
//! register themselves and report their installed VM images, and an
//! administrator queries and updates the registry over an HTTP API gated by
//! bearer-token authentication.
//!
//! ## Architecture
//!
//! - `muster-auth` owns credentials: Argon2id password hashing and HS256
//!   bearer tokens.
//! - `muster-store` owns persisted state: clients, VM images, users and the
//!   client/image association, behind a transactional SQLite store.
//! - This crate wires both into an axum router: the auth gate resolves the
//!   acting user from the `Authorization` header, handlers validate the
//!   payload, and the store performs one short-lived transaction per call.
//!
//! ## Endpoints
//!
//! - `GET /` - server identity
//! - `GET /health` - health check
//! - `POST /login` - exchange credentials for a bearer token
//! - `POST /clients` - register a client (auth)
//! - `PUT /clients` - update a client by MAC (auth)
//! - `GET /clients` - list clients, filterable by version or image hash (auth)
//! - `GET /clients/:mac_address` - fetch one client (auth)
//! - `GET /clients/:mac_address/vms` - installed image ids (auth)
//! - `POST /images` - register a VM image (auth)
//! - `PUT /images` - modify a VM image by id (auth)
//! - `GET /images` - list images, filterable by name or hash (auth)
//! - `GET /images/:image_id` - fetch one image (auth)

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use muster_store::Database;

pub use config::Config;

/// Shared application state
pub struct AppState {
    /// Registry store handle. Each logical operation takes the lock, runs
    /// one short-lived transaction and releases; no transaction is held
    /// across requests.
    pub db: Mutex<Database>,

    /// Service configuration (server identity, token secret).
    pub config: Config,
}

impl AppState {
    /// Create new application state
    pub fn new(db: Database, config: Config) -> Self {
        Self {
            db: Mutex::new(db),
            config,
        }
    }
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/", get(handlers::server_info_handler))
        .route("/health", get(handlers::health_handler))
        .route("/login", post(handlers::login_handler))
        .route(
            "/clients",
            get(handlers::list_clients_handler)
                .post(handlers::register_client_handler)
                .put(handlers::update_client_handler),
        )
        .route("/clients/:mac_address", get(handlers::get_client_handler))
        .route(
            "/clients/:mac_address/vms",
            get(handlers::get_client_vms_handler),
        )
        .route(
            "/images",
            get(handlers::list_images_handler)
                .post(handlers::add_image_handler)
                .put(handlers::update_image_handler),
        )
        .route("/images/:image_id", get(handlers::get_image_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
