// Library exports for Agora
// This allows integration tests and the binary to share one router

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod forum;
pub mod mail;
pub mod maintenance;
pub mod rbac;
pub mod routes;
pub mod sanitize;
pub mod sessions;
pub mod settings;
pub mod state;

use std::sync::Arc;

use axum::{middleware, Router};
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::auth::identity::ConfiguredIdentities;
use crate::cache::Cache;
use crate::config::Config;
use crate::sessions::SessionStore;
use crate::state::{AppState, DbPool};

/// State for a pool and config, with empty cache and session store.
pub fn build_state(db: DbPool, config: Config) -> AppState {
    let identities = ConfiguredIdentities::new(config.identity.users.clone());
    AppState {
        db,
        config,
        cache: Arc::new(Cache::new()),
        sessions: Arc::new(Mutex::new(SessionStore::new())),
        identities: Arc::new(identities),
    }
}

pub fn build_router(state: AppState) -> Router {
    routes::router()
        .layer(middleware::from_fn_with_state(state.clone(), routes::offline::gate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
