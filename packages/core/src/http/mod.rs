//! REST surface
//!
//! Thin axum handlers over [`DocumentService`]. Each endpoint module exposes
//! `routes(state)` and [`create_router`] merges them:
//!
//! - `collection_endpoints`: `/api/:slug` and below
//! - `global_endpoints`: `/api/globals/:slug` and below
//!
//! Errors are answered as [`HttpError`] JSON bodies. Every request is traced
//! through `tower_http`'s `TraceLayer`.

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::services::DocumentService;

mod collection_endpoints;
mod global_endpoints;
mod http_error;
mod params;

pub use http_error::HttpError;
pub use params::{ListQuery, ReadQuery, SaveQuery};

/// Application state shared across all endpoints
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DocumentService>,
}

impl AppState {
    pub fn new(service: Arc<DocumentService>) -> Self {
        Self { service }
    }
}

/// Create the application router with all endpoint modules
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(global_endpoints::routes(state.clone()))
        .merge(collection_endpoints::routes(state))
        .layer(TraceLayer::new_for_http())
}
