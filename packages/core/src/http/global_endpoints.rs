//! Global Endpoints
//!
//! - `GET /api/globals/:slug` - Read a global
//! - `POST /api/globals/:slug` - Save a global
//! - `GET /api/globals/:slug/versions` - Version history

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};

use super::params::{ListQuery, ReadQuery, SaveQuery};
use super::{AppState, HttpError};
use crate::db::PaginatedDocs;
use crate::models::{Record, VersionDocument};

async fn find_global(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<ReadQuery>,
) -> Result<Json<Record>, HttpError> {
    Ok(Json(state.service.find_global(&slug, query.into()).await?))
}

async fn save_global(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<SaveQuery>,
    Json(data): Json<Record>,
) -> Result<Json<Record>, HttpError> {
    Ok(Json(state.service.save_global(&slug, data, query.into()).await?))
}

async fn find_global_versions(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<PaginatedDocs<VersionDocument>>, HttpError> {
    let params = query.into_params()?;
    Ok(Json(state.service.find_global_versions(&slug, params).await?))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/globals/:slug", get(find_global).post(save_global))
        .route("/api/globals/:slug/versions", get(find_global_versions))
        .with_state(state)
}
