//! Collection Endpoints
//!
//! - `GET /api/:slug` - Paginated, filtered list
//! - `POST /api/:slug` - Create a document
//! - `GET /api/:slug/where-schema` - Compiled filterable paths
//! - `GET /api/:slug/versions` - Version history
//! - `GET /api/:slug/:id` - One document
//! - `PATCH /api/:slug/:id` - Update a document

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};

use super::params::{ListQuery, ReadQuery, SaveQuery};
use super::{AppState, HttpError};
use crate::db::PaginatedDocs;
use crate::models::{Document, Record, VersionDocument};
use crate::query::WhereSchema;

async fn find(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<PaginatedDocs<Document>>, HttpError> {
    let params = query.into_params()?;
    Ok(Json(state.service.find(&slug, params).await?))
}

async fn find_by_id(
    State(state): State<AppState>,
    Path((slug, id)): Path<(String, String)>,
    Query(query): Query<ReadQuery>,
) -> Result<Json<Document>, HttpError> {
    Ok(Json(state.service.find_by_id(&slug, &id, query.into()).await?))
}

async fn create(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<SaveQuery>,
    Json(data): Json<Record>,
) -> Result<(StatusCode, Json<Document>), HttpError> {
    let doc = state.service.create(&slug, data, query.into()).await?;
    Ok((StatusCode::CREATED, Json(doc)))
}

async fn update(
    State(state): State<AppState>,
    Path((slug, id)): Path<(String, String)>,
    Query(query): Query<SaveQuery>,
    Json(patch): Json<Record>,
) -> Result<Json<Document>, HttpError> {
    Ok(Json(state.service.update(&slug, &id, patch, query.into()).await?))
}

async fn find_versions(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<PaginatedDocs<VersionDocument>>, HttpError> {
    let params = query.into_params()?;
    Ok(Json(state.service.find_versions(&slug, params).await?))
}

async fn where_schema(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<WhereSchema>, HttpError> {
    Ok(Json(state.service.where_schema(&slug)?.clone()))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/:slug", get(find).post(create))
        .route("/api/:slug/where-schema", get(where_schema))
        .route("/api/:slug/versions", get(find_versions))
        .route("/api/:slug/:id", get(find_by_id).patch(update))
        .with_state(state)
}
