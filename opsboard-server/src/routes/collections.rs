//! Collection endpoints, generalized over the `events` and `tasks` names.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
};
use serde::{Deserialize, Serialize};

use opsboard_core::{CollectionKind, FieldMap, Item};

use crate::routes::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{collection}",
            get(list_items).post(create_item).put(replace_items),
        )
        .route("/{collection}/{id}", patch(update_item).delete(delete_item))
}

/// The version token rides along on reads so clients can submit it back
/// with a whole-array replace.
pub const VERSION_HEADER: &str = "x-collection-version";

fn kind(collection: &str) -> Result<CollectionKind, AppError> {
    Ok(collection.parse::<CollectionKind>()?)
}

/// GET /{collection} - Full contents as a JSON array
async fn list_items(
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let kind = kind(&collection)?;
    let (version, items) = state.service().get_all(kind).await;

    Ok(([(VERSION_HEADER, version.to_string())], Json(items)))
}

/// POST /{collection} - Append one item built from the submitted fields
async fn create_item(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(fields): Json<FieldMap>,
) -> Result<impl IntoResponse, AppError> {
    let kind = kind(&collection)?;
    let item = state.service().append(kind, fields).await?;

    Ok((StatusCode::CREATED, Json(item)))
}

/// PATCH /{collection}/{id} - Merge fields into an existing item
async fn update_item(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Json(fields): Json<FieldMap>,
) -> Result<Json<Item>, AppError> {
    let kind = kind(&collection)?;
    let item = state.service().update_fields(kind, &id, fields).await?;

    Ok(Json(item))
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

/// DELETE /{collection}/{id}
async fn delete_item(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<StatusResponse>, AppError> {
    let kind = kind(&collection)?;
    state.service().remove_by_id(kind, &id).await?;

    Ok(Json(StatusResponse { status: "deleted" }))
}

/// Request body for a whole-array replace
#[derive(Deserialize)]
pub struct ReplaceRequest {
    pub version: u64,
    pub items: Vec<Item>,
}

#[derive(Serialize)]
pub struct ReplaceResponse {
    pub status: &'static str,
    pub version: u64,
}

/// PUT /{collection} - Replace the whole collection
///
/// The submitted version must match the current one; a stale token means a
/// concurrent writer changed the collection and the replace would silently
/// discard their work, so it is rejected with 409.
async fn replace_items(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(req): Json<ReplaceRequest>,
) -> Result<Json<ReplaceResponse>, AppError> {
    let kind = kind(&collection)?;
    let version = state
        .service()
        .replace_all(kind, req.items, req.version)
        .await?;

    Ok(Json(ReplaceResponse {
        status: "replaced",
        version,
    }))
}
