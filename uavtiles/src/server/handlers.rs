//! Axum handlers. Each one forwards to a [`TileService`] operation.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use super::error::ApiError;
use crate::render::TileFormat;
use crate::service::{
    BoundsResponse, DatasetInfo, DatasetList, HealthResponse, RenderedTile, ServiceError,
    TileJson, TileService,
};

/// `Cache-Control` sent with every tile.
pub const TILE_CACHE_CONTROL: &str = "public, max-age=3600";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TileService>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TileJsonQuery {
    pub tile_format: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TileQuery {
    pub url: Option<String>,
    pub rescale: Option<String>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(state.service.health())
}

pub async fn datasets(State(state): State<AppState>) -> Result<Json<DatasetList>, ApiError> {
    Ok(Json(state.service.list_datasets().await?))
}

pub async fn dataset_info(
    State(state): State<AppState>,
    Path(dataset): Path<String>,
) -> Result<Json<DatasetInfo>, ApiError> {
    Ok(Json(state.service.dataset_info(&dataset).await?))
}

pub async fn dataset_bounds(
    State(state): State<AppState>,
    Path(dataset): Path<String>,
) -> Result<Json<BoundsResponse>, ApiError> {
    Ok(Json(state.service.dataset_bounds(&dataset).await?))
}

pub async fn tilejson(
    State(state): State<AppState>,
    Path(dataset): Path<String>,
    Query(query): Query<TileJsonQuery>,
) -> Result<Json<TileJson>, ApiError> {
    let format = query.tile_format.as_deref().unwrap_or("png");
    Ok(Json(state.service.tilejson(&dataset, format).await?))
}

pub async fn dataset_tile(
    State(state): State<AppState>,
    Path((dataset, z, x, tile)): Path<(String, String, String, String)>,
    Query(query): Query<TileQuery>,
) -> Result<Response, ApiError> {
    let (z, x, y, format) = parse_tile_path(&z, &x, &tile)?;
    let rendered = state
        .service
        .tile(&dataset, z, x, y, format, query.rescale.as_deref())
        .await?;
    Ok(tile_response(rendered))
}

/// `/tiles/{z}/{x}/{y}.{format}?url=...`
pub async fn tile_by_url(
    State(state): State<AppState>,
    Path((z, x, tile)): Path<(String, String, String)>,
    Query(query): Query<TileQuery>,
) -> Result<Response, ApiError> {
    let url = query.url.as_deref().filter(|u| !u.is_empty());
    if url.is_none() {
        return Err(ServiceError::MissingUrl.into());
    }
    let (z, x, y, format) = parse_tile_path(&z, &x, &tile)?;
    let rendered = state
        .service
        .tile_by_url(url, z, x, y, format, query.rescale.as_deref())
        .await?;
    Ok(tile_response(rendered))
}

fn tile_response(tile: RenderedTile) -> Response {
    (
        [
            (header::CONTENT_TYPE, tile.format.media_type()),
            (header::CACHE_CONTROL, TILE_CACHE_CONTROL),
        ],
        tile.data,
    )
        .into_response()
}

/// Split `{y}.{ext}` and parse the coordinate triple.
///
/// A missing or unknown extension renders PNG.
fn parse_tile_path(
    z: &str,
    x: &str,
    tile: &str,
) -> Result<(u32, u32, u32, TileFormat), ServiceError> {
    let (y, format) = match tile.rsplit_once('.') {
        Some((y, ext)) => (y, TileFormat::from_extension_or_png(ext)),
        None => (tile, TileFormat::Png),
    };
    let parse = |name: &str, value: &str| {
        value.parse::<u32>().map_err(|_| {
            ServiceError::InvalidParameter(format!(
                "{} must be a non-negative integer, got '{}'",
                name, value
            ))
        })
    };
    Ok((parse("z", z)?, parse("x", x)?, parse("y", y)?, format))
}
