//! HTTP surface (§6): uint16 wire tiles, colorized PNG tiles (topographic and
//! flood-risk), and the point-sample risk endpoint, backed by a single
//! explicitly constructed [`tile_engine::TileEngine`].

use std::{collections::HashMap, sync::Arc};

use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use artifact_store::AcceptEncoding;
use tile_engine::{Config, PngMode, PointSampleRequest, TileEngine};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::AppError;

const CACHE_CONTROL_IMMUTABLE: &str = "public, max-age=31536000, immutable";

pub fn create_router(config: Config) -> axum::routing::Router {
    let engine = Arc::new(TileEngine::new(config));

    axum::Router::new()
        .route("/api/v1/tiles/elevation-data/{z}/{x}/{y}", get(elevation_data))
        .route("/api/v1/tiles/elevation/{z}/{x}/{y}", get(elevation_png))
        .route("/api/v1/tiles/flood/{water_level}/{z}/{x}/{y}", get(flood_png))
        .route("/risk/location", post(risk_location))
        .route("/api/v1/status", get(status))
        .route("/healthz", get(healthz))
        .with_state(engine)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Splits a path segment like `"215.u16"` or `"215.png"` into its tile index
/// and required extension, the same way the client addresses tiles under
/// `{z}/{x}/{y}.<ext>`.
fn parse_tile_index(segment: &str, expected_ext: &str) -> Result<i32, AppError> {
    let (index, ext) = segment
        .split_once('.')
        .ok_or_else(|| invalid(format!("tile segment '{segment}' is missing its .{expected_ext} extension")))?;

    if ext != expected_ext {
        return Err(invalid(format!("expected .{expected_ext}, got .{ext}")));
    }

    index
        .parse::<i32>()
        .map_err(|_| invalid(format!("invalid tile index: {index}")))
}

fn invalid(message: String) -> AppError {
    AppError(tile_engine::Error::InvalidRequest(message))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn status(State(engine): State<Arc<TileEngine>>) -> Json<tile_engine::Status> {
    Json(engine.status().await)
}

/// `GET /api/v1/tiles/elevation-data/{z}/{x}/{y}.u16`
///
/// `?method=precompressed` biases toward the Precompressed Store: a miss
/// there surfaces as `404` instead of falling through to runtime synthesis.
async fn elevation_data(
    State(engine): State<Arc<TileEngine>>,
    Path((z, x, y_segment)): Path<(i32, i32, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let y = parse_tile_index(&y_segment, "u16")?;

    let accept = headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(AcceptEncoding::parse)
        .unwrap_or_default();

    let allow_runtime_synthesis = params.get("method").map(|m| m != "precompressed").unwrap_or(true);

    let result = engine.serve_uint16(z, x, y, accept, allow_runtime_synthesis).await?;

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CACHE_CONTROL, CACHE_CONTROL_IMMUTABLE)
        .header(header::VARY, "Accept-Encoding")
        .header("X-Tile-Source", result.source.header_value());

    if let Some(encoding) = result.content_encoding {
        response = response.header(header::CONTENT_ENCODING, encoding);
    }

    Ok(response
        .body(Body::from(result.payload))
        .unwrap_or_else(|_| (StatusCode::INTERNAL_SERVER_ERROR, "failed to build response").into_response()))
}

/// `GET /api/v1/tiles/elevation/{z}/{x}/{y}.png` — topographic mode.
async fn elevation_png(State(engine): State<Arc<TileEngine>>, Path((z, x, y_segment)): Path<(i32, i32, String)>) -> Result<Response, AppError> {
    let y = parse_tile_index(&y_segment, "png")?;
    let response = engine.serve_png(z, x, y, PngMode::Topographic).await?;
    Ok(png_response(response))
}

/// `GET /api/v1/tiles/flood/{water_level}/{z}/{x}/{y}.png` — flood-risk mode.
async fn flood_png(
    State(engine): State<Arc<TileEngine>>,
    Path((water_level, z, x, y_segment)): Path<(f64, i32, i32, String)>,
) -> Result<Response, AppError> {
    let y = parse_tile_index(&y_segment, "png")?;
    let response = engine.serve_png(z, x, y, PngMode::Flood { water_level_m: water_level }).await?;
    Ok(png_response(response))
}

fn png_response(response: tile_engine::PngResponse) -> Response {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/png")
        .header(header::CACHE_CONTROL, CACHE_CONTROL_IMMUTABLE)
        .header("X-Tile-Source", response.source.header_value());

    if let Some(quantum) = response.water_level_quantum {
        builder = builder.header("X-Water-Level", quantum.to_string());
    }

    builder
        .body(Body::from(response.bytes.to_vec()))
        .unwrap_or_else(|_| (StatusCode::INTERNAL_SERVER_ERROR, "failed to build response").into_response())
}

/// `POST /risk/location`
async fn risk_location(
    State(engine): State<Arc<TileEngine>>,
    Json(request): Json<PointSampleRequest>,
) -> Result<Json<tile_engine::PointSampleResponse>, AppError> {
    Ok(Json(engine.sample_point(request).await?))
}
