use super::AppState;
use super::error::ApiError;
use crate::core::error::VendorError;
use crate::core::financials::Vendor;
use crate::core::metrics::DerivedMetrics;
use crate::providers::KeyPoolStatus;
use crate::service::{Comparison, InitializeReport, TrendSeries, VendorSummary};
use axum::Json;
use axum::extract::{Path, State};
use chrono::Utc;
use serde_json::{Value, json};

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now(),
        "started_at": state.started_at,
    }))
}

pub async fn list_vendors(State(state): State<AppState>) -> Result<Json<Vec<Vendor>>, ApiError> {
    Ok(Json(state.query.list_vendors()?))
}

pub async fn vendor(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<Vendor>, ApiError> {
    match state.query.get_vendor(&ticker)? {
        Some(vendor) => Ok(Json(vendor)),
        None => Err(not_found(&ticker)),
    }
}

pub async fn evict_vendor(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if !state.query.evict(&ticker)? {
        return Err(not_found(&ticker));
    }
    Ok(Json(json!({ "evicted": ticker.trim().to_uppercase() })))
}

pub async fn clear_cache(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let cleared = state.query.clear_cache()?;
    Ok(Json(json!({ "cleared": cleared })))
}

fn not_found(ticker: &str) -> ApiError {
    VendorError::TickerNotFound(ticker.trim().to_uppercase()).into()
}

pub async fn vendor_summary(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<VendorSummary>, ApiError> {
    Ok(Json(state.query.get_summary(&ticker).await?))
}

pub async fn vendor_trends(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<TrendSeries>, ApiError> {
    Ok(Json(state.query.get_trends(&ticker).await?))
}

pub async fn vendor_overview(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.query.get_overview(&ticker).await?))
}

pub async fn vendor_metrics(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<Vec<DerivedMetrics>>, ApiError> {
    Ok(Json(state.query.get_metrics(&ticker).await?))
}

pub async fn refresh_vendor(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<VendorSummary>, ApiError> {
    Ok(Json(state.query.refresh_summary(&ticker).await?))
}

pub async fn comparison(State(state): State<AppState>) -> Json<Comparison> {
    Json(state.query.get_comparison().await)
}

pub async fn initialize_vendors(State(state): State<AppState>) -> Json<InitializeReport> {
    let tickers = state.refresh.configured_tickers();
    Json(state.refresh.refresh_all(&tickers).await)
}

pub async fn key_status(State(state): State<AppState>) -> Json<KeyPoolStatus> {
    Json(state.keys.status())
}
