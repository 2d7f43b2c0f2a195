//! Invention and beverage endpoints.

use super::error::ApiError;
use super::extractors::CorrelationId;
use super::state::AppState;
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
};
use beverage_inventor_core::ports::BeverageFilter;
use beverage_inventor_core::{AnalysisLevel, Beverage, BeverageId, BeverageStatus, RequestBuilder, Response};
use serde::Deserialize;

/// Largest page `GET /beverages` returns.
pub const MAX_PAGE: usize = 500;

/// `POST /invent`
///
/// The body is a request in its wire shape. `X-Correlation-ID` wins over a
/// `request_id` in the body.
///
/// ```bash
/// curl -X POST localhost:8080/invent -H 'content-type: application/json' \
///   -d '{"ingredients":["espresso","whole milk"],"theme":"comfort","created_by":"u1"}'
/// ```
pub async fn invent(
    State(state): State<AppState>,
    correlation_id: Option<CorrelationId>,
    body: Result<Json<RequestBuilder>, JsonRejection>,
) -> Result<Json<Response>, ApiError> {
    let Json(mut builder) = body?;
    if let Some(CorrelationId(id)) = correlation_id {
        builder = builder.correlation_id(id);
    }
    let response = state.pipeline.run(builder.build()).await?;
    Ok(Json(response))
}

/// `GET /beverages/:id`
pub async fn get_beverage(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<Beverage>, ApiError> {
    let id: BeverageId = id?.0.parse()?;
    Ok(Json(state.pipeline.get_beverage(id).await?))
}

/// `GET /beverages?theme=&creator=&status=&limit=`
pub async fn list_beverages(
    State(state): State<AppState>,
    filter: Result<Query<BeverageFilter>, QueryRejection>,
) -> Result<Json<Vec<Beverage>>, ApiError> {
    let Query(mut filter) = filter?;
    filter.limit = Some(filter.limit.map_or(MAX_PAGE, |limit| limit.min(MAX_PAGE)));
    Ok(Json(state.pipeline.list_beverages(&filter).await?))
}

/// Body of `PUT /beverages/:id/status`.
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    /// Target status
    pub status: BeverageStatus,
}

/// `PUT /beverages/:id/status`
pub async fn update_status(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
    body: Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Json<Beverage>, ApiError> {
    let id: BeverageId = id?.0.parse()?;
    let Json(update) = body?;
    Ok(Json(state.pipeline.update_status(id, update.status).await?))
}

/// Query of `GET /beverages/:id/analysis`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AnalysisQuery {
    /// Depth; `detailed` when absent
    pub level: Option<AnalysisLevel>,
}

/// `GET /beverages/:id/analysis?level=`
pub async fn analyze_beverage(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
    query: Result<Query<AnalysisQuery>, QueryRejection>,
) -> Result<Json<Response>, ApiError> {
    let id: BeverageId = id?.0.parse()?;
    let Query(query) = query?;
    let response = state
        .pipeline
        .analyze_beverage(id, query.level.unwrap_or_default())
        .await?;
    Ok(Json(response))
}
