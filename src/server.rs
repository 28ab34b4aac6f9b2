//! HTTP API exposing the four segmentation endpoints

use crate::analysis::{
    AnalysisService, CountryAnalysis, CustomerAnalysis, ProductAnalysis, SupplierAnalysis,
};
use crate::data::SalesSource;
use crate::error::AnalysisError;
use crate::viz::Visualizer;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::error;

/// Shared handler state
pub struct AppState<S, V> {
    pub service: Arc<AnalysisService<S, V>>,
}

impl<S, V> Clone for AppState<S, V> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

impl IntoResponse for AnalysisError {
    fn into_response(self) -> Response {
        let detail = self.to_string();
        error!("Request failed: {}", detail);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": detail })),
        )
            .into_response()
    }
}

/// Build the API router around an analysis service
pub fn router<S, V>(service: Arc<AnalysisService<S, V>>) -> Router
where
    S: SalesSource + 'static,
    V: Visualizer + 'static,
{
    Router::new()
        .route("/api/customers", get(customers::<S, V>))
        .route("/api/products", get(products::<S, V>))
        .route("/api/suppliers", get(suppliers::<S, V>))
        .route("/api/countries", get(countries::<S, V>))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { service })
}

async fn customers<S, V>(
    State(state): State<AppState<S, V>>,
) -> Result<Json<CustomerAnalysis>, AnalysisError>
where
    S: SalesSource + 'static,
    V: Visualizer + 'static,
{
    Ok(Json(state.service.customers().await?))
}

async fn products<S, V>(
    State(state): State<AppState<S, V>>,
) -> Result<Json<ProductAnalysis>, AnalysisError>
where
    S: SalesSource + 'static,
    V: Visualizer + 'static,
{
    Ok(Json(state.service.products().await?))
}

async fn suppliers<S, V>(
    State(state): State<AppState<S, V>>,
) -> Result<Json<SupplierAnalysis>, AnalysisError>
where
    S: SalesSource + 'static,
    V: Visualizer + 'static,
{
    Ok(Json(state.service.suppliers().await?))
}

async fn countries<S, V>(
    State(state): State<AppState<S, V>>,
) -> Result<Json<CountryAnalysis>, AnalysisError>
where
    S: SalesSource + 'static,
    V: Visualizer + 'static,
{
    Ok(Json(state.service.countries().await?))
}
