//! AfroZon - backend del marketplace de importación de vehículos
//!
//! Catálogo unificado (inventario propio + listados externos), precios
//! puestos en destino, ciclo de vida de órdenes y pagos.

pub mod cache;
pub mod clients;
pub mod config;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

use axum::{error_handling::HandleErrorLayer, Router};
use http::StatusCode;
use serde_json::json;
use tower::{timeout::error::Elapsed, BoxError, ServiceBuilder};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use state::AppState;

/// Router de la aplicación con sus capas transversales
pub fn build_router(state: AppState) -> Router {
    let timeout = state.config.request_timeout();
    let cors = middleware::cors_layer(&state.config.cors_origins);

    routes::create_api_router()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .timeout(timeout)
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .with_state(state)
}

async fn handle_middleware_error(err: BoxError) -> (StatusCode, axum::Json<serde_json::Value>) {
    let (status, message) = if err.is::<Elapsed>() {
        (StatusCode::REQUEST_TIMEOUT, "request timed out".to_string())
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("unhandled middleware error: {}", err))
    };
    (
        status,
        axum::Json(json!({
            "success": false,
            "error": message,
        })),
    )
}
