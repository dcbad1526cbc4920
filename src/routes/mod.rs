//! Rutas HTTP
//!
//! Adaptadores delgados: traducen cada request a una llamada de servicio.

pub mod order_routes;
pub mod payment_routes;
pub mod pricing_routes;
pub mod vehicle_routes;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::json;

use crate::state::AppState;

/// Router completo de la API
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/api/vehicles", vehicle_routes::create_vehicle_router())
        .nest("/api/orders", order_routes::create_order_router())
        .nest("/api/pricing", pricing_routes::create_pricing_router())
        .nest("/api/payments", payment_routes::create_payment_router())
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "environment": state.config.environment,
        "cache_available": state.cache.is_available().await,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
