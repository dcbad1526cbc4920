use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use uuid::Uuid;

use crate::dto::vehicle_dto::{
    ActivityQuery, CachePurgeResponse, CreateVehicleRequest, UpdateVehiclePriceRequest,
    UpdateVehicleRequest, VehicleListQuery, VehicleLookupQuery,
};
use crate::dto::ApiResponse;
use crate::models::activity::ActivityRecord;
use crate::models::auth::Actor;
use crate::models::vehicle::{Vehicle, VehicleListResult};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_vehicle_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_vehicles).post(create_vehicle))
        .route("/activity", get(recent_activity))
        .route("/cache/purge", post(purge_cache))
        .route("/:id", get(get_vehicle).put(update_vehicle).delete(delete_vehicle))
        .route("/:id/price", put(update_price))
}

async fn list_vehicles(
    State(state): State<AppState>,
    Query(query): Query<VehicleListQuery>,
) -> Result<Json<ApiResponse<VehicleListResult>>, AppError> {
    let (filters, pagination, include_external) = query.into_parts();
    let result = state
        .resolution
        .resolve_list(&filters, pagination, include_external)
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

// Acepta id durable, VIN o `temp-<VIN>`
async fn get_vehicle(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<VehicleLookupQuery>,
) -> Result<Json<ApiResponse<Vehicle>>, AppError> {
    let vehicle = state.resolution.resolve_one(&id, query.kind).await?;
    Ok(Json(ApiResponse::success(vehicle)))
}

async fn create_vehicle(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateVehicleRequest>,
) -> Result<Json<ApiResponse<Vehicle>>, AppError> {
    let vehicle = state.inventory.create_vehicle(request, &actor).await?;
    Ok(Json(ApiResponse::success_with_message(
        vehicle,
        "Vehicle created".to_string(),
    )))
}

async fn update_vehicle(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateVehicleRequest>,
) -> Result<Json<ApiResponse<Vehicle>>, AppError> {
    let vehicle = state.inventory.update_vehicle(id, request, &actor).await?;
    Ok(Json(ApiResponse::success(vehicle)))
}

async fn update_price(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateVehiclePriceRequest>,
) -> Result<Json<ApiResponse<Vehicle>>, AppError> {
    let vehicle = state.inventory.update_price(id, request, &actor).await?;
    Ok(Json(ApiResponse::success(vehicle)))
}

async fn delete_vehicle(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.inventory.delete_vehicle(id, &actor).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Vehicle deleted"
    })))
}

async fn recent_activity(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<ApiResponse<Vec<ActivityRecord>>>, AppError> {
    let records = state
        .inventory
        .recent_activity(query.vehicle_id, query.limit, &actor)
        .await?;
    Ok(Json(ApiResponse::success(records)))
}

async fn purge_cache(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<ApiResponse<CachePurgeResponse>>, AppError> {
    actor.require_admin("purge the listings cache")?;
    let deleted_keys = state.resolution.purge_external_cache().await;
    Ok(Json(ApiResponse::success(CachePurgeResponse { deleted_keys })))
}
