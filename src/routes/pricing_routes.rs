use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use validator::Validate;

use crate::dto::pricing_dto::LandedCostQuery;
use crate::dto::ApiResponse;
use crate::models::auth::Actor;
use crate::models::fee_settings::{FeeSettings, FeeSettingsUpdate};
use crate::models::pricing::{LandedCost, PaymentAmount, PaymentAmountRequest};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_pricing_router() -> Router<AppState> {
    Router::new()
        .route("/landed-cost", get(landed_cost))
        .route("/payment-amount", post(payment_amount))
        .route("/fees", get(get_fees).put(update_fees))
}

async fn landed_cost(
    State(state): State<AppState>,
    Query(query): Query<LandedCostQuery>,
) -> Result<Json<ApiResponse<LandedCost>>, AppError> {
    query.validate()?;
    let cost = state
        .pricing
        .compute_landed_cost(query.price_usd, query.shipping_method)
        .await?;
    Ok(Json(ApiResponse::success(cost)))
}

async fn payment_amount(
    State(state): State<AppState>,
    Json(request): Json<PaymentAmountRequest>,
) -> Result<Json<ApiResponse<PaymentAmount>>, AppError> {
    let amount = state.pricing.compute_payment_amount(&request)?;
    Ok(Json(ApiResponse::success(amount)))
}

async fn get_fees(State(state): State<AppState>) -> Result<Json<ApiResponse<FeeSettings>>, AppError> {
    let settings = state.pricing.fee_settings().await?;
    Ok(Json(ApiResponse::success(settings)))
}

async fn update_fees(
    State(state): State<AppState>,
    actor: Actor,
    Json(update): Json<FeeSettingsUpdate>,
) -> Result<Json<ApiResponse<FeeSettings>>, AppError> {
    let settings = state.pricing.update_fee_settings(update, &actor).await?;
    Ok(Json(ApiResponse::success_with_message(
        settings,
        "Fee settings updated".to_string(),
    )))
}
