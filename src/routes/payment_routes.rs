use axum::{extract::State, routing::post, Json, Router};
use validator::Validate;

use crate::dto::order_dto::{PaymentCompletionResponse, PaymentWebhookRequest};
use crate::dto::ApiResponse;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_payment_router() -> Router<AppState> {
    Router::new().route("/webhook", post(payment_webhook))
}

// Notificación del proveedor de pagos; repetirla es seguro
async fn payment_webhook(
    State(state): State<AppState>,
    Json(request): Json<PaymentWebhookRequest>,
) -> Result<Json<ApiResponse<PaymentCompletionResponse>>, AppError> {
    request.validate()?;
    let (payment, order) = state.payments.complete(&request.reference).await?;
    Ok(Json(ApiResponse::success(PaymentCompletionResponse { payment, order })))
}
