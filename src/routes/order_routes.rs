use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::order_dto::{
    AdminNoteRequest, BulkStatusRequest, CancelOrderRequest, CreateOrderRequest,
    InitiatePaymentRequest, OrderListQuery, PaymentInitiationResponse, PriorityRequest,
    RefundRequestBody, TagsRequest, UpdateStatusRequest,
};
use crate::dto::{ApiResponse, PagedResponse};
use crate::models::auth::Actor;
use crate::models::order::{AdminNote, Order};
use crate::models::vehicle::Pagination;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_order_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/bulk-status", post(bulk_update_status))
        .route("/:id", get(get_order))
        .route("/:id/status", put(update_status))
        .route("/:id/cancel", post(cancel_order))
        .route("/:id/refund-request", post(request_refund))
        .route("/:id/notes", get(list_notes).post(add_note))
        .route("/:id/priority", put(set_priority))
        .route("/:id/tags", put(set_tags))
        .route("/:id/payments", post(initiate_payment))
}

async fn create_order(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<ApiResponse<Order>>, AppError> {
    let order = state.orders.create_order(request, &actor).await?;
    let message = format!("Order {} created", order.request_number);
    Ok(Json(ApiResponse::success_with_message(order, message)))
}

async fn list_orders(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<ApiResponse<PagedResponse<Order>>>, AppError> {
    let pagination = Pagination::new(query.page, query.limit);
    let (orders, total) = state
        .orders
        .list_orders(&actor, query.status, query.user_id, pagination)
        .await?;
    Ok(Json(ApiResponse::success(PagedResponse::new(orders, total, pagination))))
}

async fn get_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Order>>, AppError> {
    let order = state.orders.get_order(id, &actor).await?;
    Ok(Json(ApiResponse::success(order)))
}

async fn update_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<Order>>, AppError> {
    let order = state.orders.update_status(id, request.status, &actor).await?;
    Ok(Json(ApiResponse::success(order)))
}

async fn cancel_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<CancelOrderRequest>,
) -> Result<Json<ApiResponse<Order>>, AppError> {
    request.validate()?;
    let order = state.orders.cancel_order(id, &request.reason, &actor).await?;
    Ok(Json(ApiResponse::success(order)))
}

async fn request_refund(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<RefundRequestBody>,
) -> Result<Json<ApiResponse<Order>>, AppError> {
    request.validate()?;
    let order = state.orders.request_refund(id, &request.reason, &actor).await?;
    Ok(Json(ApiResponse::success(order)))
}

async fn bulk_update_status(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<BulkStatusRequest>,
) -> Result<Json<ApiResponse<Vec<Order>>>, AppError> {
    request.validate()?;
    let orders = state
        .orders
        .bulk_update_status(&request.order_ids, request.status, &actor)
        .await?;
    let message = format!("{} order(s) updated", orders.len());
    Ok(Json(ApiResponse::success_with_message(orders, message)))
}

async fn list_notes(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<AdminNote>>>, AppError> {
    let notes = state.orders.list_admin_notes(id, &actor).await?;
    Ok(Json(ApiResponse::success(notes)))
}

async fn add_note(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<AdminNoteRequest>,
) -> Result<Json<ApiResponse<AdminNote>>, AppError> {
    request.validate()?;
    let note = state
        .orders
        .add_admin_note(id, &request.body, request.is_internal, &actor)
        .await?;
    Ok(Json(ApiResponse::success(note)))
}

async fn set_priority(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<PriorityRequest>,
) -> Result<Json<ApiResponse<Order>>, AppError> {
    let order = state.orders.set_priority(id, request.priority, &actor).await?;
    Ok(Json(ApiResponse::success(order)))
}

async fn set_tags(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<TagsRequest>,
) -> Result<Json<ApiResponse<Order>>, AppError> {
    request.validate()?;
    let order = state.orders.set_tags(id, &request.tags, &actor).await?;
    Ok(Json(ApiResponse::success(order)))
}

async fn initiate_payment(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<InitiatePaymentRequest>,
) -> Result<Json<ApiResponse<PaymentInitiationResponse>>, AppError> {
    let initiation = state
        .payments
        .initiate(id, request.payment_type, &actor)
        .await?;
    Ok(Json(ApiResponse::success(PaymentInitiationResponse {
        payment: initiation.payment,
        checkout_url: initiation.checkout_url,
    })))
}
