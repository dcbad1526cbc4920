use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::order::{Order, OrderPriority, OrderStatus};
use crate::models::payment::Payment;
use crate::models::pricing::{PaymentType, ShippingMethod};
use crate::services::vehicle_resolution::IdentifierKind;

// Request para crear una orden de importación
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateOrderRequest {
    /// Id durable, VIN o id temporal (`temp-<VIN>`)
    #[validate(length(min = 1, max = 64))]
    pub vehicle_id: String,
    #[serde(default)]
    pub identifier_kind: IdentifierKind,
    pub shipping_method: Option<ShippingMethod>,
    #[validate(length(max = 2000))]
    pub customer_notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CancelOrderRequest {
    #[validate(length(min = 3, max = 500))]
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RefundRequestBody {
    #[validate(length(min = 3, max = 500))]
    pub reason: String,
}

// Request para actualización masiva de estados
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BulkStatusRequest {
    #[validate(length(min = 1, max = 100))]
    pub order_ids: Vec<Uuid>,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AdminNoteRequest {
    #[validate(length(min = 1, max = 5000))]
    pub body: String,
    #[serde(default = "default_internal")]
    pub is_internal: bool,
}

fn default_internal() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriorityRequest {
    pub priority: OrderPriority,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TagsRequest {
    #[validate(length(max = 20))]
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub user_id: Option<Uuid>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitiatePaymentRequest {
    pub payment_type: PaymentType,
}

// Notificación del proveedor de pagos
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PaymentWebhookRequest {
    #[validate(length(min = 1, max = 128))]
    pub reference: String,
}

// Response de pago iniciado
#[derive(Debug, Serialize)]
pub struct PaymentInitiationResponse {
    pub payment: Payment,
    pub checkout_url: Option<String>,
}

// Response de pago completado
#[derive(Debug, Serialize)]
pub struct PaymentCompletionResponse {
    pub payment: Payment,
    pub order: Order,
}
