//! Modelo de Order y máquina de estados
//!
//! ```text
//! PENDING_QUOTE → QUOTE_SENT → QUOTE_ACCEPTED → DEPOSIT_PENDING → DEPOSIT_PAID
//!   → INSPECTION_PENDING → INSPECTION_COMPLETED → AWAITING_APPROVAL → APPROVED
//!   → PURCHASE_IN_PROGRESS → PURCHASED → EXPORT_PROCESSING → SHIPPED → IN_TRANSIT
//!   → ARRIVED_PORT → CUSTOMS_CLEARANCE → CUSTOMS_CLEARED → OUT_FOR_DELIVERY → DELIVERED
//! ```
//!
//! `CANCELLED` es alcanzable desde todos los estados previos a la compra.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::listing::{Photo, Specifications};
use super::pricing::{LandedCost, ShippingMethod};
use super::profile::ShippingAddress;
use super::vehicle::{Vehicle, VehicleId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    PendingQuote,
    QuoteSent,
    QuoteAccepted,
    QuoteRejected,
    QuoteExpired,
    DepositPending,
    DepositPaid,
    InspectionPending,
    InspectionCompleted,
    AwaitingApproval,
    Approved,
    PurchaseInProgress,
    Purchased,
    ExportProcessing,
    Shipped,
    InTransit,
    ArrivedPort,
    CustomsClearance,
    CustomsCleared,
    OutForDelivery,
    Delivered,
    Cancelled,
    Refunded,
    PartiallyRefunded,
}

text_enum!(OrderStatus {
    PendingQuote => "PENDING_QUOTE",
    QuoteSent => "QUOTE_SENT",
    QuoteAccepted => "QUOTE_ACCEPTED",
    QuoteRejected => "QUOTE_REJECTED",
    QuoteExpired => "QUOTE_EXPIRED",
    DepositPending => "DEPOSIT_PENDING",
    DepositPaid => "DEPOSIT_PAID",
    InspectionPending => "INSPECTION_PENDING",
    InspectionCompleted => "INSPECTION_COMPLETED",
    AwaitingApproval => "AWAITING_APPROVAL",
    Approved => "APPROVED",
    PurchaseInProgress => "PURCHASE_IN_PROGRESS",
    Purchased => "PURCHASED",
    ExportProcessing => "EXPORT_PROCESSING",
    Shipped => "SHIPPED",
    InTransit => "IN_TRANSIT",
    ArrivedPort => "ARRIVED_PORT",
    CustomsClearance => "CUSTOMS_CLEARANCE",
    CustomsCleared => "CUSTOMS_CLEARED",
    OutForDelivery => "OUT_FOR_DELIVERY",
    Delivered => "DELIVERED",
    Cancelled => "CANCELLED",
    Refunded => "REFUNDED",
    PartiallyRefunded => "PARTIALLY_REFUNDED",
});

impl OrderStatus {
    pub const ALL: [OrderStatus; 24] = [
        OrderStatus::PendingQuote,
        OrderStatus::QuoteSent,
        OrderStatus::QuoteAccepted,
        OrderStatus::QuoteRejected,
        OrderStatus::QuoteExpired,
        OrderStatus::DepositPending,
        OrderStatus::DepositPaid,
        OrderStatus::InspectionPending,
        OrderStatus::InspectionCompleted,
        OrderStatus::AwaitingApproval,
        OrderStatus::Approved,
        OrderStatus::PurchaseInProgress,
        OrderStatus::Purchased,
        OrderStatus::ExportProcessing,
        OrderStatus::Shipped,
        OrderStatus::InTransit,
        OrderStatus::ArrivedPort,
        OrderStatus::CustomsClearance,
        OrderStatus::CustomsCleared,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
        OrderStatus::PartiallyRefunded,
    ];

    /// Tabla de transiciones: sucesores permitidos de cada estado
    pub fn allowed_transitions(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            PendingQuote => &[QuoteSent, Cancelled],
            QuoteSent => &[QuoteAccepted, QuoteRejected, QuoteExpired, Cancelled],
            QuoteAccepted => &[DepositPending, Cancelled],
            DepositPending => &[DepositPaid, Cancelled],
            DepositPaid => &[InspectionPending, Cancelled, Refunded, PartiallyRefunded],
            InspectionPending => &[InspectionCompleted, Cancelled, Refunded, PartiallyRefunded],
            InspectionCompleted => &[AwaitingApproval, Cancelled, Refunded, PartiallyRefunded],
            AwaitingApproval => &[Approved, Cancelled, Refunded, PartiallyRefunded],
            Approved => &[PurchaseInProgress, Cancelled, Refunded, PartiallyRefunded],
            PurchaseInProgress => &[Purchased],
            Purchased => &[ExportProcessing],
            ExportProcessing => &[Shipped],
            Shipped => &[InTransit],
            InTransit => &[ArrivedPort],
            ArrivedPort => &[CustomsClearance],
            CustomsClearance => &[CustomsCleared],
            CustomsCleared => &[OutForDelivery],
            OutForDelivery => &[Delivered],
            Delivered | Cancelled | Refunded | PartiallyRefunded | QuoteRejected
            | QuoteExpired => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Estados desde los que el cliente puede cancelar
    pub fn is_customer_cancellable(&self) -> bool {
        use OrderStatus::*;
        matches!(
            self,
            PendingQuote
                | QuoteSent
                | QuoteAccepted
                | DepositPending
                | DepositPaid
                | InspectionPending
                | InspectionCompleted
                | AwaitingApproval
        )
    }
}

/// Prioridad administrativa
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

text_enum!(OrderPriority {
    Low => "LOW",
    Normal => "NORMAL",
    High => "HIGH",
    Urgent => "URGENT",
});

/// Entrada del historial de estados (solo se agregan)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusChange {
    pub status: OrderStatus,
    pub changed_at: DateTime<Utc>,
    pub changed_by: Option<Uuid>,
}

/// Copia inmutable del vehículo al momento de crear la orden
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VehicleSnapshot {
    pub vehicle_id: VehicleId,
    pub vin: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub trim: Option<String>,
    pub mileage: Option<i32>,
    pub price_usd: Decimal,
    pub primary_photo: Option<Photo>,
    pub specifications: Option<Specifications>,
    pub captured_at: DateTime<Utc>,
}

impl VehicleSnapshot {
    pub fn capture(vehicle: &Vehicle, now: DateTime<Utc>) -> Self {
        let primary_photo = vehicle
            .photos
            .iter()
            .find(|p| p.is_primary)
            .or_else(|| vehicle.photos.first())
            .cloned();

        Self {
            vehicle_id: vehicle.id.clone(),
            vin: vehicle.vin.clone(),
            make: vehicle.make.clone(),
            model: vehicle.model.clone(),
            year: vehicle.year,
            trim: vehicle.trim.clone(),
            mileage: vehicle.mileage,
            price_usd: vehicle.price_usd,
            primary_photo,
            specifications: vehicle.specifications.clone(),
            captured_at: now,
        }
    }
}

/// Desglose de pago capturado al crear la orden
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentBreakdown {
    pub landed_cost: LandedCost,
    pub deposit_amount_usd: Decimal,
    pub balance_amount_usd: Decimal,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cancellation {
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
    pub cancelled_by: Uuid,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundRequestStatus {
    Requested,
    Processed,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefundRequest {
    pub reason: String,
    pub requested_at: DateTime<Utc>,
    pub requested_by: Uuid,
    pub status: RefundRequestStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub request_number: String,
    pub user_id: Uuid,
    pub vehicle_id: Option<Uuid>,
    pub vehicle_snapshot: VehicleSnapshot,
    pub payment_breakdown: PaymentBreakdown,
    pub shipping_method: Option<ShippingMethod>,
    pub shipping_address: ShippingAddress,
    pub customer_notes: Option<String>,
    pub status: OrderStatus,
    pub previous_status: Vec<StatusChange>,
    pub status_changed_at: DateTime<Utc>,
    pub status_changed_by: Option<Uuid>,
    pub priority: OrderPriority,
    pub tags: Vec<String>,
    pub amount_paid_usd: Decimal,
    pub cancellation: Option<Cancellation>,
    pub refund_request: Option<RefundRequest>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Aplicar una transición ya validada: el estado actual pasa al historial
    pub fn apply_transition(&mut self, next: OrderStatus, actor: Uuid, now: DateTime<Utc>) {
        self.previous_status.push(StatusChange {
            status: self.status,
            changed_at: self.status_changed_at,
            changed_by: self.status_changed_by,
        });
        self.status = next;
        self.status_changed_at = now;
        self.status_changed_by = Some(actor);
        self.updated_at = now;
    }
}

/// Transición solicitada, con el estado observado al validar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusTransition {
    pub order_id: Uuid,
    pub expected: OrderStatus,
    pub next: OrderStatus,
    pub actor: Uuid,
    pub at: DateTime<Utc>,
}

/// Nota administrativa (solo se agregan, nunca se editan ni se borran)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdminNote {
    pub id: Uuid,
    pub order_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_have_no_successors() {
        for status in [
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
            OrderStatus::PartiallyRefunded,
            OrderStatus::QuoteRejected,
            OrderStatus::QuoteExpired,
        ] {
            assert!(status.is_terminal(), "{} should be terminal", status);
        }
        let terminal = OrderStatus::ALL.iter().filter(|s| s.is_terminal()).count();
        assert_eq!(terminal, 6);
    }

    #[test]
    fn test_cancel_reachable_from_every_pre_purchase_state() {
        let pre_purchase = OrderStatus::ALL
            .iter()
            .take_while(|s| **s != OrderStatus::PurchaseInProgress)
            .filter(|s| !s.is_terminal());
        for status in pre_purchase {
            assert!(status.can_transition_to(OrderStatus::Cancelled), "{}", status);
        }
        assert!(!OrderStatus::Purchased.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn test_customer_cancellable_is_subset_of_cancel_edges() {
        for status in OrderStatus::ALL {
            if status.is_customer_cancellable() {
                assert!(status.can_transition_to(OrderStatus::Cancelled));
            }
        }
        assert!(!OrderStatus::Purchased.is_customer_cancellable());
        assert!(!OrderStatus::Cancelled.is_customer_cancellable());
    }

    #[test]
    fn test_deposit_pending_edges() {
        assert!(OrderStatus::DepositPending.can_transition_to(OrderStatus::DepositPaid));
        assert!(!OrderStatus::DepositPending.can_transition_to(OrderStatus::Shipped));
    }

    #[test]
    fn test_status_text_round_trip() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }
}
