//! Ciclo de vida de órdenes de importación
//!
//! Todas las escrituras de estado pasan por la tabla de transiciones de
//! `OrderStatus` y se guardan como compare-and-set contra el estado leído.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::pricing_service::PricingService;
use super::vehicle_resolution::VehicleResolutionEngine;
use crate::dto::order_dto::CreateOrderRequest;
use crate::models::auth::Actor;
use crate::models::order::{
    AdminNote, Cancellation, Order, OrderPriority, OrderStatus, PaymentBreakdown, RefundRequest,
    RefundRequestStatus, StatusTransition, VehicleSnapshot,
};
use crate::models::pricing::{PaymentAmountRequest, PaymentType};
use crate::models::vehicle::{Pagination, VehicleStatus};
use crate::repositories::{OrderFilter, OrderStore, ProfileDirectory};
use crate::utils::errors::{invalid_argument, not_found_error, AppError, AppResult, BulkFailure};

/// Configuración del motor de órdenes
#[derive(Debug, Clone)]
pub struct OrderConfig {
    pub request_number_prefix: String,
    /// Reintentos ante colisión del número de solicitud
    pub max_request_number_attempts: u32,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            request_number_prefix: "AFZ".to_string(),
            max_request_number_attempts: 5,
        }
    }
}

/// `<prefijo><YY><MM><6 dígitos>`
pub fn generate_request_number<R: Rng>(prefix: &str, now: DateTime<Utc>, rng: &mut R) -> String {
    format!("{}{}{:06}", prefix, now.format("%y%m"), rng.gen_range(0..1_000_000))
}

/// Validar una transición contra la tabla
pub fn check_transition(current: OrderStatus, next: OrderStatus) -> AppResult<()> {
    if current.can_transition_to(next) {
        Ok(())
    } else {
        Err(AppError::InvalidTransition {
            from: current,
            to: next,
            allowed: current.allowed_transitions().to_vec(),
        })
    }
}

/// Recortar, pasar a minúsculas y deduplicar conservando el orden
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

fn required_reason(reason: &str) -> AppResult<String> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(invalid_argument("a reason is required"));
    }
    Ok(reason.to_string())
}

pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    profiles: Arc<dyn ProfileDirectory>,
    resolution: Arc<VehicleResolutionEngine>,
    pricing: Arc<PricingService>,
    config: OrderConfig,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        profiles: Arc<dyn ProfileDirectory>,
        resolution: Arc<VehicleResolutionEngine>,
        pricing: Arc<PricingService>,
        config: OrderConfig,
    ) -> Self {
        Self {
            orders,
            profiles,
            resolution,
            pricing,
            config,
        }
    }

    /// Crear una orden en PENDING_QUOTE. Un vehículo temporal se promueve aquí.
    pub async fn create_order(&self, request: CreateOrderRequest, actor: &Actor) -> AppResult<Order> {
        request.validate()?;

        let address = self
            .profiles
            .default_shipping_address(actor.id)
            .await?
            .ok_or_else(|| {
                AppError::PreconditionFailed(
                    "A default shipping address is required before placing an order".to_string(),
                )
            })?;

        let resolved = self
            .resolution
            .resolve_one(&request.vehicle_id, request.identifier_kind)
            .await?;
        let vehicle = self.resolution.ensure_persisted(resolved).await?;
        if vehicle.status != VehicleStatus::Available {
            return Err(AppError::PreconditionFailed(format!(
                "Vehicle {} is not available ({})",
                vehicle.vin, vehicle.status
            )));
        }

        let landed_cost = self
            .pricing
            .compute_landed_cost(vehicle.price_usd, request.shipping_method)
            .await?;
        let deposit = self.pricing.compute_payment_amount(&PaymentAmountRequest {
            total_amount_usd: landed_cost.total_usd,
            payment_type: PaymentType::Deposit,
            amount_paid_usd: None,
            amount_usd: None,
        })?;

        let now = Utc::now();
        let total = landed_cost.total_usd;
        let mut order = Order {
            id: Uuid::new_v4(),
            request_number: String::new(),
            user_id: actor.id,
            vehicle_id: vehicle.persisted_id(),
            vehicle_snapshot: VehicleSnapshot::capture(&vehicle, now),
            payment_breakdown: PaymentBreakdown {
                landed_cost,
                deposit_amount_usd: deposit.payment_amount,
                balance_amount_usd: total - deposit.payment_amount,
                captured_at: now,
            },
            shipping_method: request.shipping_method,
            shipping_address: address,
            customer_notes: request
                .customer_notes
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            status: OrderStatus::PendingQuote,
            previous_status: Vec::new(),
            status_changed_at: now,
            status_changed_by: Some(actor.id),
            priority: OrderPriority::Normal,
            tags: Vec::new(),
            amount_paid_usd: Decimal::ZERO,
            cancellation: None,
            refund_request: None,
            created_at: now,
            updated_at: now,
        };

        let attempts = self.config.max_request_number_attempts.max(1);
        for attempt in 1..=attempts {
            order.request_number =
                generate_request_number(&self.config.request_number_prefix, now, &mut rand::thread_rng());
            match self.orders.insert(&order).await {
                Ok(()) => {
                    info!(
                        "📦 Orden {} creada para VIN {} (total {} USD)",
                        order.request_number, order.vehicle_snapshot.vin, total
                    );
                    return Ok(order);
                }
                Err(AppError::Conflict(_)) if attempt < attempts => {
                    warn!("⚠️ Número de solicitud {} repetido, reintentando", order.request_number);
                }
                Err(e) => return Err(e),
            }
        }
        Err(AppError::Internal(
            "could not allocate a unique request number".to_string(),
        ))
    }

    pub async fn get_order(&self, id: Uuid, actor: &Actor) -> AppResult<Order> {
        let order = self.find(id).await?;
        actor.require_access(order.user_id, "read order")?;
        Ok(order)
    }

    /// Clientes solo ven sus órdenes; administradores pueden filtrar por usuario
    pub async fn list_orders(
        &self,
        actor: &Actor,
        status: Option<OrderStatus>,
        user_id: Option<Uuid>,
        pagination: Pagination,
    ) -> AppResult<(Vec<Order>, i64)> {
        let filter = OrderFilter {
            user_id: if actor.is_admin() { user_id } else { Some(actor.id) },
            status,
        };
        self.orders.list(&filter, pagination).await
    }

    /// Transición administrativa validada contra la tabla
    pub async fn update_status(&self, id: Uuid, next: OrderStatus, actor: &Actor) -> AppResult<Order> {
        actor.require_admin("update order status")?;
        let order = self.find(id).await?;
        check_transition(order.status, next)?;

        let now = Utc::now();
        let transition = StatusTransition {
            order_id: id,
            expected: order.status,
            next,
            actor: actor.id,
            at: now,
        };
        let cancellation = (next == OrderStatus::Cancelled).then(|| Cancellation {
            reason: "Cancelled by administrator".to_string(),
            cancelled_at: now,
            cancelled_by: actor.id,
        });

        let updated = self.orders.transition(&transition, cancellation.as_ref()).await?;
        info!("🔄 Orden {}: {} → {}", updated.request_number, order.status, next);
        Ok(updated)
    }

    /// Cancelación por el dueño (o un administrador) antes de la compra
    pub async fn cancel_order(&self, id: Uuid, reason: &str, actor: &Actor) -> AppResult<Order> {
        let reason = required_reason(reason)?;
        let order = self.find(id).await?;
        actor.require_access(order.user_id, "cancel order")?;

        if !order.status.is_customer_cancellable() {
            return Err(AppError::InvalidState {
                message: format!("Order {} can no longer be cancelled", order.request_number),
                current: Some(order.status),
            });
        }
        check_transition(order.status, OrderStatus::Cancelled)?;

        let now = Utc::now();
        let transition = StatusTransition {
            order_id: id,
            expected: order.status,
            next: OrderStatus::Cancelled,
            actor: actor.id,
            at: now,
        };
        let cancellation = Cancellation {
            reason,
            cancelled_at: now,
            cancelled_by: actor.id,
        };

        let updated = self.orders.transition(&transition, Some(&cancellation)).await?;
        info!("🗑️ Orden {} cancelada desde {}", updated.request_number, order.status);
        Ok(updated)
    }

    /// Solicitud de reembolso; solo una por orden cancelada
    pub async fn request_refund(&self, id: Uuid, reason: &str, actor: &Actor) -> AppResult<Order> {
        let reason = required_reason(reason)?;
        let order = self.find(id).await?;
        actor.require_access(order.user_id, "request refund")?;

        if order.status != OrderStatus::Cancelled {
            return Err(AppError::InvalidState {
                message: "Refunds can only be requested for cancelled orders".to_string(),
                current: Some(order.status),
            });
        }
        if order.refund_request.is_some() {
            return Err(AppError::Conflict(format!(
                "A refund has already been requested for order {}",
                order.request_number
            )));
        }

        let request = RefundRequest {
            reason,
            requested_at: Utc::now(),
            requested_by: actor.id,
            status: RefundRequestStatus::Requested,
        };
        let updated = self.orders.set_refund_request(id, &request).await?;
        info!("💱 Reembolso solicitado para la orden {}", updated.request_number);
        Ok(updated)
    }

    /// Todo o nada: se valida cada orden antes de escribir, y la escritura
    /// vuelve a comprobar cada estado dentro de una sola transacción.
    pub async fn bulk_update_status(
        &self,
        order_ids: &[Uuid],
        next: OrderStatus,
        actor: &Actor,
    ) -> AppResult<Vec<Order>> {
        actor.require_admin("bulk update order status")?;

        let mut seen = HashSet::new();
        let ids: Vec<Uuid> = order_ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        if ids.is_empty() {
            return Err(invalid_argument("at least one order id is required"));
        }

        let found = self.orders.find_many(&ids).await?;
        let now = Utc::now();
        let mut failures = Vec::new();
        let mut transitions = Vec::with_capacity(ids.len());

        for id in &ids {
            match found.iter().find(|o| o.id == *id) {
                None => failures.push(BulkFailure {
                    order_id: *id,
                    current_status: None,
                    reason: "order not found".to_string(),
                }),
                Some(order) if !order.status.can_transition_to(next) => failures.push(BulkFailure {
                    order_id: *id,
                    current_status: Some(order.status),
                    reason: format!("cannot move from {} to {}", order.status, next),
                }),
                Some(order) => transitions.push(StatusTransition {
                    order_id: *id,
                    expected: order.status,
                    next,
                    actor: actor.id,
                    at: now,
                }),
            }
        }

        if !failures.is_empty() {
            warn!(
                "⚠️ Actualización masiva rechazada: {} de {} órdenes inválidas",
                failures.len(),
                ids.len()
            );
            return Err(AppError::BulkRejected(failures));
        }

        let updated = self.orders.apply_batch(&transitions).await?;
        info!("✅ {} órdenes movidas a {}", updated.len(), next);
        Ok(updated)
    }

    pub async fn add_admin_note(
        &self,
        order_id: Uuid,
        body: &str,
        is_internal: bool,
        actor: &Actor,
    ) -> AppResult<AdminNote> {
        actor.require_admin("add order notes")?;
        let body = body.trim();
        if body.is_empty() {
            return Err(invalid_argument("note body cannot be empty"));
        }
        self.find(order_id).await?;

        let note = AdminNote {
            id: Uuid::new_v4(),
            order_id,
            author_id: actor.id,
            body: body.to_string(),
            is_internal,
            created_at: Utc::now(),
        };
        self.orders.add_note(&note).await?;
        Ok(note)
    }

    /// Los clientes solo ven las notas no internas de sus órdenes
    pub async fn list_admin_notes(&self, order_id: Uuid, actor: &Actor) -> AppResult<Vec<AdminNote>> {
        let order = self.find(order_id).await?;
        actor.require_access(order.user_id, "read order notes")?;
        self.orders.list_notes(order_id, actor.is_admin()).await
    }

    pub async fn set_priority(&self, order_id: Uuid, priority: OrderPriority, actor: &Actor) -> AppResult<Order> {
        actor.require_admin("set order priority")?;
        self.find(order_id).await?;
        self.orders.set_priority(order_id, priority).await
    }

    pub async fn set_tags(&self, order_id: Uuid, tags: &[String], actor: &Actor) -> AppResult<Order> {
        actor.require_admin("set order tags")?;
        self.find(order_id).await?;
        self.orders.set_tags(order_id, &normalize_tags(tags)).await
    }

    async fn find(&self, id: Uuid) -> AppResult<Order> {
        self.orders
            .find_by_id(id)
            .await?
            .ok_or_else(|| not_found_error("Order", &id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_request_number_format() {
        let now = Utc.with_ymd_and_hms(2026, 3, 9, 12, 0, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let number = generate_request_number("AFZ", now, &mut rng);
        assert_eq!(number.len(), 13);
        assert!(number.starts_with("AFZ2603"));
        assert!(number[7..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_transition_table_closure() {
        for current in OrderStatus::ALL {
            for next in OrderStatus::ALL {
                match check_transition(current, next) {
                    Ok(()) => assert!(current.allowed_transitions().contains(&next)),
                    Err(AppError::InvalidTransition { from, to, allowed }) => {
                        assert_eq!((from, to), (current, next));
                        assert_eq!(allowed, current.allowed_transitions().to_vec());
                    }
                    Err(other) => panic!("unexpected error {:?}", other),
                }
            }
        }
    }

    #[test]
    fn test_normalize_tags() {
        let tags = vec![
            " VIP ".to_string(),
            "vip".to_string(),
            "".to_string(),
            "Lagos".to_string(),
        ];
        assert_eq!(normalize_tags(&tags), vec!["vip".to_string(), "lagos".to_string()]);
    }
}
