//! Flujo de pagos de una orden
//!
//! Calcula el monto en USD, lo convierte a moneda local y pide al proveedor
//! de pagos un cobro. La confirmación (webhook) es idempotente y actualiza
//! pago y orden en una sola transacción.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::order_service::check_transition;
use super::pricing_service::PricingService;
use crate::clients::exchange_rate::ExchangeRateService;
use crate::models::auth::Actor;
use crate::models::order::{Order, OrderStatus, StatusTransition};
use crate::models::payment::{Payment, PaymentStatus};
use crate::models::pricing::{PaymentAmountRequest, PaymentType};
use crate::repositories::OrderStore;
use crate::utils::errors::{invalid_argument, not_found_error, AppError, AppResult};
use crate::utils::money::round_money;

/// Moneda base de todos los montos
pub const BASE_CURRENCY: &str = "USD";

/// Cobro solicitado al proveedor de pagos
#[derive(Debug, Clone, Serialize)]
pub struct ChargeRequest {
    pub reference: String,
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
}

/// Respuesta del proveedor
#[derive(Debug, Clone)]
pub struct Charge {
    pub reference: String,
    pub checkout_url: Option<String>,
}

/// Proveedor de pagos
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &str;

    async fn create_charge(&self, request: &ChargeRequest) -> anyhow::Result<Charge>;
}

/// Pago iniciado y URL de checkout
#[derive(Debug, Clone)]
pub struct PaymentInitiation {
    pub payment: Payment,
    pub checkout_url: Option<String>,
}

/// Estado que debe tener la orden para cobrar cada tipo de pago
pub fn required_status(payment_type: PaymentType) -> AppResult<OrderStatus> {
    match payment_type {
        PaymentType::Deposit | PaymentType::Full => Ok(OrderStatus::DepositPending),
        PaymentType::Balance => Ok(OrderStatus::Approved),
        PaymentType::Refund | PaymentType::PartialRefund => {
            Err(invalid_argument("refunds are not collected through checkout"))
        }
    }
}

/// Estado al que avanza la orden cuando se confirma el pago
pub fn status_after_payment(payment_type: PaymentType) -> Option<OrderStatus> {
    match payment_type {
        PaymentType::Deposit | PaymentType::Full => Some(OrderStatus::DepositPaid),
        PaymentType::Balance => Some(OrderStatus::PurchaseInProgress),
        PaymentType::Refund | PaymentType::PartialRefund => None,
    }
}

pub struct PaymentService {
    orders: Arc<dyn OrderStore>,
    pricing: Arc<PricingService>,
    exchange: Arc<ExchangeRateService>,
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        pricing: Arc<PricingService>,
        exchange: Arc<ExchangeRateService>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            orders,
            pricing,
            exchange,
            gateway,
        }
    }

    pub async fn initiate(
        &self,
        order_id: Uuid,
        payment_type: PaymentType,
        actor: &Actor,
    ) -> AppResult<PaymentInitiation> {
        let order = self.find_order(order_id).await?;
        actor.require_access(order.user_id, "pay for order")?;

        let required = required_status(payment_type)?;
        if order.status != required {
            return Err(AppError::InvalidState {
                message: format!("{} payments require the order to be {}", payment_type, required),
                current: Some(order.status),
            });
        }

        let total = order.payment_breakdown.landed_cost.total_usd;
        let outstanding = round_money(total - order.amount_paid_usd);
        if outstanding <= Decimal::ZERO {
            return Err(AppError::InvalidState {
                message: format!("Order {} is already paid in full", order.request_number),
                current: Some(order.status),
            });
        }

        // Un solo cobro abierto por orden
        let payments = self.orders.list_payments(order_id).await?;
        if let Some(open) = payments
            .iter()
            .find(|p| p.status == PaymentStatus::Pending && p.payment_type.is_collection())
        {
            return Err(AppError::InvalidState {
                message: format!(
                    "{} payment {} is still pending for order {}",
                    open.payment_type, open.reference, order.request_number
                ),
                current: Some(order.status),
            });
        }

        let amount = self.pricing.compute_payment_amount(&PaymentAmountRequest {
            total_amount_usd: total,
            payment_type,
            amount_paid_usd: Some(order.amount_paid_usd),
            amount_usd: None,
        })?;
        let amount_usd = amount.payment_amount.min(outstanding);

        // Sin tasa no hay cobro: nunca se asume 1:1
        let currency = self.pricing.config().local_currency.clone();
        let rate = self.exchange.get_rate(BASE_CURRENCY, &currency).await?;
        let amount_local = round_money(amount_usd * rate);

        let reference = format!("AFZPAY-{}", Uuid::new_v4().simple());
        let charge_request = ChargeRequest {
            reference: reference.clone(),
            order_id,
            customer_id: order.user_id,
            amount: amount_local,
            currency: currency.clone(),
            description: format!("{} payment for order {}", payment_type, order.request_number),
        };
        let charge = self.gateway.create_charge(&charge_request).await.map_err(|e| {
            error!("❌ Proveedor de pagos {} falló: {}", self.gateway.name(), e);
            AppError::UpstreamUnavailable(format!("payment provider {}", self.gateway.name()))
        })?;

        let payment = Payment {
            id: Uuid::new_v4(),
            order_id,
            user_id: order.user_id,
            payment_type,
            provider: self.gateway.name().to_string(),
            reference: charge.reference,
            amount_usd,
            currency,
            exchange_rate: rate,
            amount_local,
            status: PaymentStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
        };
        self.orders.insert_payment(&payment).await?;
        info!(
            "💱 Pago {} iniciado para la orden {}: {} USD → {} {}",
            payment.reference, order.request_number, payment.amount_usd, payment.amount_local, payment.currency
        );

        Ok(PaymentInitiation {
            payment,
            checkout_url: charge.checkout_url,
        })
    }

    /// Confirmación del proveedor. Repetirla devuelve el mismo resultado.
    pub async fn complete(&self, reference: &str) -> AppResult<(Payment, Order)> {
        let payment = self
            .orders
            .find_payment_by_reference(reference)
            .await?
            .ok_or_else(|| not_found_error("Payment", reference))?;

        if payment.status == PaymentStatus::Completed {
            info!("🔁 Pago {} ya confirmado", reference);
            let order = self.find_order(payment.order_id).await?;
            return Ok((payment, order));
        }
        if payment.status != PaymentStatus::Pending {
            return Err(AppError::InvalidState {
                message: format!("Payment {} is {}", reference, payment.status),
                current: None,
            });
        }

        let order = self.find_order(payment.order_id).await?;
        let now = Utc::now();
        let transition = match status_after_payment(payment.payment_type) {
            Some(next) if order.status == required_status(payment.payment_type)? => {
                check_transition(order.status, next)?;
                Some(StatusTransition {
                    order_id: order.id,
                    expected: order.status,
                    next,
                    actor: payment.user_id,
                    at: now,
                })
            }
            _ => {
                warn!(
                    "⚠️ Pago {} confirmado con la orden en {}; el estado no cambia",
                    reference, order.status
                );
                None
            }
        };

        match self
            .orders
            .complete_payment(payment.id, now, payment.amount_usd, transition.as_ref())
            .await
        {
            Ok((payment, order)) => {
                info!("✅ Pago {} confirmado; orden {} en {}", reference, order.request_number, order.status);
                Ok((payment, order))
            }
            Err(AppError::Conflict(msg)) => {
                // Un webhook duplicado pudo ganar la carrera
                let current = self.orders.find_payment_by_reference(reference).await?;
                match current {
                    Some(payment) if payment.status == PaymentStatus::Completed => {
                        let order = self.find_order(payment.order_id).await?;
                        Ok((payment, order))
                    }
                    _ => Err(AppError::Conflict(msg)),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn find_order(&self, id: Uuid) -> AppResult<Order> {
        self.orders
            .find_by_id(id)
            .await?
            .ok_or_else(|| not_found_error("Order", &id.to_string()))
    }
}

/// Proveedor de pagos local: acepta cualquier cobro sin redirección.
/// Se usa en desarrollo y en tests.
pub struct ManualPaymentGateway;

#[async_trait]
impl PaymentGateway for ManualPaymentGateway {
    fn name(&self) -> &str {
        "manual"
    }

    async fn create_charge(&self, request: &ChargeRequest) -> anyhow::Result<Charge> {
        Ok(Charge {
            reference: request.reference.clone(),
            checkout_url: None,
        })
    }
}
