//! Tipos del cálculo de costo puesto en destino (landed cost)

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShippingMethod {
    Roro,
    Container,
    Air,
}

text_enum!(ShippingMethod {
    Roro => "RORO",
    Container => "CONTAINER",
    Air => "AIR",
});

/// Desglose completo. Duty/VAT/CISS son informativos y no entran en `total_usd`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceBreakdown {
    pub vehicle_price_usd: Decimal,
    pub shipping_method: Option<ShippingMethod>,
    pub import_duty_percent: Decimal,
    pub import_duty_usd: Decimal,
    pub vat_percent: Decimal,
    pub vat_usd: Decimal,
    pub ciss_percent: Decimal,
    pub ciss_usd: Decimal,
    pub inspection_fee_usd: Decimal,
    pub sourcing_fee_usd: Decimal,
    pub handling_fee_usd: Decimal,
    pub shipping_fee_usd: Decimal,
    pub clearing_fee_usd: Decimal,
    pub port_charges_usd: Decimal,
    pub local_delivery_fee_usd: Decimal,
    pub fixed_fees_usd: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LandedCost {
    pub total_usd: Decimal,
    pub breakdown: PriceBreakdown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    Deposit,
    Balance,
    Full,
    Refund,
    PartialRefund,
}

text_enum!(PaymentType {
    Deposit => "DEPOSIT",
    Balance => "BALANCE",
    Full => "FULL",
    Refund => "REFUND",
    PartialRefund => "PARTIAL_REFUND",
});

impl PaymentType {
    /// Cobro al cliente (no devolución)
    pub fn is_collection(&self) -> bool {
        matches!(self, PaymentType::Deposit | PaymentType::Balance | PaymentType::Full)
    }
}

/// Entrada de `compute_payment_amount`
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentAmountRequest {
    pub total_amount_usd: Decimal,
    pub payment_type: PaymentType,
    /// Monto ya cobrado; base de los reembolsos (por defecto el total)
    pub amount_paid_usd: Option<Decimal>,
    /// Monto explícito, obligatorio para reembolsos parciales
    pub amount_usd: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaymentAmount {
    pub payment_type: PaymentType,
    pub payment_amount: Decimal,
}
