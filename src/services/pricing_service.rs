//! Motor de precios
//!
//! `total_usd = precio del vehículo + tarifas fijas`. Duty, VAT y CISS se
//! reportan en el desglose pero no se suman al total.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;
use validator::Validate;

use crate::models::auth::Actor;
use crate::models::fee_settings::{FeeSettings, FeeSettingsUpdate};
use crate::models::pricing::{
    LandedCost, PaymentAmount, PaymentAmountRequest, PaymentType, PriceBreakdown, ShippingMethod,
};
use crate::repositories::FeeSettingsStore;
use crate::utils::errors::{invalid_argument, AppResult};
use crate::utils::money::{percent_of, round_money};

/// Configuración del motor de precios
#[derive(Debug, Clone)]
pub struct PricingConfig {
    /// Porcentaje del total cobrado como depósito
    pub deposit_percent: Decimal,
    /// Moneda local de cobro (ISO 4217)
    pub local_currency: String,
    pub exchange_rate_ttl_secs: u64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            deposit_percent: dec!(30),
            local_currency: "NGN".to_string(),
            exchange_rate_ttl_secs: 43_200,
        }
    }
}

/// Desglose puro a partir de una configuración de tarifas ya leída
pub fn landed_cost(settings: &FeeSettings, vehicle_price_usd: Decimal, shipping_method: Option<ShippingMethod>) -> LandedCost {
    let price = round_money(vehicle_price_usd);
    let fixed_fees = round_money(settings.payable_fixed_fees());

    let breakdown = PriceBreakdown {
        vehicle_price_usd: price,
        shipping_method,
        import_duty_percent: settings.import_duty_percent,
        import_duty_usd: percent_of(settings.import_duty_percent, price),
        vat_percent: settings.vat_percent,
        vat_usd: percent_of(settings.vat_percent, price),
        ciss_percent: settings.ciss_percent,
        ciss_usd: percent_of(settings.ciss_percent, price),
        inspection_fee_usd: round_money(settings.inspection_fee),
        sourcing_fee_usd: round_money(settings.sourcing_fee),
        handling_fee_usd: round_money(settings.handling_fee),
        shipping_fee_usd: round_money(settings.shipping_fee),
        clearing_fee_usd: round_money(settings.clearing_fee),
        port_charges_usd: round_money(settings.port_charges),
        local_delivery_fee_usd: round_money(settings.local_delivery_fee),
        fixed_fees_usd: fixed_fees,
    };

    LandedCost {
        total_usd: price + fixed_fees,
        breakdown,
    }
}

/// Depósito y saldo de un total; la suma es exacta
pub fn deposit_split(total_usd: Decimal, deposit_percent: Decimal) -> (Decimal, Decimal) {
    let deposit = percent_of(deposit_percent, total_usd);
    (deposit, total_usd - deposit)
}

/// Monto a cobrar (o devolver) según el tipo de pago
pub fn payment_amount(request: &PaymentAmountRequest, deposit_percent: Decimal) -> AppResult<PaymentAmount> {
    let total = round_money(request.total_amount_usd);
    if total <= Decimal::ZERO {
        return Err(invalid_argument("total amount must be positive"));
    }
    let paid = round_money(request.amount_paid_usd.unwrap_or(total));

    let amount = match request.payment_type {
        PaymentType::Deposit => deposit_split(total, deposit_percent).0,
        PaymentType::Balance => deposit_split(total, deposit_percent).1,
        PaymentType::Full => total,
        PaymentType::Refund => paid,
        PaymentType::PartialRefund => {
            let amount = request
                .amount_usd
                .map(round_money)
                .ok_or_else(|| invalid_argument("partial refunds require an explicit amount"))?;
            if amount <= Decimal::ZERO || amount > paid {
                return Err(invalid_argument(format!(
                    "partial refund must be within (0, {}]",
                    paid
                )));
            }
            amount
        }
    };

    Ok(PaymentAmount {
        payment_type: request.payment_type,
        payment_amount: amount,
    })
}

pub struct PricingService {
    fees: Arc<dyn FeeSettingsStore>,
    config: PricingConfig,
}

impl PricingService {
    pub fn new(fees: Arc<dyn FeeSettingsStore>, config: PricingConfig) -> Self {
        Self { fees, config }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Tarifas vigentes; se crean con valores por defecto en la primera lectura
    pub async fn fee_settings(&self) -> AppResult<FeeSettings> {
        self.fees.load_or_init(&FeeSettings::default()).await
    }

    pub async fn update_fee_settings(&self, update: FeeSettingsUpdate, actor: &Actor) -> AppResult<FeeSettings> {
        actor.require_admin("update fee settings")?;
        update.validate()?;

        let mut settings = self.fee_settings().await?;
        settings.apply(&update, actor.id, Utc::now());
        let saved = self.fees.save(&settings).await?;
        info!("💰 Tarifas actualizadas por {}", actor.id);
        Ok(saved)
    }

    pub async fn compute_landed_cost(
        &self,
        vehicle_price_usd: Decimal,
        shipping_method: Option<ShippingMethod>,
    ) -> AppResult<LandedCost> {
        if vehicle_price_usd <= Decimal::ZERO {
            return Err(invalid_argument("vehicle price must be positive"));
        }
        let settings = self.fee_settings().await?;
        Ok(landed_cost(&settings, vehicle_price_usd, shipping_method))
    }

    pub fn compute_payment_amount(&self, request: &PaymentAmountRequest) -> AppResult<PaymentAmount> {
        payment_amount(request, self.config.deposit_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::memory::MemoryFeeSettingsStore;
    use crate::utils::errors::AppError;
    use uuid::Uuid;

    fn request(total: Decimal, payment_type: PaymentType) -> PaymentAmountRequest {
        PaymentAmountRequest {
            total_amount_usd: total,
            payment_type,
            amount_paid_usd: None,
            amount_usd: None,
        }
    }

    #[test]
    fn test_default_fees_landed_cost() {
        let cost = landed_cost(&FeeSettings::default(), dec!(20000), None);
        assert_eq!(cost.total_usd, dec!(22305));
        assert_eq!(cost.breakdown.import_duty_usd, dec!(7000));
        assert_eq!(cost.breakdown.vat_usd, dec!(1500));
        assert_eq!(cost.breakdown.ciss_usd, dec!(3000));
        assert_eq!(cost.breakdown.fixed_fees_usd, dec!(2305));
    }

    #[test]
    fn test_reserved_fees_not_in_total() {
        let settings = FeeSettings {
            clearing_fee: dec!(400),
            port_charges: dec!(250),
            local_delivery_fee: dec!(90),
            ..FeeSettings::default()
        };
        let cost = landed_cost(&settings, dec!(1000), Some(ShippingMethod::Air));
        assert_eq!(cost.total_usd, dec!(3305));
        assert_eq!(cost.breakdown.clearing_fee_usd, dec!(400));
        assert_eq!(cost.breakdown.shipping_method, Some(ShippingMethod::Air));
    }

    #[test]
    fn test_landed_cost_is_deterministic() {
        let settings = FeeSettings::default();
        let a = serde_json::to_string(&landed_cost(&settings, dec!(1000), Some(ShippingMethod::Air))).unwrap();
        let b = serde_json::to_string(&landed_cost(&settings, dec!(1000), Some(ShippingMethod::Air))).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_deposit_plus_balance_equals_total() {
        for total in [dec!(22305), dec!(1000.01), dec!(3333.33), dec!(0.07), dec!(98765.43)] {
            let deposit = payment_amount(&request(total, PaymentType::Deposit), dec!(30)).unwrap();
            let balance = payment_amount(&request(total, PaymentType::Balance), dec!(30)).unwrap();
            assert_eq!(deposit.payment_amount + balance.payment_amount, total, "total {}", total);
        }
        let deposit = payment_amount(&request(dec!(22305), PaymentType::Deposit), dec!(30)).unwrap();
        assert_eq!(deposit.payment_amount, dec!(6691.50));
    }

    #[test]
    fn test_refund_amounts() {
        let mut refund = request(dec!(22305), PaymentType::Refund);
        refund.amount_paid_usd = Some(dec!(6691.50));
        assert_eq!(payment_amount(&refund, dec!(30)).unwrap().payment_amount, dec!(6691.50));

        let mut partial = request(dec!(22305), PaymentType::PartialRefund);
        partial.amount_paid_usd = Some(dec!(6691.50));
        assert!(matches!(payment_amount(&partial, dec!(30)), Err(AppError::InvalidArgument(_))));

        partial.amount_usd = Some(dec!(7000));
        assert!(payment_amount(&partial, dec!(30)).is_err());

        partial.amount_usd = Some(dec!(1000));
        assert_eq!(payment_amount(&partial, dec!(30)).unwrap().payment_amount, dec!(1000));
    }

    #[tokio::test]
    async fn test_fee_settings_lazy_init_and_admin_update() {
        let service = PricingService::new(Arc::new(MemoryFeeSettingsStore::new()), PricingConfig::default());
        assert_eq!(service.fee_settings().await.unwrap().shipping_fee, dec!(1800));

        let update = FeeSettingsUpdate {
            shipping_fee: Some(dec!(2000)),
            ..Default::default()
        };
        let customer = Actor::customer(Uuid::new_v4());
        assert!(matches!(
            service.update_fee_settings(update.clone(), &customer).await,
            Err(AppError::Forbidden(_))
        ));

        let admin = Actor::admin(Uuid::new_v4());
        service.update_fee_settings(update, &admin).await.unwrap();
        let cost = service.compute_landed_cost(dec!(20000), None).await.unwrap();
        assert_eq!(cost.total_usd, dec!(22505));

        let invalid = FeeSettingsUpdate {
            vat_percent: Some(dec!(101)),
            ..Default::default()
        };
        assert!(matches!(
            service.update_fee_settings(invalid, &admin).await,
            Err(AppError::Validation(_))
        ));
    }
}
