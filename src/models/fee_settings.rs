//! Configuración de tarifas (singleton)
//!
//! Se crea con valores por defecto en la primera lectura y solo cambia
//! mediante la operación explícita de actualización.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::utils::validation::{validate_non_negative_amount, validate_percentage};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeeSettings {
    pub import_duty_percent: Decimal,
    pub vat_percent: Decimal,
    pub ciss_percent: Decimal,
    pub inspection_fee: Decimal,
    pub sourcing_fee: Decimal,
    pub handling_fee: Decimal,
    pub shipping_fee: Decimal,
    // Reservados: se reportan pero no entran en el total
    pub clearing_fee: Decimal,
    pub port_charges: Decimal,
    pub local_delivery_fee: Decimal,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<Uuid>,
}

impl Default for FeeSettings {
    fn default() -> Self {
        Self {
            import_duty_percent: dec!(35),
            vat_percent: dec!(7.5),
            ciss_percent: dec!(15),
            inspection_fee: dec!(150),
            sourcing_fee: dec!(5),
            handling_fee: dec!(350),
            shipping_fee: dec!(1800),
            clearing_fee: dec!(0),
            port_charges: dec!(0),
            local_delivery_fee: dec!(0),
            updated_at: Utc::now(),
            updated_by: None,
        }
    }
}

impl FeeSettings {
    /// Suma de las tarifas fijas que sí forman parte del total a pagar
    pub fn payable_fixed_fees(&self) -> Decimal {
        self.inspection_fee + self.sourcing_fee + self.handling_fee + self.shipping_fee
    }

    /// Aplicar una actualización parcial
    pub fn apply(&mut self, update: &FeeSettingsUpdate, actor: Uuid, now: DateTime<Utc>) {
        macro_rules! set {
            ($($field:ident),+) => {
                $(if let Some(value) = update.$field {
                    self.$field = value;
                })+
            };
        }
        set!(
            import_duty_percent,
            vat_percent,
            ciss_percent,
            inspection_fee,
            sourcing_fee,
            handling_fee,
            shipping_fee,
            clearing_fee,
            port_charges,
            local_delivery_fee
        );
        self.updated_at = now;
        self.updated_by = Some(actor);
    }
}

/// Actualización parcial de tarifas
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct FeeSettingsUpdate {
    #[validate(custom = "validate_percentage")]
    pub import_duty_percent: Option<Decimal>,
    #[validate(custom = "validate_percentage")]
    pub vat_percent: Option<Decimal>,
    #[validate(custom = "validate_percentage")]
    pub ciss_percent: Option<Decimal>,
    #[validate(custom = "validate_non_negative_amount")]
    pub inspection_fee: Option<Decimal>,
    #[validate(custom = "validate_non_negative_amount")]
    pub sourcing_fee: Option<Decimal>,
    #[validate(custom = "validate_non_negative_amount")]
    pub handling_fee: Option<Decimal>,
    #[validate(custom = "validate_non_negative_amount")]
    pub shipping_fee: Option<Decimal>,
    #[validate(custom = "validate_non_negative_amount")]
    pub clearing_fee: Option<Decimal>,
    #[validate(custom = "validate_non_negative_amount")]
    pub port_charges: Option<Decimal>,
    #[validate(custom = "validate_non_negative_amount")]
    pub local_delivery_fee: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fixed_fees() {
        assert_eq!(FeeSettings::default().payable_fixed_fees(), dec!(2305));
    }

    #[test]
    fn test_apply_partial_update() {
        let mut settings = FeeSettings::default();
        let actor = Uuid::new_v4();
        let update = FeeSettingsUpdate {
            shipping_fee: Some(dec!(2100)),
            ..Default::default()
        };
        settings.apply(&update, actor, Utc::now());
        assert_eq!(settings.shipping_fee, dec!(2100));
        assert_eq!(settings.handling_fee, dec!(350));
        assert_eq!(settings.updated_by, Some(actor));
    }

    #[test]
    fn test_update_validation() {
        let update = FeeSettingsUpdate {
            vat_percent: Some(dec!(120)),
            handling_fee: Some(dec!(-1)),
            ..Default::default()
        };
        let errors = update.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("vat_percent"));
        assert!(errors.field_errors().contains_key("handling_fee"));
    }
}
