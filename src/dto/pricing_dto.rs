use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use crate::models::pricing::ShippingMethod;
use crate::utils::validation::validate_positive_amount;

// Query del cálculo de costo puesto en destino
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LandedCostQuery {
    #[validate(custom = "validate_positive_amount")]
    pub price_usd: Decimal,
    pub shipping_method: Option<ShippingMethod>,
}
