//! Utilidades de dinero con rust_decimal
//!
//! Todos los montos se calculan en `Decimal` y se redondean a 2 decimales.

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimales para montos monetarios
const DECIMAL_PLACES: u32 = 2;

/// Tolerancia para comparaciones monetarias (0.01)
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Redondear a centavos (mitad hacia afuera de cero)
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// `percent / 100 × base`, redondeado a centavos
pub fn percent_of(percent: Decimal, base: Decimal) -> Decimal {
    round_money(percent / Decimal::ONE_HUNDRED * base)
}

/// Dos montos difieren más que la tolerancia
pub fn differs(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() >= MONEY_TOLERANCE
}
