//! Utilidades de VIN
//!
//! Normalización y validación de VINs, identificadores temporales y slugs.

use lazy_static::lazy_static;
use regex::Regex;

/// Prefijo de los identificadores de vehículos temporales (no persistidos)
pub const TEMP_ID_PREFIX: &str = "temp-";

lazy_static! {
    // 17 caracteres, sin I, O ni Q
    static ref VIN_RE: Regex = Regex::new(r"^[A-HJ-NPR-Z0-9]{17}$").expect("VIN regex");
    static ref SLUG_JUNK_RE: Regex = Regex::new(r"[^a-z0-9]+").expect("slug regex");
}

/// Normalizar un VIN: recortar espacios y pasar a mayúsculas
pub fn normalize_vin(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Verificar si un VIN ya normalizado tiene formato válido
pub fn is_valid_vin(vin: &str) -> bool {
    VIN_RE.is_match(vin)
}

/// Normalizar y validar en un solo paso
pub fn parse_vin(raw: &str) -> Option<String> {
    let vin = normalize_vin(raw);
    if is_valid_vin(&vin) {
        Some(vin)
    } else {
        None
    }
}

/// Identificador sintético de un vehículo temporal
pub fn temp_id(vin: &str) -> String {
    format!("{}{}", TEMP_ID_PREFIX, vin)
}

/// Extraer el VIN de un identificador temporal (`temp-<VIN>`)
pub fn vin_from_temp_id(identifier: &str) -> Option<String> {
    identifier
        .trim()
        .strip_prefix(TEMP_ID_PREFIX)
        .and_then(parse_vin)
}

/// Generar slug `make-model-year-<últimos 6 del VIN>`
pub fn vehicle_slug(make: &str, model: &str, year: i32, vin: &str) -> String {
    let suffix_start = vin.len().saturating_sub(6);
    let raw = format!("{} {} {} {}", make, model, year, &vin[suffix_start..]);
    SLUG_JUNK_RE
        .replace_all(&raw.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}
