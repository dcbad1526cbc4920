//! Utilidades del sistema
//!
//! Este módulo contiene utilidades para manejo de errores, validación,
//! VINs, dinero y otras funcionalidades comunes.

pub mod errors;
pub mod money;
pub mod validation;
pub mod vin;

pub use errors::{AppError, AppResult};
