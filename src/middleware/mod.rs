//! Middleware del sistema
//!
//! Este módulo contiene el extractor de identidad del actor y la
//! configuración de CORS.

pub mod actor;
pub mod cors;

pub use cors::cors_layer;
