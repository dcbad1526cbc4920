//! Configuración de cache
//!
//! Este módulo contiene la configuración y el espacio de nombres de claves.

use serde::{Deserialize, Serialize};

/// Configuración del cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub redis_url: Option<String>,
    pub default_ttl: u64,
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            default_ttl: 43_200, // 12 horas
            key_prefix: "afrozon".to_string(),
        }
    }
}

/// Generador de claves con prefijo
#[derive(Debug, Clone)]
pub struct CacheKeys {
    prefix: String,
}

impl CacheKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    fn make_key(&self, namespace: &str, identifier: &str) -> String {
        format!("{}:{}:{}", self.prefix, namespace, identifier)
    }

    /// Detalle temporal de un vehículo por VIN
    pub fn vehicle_by_vin(&self, vin: &str) -> String {
        self.make_key("vehicle:vin", vin)
    }

    pub fn vehicle_by_id(&self, id: &str) -> String {
        self.make_key("vehicle:id", id)
    }

    /// Página del proveedor por checksum de filtros
    pub fn listings(&self, checksum: &str) -> String {
        self.make_key("listings", checksum)
    }

    pub fn exchange_rate(&self, from: &str, to: &str) -> String {
        self.make_key("exchange_rate", &format!("{}:{}", from, to))
    }

    pub fn listings_pattern(&self) -> String {
        self.make_key("listings", "*")
    }

    pub fn vehicle_vin_pattern(&self) -> String {
        self.make_key("vehicle:vin", "*")
    }
}

impl Default for CacheKeys {
    fn default() -> Self {
        Self::new(CacheConfig::default().key_prefix)
    }
}
