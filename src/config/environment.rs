//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno y deriva las
//! configuraciones tipadas de cada componente.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use rust_decimal::Decimal;

use crate::cache::CacheConfig;
use crate::clients::listing_provider::ListingProviderConfig;
use crate::services::order_service::OrderConfig;
use crate::services::pricing_service::PricingConfig;
use crate::services::vehicle_resolution::ResolutionConfig;

use super::database::DatabaseConfig;

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub port: u16,
    pub host: String,
    pub database_url: String,
    pub redis_url: Option<String>,
    pub listing_api_url: String,
    pub listing_api_key: Option<String>,
    pub exchange_rate_api_url: String,
    pub local_currency: String,
    pub vehicle_cache_ttl_secs: u64,
    pub deposit_percent: Decimal,
    pub noise_makes: Vec<String>,
    pub order_number_prefix: String,
    pub request_timeout_secs: u64,
    pub cors_origins: Vec<String>,
    pub log_level: Option<String>,
}

impl EnvironmentConfig {
    /// Leer la configuración desde el entorno (después de `dotenv()`)
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            port: parse_var("PORT", 3000)?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            database_url: env::var("DATABASE_URL")
                .context("DATABASE_URL must be set in environment variables")?,
            redis_url: optional_var("REDIS_URL"),
            listing_api_url: env::var("LISTING_API_URL")
                .unwrap_or_else(|_| "https://api.marketcheck.com/v2".to_string()),
            listing_api_key: optional_var("LISTING_API_KEY"),
            exchange_rate_api_url: env::var("EXCHANGE_RATE_API_URL")
                .unwrap_or_else(|_| "https://open.er-api.com/v6/latest".to_string()),
            local_currency: env::var("LOCAL_CURRENCY").unwrap_or_else(|_| "NGN".to_string()),
            vehicle_cache_ttl_secs: parse_var("VEHICLE_CACHE_TTL_SECS", 43_200)?,
            deposit_percent: parse_var("DEPOSIT_PERCENT", Decimal::from(30))?,
            noise_makes: optional_var("NOISE_MAKES")
                .map(|raw| split_list(&raw))
                .unwrap_or_else(default_noise_makes),
            order_number_prefix: env::var("ORDER_NUMBER_PREFIX")
                .unwrap_or_else(|_| "AFZ".to_string()),
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", 30)?,
            cors_origins: optional_var("CORS_ORIGINS")
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
            log_level: optional_var("LOG_LEVEL"),
        })
    }

    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Verificar si estamos en modo producción
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Obtener la URL del servidor
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Nivel de logging: `LOG_LEVEL` o DEBUG en desarrollo
    pub fn tracing_level(&self) -> tracing::Level {
        self.log_level
            .as_deref()
            .and_then(|level| tracing::Level::from_str(level).ok())
            .unwrap_or(if self.is_development() {
                tracing::Level::DEBUG
            } else {
                tracing::Level::INFO
            })
    }

    pub fn database(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.database_url.clone())
    }

    pub fn cache(&self) -> CacheConfig {
        CacheConfig {
            redis_url: self.redis_url.clone(),
            default_ttl: self.vehicle_cache_ttl_secs,
            ..CacheConfig::default()
        }
    }

    pub fn resolution(&self) -> ResolutionConfig {
        ResolutionConfig {
            cache_ttl_secs: self.vehicle_cache_ttl_secs,
            noise_makes: self.noise_makes.clone(),
        }
    }

    pub fn pricing(&self) -> PricingConfig {
        PricingConfig {
            deposit_percent: self.deposit_percent,
            local_currency: self.local_currency.clone(),
            exchange_rate_ttl_secs: self.vehicle_cache_ttl_secs,
        }
    }

    pub fn orders(&self) -> OrderConfig {
        OrderConfig {
            request_number_prefix: self.order_number_prefix.clone(),
            ..OrderConfig::default()
        }
    }

    pub fn listing_provider(&self) -> ListingProviderConfig {
        ListingProviderConfig {
            base_url: self.listing_api_url.clone(),
            api_key: self.listing_api_key.clone(),
            timeout: self.request_timeout(),
        }
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} must be a valid value: {}", name, e)),
        None => Ok(default),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Marcas de camiones/comerciales que saturan la navegación sin filtros
fn default_noise_makes() -> Vec<String> {
    ["Freightliner", "International", "Mack", "Peterbilt", "Kenworth"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
