//! Tipo de cambio USD → moneda local
//!
//! Consulta con cache (mismo TTL que los vehículos). Si no se obtiene una
//! tasa no hay fallback 1:1: el flujo de pago falla.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::cache::{CacheKeys, CacheOperations};
use crate::utils::errors::{AppError, AppResult};

/// Fuente de tasas de cambio
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_rate(&self, from: &str, to: &str) -> Result<Decimal>;
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    result: Option<String>,
    #[serde(default)]
    rates: HashMap<String, serde_json::Value>,
}

/// Fuente HTTP: `GET {base_url}/{FROM}` → `{ "rates": { "NGN": 1530.2 } }`
pub struct HttpRateSource {
    client: Client,
    base_url: String,
}

impl HttpRateSource {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch_rate(&self, from: &str, to: &str) -> Result<Decimal> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), urlencoding::encode(from));
        log::debug!("🌐 GET {}", url);

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let body: RatesResponse = response.json().await.context("invalid rates payload")?;
        if body.result.as_deref().map_or(false, |r| r != "success") {
            return Err(anyhow!("rate provider reported {:?}", body.result));
        }

        let raw = body
            .rates
            .get(to)
            .ok_or_else(|| anyhow!("rate {}→{} missing", from, to))?;
        let rate = match raw {
            serde_json::Value::Number(n) => Decimal::from_str(&n.to_string())?,
            serde_json::Value::String(s) => Decimal::from_str(s)?,
            other => return Err(anyhow!("unexpected rate value {}", other)),
        };
        Ok(rate)
    }
}

/// Servicio de tasas con cache
pub struct ExchangeRateService {
    source: Arc<dyn RateSource>,
    cache: Arc<dyn CacheOperations>,
    keys: CacheKeys,
    ttl_seconds: u64,
}

impl ExchangeRateService {
    pub fn new(
        source: Arc<dyn RateSource>,
        cache: Arc<dyn CacheOperations>,
        keys: CacheKeys,
        ttl_seconds: u64,
    ) -> Self {
        Self {
            source,
            cache,
            keys,
            ttl_seconds,
        }
    }

    /// Obtener la tasa `from → to`; falla con `UpstreamUnavailable` si no hay tasa
    pub async fn get_rate(&self, from: &str, to: &str) -> AppResult<Decimal> {
        let from = from.trim().to_uppercase();
        let to = to.trim().to_uppercase();
        if from == to {
            return Ok(Decimal::ONE);
        }

        let key = self.keys.exchange_rate(&from, &to);
        if let Some(rate) = self.cache.get_json::<Decimal>(&key).await {
            debug!("📥 Tasa {}→{} desde cache: {}", from, to, rate);
            return Ok(rate);
        }

        match self.source.fetch_rate(&from, &to).await {
            Ok(rate) if rate > Decimal::ZERO => {
                info!("💱 Tasa {}→{} obtenida: {}", from, to, rate);
                self.cache.set_json(&key, &rate, self.ttl_seconds).await;
                Ok(rate)
            }
            Ok(rate) => {
                warn!("⚠️ Tasa no positiva {}→{}: {}", from, to, rate);
                Err(AppError::UpstreamUnavailable(format!(
                    "no usable exchange rate for {}→{}",
                    from, to
                )))
            }
            Err(e) => {
                warn!("⚠️ No se pudo obtener la tasa {}→{}: {}", from, to, e);
                Err(AppError::UpstreamUnavailable(format!(
                    "exchange rate {}→{} unavailable",
                    from, to
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        rate: Option<Decimal>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RateSource for CountingSource {
        async fn fetch_rate(&self, _from: &str, _to: &str) -> Result<Decimal> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.rate.ok_or_else(|| anyhow!("down"))
        }
    }

    fn service(rate: Option<Decimal>) -> (ExchangeRateService, Arc<CountingSource>) {
        let source = Arc::new(CountingSource {
            rate,
            calls: AtomicUsize::new(0),
        });
        let service = ExchangeRateService::new(
            source.clone(),
            Arc::new(MemoryCache::new()),
            CacheKeys::default(),
            60,
        );
        (service, source)
    }

    #[tokio::test]
    async fn test_rate_is_cached() {
        let (service, source) = service(Some(dec!(1530.25)));
        assert_eq!(service.get_rate("usd", "NGN").await.unwrap(), dec!(1530.25));
        assert_eq!(service.get_rate("USD", "NGN").await.unwrap(), dec!(1530.25));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_silent_fallback() {
        let (service, _) = service(None);
        let err = service.get_rate("USD", "NGN").await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_same_currency_is_identity() {
        let (service, source) = service(None);
        assert_eq!(service.get_rate("USD", "usd").await.unwrap(), Decimal::ONE);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }
}
