//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum, y el cableado de servicios sobre sus
//! backends (PostgreSQL o memoria).

use std::sync::Arc;

use sqlx::PgPool;

use crate::cache::{CacheKeys, CacheOperations};
use crate::clients::exchange_rate::{ExchangeRateService, RateSource};
use crate::clients::listing_provider::ListingProvider;
use crate::config::environment::EnvironmentConfig;
use crate::repositories::memory::{
    MemoryActivityLog, MemoryFeeSettingsStore, MemoryOrderStore, MemoryProfileDirectory,
    MemoryVehicleStore,
};
use crate::repositories::{
    ActivityLog, FeeSettingsStore, OrderStore, PgActivityLog, PgFeeSettingsStore, PgOrderStore,
    PgProfileDirectory, PgVehicleStore, ProfileDirectory, VehicleStore,
};
use crate::services::{
    InventoryService, OrderService, PaymentGateway, PaymentService, PricingService,
    VehicleResolutionEngine,
};

/// Colaboradores de infraestructura sobre los que se montan los servicios
#[derive(Clone)]
pub struct Backends {
    pub vehicles: Arc<dyn VehicleStore>,
    pub orders: Arc<dyn OrderStore>,
    pub fees: Arc<dyn FeeSettingsStore>,
    pub activity: Arc<dyn ActivityLog>,
    pub profiles: Arc<dyn ProfileDirectory>,
    pub cache: Arc<dyn CacheOperations>,
    pub provider: Arc<dyn ListingProvider>,
    pub rates: Arc<dyn RateSource>,
    pub gateway: Arc<dyn PaymentGateway>,
}

impl Backends {
    /// Repositorios PostgreSQL
    pub fn postgres(
        pool: PgPool,
        cache: Arc<dyn CacheOperations>,
        provider: Arc<dyn ListingProvider>,
        rates: Arc<dyn RateSource>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            vehicles: Arc::new(PgVehicleStore::new(pool.clone())),
            orders: Arc::new(PgOrderStore::new(pool.clone())),
            fees: Arc::new(PgFeeSettingsStore::new(pool.clone())),
            activity: Arc::new(PgActivityLog::new(pool.clone())),
            profiles: Arc::new(PgProfileDirectory::new(pool)),
            cache,
            provider,
            rates,
            gateway,
        }
    }

    /// Repositorios en memoria
    pub fn in_memory(
        cache: Arc<dyn CacheOperations>,
        provider: Arc<dyn ListingProvider>,
        rates: Arc<dyn RateSource>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            vehicles: Arc::new(MemoryVehicleStore::new()),
            orders: Arc::new(MemoryOrderStore::new()),
            fees: Arc::new(MemoryFeeSettingsStore::new()),
            activity: Arc::new(MemoryActivityLog::new()),
            profiles: Arc::new(MemoryProfileDirectory::new()),
            cache,
            provider,
            rates,
            gateway,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EnvironmentConfig>,
    pub cache: Arc<dyn CacheOperations>,
    pub resolution: Arc<VehicleResolutionEngine>,
    pub inventory: Arc<InventoryService>,
    pub pricing: Arc<PricingService>,
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
}

impl AppState {
    pub fn new(config: EnvironmentConfig, backends: Backends) -> Self {
        let keys = CacheKeys::new(config.cache().key_prefix);

        let resolution = Arc::new(VehicleResolutionEngine::new(
            backends.vehicles.clone(),
            backends.provider.clone(),
            backends.cache.clone(),
            backends.activity.clone(),
            keys.clone(),
            config.resolution(),
        ));
        let inventory = Arc::new(InventoryService::new(
            backends.vehicles.clone(),
            backends.activity.clone(),
            backends.cache.clone(),
            keys.clone(),
        ));
        let pricing_config = config.pricing();
        let exchange = Arc::new(ExchangeRateService::new(
            backends.rates.clone(),
            backends.cache.clone(),
            keys,
            pricing_config.exchange_rate_ttl_secs,
        ));
        let pricing = Arc::new(PricingService::new(backends.fees.clone(), pricing_config));
        let orders = Arc::new(OrderService::new(
            backends.orders.clone(),
            backends.profiles.clone(),
            resolution.clone(),
            pricing.clone(),
            config.orders(),
        ));
        let payments = Arc::new(PaymentService::new(
            backends.orders.clone(),
            pricing.clone(),
            exchange,
            backends.gateway.clone(),
        ));

        Self {
            config: Arc::new(config),
            cache: backends.cache,
            resolution,
            inventory,
            pricing,
            orders,
            payments,
        }
    }
}
