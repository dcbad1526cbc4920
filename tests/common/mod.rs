#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{RwLock, RwLockWriteGuard};
use uuid::Uuid;

use afrozon_backend::cache::MemoryCache;
use afrozon_backend::clients::{ListingProvider, ProviderError, RateSource};
use afrozon_backend::config::EnvironmentConfig;
use afrozon_backend::models::listing::{ExternalListing, ListingQuery, Photo, Specifications};
use afrozon_backend::models::profile::ShippingAddress;
use afrozon_backend::models::vehicle::{ApiSyncStatus, Vehicle, VehicleSource};
use afrozon_backend::repositories::memory::{
    MemoryActivityLog, MemoryFeeSettingsStore, MemoryOrderStore, MemoryProfileDirectory,
    MemoryVehicleStore,
};
use afrozon_backend::services::ManualPaymentGateway;
use afrozon_backend::state::{AppState, Backends};

/// Proveedor de listados con respuestas programables
#[derive(Default)]
pub struct FakeListingProvider {
    listings: Mutex<Vec<ExternalListing>>,
    by_vin: Mutex<HashMap<String, ExternalListing>>,
    failing: AtomicBool,
    list_calls: AtomicUsize,
    vin_calls: AtomicUsize,
    vin_gate: RwLock<()>,
}

impl FakeListingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publicar un listado tanto en búsquedas como por VIN
    pub fn publish(&self, listing: ExternalListing) {
        self.by_vin
            .lock()
            .unwrap()
            .insert(listing.vin.clone(), listing.clone());
        self.listings.lock().unwrap().push(listing);
    }

    pub fn set_price(&self, vin: &str, price: Decimal) {
        if let Some(listing) = self.by_vin.lock().unwrap().get_mut(vin) {
            listing.price_usd = Some(price);
        }
        for listing in self.listings.lock().unwrap().iter_mut() {
            if listing.vin == vin {
                listing.price_usd = Some(price);
            }
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn vin_calls(&self) -> usize {
        self.vin_calls.load(Ordering::SeqCst)
    }

    /// Retener las búsquedas por VIN hasta soltar el guard
    pub async fn hold_vin_lookups(&self) -> RwLockWriteGuard<'_, ()> {
        self.vin_gate.write().await
    }

    fn check(&self) -> Result<(), ProviderError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Status(503));
        }
        Ok(())
    }
}

#[async_trait]
impl ListingProvider for FakeListingProvider {
    async fn fetch_listings(&self, _query: &ListingQuery) -> Result<Vec<ExternalListing>, ProviderError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.listings.lock().unwrap().clone())
    }

    async fn fetch_listing_by_vin(&self, vin: &str) -> Result<Option<ExternalListing>, ProviderError> {
        self.vin_calls.fetch_add(1, Ordering::SeqCst);
        let _open = self.vin_gate.read().await;
        self.check()?;
        Ok(self.by_vin.lock().unwrap().get(vin).cloned())
    }

    async fn fetch_photos(&self, vin: &str) -> Result<Vec<Photo>, ProviderError> {
        self.check()?;
        Ok(vec![Photo {
            url: format!("https://cdn.example.com/{}/front.jpg", vin),
            is_primary: true,
            caption: None,
        }])
    }

    async fn fetch_specifications(&self, _vin: &str) -> Result<Option<Specifications>, ProviderError> {
        self.check()?;
        Ok(Some(Specifications {
            engine: Some("2.5L I4".to_string()),
            doors: Some(4),
            ..Default::default()
        }))
    }
}

/// Tasa fija
pub struct FixedRate(pub Decimal);

#[async_trait]
impl RateSource for FixedRate {
    async fn fetch_rate(&self, _from: &str, _to: &str) -> anyhow::Result<Decimal> {
        Ok(self.0)
    }
}

/// Fuente de tasas caída
pub struct FailingRate;

#[async_trait]
impl RateSource for FailingRate {
    async fn fetch_rate(&self, from: &str, to: &str) -> anyhow::Result<Decimal> {
        Err(anyhow!("no rate for {}/{}", from, to))
    }
}

pub fn test_config() -> EnvironmentConfig {
    EnvironmentConfig {
        environment: "test".into(),
        port: 0,
        host: "127.0.0.1".into(),
        database_url: "postgres://localhost/afrozon_test".into(),
        redis_url: None,
        listing_api_url: "http://localhost".into(),
        listing_api_key: None,
        exchange_rate_api_url: "http://localhost".into(),
        local_currency: "NGN".into(),
        vehicle_cache_ttl_secs: 43_200,
        deposit_percent: Decimal::from(30),
        noise_makes: vec![],
        order_number_prefix: "AFZ".into(),
        request_timeout_secs: 5,
        cors_origins: vec![],
        log_level: None,
    }
}

/// Aplicación completa sobre backends en memoria
pub struct TestApp {
    pub state: AppState,
    pub vehicles: Arc<MemoryVehicleStore>,
    pub orders: Arc<MemoryOrderStore>,
    pub activity: Arc<MemoryActivityLog>,
    pub profiles: Arc<MemoryProfileDirectory>,
    pub provider: Arc<FakeListingProvider>,
    pub cache: Arc<MemoryCache>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_rates(Arc::new(FixedRate(Decimal::from(1500))))
    }

    pub fn with_rates(rates: Arc<dyn RateSource>) -> Self {
        Self::with_config(test_config(), rates)
    }

    pub fn with_config(config: EnvironmentConfig, rates: Arc<dyn RateSource>) -> Self {
        let vehicles = Arc::new(MemoryVehicleStore::new());
        let orders = Arc::new(MemoryOrderStore::new());
        let activity = Arc::new(MemoryActivityLog::new());
        let profiles = Arc::new(MemoryProfileDirectory::new());
        let provider = Arc::new(FakeListingProvider::new());
        let cache = Arc::new(MemoryCache::new());

        let backends = Backends {
            vehicles: vehicles.clone(),
            orders: orders.clone(),
            fees: Arc::new(MemoryFeeSettingsStore::new()),
            activity: activity.clone(),
            profiles: profiles.clone(),
            cache: cache.clone(),
            provider: provider.clone(),
            rates,
            gateway: Arc::new(ManualPaymentGateway),
        };

        Self {
            state: AppState::new(config, backends),
            vehicles,
            orders,
            activity,
            profiles,
            provider,
            cache,
        }
    }

    /// Cliente con dirección de envío por defecto
    pub async fn customer_with_address(&self) -> Uuid {
        let user_id = Uuid::new_v4();
        self.profiles
            .set_default_address(user_id, address())
            .await;
        user_id
    }
}

pub fn address() -> ShippingAddress {
    ShippingAddress {
        address_id: Uuid::new_v4(),
        full_name: "Adaeze Okafor".into(),
        phone: Some("+2348012345678".into()),
        street: "12 Admiralty Way".into(),
        city: "Lagos".into(),
        state: Some("Lagos".into()),
        country: "NG".into(),
        postal_code: Some("101233".into()),
    }
}

pub fn listing(vin: &str, make: &str, model: &str, price: Decimal) -> ExternalListing {
    ExternalListing {
        vin: vin.to_string(),
        listing_id: Some(format!("mc-{}", &vin[..6])),
        make: make.to_string(),
        model: model.to_string(),
        year: 2019,
        trim: Some("SE".to_string()),
        price_usd: Some(price),
        mileage: Some(42_000),
        body_type: Some("Sedan".to_string()),
        fuel_type: Some("Gasoline".to_string()),
        transmission: Some("Automatic".to_string()),
        exterior_color: Some("Black".to_string()),
        region: Some("TX".to_string()),
        dealer_name: Some("Lone Star Motors".to_string()),
        photo_urls: vec![],
    }
}

/// Vehículo persistido de origen API, sincronizado en `last_sync`
pub fn synced_vehicle(listing: &ExternalListing, last_sync: DateTime<Utc>) -> Vehicle {
    let mut vehicle = Vehicle::ephemeral(listing, vec![], None, last_sync).unwrap();
    vehicle.source = VehicleSource::Api;
    vehicle.api_sync_status = ApiSyncStatus::Synced;
    vehicle.last_api_sync = Some(last_sync);
    vehicle
}

pub const VIN_A: &str = "1HGCM82633A004352";
pub const VIN_B: &str = "2T1BURHE5JC012345";
pub const VIN_C: &str = "5YJ3E1EA7KF317000";
