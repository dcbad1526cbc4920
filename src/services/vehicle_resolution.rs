//! Motor de resolución de vehículos
//!
//! Combina el Vehicle Store con el proveedor externo de listados en una sola
//! página deduplicada por VIN, refresca precios obsoletos y promueve
//! vehículos temporales a persistidos.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::vehicle_refresh::{VehicleRefresher, SYNC_REASON};
use crate::cache::{CacheKeys, CacheOperations};
use crate::clients::listing_provider::ListingProvider;
use crate::models::activity::{ActivityKind, ActivityRecord};
use crate::models::listing::{ExternalListing, ListingQuery, Photo, Specifications};
use crate::models::vehicle::{
    ApiSyncStatus, NewVehicle, Pagination, PriceHistoryEntry, Vehicle, VehicleFilters,
    VehicleListResult, VehicleSource, VehicleUpdate,
};
use crate::repositories::{ActivityLog, VehicleStore};
use crate::utils::errors::{invalid_argument, AppError, AppResult};
use crate::utils::money::differs;
use crate::utils::vin::{self, TEMP_ID_PREFIX};

/// Configuración del motor de resolución
#[derive(Debug, Clone)]
pub struct ResolutionConfig {
    /// Ventana de obsolescencia y TTL de cache (segundos)
    pub cache_ttl_secs: u64,
    /// Marcas relegadas al final cuando no hay filtro de marca/tipo
    pub noise_makes: Vec<String>,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 43_200,
            noise_makes: Vec::new(),
        }
    }
}

/// Tipo de identificador indicado por el llamador
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierKind {
    #[default]
    Id,
    Vin,
}

/// Identificador ya clasificado
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VehicleIdentifier {
    Durable(Uuid),
    Vin(String),
}

impl VehicleIdentifier {
    /// Clasificar un identificador crudo. Un id temporal siempre se
    /// normaliza a su VIN; cualquier otra forma es `InvalidArgument`.
    pub fn parse(raw: &str, kind: IdentifierKind) -> AppResult<Self> {
        let raw = raw.trim();
        if raw.starts_with(TEMP_ID_PREFIX) {
            return vin::vin_from_temp_id(raw)
                .map(VehicleIdentifier::Vin)
                .ok_or_else(|| invalid_argument(format!("malformed temporary vehicle id '{}'", raw)));
        }

        match kind {
            IdentifierKind::Vin => vin::parse_vin(raw)
                .map(VehicleIdentifier::Vin)
                .ok_or_else(|| invalid_argument(format!("'{}' is not a valid VIN", raw))),
            IdentifierKind::Id => {
                if let Ok(id) = Uuid::parse_str(raw) {
                    return Ok(VehicleIdentifier::Durable(id));
                }
                vin::parse_vin(raw)
                    .map(VehicleIdentifier::Vin)
                    .ok_or_else(|| invalid_argument(format!("'{}' is not a vehicle id or VIN", raw)))
            }
        }
    }
}

/// Traducir los filtros al vocabulario del proveedor
pub fn to_listing_query(filters: &VehicleFilters, pagination: Pagination) -> ListingQuery {
    fn clean(value: &Option<String>) -> Option<String> {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    ListingQuery {
        make: clean(&filters.make),
        model: clean(&filters.model),
        year_min: filters.year_min,
        year_max: filters.year_max,
        price_min: filters.price_min,
        price_max: filters.price_max,
        miles_max: filters.mileage_max,
        body_type: clean(&filters.body_type),
        page: pagination.page,
        per_page: pagination.limit,
    }
}

pub struct VehicleResolutionEngine {
    store: Arc<dyn VehicleStore>,
    provider: Arc<dyn ListingProvider>,
    cache: Arc<dyn CacheOperations>,
    activity: Arc<dyn ActivityLog>,
    refresher: Arc<VehicleRefresher>,
    keys: CacheKeys,
    config: ResolutionConfig,
}

impl VehicleResolutionEngine {
    pub fn new(
        store: Arc<dyn VehicleStore>,
        provider: Arc<dyn ListingProvider>,
        cache: Arc<dyn CacheOperations>,
        activity: Arc<dyn ActivityLog>,
        keys: CacheKeys,
        config: ResolutionConfig,
    ) -> Self {
        let refresher = Arc::new(VehicleRefresher::new(
            store.clone(),
            provider.clone(),
            activity.clone(),
            config.cache_ttl_secs,
        ));
        Self {
            store,
            provider,
            cache,
            activity,
            refresher,
            keys,
            config,
        }
    }

    pub fn refresher(&self) -> &Arc<VehicleRefresher> {
        &self.refresher
    }

    /// Página combinada de vehículos persistidos + temporales
    pub async fn resolve_list(
        &self,
        filters: &VehicleFilters,
        pagination: Pagination,
        include_external: bool,
    ) -> AppResult<VehicleListResult> {
        let now = Utc::now();
        let (mut items, persisted_total) = self.store.search(filters, pagination).await?;
        debug!(
            "🔍 Store devolvió {} de {} vehículos (página {})",
            items.len(),
            persisted_total,
            pagination.page
        );

        // Refresco asíncrono: la respuesta no espera
        for vehicle in items.iter().filter(|v| self.refresher.is_stale(v, now)) {
            self.refresher.spawn_refresh(vehicle.clone());
        }

        let mut external_count = 0;
        if include_external && (items.len() as u32) < pagination.limit {
            let ephemeral = self.external_candidates(filters, pagination, &items).await?;
            external_count = ephemeral.len();

            let room = (pagination.limit as usize).saturating_sub(items.len());
            items.extend(ephemeral.into_iter().take(room));
        }

        if let Some(key) = filters.sort_by {
            items.sort_by(|a, b| key.compare(a, b, filters.sort_order));
        }
        if filters.is_unscoped() {
            self.demote_noise_makes(&mut items);
        }

        let total = persisted_total + external_count as i64;
        let limit = pagination.limit as i64;
        Ok(VehicleListResult {
            items,
            total,
            page: pagination.page,
            pages: (total + limit - 1) / limit,
            external_count,
        })
    }

    /// Listados externos que no existen en el store, como vehículos temporales
    async fn external_candidates(
        &self,
        filters: &VehicleFilters,
        pagination: Pagination,
        persisted: &[Vehicle],
    ) -> AppResult<Vec<Vehicle>> {
        let query = to_listing_query(filters, pagination);
        let listings = self.fetch_listings_cached(&query).await;
        if listings.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen: HashSet<String> = persisted.iter().map(|v| v.vin.clone()).collect();
        let candidates: Vec<&ExternalListing> = listings
            .iter()
            .filter(|l| l.positive_price().is_some())
            .filter(|l| seen.insert(l.vin.clone()))
            .collect();

        // Una sola consulta batch, nunca N+1
        let vins: Vec<String> = candidates.iter().map(|l| l.vin.clone()).collect();
        let existing = self.store.find_existing_vins(&vins).await?;

        let now = Utc::now();
        let ephemeral: Vec<Vehicle> = candidates
            .into_iter()
            .filter(|l| !existing.contains(&l.vin))
            .filter_map(|l| Vehicle::ephemeral(l, Vec::new(), None, now))
            .filter(|v| filters.matches(v))
            .collect();

        debug!(
            "🌐 {} listados externos, {} ya persistidos, {} temporales",
            listings.len(),
            existing.len(),
            ephemeral.len()
        );
        Ok(ephemeral)
    }

    async fn fetch_listings_cached(&self, query: &ListingQuery) -> Vec<ExternalListing> {
        let key = self.keys.listings(&query.checksum());
        if let Some(listings) = self.cache.get_json::<Vec<ExternalListing>>(&key).await {
            return listings;
        }

        match self.provider.fetch_listings(query).await {
            Ok(listings) => {
                self.cache
                    .set_json(&key, &listings, self.config.cache_ttl_secs)
                    .await;
                listings
            }
            Err(e) => {
                warn!("⚠️ Proveedor de listados no disponible, solo inventario local: {}", e);
                Vec::new()
            }
        }
    }

    fn demote_noise_makes(&self, items: &mut Vec<Vehicle>) {
        if self.config.noise_makes.is_empty() {
            return;
        }
        let is_noise = |v: &Vehicle| {
            self.config
                .noise_makes
                .iter()
                .any(|m| m.eq_ignore_ascii_case(v.make.trim()))
        };
        let (signal, noise): (Vec<Vehicle>, Vec<Vehicle>) = items.drain(..).partition(|v| !is_noise(v));
        items.extend(signal);
        items.extend(noise);
    }

    /// Resolver un vehículo por id durable, VIN o id temporal
    pub async fn resolve_one(&self, identifier: &str, kind: IdentifierKind) -> AppResult<Vehicle> {
        match VehicleIdentifier::parse(identifier, kind)? {
            VehicleIdentifier::Durable(id) => {
                let vehicle = self
                    .store
                    .find_by_id(id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Vehicle {} not found", id)))?;
                Ok(self.detail_view(vehicle).await)
            }
            VehicleIdentifier::Vin(vin) => match self.store.find_by_vin(&vin).await? {
                Some(vehicle) => Ok(self.detail_view(vehicle).await),
                None => {
                    // Un VIN dado de baja sigue reservado: no se ofrece como temporal
                    let reserved = self.store.find_existing_vins(std::slice::from_ref(&vin)).await?;
                    if reserved.contains(&vin) {
                        return Err(AppError::NotFound(format!("Vehicle with VIN {} not found", vin)));
                    }
                    self.lookup_ephemeral(&vin).await
                }
            },
        }
    }

    /// Vista de detalle de un persistido: refresco síncrono si está obsoleto
    async fn detail_view(&self, vehicle: Vehicle) -> Vehicle {
        let vehicle = if self.refresher.is_stale(&vehicle, Utc::now()) {
            self.refresher.refresh_or_join(&vehicle).await.into_vehicle()
        } else {
            vehicle
        };

        if let Some(id) = vehicle.persisted_id() {
            let store = self.store.clone();
            tokio::spawn(async move {
                if let Err(e) = store.increment_view_count(id).await {
                    warn!("⚠️ No se pudo incrementar vistas de {}: {}", id, e);
                }
            });
        }
        vehicle
    }

    async fn lookup_ephemeral(&self, vin: &str) -> AppResult<Vehicle> {
        let key = self.keys.vehicle_by_vin(vin);
        if let Some(vehicle) = self.cache.get_json::<Vehicle>(&key).await {
            return Ok(vehicle);
        }

        let not_found = || AppError::NotFound(format!("Vehicle with VIN {} not found", vin));
        let listing = match self.provider.fetch_listing_by_vin(vin).await {
            Ok(Some(listing)) => listing,
            Ok(None) => return Err(not_found()),
            Err(e) => {
                warn!("⚠️ Proveedor falló buscando VIN {}: {}", vin, e);
                return Err(not_found());
            }
        };

        let (photos, specifications) = futures::join!(
            self.provider.fetch_photos(vin),
            self.provider.fetch_specifications(vin)
        );
        let photos = photos.unwrap_or_else(|e| {
            warn!("⚠️ Sin fotos para VIN {}: {}", vin, e);
            Vec::new()
        });
        let specifications = specifications.unwrap_or_else(|e| {
            warn!("⚠️ Sin especificaciones para VIN {}: {}", vin, e);
            None
        });

        let vehicle =
            Vehicle::ephemeral(&listing, photos, specifications, Utc::now()).ok_or_else(not_found)?;
        self.cache
            .set_json(&key, &vehicle, self.config.cache_ttl_secs)
            .await;
        Ok(vehicle)
    }

    /// Único camino de temporal a persistido. Idempotente: un VIN ya
    /// persistido se actualiza en lugar de duplicarse.
    pub async fn promote(
        &self,
        listing: &ExternalListing,
        photos: Option<Vec<Photo>>,
        specifications: Option<Specifications>,
    ) -> AppResult<Vehicle> {
        let price = listing
            .positive_price()
            .ok_or_else(|| invalid_argument(format!("listing {} has no positive price", listing.vin)))?;

        let photos = match photos.filter(|p| !p.is_empty()) {
            Some(photos) => photos,
            None => match self.provider.fetch_photos(&listing.vin).await {
                Ok(photos) if !photos.is_empty() => photos,
                Ok(_) => listing.photos(),
                Err(e) => {
                    warn!("⚠️ Sin fotos del proveedor para VIN {}: {}", listing.vin, e);
                    listing.photos()
                }
            },
        };
        let specifications = match specifications {
            Some(specs) => Some(specs),
            None => self
                .provider
                .fetch_specifications(&listing.vin)
                .await
                .unwrap_or_else(|e| {
                    warn!("⚠️ Sin especificaciones para VIN {}: {}", listing.vin, e);
                    None
                }),
        };

        let now = Utc::now();
        let vehicle = match self.store.find_by_vin(&listing.vin).await? {
            Some(existing) => {
                self.sync_existing(existing, listing, price, photos, specifications)
                    .await?
            }
            None => {
                let new_vehicle =
                    NewVehicle::from_listing(listing, price, photos.clone(), specifications.clone(), now);
                match self.store.insert(new_vehicle).await {
                    Ok(created) => {
                        info!("💾 Vehículo promovido: VIN {} → {}", created.vin, created.id);
                        self.log_activity(
                            ActivityRecord::new(
                                ActivityKind::VehiclePromoted,
                                created.persisted_id(),
                                &created.vin,
                                "Vehicle promoted from external listing",
                            )
                            .with_metadata(json!({ "price_usd": price })),
                        )
                        .await;
                        created
                    }
                    Err(AppError::Conflict(_)) => {
                        // Otra petición lo creó primero
                        info!("🔁 VIN {} creado concurrentemente, actualizando", listing.vin);
                        let existing = self.store.find_by_vin(&listing.vin).await?.ok_or_else(|| {
                            AppError::NotFound(format!(
                                "Vehicle with VIN {} is no longer available",
                                listing.vin
                            ))
                        })?;
                        self.sync_existing(existing, listing, price, photos, specifications)
                            .await?
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        self.cache.delete(&self.keys.vehicle_by_vin(&listing.vin)).await;
        Ok(vehicle)
    }

    /// Asegurar que un vehículo resuelto esté persistido
    pub async fn ensure_persisted(&self, vehicle: Vehicle) -> AppResult<Vehicle> {
        if !vehicle.is_temporary {
            return Ok(vehicle);
        }
        let listing = listing_from_vehicle(&vehicle);
        self.promote(&listing, Some(vehicle.photos), vehicle.specifications)
            .await
    }

    async fn sync_existing(
        &self,
        existing: Vehicle,
        listing: &ExternalListing,
        price: rust_decimal::Decimal,
        photos: Vec<Photo>,
        specifications: Option<Specifications>,
    ) -> AppResult<Vehicle> {
        let id = existing
            .persisted_id()
            .ok_or_else(|| AppError::Internal("stored vehicle without durable id".to_string()))?;
        let now = Utc::now();

        // El precio de un vehículo MANUAL lo decide el administrador
        if existing.source == VehicleSource::Api && differs(price, existing.price_usd) {
            let entry = PriceHistoryEntry::new(existing.price_usd, price, SYNC_REASON, VehicleSource::Api, now);
            self.store.record_price_change(id, entry, Some(now)).await?;
        }

        let update = VehicleUpdate {
            mileage: listing.mileage,
            external_listing_id: listing.listing_id.clone(),
            photos: if photos.is_empty() { None } else { Some(photos) },
            specifications,
            api_sync_status: Some(ApiSyncStatus::Synced),
            last_api_sync: Some(now),
            ..Default::default()
        };
        self.store.update(id, update).await
    }

    /// Vaciar listas y detalles temporales del cache
    pub async fn purge_external_cache(&self) -> u64 {
        let listings = self.cache.delete_by_pattern(&self.keys.listings_pattern()).await;
        let details = self
            .cache
            .delete_by_pattern(&self.keys.vehicle_vin_pattern())
            .await;
        info!("🗑️ Cache externo purgado: {} listas, {} detalles", listings, details);
        listings + details
    }

    async fn log_activity(&self, record: ActivityRecord) {
        if let Err(e) = self.activity.record(record).await {
            warn!("⚠️ No se pudo registrar actividad: {}", e);
        }
    }
}

/// Reconstruir el listado de un vehículo temporal para promoverlo
fn listing_from_vehicle(vehicle: &Vehicle) -> ExternalListing {
    ExternalListing {
        vin: vehicle.vin.clone(),
        listing_id: vehicle.external_listing_id.clone(),
        make: vehicle.make.clone(),
        model: vehicle.model.clone(),
        year: vehicle.year,
        trim: vehicle.trim.clone(),
        price_usd: Some(vehicle.price_usd),
        mileage: vehicle.mileage,
        body_type: vehicle.body_type.clone(),
        fuel_type: vehicle.fuel_type.clone(),
        transmission: vehicle.transmission.clone(),
        exterior_color: vehicle.exterior_color.clone(),
        region: vehicle.region.clone(),
        dealer_name: None,
        photo_urls: vehicle.photos.iter().map(|p| p.url.clone()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_id_normalizes_to_vin() {
        assert_eq!(
            VehicleIdentifier::parse("temp-1HGCM82633A004352", IdentifierKind::Id).unwrap(),
            VehicleIdentifier::Vin("1HGCM82633A004352".into())
        );
    }

    #[test]
    fn test_identifier_shapes() {
        let id = Uuid::new_v4();
        assert_eq!(
            VehicleIdentifier::parse(&id.to_string(), IdentifierKind::Id).unwrap(),
            VehicleIdentifier::Durable(id)
        );
        assert_eq!(
            VehicleIdentifier::parse("1hgcm82633a004352", IdentifierKind::Vin).unwrap(),
            VehicleIdentifier::Vin("1HGCM82633A004352".into())
        );
        assert!(matches!(
            VehicleIdentifier::parse("robert'); drop table", IdentifierKind::Id),
            Err(AppError::InvalidArgument(_))
        ));
        assert!(matches!(
            VehicleIdentifier::parse(&id.to_string(), IdentifierKind::Vin),
            Err(AppError::InvalidArgument(_))
        ));
        assert!(matches!(
            VehicleIdentifier::parse("temp-XYZ", IdentifierKind::Id),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_listing_query_translation() {
        let filters = VehicleFilters {
            make: Some(" Toyota ".into()),
            mileage_max: Some(60_000),
            search: Some("camry".into()),
            ..Default::default()
        };
        let query = to_listing_query(&filters, Pagination::new(Some(2), Some(25)));
        assert_eq!(query.make.as_deref(), Some("Toyota"));
        assert_eq!(query.miles_max, Some(60_000));
        assert_eq!(query.page, 2);
        assert_eq!(query.per_page, 25);
    }
}
