//! Gestión administrativa del inventario
//!
//! Alta manual, cambios de precio, edición y borrado lógico de vehículos.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::cache::{CacheKeys, CacheOperations};
use crate::dto::vehicle_dto::{CreateVehicleRequest, UpdateVehiclePriceRequest, UpdateVehicleRequest};
use crate::models::activity::{ActivityKind, ActivityRecord};
use crate::models::auth::Actor;
use crate::models::vehicle::{
    ApiSyncStatus, NewVehicle, PriceHistoryEntry, Vehicle, VehicleSource, VehicleStatus, VehicleUpdate,
};
use crate::repositories::{ActivityLog, VehicleStore};
use crate::utils::errors::{invalid_argument, not_found_error, AppResult};
use crate::utils::money::{differs, round_money};
use crate::utils::vin::parse_vin;

const MANUAL_PRICE_REASON: &str = "manual_update";
const MAX_ACTIVITY_LIMIT: i64 = 200;

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub struct InventoryService {
    store: Arc<dyn VehicleStore>,
    activity: Arc<dyn ActivityLog>,
    cache: Arc<dyn CacheOperations>,
    keys: CacheKeys,
}

impl InventoryService {
    pub fn new(
        store: Arc<dyn VehicleStore>,
        activity: Arc<dyn ActivityLog>,
        cache: Arc<dyn CacheOperations>,
        keys: CacheKeys,
    ) -> Self {
        Self {
            store,
            activity,
            cache,
            keys,
        }
    }

    /// Crear un vehículo de origen MANUAL. `Conflict` si el VIN ya existe.
    pub async fn create_vehicle(&self, request: CreateVehicleRequest, actor: &Actor) -> AppResult<Vehicle> {
        actor.require_admin("create vehicles")?;
        request.validate()?;

        let vin = parse_vin(&request.vin)
            .ok_or_else(|| invalid_argument(format!("'{}' is not a valid VIN", request.vin)))?;

        let new_vehicle = NewVehicle {
            vin,
            make: request.make.trim().to_string(),
            model: request.model.trim().to_string(),
            year: request.year,
            trim: non_blank(request.trim),
            price_usd: round_money(request.price_usd),
            mileage: request.mileage,
            body_type: non_blank(request.body_type),
            fuel_type: non_blank(request.fuel_type),
            transmission: non_blank(request.transmission),
            exterior_color: non_blank(request.exterior_color),
            region: non_blank(request.region),
            status: VehicleStatus::Available,
            featured: request.featured,
            source: VehicleSource::Manual,
            api_sync_status: ApiSyncStatus::Synced,
            last_api_sync: None,
            external_listing_id: None,
            photos: request.photos,
            specifications: request.specifications,
        };

        let vehicle = self.store.insert(new_vehicle).await?;
        info!("✅ Vehículo manual creado: {} (VIN {})", vehicle.slug, vehicle.vin);

        self.log_activity(
            ActivityRecord::new(
                ActivityKind::VehicleCreated,
                vehicle.persisted_id(),
                &vehicle.vin,
                "Vehicle created manually",
            )
            .with_actor(actor.id)
            .with_metadata(json!({ "price_usd": vehicle.price_usd })),
        )
        .await;
        self.invalidate(&vehicle.vin).await;
        Ok(vehicle)
    }

    /// Cambio manual de precio; agrega una entrada MANUAL al historial
    pub async fn update_price(
        &self,
        id: Uuid,
        request: UpdateVehiclePriceRequest,
        actor: &Actor,
    ) -> AppResult<Vehicle> {
        actor.require_admin("update vehicle prices")?;
        request.validate()?;

        let vehicle = self.find_live(id).await?;
        let new_price = round_money(request.price_usd);
        if !differs(new_price, vehicle.price_usd) {
            return Ok(vehicle);
        }

        let reason = non_blank(request.reason).unwrap_or_else(|| MANUAL_PRICE_REASON.to_string());
        let entry = PriceHistoryEntry::new(vehicle.price_usd, new_price, reason, VehicleSource::Manual, Utc::now());
        let metadata = json!({
            "old_price": vehicle.price_usd,
            "new_price": new_price,
            "change_amount": entry.change_amount,
            "change_percent": entry.change_percent,
        });

        let updated = self.store.record_price_change(id, entry, None).await?;
        info!("💰 Precio manual para VIN {}: {} → {}", updated.vin, vehicle.price_usd, new_price);

        self.log_activity(
            ActivityRecord::new(
                ActivityKind::PriceChanged,
                Some(id),
                &updated.vin,
                format!("Price changed manually from {} to {}", vehicle.price_usd, new_price),
            )
            .with_actor(actor.id)
            .with_metadata(metadata),
        )
        .await;
        self.invalidate(&updated.vin).await;
        Ok(updated)
    }

    pub async fn update_vehicle(&self, id: Uuid, request: UpdateVehicleRequest, actor: &Actor) -> AppResult<Vehicle> {
        actor.require_admin("update vehicles")?;
        request.validate()?;
        self.find_live(id).await?;

        let update = VehicleUpdate {
            mileage: request.mileage,
            status: request.status,
            featured: request.featured,
            body_type: non_blank(request.body_type),
            region: non_blank(request.region),
            photos: request.photos,
            specifications: request.specifications,
            ..Default::default()
        };
        let vehicle = self.store.update(id, update).await?;
        self.invalidate(&vehicle.vin).await;
        Ok(vehicle)
    }

    /// Borrado lógico; el VIN sigue reservado
    pub async fn delete_vehicle(&self, id: Uuid, actor: &Actor) -> AppResult<()> {
        actor.require_admin("delete vehicles")?;
        let vehicle = self.find_live(id).await?;

        if !self.store.soft_delete(id, Utc::now()).await? {
            return Err(not_found_error("Vehicle", &id.to_string()));
        }
        info!("🗑️ Vehículo {} (VIN {}) eliminado", id, vehicle.vin);

        self.log_activity(
            ActivityRecord::new(ActivityKind::VehicleDeleted, Some(id), &vehicle.vin, "Vehicle deleted")
                .with_actor(actor.id),
        )
        .await;
        self.invalidate(&vehicle.vin).await;
        Ok(())
    }

    pub async fn recent_activity(
        &self,
        vehicle_id: Option<Uuid>,
        limit: Option<i64>,
        actor: &Actor,
    ) -> AppResult<Vec<ActivityRecord>> {
        actor.require_admin("read inventory activity")?;
        let limit = limit.unwrap_or(50).clamp(1, MAX_ACTIVITY_LIMIT);
        self.activity.recent(vehicle_id, limit).await
    }

    async fn find_live(&self, id: Uuid) -> AppResult<Vehicle> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| not_found_error("Vehicle", &id.to_string()))
    }

    async fn invalidate(&self, vin: &str) {
        self.cache.delete(&self.keys.vehicle_by_vin(vin)).await;
    }

    async fn log_activity(&self, record: ActivityRecord) {
        if let Err(e) = self.activity.record(record).await {
            warn!("⚠️ No se pudo registrar actividad: {}", e);
        }
    }
}
