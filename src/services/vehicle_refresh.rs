//! Refresco de precios de vehículos obsoletos
//!
//! Un vehículo persistido con origen API es obsoleto cuando
//! `now - last_api_sync >= ttl`. Los vehículos MANUAL nunca lo son.
//! El refresco nunca falla hacia el llamador: ante cualquier error el último
//! precio conocido sigue siendo el autoritativo.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clients::listing_provider::ListingProvider;
use crate::models::activity::{ActivityKind, ActivityRecord};
use crate::models::vehicle::{ApiSyncStatus, PriceHistoryEntry, Vehicle, VehicleSource};
use crate::repositories::{ActivityLog, VehicleStore};
use crate::utils::money::differs;

/// Motivo registrado en el historial para cambios detectados al sincronizar
pub const SYNC_REASON: &str = "api_sync";

/// Verificar si un vehículo persistido necesita refresco
pub fn is_stale(vehicle: &Vehicle, ttl: Duration, now: DateTime<Utc>) -> bool {
    if vehicle.is_temporary || vehicle.source == VehicleSource::Manual {
        return false;
    }
    match vehicle.last_api_sync {
        Some(synced) => now - synced >= ttl,
        None => true,
    }
}

/// Resultado de un refresco
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// Mismo precio: solo avanzó `last_api_sync`
    Unchanged(Vehicle),
    PriceChanged(Vehicle),
    /// El proveedor falló: el vehículo queda OUTDATED con su último precio
    Failed(Vehicle),
    /// Otro refresco del mismo vehículo está en curso
    Skipped(Vehicle),
    /// Se esperó el refresco en curso; contiene el vehículo ya releído
    Joined(Vehicle),
}

impl RefreshOutcome {
    pub fn vehicle(&self) -> &Vehicle {
        match self {
            RefreshOutcome::Unchanged(v)
            | RefreshOutcome::PriceChanged(v)
            | RefreshOutcome::Failed(v)
            | RefreshOutcome::Skipped(v)
            | RefreshOutcome::Joined(v) => v,
        }
    }

    pub fn into_vehicle(self) -> Vehicle {
        match self {
            RefreshOutcome::Unchanged(v)
            | RefreshOutcome::PriceChanged(v)
            | RefreshOutcome::Failed(v)
            | RefreshOutcome::Skipped(v)
            | RefreshOutcome::Joined(v) => v,
        }
    }
}

/// Refrescos en curso por vehículo. Soltar el `Sender` despierta a quien espera.
type InFlightMap = Arc<Mutex<HashMap<Uuid, watch::Sender<()>>>>;

/// Marca de refresco en curso; se libera al soltarse
struct InFlight {
    map: InFlightMap,
    id: Uuid,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Ok(mut map) = self.map.lock() {
            map.remove(&self.id);
        }
    }
}

enum Claim {
    Owner(InFlight),
    Running(watch::Receiver<()>),
}

pub struct VehicleRefresher {
    store: Arc<dyn VehicleStore>,
    provider: Arc<dyn ListingProvider>,
    activity: Arc<dyn ActivityLog>,
    ttl: Duration,
    in_flight: InFlightMap,
}

impl VehicleRefresher {
    pub fn new(
        store: Arc<dyn VehicleStore>,
        provider: Arc<dyn ListingProvider>,
        activity: Arc<dyn ActivityLog>,
        ttl_seconds: u64,
    ) -> Self {
        Self {
            store,
            provider,
            activity,
            ttl: Duration::seconds(ttl_seconds as i64),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn is_stale(&self, vehicle: &Vehicle, now: DateTime<Utc>) -> bool {
        is_stale(vehicle, self.ttl, now)
    }

    fn claim(&self, id: Uuid) -> Option<Claim> {
        let mut map = self.in_flight.lock().ok()?;
        if let Some(sender) = map.get(&id) {
            return Some(Claim::Running(sender.subscribe()));
        }
        let (sender, _) = watch::channel(());
        map.insert(id, sender);
        Some(Claim::Owner(InFlight {
            map: self.in_flight.clone(),
            id,
        }))
    }

    /// Lanzar un refresco en segundo plano; el llamador no lo espera
    pub fn spawn_refresh(self: &Arc<Self>, vehicle: Vehicle) -> JoinHandle<()> {
        let refresher = Arc::clone(self);
        tokio::spawn(async move {
            let vin = vehicle.vin.clone();
            match refresher.refresh(&vehicle).await {
                RefreshOutcome::Failed(_) => warn!("⚠️ Refresco en segundo plano falló para VIN {}", vin),
                RefreshOutcome::Skipped(_) => debug!("🔄 Refresco de VIN {} ya en curso", vin),
                _ => debug!("✅ Refresco en segundo plano completado para VIN {}", vin),
            }
        })
    }

    /// Re-consultar el listado por VIN y aplicar la política de precios.
    /// Si ya hay un refresco del mismo vehículo en curso no hace nada.
    pub async fn refresh(&self, vehicle: &Vehicle) -> RefreshOutcome {
        let Some(id) = vehicle.persisted_id() else {
            return RefreshOutcome::Skipped(vehicle.clone());
        };
        match self.claim(id) {
            Some(Claim::Owner(_guard)) => self.run(vehicle, id).await,
            _ => RefreshOutcome::Skipped(vehicle.clone()),
        }
    }

    /// Como `refresh`, pero si otro refresco está en curso lo espera y
    /// devuelve el vehículo tal como quedó
    pub async fn refresh_or_join(&self, vehicle: &Vehicle) -> RefreshOutcome {
        let Some(id) = vehicle.persisted_id() else {
            return RefreshOutcome::Skipped(vehicle.clone());
        };
        let mut running = match self.claim(id) {
            Some(Claim::Owner(_guard)) => return self.run(vehicle, id).await,
            Some(Claim::Running(receiver)) => receiver,
            None => return RefreshOutcome::Skipped(vehicle.clone()),
        };

        debug!("⏳ Esperando refresco en curso del vehículo {}", id);
        // Solo termina cuando el dueño suelta el Sender
        while running.changed().await.is_ok() {}

        match self.store.find_by_id(id).await {
            Ok(Some(latest)) => RefreshOutcome::Joined(latest),
            Ok(None) => RefreshOutcome::Joined(vehicle.clone()),
            Err(e) => {
                error!("❌ No se pudo releer el vehículo {}: {}", id, e);
                RefreshOutcome::Skipped(vehicle.clone())
            }
        }
    }

    async fn run(&self, vehicle: &Vehicle, id: Uuid) -> RefreshOutcome {
        info!("🔄 Refrescando precio del vehículo {} (VIN {})", id, vehicle.vin);
        let now = Utc::now();

        let listing = match self.provider.fetch_listing_by_vin(&vehicle.vin).await {
            Ok(Some(listing)) => listing,
            Ok(None) => return self.mark_failed(vehicle, id, "listing no longer available").await,
            Err(e) => return self.mark_failed(vehicle, id, &e.to_string()).await,
        };
        let Some(new_price) = listing.positive_price() else {
            return self.mark_failed(vehicle, id, "listing has no price").await;
        };

        if !differs(new_price, vehicle.price_usd) {
            if let Err(e) = self.store.mark_synced(id, now).await {
                error!("❌ No se pudo marcar sincronizado el vehículo {}: {}", id, e);
                return RefreshOutcome::Failed(vehicle.clone());
            }
            let mut synced = vehicle.clone();
            synced.last_api_sync = Some(now);
            synced.api_sync_status = ApiSyncStatus::Synced;
            return RefreshOutcome::Unchanged(synced);
        }

        let entry = PriceHistoryEntry::new(vehicle.price_usd, new_price, SYNC_REASON, VehicleSource::Api, now);
        let metadata = json!({
            "old_price": vehicle.price_usd,
            "new_price": new_price,
            "change_amount": entry.change_amount,
            "change_percent": entry.change_percent,
        });

        match self.store.record_price_change(id, entry, Some(now)).await {
            Ok(updated) => {
                info!(
                    "💰 Precio actualizado para VIN {}: {} → {}",
                    vehicle.vin, vehicle.price_usd, new_price
                );
                self.log_activity(
                    ActivityRecord::new(
                        ActivityKind::PriceChanged,
                        Some(id),
                        &vehicle.vin,
                        format!("Price changed from {} to {}", vehicle.price_usd, new_price),
                    )
                    .with_metadata(metadata),
                )
                .await;
                RefreshOutcome::PriceChanged(updated)
            }
            Err(e) => {
                error!("❌ No se pudo guardar el nuevo precio de {}: {}", id, e);
                RefreshOutcome::Failed(vehicle.clone())
            }
        }
    }

    async fn mark_failed(&self, vehicle: &Vehicle, id: Uuid, reason: &str) -> RefreshOutcome {
        warn!("⚠️ Refresco fallido para VIN {}: {}", vehicle.vin, reason);

        if let Err(e) = self.store.set_sync_status(id, ApiSyncStatus::Outdated).await {
            error!("❌ No se pudo marcar OUTDATED el vehículo {}: {}", id, e);
        }
        self.log_activity(
            ActivityRecord::new(
                ActivityKind::RefreshFailed,
                Some(id),
                &vehicle.vin,
                format!("Price refresh failed: {}", reason),
            )
            .with_metadata(json!({ "last_known_price": vehicle.price_usd })),
        )
        .await;

        let mut outdated = vehicle.clone();
        outdated.api_sync_status = ApiSyncStatus::Outdated;
        RefreshOutcome::Failed(outdated)
    }

    async fn log_activity(&self, record: ActivityRecord) {
        if let Err(e) = self.activity.record(record).await {
            warn!("⚠️ No se pudo registrar actividad: {}", e);
        }
    }
}
