//! Repositorios en memoria
//!
//! Implementan los mismos contratos que los repositorios PostgreSQL. Se usan
//! en los tests y para levantar el servicio sin base de datos.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ActivityLog, FeeSettingsStore, OrderFilter, OrderStore, ProfileDirectory, VehicleStore};
use crate::models::activity::ActivityRecord;
use crate::models::fee_settings::FeeSettings;
use crate::models::order::{
    AdminNote, Cancellation, Order, OrderPriority, RefundRequest, StatusTransition,
};
use crate::models::payment::{Payment, PaymentStatus};
use crate::models::profile::ShippingAddress;
use crate::models::vehicle::{
    default_ordering, ApiSyncStatus, NewVehicle, Pagination, PriceHistoryEntry, Vehicle,
    VehicleFilters, VehicleId, VehicleUpdate,
};
use crate::utils::errors::{conflict_error, not_found_error, AppError, AppResult};

fn page_of<T: Clone>(items: &[T], pagination: Pagination) -> Vec<T> {
    items
        .iter()
        .skip(pagination.offset() as usize)
        .take(pagination.limit as usize)
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Vehículos
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct StoredVehicle {
    vehicle: Vehicle,
    deleted_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct MemoryVehicleStore {
    vehicles: RwLock<HashMap<Uuid, StoredVehicle>>,
    existence_queries: AtomicUsize,
}

impl MemoryVehicleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Guardar un vehículo ya formado (id persistido requerido)
    pub async fn seed(&self, mut vehicle: Vehicle) -> Uuid {
        let id = vehicle.persisted_id().unwrap_or_else(Uuid::new_v4);
        vehicle.id = VehicleId::Persisted(id);
        vehicle.is_temporary = false;
        self.vehicles.write().await.insert(
            id,
            StoredVehicle {
                vehicle,
                deleted_at: None,
            },
        );
        id
    }

    /// Vehículos visibles
    pub async fn count(&self) -> usize {
        self.vehicles
            .read()
            .await
            .values()
            .filter(|v| v.deleted_at.is_none())
            .count()
    }

    /// Número de consultas de existencia de VINs realizadas
    pub fn existence_queries(&self) -> usize {
        self.existence_queries.load(Ordering::SeqCst)
    }

    async fn modify<F>(&self, id: Uuid, change: F) -> AppResult<Vehicle>
    where
        F: FnOnce(&mut Vehicle) + Send,
    {
        let mut vehicles = self.vehicles.write().await;
        let stored = vehicles
            .get_mut(&id)
            .filter(|v| v.deleted_at.is_none())
            .ok_or_else(|| not_found_error("Vehicle", &id.to_string()))?;
        change(&mut stored.vehicle);
        stored.vehicle.updated_at = Utc::now();
        Ok(stored.vehicle.clone())
    }
}

#[async_trait]
impl VehicleStore for MemoryVehicleStore {
    async fn search(
        &self,
        filters: &VehicleFilters,
        pagination: Pagination,
    ) -> AppResult<(Vec<Vehicle>, i64)> {
        let vehicles = self.vehicles.read().await;
        let mut matches: Vec<Vehicle> = vehicles
            .values()
            .filter(|v| v.deleted_at.is_none() && filters.matches(&v.vehicle))
            .map(|v| v.vehicle.clone())
            .collect();

        match filters.sort_by {
            Some(key) => matches.sort_by(|a, b| key.compare(a, b, filters.sort_order)),
            None => matches.sort_by(default_ordering),
        }

        let total = matches.len() as i64;
        Ok((page_of(&matches, pagination), total))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Vehicle>> {
        Ok(self
            .vehicles
            .read()
            .await
            .get(&id)
            .filter(|v| v.deleted_at.is_none())
            .map(|v| v.vehicle.clone()))
    }

    async fn find_by_vin(&self, vin: &str) -> AppResult<Option<Vehicle>> {
        Ok(self
            .vehicles
            .read()
            .await
            .values()
            .find(|v| v.deleted_at.is_none() && v.vehicle.vin == vin)
            .map(|v| v.vehicle.clone()))
    }

    async fn find_existing_vins(&self, vins: &[String]) -> AppResult<HashSet<String>> {
        self.existence_queries.fetch_add(1, Ordering::SeqCst);
        let wanted: HashSet<&str> = vins.iter().map(String::as_str).collect();
        Ok(self
            .vehicles
            .read()
            .await
            .values()
            .filter(|v| wanted.contains(v.vehicle.vin.as_str()))
            .map(|v| v.vehicle.vin.clone())
            .collect())
    }

    async fn insert(&self, vehicle: NewVehicle) -> AppResult<Vehicle> {
        let mut vehicles = self.vehicles.write().await;
        if vehicles.values().any(|v| v.vehicle.vin == vehicle.vin) {
            return Err(conflict_error("Vehicle", "VIN", &vehicle.vin));
        }

        let now = Utc::now();
        let id = Uuid::new_v4();
        let slug = vehicle.slug();
        let stored = Vehicle {
            id: VehicleId::Persisted(id),
            vin: vehicle.vin,
            slug,
            make: vehicle.make,
            model: vehicle.model,
            year: vehicle.year,
            trim: vehicle.trim,
            price_usd: vehicle.price_usd,
            mileage: vehicle.mileage,
            body_type: vehicle.body_type,
            fuel_type: vehicle.fuel_type,
            transmission: vehicle.transmission,
            exterior_color: vehicle.exterior_color,
            region: vehicle.region,
            status: vehicle.status,
            featured: vehicle.featured,
            source: vehicle.source,
            api_sync_status: vehicle.api_sync_status,
            last_api_sync: vehicle.last_api_sync,
            external_listing_id: vehicle.external_listing_id,
            price_history: Vec::new(),
            photos: vehicle.photos,
            specifications: vehicle.specifications,
            view_count: 0,
            is_temporary: false,
            created_at: now,
            updated_at: now,
        };
        vehicles.insert(
            id,
            StoredVehicle {
                vehicle: stored.clone(),
                deleted_at: None,
            },
        );
        Ok(stored)
    }

    async fn update(&self, id: Uuid, update: VehicleUpdate) -> AppResult<Vehicle> {
        self.modify(id, move |v| {
            if let Some(mileage) = update.mileage {
                v.mileage = Some(mileage);
            }
            if let Some(status) = update.status {
                v.status = status;
            }
            if let Some(featured) = update.featured {
                v.featured = featured;
            }
            if update.body_type.is_some() {
                v.body_type = update.body_type;
            }
            if update.region.is_some() {
                v.region = update.region;
            }
            if let Some(status) = update.api_sync_status {
                v.api_sync_status = status;
            }
            if update.last_api_sync.is_some() {
                v.last_api_sync = update.last_api_sync;
            }
            if update.external_listing_id.is_some() {
                v.external_listing_id = update.external_listing_id;
            }
            if let Some(photos) = update.photos {
                v.photos = photos;
            }
            if update.specifications.is_some() {
                v.specifications = update.specifications;
            }
        })
        .await
    }

    async fn record_price_change(
        &self,
        id: Uuid,
        entry: PriceHistoryEntry,
        synced_at: Option<DateTime<Utc>>,
    ) -> AppResult<Vehicle> {
        self.modify(id, move |v| {
            v.price_usd = entry.price;
            v.price_history.push(entry);
            if let Some(at) = synced_at {
                v.last_api_sync = Some(at);
                v.api_sync_status = ApiSyncStatus::Synced;
            }
        })
        .await
    }

    async fn mark_synced(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        self.modify(id, move |v| {
            v.last_api_sync = Some(at);
            v.api_sync_status = ApiSyncStatus::Synced;
        })
        .await
        .map(|_| ())
    }

    async fn set_sync_status(&self, id: Uuid, status: ApiSyncStatus) -> AppResult<()> {
        self.modify(id, move |v| v.api_sync_status = status)
            .await
            .map(|_| ())
    }

    async fn increment_view_count(&self, id: Uuid) -> AppResult<()> {
        let mut vehicles = self.vehicles.write().await;
        if let Some(stored) = vehicles.get_mut(&id).filter(|v| v.deleted_at.is_none()) {
            stored.vehicle.view_count += 1;
        }
        Ok(())
    }

    async fn soft_delete(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<bool> {
        let mut vehicles = self.vehicles.write().await;
        match vehicles.get_mut(&id).filter(|v| v.deleted_at.is_none()) {
            Some(stored) => {
                stored.deleted_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ---------------------------------------------------------------------------
// Órdenes, notas y pagos
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<Uuid, Order>>,
    notes: RwLock<Vec<AdminNote>>,
    payments: RwLock<HashMap<Uuid, Payment>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sobrescribir una orden tal cual (simula escrituras concurrentes)
    pub async fn put(&self, order: Order) {
        self.orders.write().await.insert(order.id, order);
    }

    fn check_expected(orders: &HashMap<Uuid, Order>, transition: &StatusTransition) -> AppResult<()> {
        let order = orders
            .get(&transition.order_id)
            .ok_or_else(|| not_found_error("Order", &transition.order_id.to_string()))?;
        if order.status != transition.expected {
            return Err(AppError::Conflict(format!(
                "Order {} changed concurrently (now {})",
                order.id, order.status
            )));
        }
        Ok(())
    }

    fn modify<F>(orders: &mut HashMap<Uuid, Order>, order_id: Uuid, change: F) -> AppResult<Order>
    where
        F: FnOnce(&mut Order),
    {
        let order = orders
            .get_mut(&order_id)
            .ok_or_else(|| not_found_error("Order", &order_id.to_string()))?;
        change(order);
        Ok(order.clone())
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: &Order) -> AppResult<()> {
        let mut orders = self.orders.write().await;
        if orders.values().any(|o| o.request_number == order.request_number) {
            return Err(conflict_error("Order", "request number", &order.request_number));
        }
        orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn find_many(&self, ids: &[Uuid]) -> AppResult<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(ids.iter().filter_map(|id| orders.get(id).cloned()).collect())
    }

    async fn list(&self, filter: &OrderFilter, pagination: Pagination) -> AppResult<(Vec<Order>, i64)> {
        let orders = self.orders.read().await;
        let mut matches: Vec<Order> = orders
            .values()
            .filter(|o| filter.user_id.map_or(true, |u| o.user_id == u))
            .filter(|o| filter.status.map_or(true, |s| o.status == s))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matches.len() as i64;
        Ok((page_of(&matches, pagination), total))
    }

    async fn transition(
        &self,
        transition: &StatusTransition,
        cancellation: Option<&Cancellation>,
    ) -> AppResult<Order> {
        let mut orders = self.orders.write().await;
        Self::check_expected(&orders, transition)?;
        Self::modify(&mut orders, transition.order_id, |order| {
            order.apply_transition(transition.next, transition.actor, transition.at);
            if let Some(cancellation) = cancellation {
                order.cancellation = Some(cancellation.clone());
            }
        })
    }

    async fn apply_batch(&self, transitions: &[StatusTransition]) -> AppResult<Vec<Order>> {
        let mut orders = self.orders.write().await;
        // Verificar todo antes de escribir: bajo el mismo lock equivale a una transacción
        for transition in transitions {
            Self::check_expected(&orders, transition)?;
        }

        transitions
            .iter()
            .map(|t| {
                Self::modify(&mut orders, t.order_id, |order| {
                    order.apply_transition(t.next, t.actor, t.at)
                })
            })
            .collect()
    }

    async fn set_refund_request(&self, order_id: Uuid, request: &RefundRequest) -> AppResult<Order> {
        let mut orders = self.orders.write().await;
        let already = orders
            .get(&order_id)
            .ok_or_else(|| not_found_error("Order", &order_id.to_string()))?
            .refund_request
            .is_some();
        if already {
            return Err(AppError::Conflict(format!(
                "A refund has already been requested for order {}",
                order_id
            )));
        }
        Self::modify(&mut orders, order_id, |order| {
            order.refund_request = Some(request.clone());
            order.updated_at = request.requested_at;
        })
    }

    async fn set_priority(&self, order_id: Uuid, priority: OrderPriority) -> AppResult<Order> {
        let mut orders = self.orders.write().await;
        Self::modify(&mut orders, order_id, |order| {
            order.priority = priority;
            order.updated_at = Utc::now();
        })
    }

    async fn set_tags(&self, order_id: Uuid, tags: &[String]) -> AppResult<Order> {
        let mut orders = self.orders.write().await;
        Self::modify(&mut orders, order_id, |order| {
            order.tags = tags.to_vec();
            order.updated_at = Utc::now();
        })
    }

    async fn add_note(&self, note: &AdminNote) -> AppResult<()> {
        self.notes.write().await.push(note.clone());
        Ok(())
    }

    async fn list_notes(&self, order_id: Uuid, include_internal: bool) -> AppResult<Vec<AdminNote>> {
        Ok(self
            .notes
            .read()
            .await
            .iter()
            .filter(|n| n.order_id == order_id && (include_internal || !n.is_internal))
            .cloned()
            .collect())
    }

    async fn insert_payment(&self, payment: &Payment) -> AppResult<()> {
        let mut payments = self.payments.write().await;
        if payments.values().any(|p| p.reference == payment.reference) {
            return Err(conflict_error("Payment", "reference", &payment.reference));
        }
        payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn find_payment_by_reference(&self, reference: &str) -> AppResult<Option<Payment>> {
        Ok(self
            .payments
            .read()
            .await
            .values()
            .find(|p| p.reference == reference)
            .cloned())
    }

    async fn list_payments(&self, order_id: Uuid) -> AppResult<Vec<Payment>> {
        let mut payments: Vec<Payment> = self
            .payments
            .read()
            .await
            .values()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }

    async fn complete_payment(
        &self,
        payment_id: Uuid,
        completed_at: DateTime<Utc>,
        amount_usd: Decimal,
        transition: Option<&StatusTransition>,
    ) -> AppResult<(Payment, Order)> {
        let mut payments = self.payments.write().await;
        let mut orders = self.orders.write().await;

        let payment = payments
            .get(&payment_id)
            .ok_or_else(|| not_found_error("Payment", &payment_id.to_string()))?;
        if payment.status != PaymentStatus::Pending {
            return Err(AppError::Conflict(format!("Payment {} is no longer pending", payment_id)));
        }
        let order_id = payment.order_id;
        if !orders.contains_key(&order_id) {
            return Err(not_found_error("Order", &order_id.to_string()));
        }
        if let Some(transition) = transition {
            Self::check_expected(&orders, transition)?;
        }

        // Validado todo: aplicar ambos cambios
        let order = Self::modify(&mut orders, order_id, |order| {
            order.amount_paid_usd += amount_usd;
            order.updated_at = completed_at;
            if let Some(t) = transition {
                order.apply_transition(t.next, t.actor, t.at);
            }
        })?;
        let payment = payments
            .get_mut(&payment_id)
            .ok_or_else(|| not_found_error("Payment", &payment_id.to_string()))?;
        payment.status = PaymentStatus::Completed;
        payment.completed_at = Some(completed_at);

        Ok((payment.clone(), order))
    }
}

// ---------------------------------------------------------------------------
// Tarifas, actividad y perfiles
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryFeeSettingsStore {
    settings: RwLock<Option<FeeSettings>>,
}

impl MemoryFeeSettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FeeSettingsStore for MemoryFeeSettingsStore {
    async fn load_or_init(&self, defaults: &FeeSettings) -> AppResult<FeeSettings> {
        let mut settings = self.settings.write().await;
        Ok(settings.get_or_insert_with(|| defaults.clone()).clone())
    }

    async fn save(&self, settings: &FeeSettings) -> AppResult<FeeSettings> {
        *self.settings.write().await = Some(settings.clone());
        Ok(settings.clone())
    }
}

#[derive(Default)]
pub struct MemoryActivityLog {
    records: RwLock<Vec<ActivityRecord>>,
}

impl MemoryActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<ActivityRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl ActivityLog for MemoryActivityLog {
    async fn record(&self, record: ActivityRecord) -> AppResult<()> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn recent(&self, vehicle_id: Option<Uuid>, limit: i64) -> AppResult<Vec<ActivityRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .rev()
            .filter(|r| vehicle_id.map_or(true, |id| r.vehicle_id == Some(id)))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryProfileDirectory {
    addresses: RwLock<HashMap<Uuid, ShippingAddress>>,
}

impl MemoryProfileDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_default_address(&self, user_id: Uuid, address: ShippingAddress) {
        self.addresses.write().await.insert(user_id, address);
    }
}

#[async_trait]
impl ProfileDirectory for MemoryProfileDirectory {
    async fn default_shipping_address(&self, user_id: Uuid) -> AppResult<Option<ShippingAddress>> {
        Ok(self.addresses.read().await.get(&user_id).cloned())
    }
}
