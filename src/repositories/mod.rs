//! Repositorios
//!
//! Contratos de persistencia usados por los servicios. Cada contrato tiene
//! una implementación PostgreSQL (sqlx) y una en memoria (`memory`).

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::activity::ActivityRecord;
use crate::models::fee_settings::FeeSettings;
use crate::models::order::{
    AdminNote, Cancellation, Order, OrderPriority, OrderStatus, RefundRequest, StatusTransition,
};
use crate::models::payment::Payment;
use crate::models::profile::ShippingAddress;
use crate::models::vehicle::{
    ApiSyncStatus, NewVehicle, Pagination, PriceHistoryEntry, Vehicle, VehicleFilters,
    VehicleUpdate,
};
use crate::utils::errors::AppResult;

pub mod activity_repository;
pub mod fee_settings_repository;
pub mod memory;
pub mod order_repository;
pub mod profile_repository;
pub mod vehicle_repository;

pub use activity_repository::PgActivityLog;
pub use fee_settings_repository::PgFeeSettingsStore;
pub use order_repository::PgOrderStore;
pub use profile_repository::PgProfileDirectory;
pub use vehicle_repository::PgVehicleStore;

/// Vehicle Store: dueño exclusivo de los vehículos persistidos.
///
/// Los registros borrados (soft delete) son invisibles para todas las
/// consultas pero siguen reservando su VIN.
#[async_trait]
pub trait VehicleStore: Send + Sync {
    /// Página filtrada y conteo total de coincidencias
    async fn search(
        &self,
        filters: &VehicleFilters,
        pagination: Pagination,
    ) -> AppResult<(Vec<Vehicle>, i64)>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Vehicle>>;

    async fn find_by_vin(&self, vin: &str) -> AppResult<Option<Vehicle>>;

    /// Subconjunto de `vins` que ya existe en el store (una sola consulta)
    async fn find_existing_vins(&self, vins: &[String]) -> AppResult<HashSet<String>>;

    /// Insertar; `Conflict` si el VIN ya existe
    async fn insert(&self, vehicle: NewVehicle) -> AppResult<Vehicle>;

    async fn update(&self, id: Uuid, update: VehicleUpdate) -> AppResult<Vehicle>;

    /// Nuevo precio + entrada de historial. Con `synced_at` también marca SYNCED.
    async fn record_price_change(
        &self,
        id: Uuid,
        entry: PriceHistoryEntry,
        synced_at: Option<DateTime<Utc>>,
    ) -> AppResult<Vehicle>;

    /// Solo avanza `last_api_sync` y marca SYNCED
    async fn mark_synced(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()>;

    async fn set_sync_status(&self, id: Uuid, status: ApiSyncStatus) -> AppResult<()>;

    async fn increment_view_count(&self, id: Uuid) -> AppResult<()>;

    /// `false` si no existía o ya estaba borrado
    async fn soft_delete(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<bool>;
}

/// Filtros del listado de órdenes
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
}

/// Order Store. Toda escritura de estado es compare-and-set contra
/// `StatusTransition::expected`: si el estado cambió, `Conflict`.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// `Conflict` si el número de solicitud ya existe
    async fn insert(&self, order: &Order) -> AppResult<()>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Order>>;

    async fn find_many(&self, ids: &[Uuid]) -> AppResult<Vec<Order>>;

    async fn list(&self, filter: &OrderFilter, pagination: Pagination) -> AppResult<(Vec<Order>, i64)>;

    /// Transición atómica; opcionalmente guarda la cancelación
    async fn transition(
        &self,
        transition: &StatusTransition,
        cancellation: Option<&Cancellation>,
    ) -> AppResult<Order>;

    /// Todas las transiciones en una transacción, o ninguna
    async fn apply_batch(&self, transitions: &[StatusTransition]) -> AppResult<Vec<Order>>;

    /// `Conflict` si ya existe una solicitud de reembolso
    async fn set_refund_request(&self, order_id: Uuid, request: &RefundRequest) -> AppResult<Order>;

    async fn set_priority(&self, order_id: Uuid, priority: OrderPriority) -> AppResult<Order>;

    async fn set_tags(&self, order_id: Uuid, tags: &[String]) -> AppResult<Order>;

    async fn add_note(&self, note: &AdminNote) -> AppResult<()>;

    async fn list_notes(&self, order_id: Uuid, include_internal: bool) -> AppResult<Vec<AdminNote>>;

    async fn insert_payment(&self, payment: &Payment) -> AppResult<()>;

    async fn find_payment_by_reference(&self, reference: &str) -> AppResult<Option<Payment>>;

    /// Pagos de una orden, del más antiguo al más reciente
    async fn list_payments(&self, order_id: Uuid) -> AppResult<Vec<Payment>>;

    /// En una transacción: pago PENDING → COMPLETED, suma el monto pagado a
    /// la orden y aplica la transición si la hay. `Conflict` si el pago ya no
    /// estaba pendiente o el estado de la orden cambió.
    async fn complete_payment(
        &self,
        payment_id: Uuid,
        completed_at: DateTime<Utc>,
        amount_usd: Decimal,
        transition: Option<&StatusTransition>,
    ) -> AppResult<(Payment, Order)>;
}

/// Configuración de tarifas (fila única)
#[async_trait]
pub trait FeeSettingsStore: Send + Sync {
    /// Leer, creando los valores por defecto si no existen
    async fn load_or_init(&self, defaults: &FeeSettings) -> AppResult<FeeSettings>;

    async fn save(&self, settings: &FeeSettings) -> AppResult<FeeSettings>;
}

/// Log de actividad del inventario
#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn record(&self, record: ActivityRecord) -> AppResult<()>;

    async fn recent(&self, vehicle_id: Option<Uuid>, limit: i64) -> AppResult<Vec<ActivityRecord>>;
}

/// Colaborador de perfiles/direcciones
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn default_shipping_address(&self, user_id: Uuid) -> AppResult<Option<ShippingAddress>>;
}
