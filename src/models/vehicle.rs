//! Modelo de Vehicle
//!
//! Un vehículo vive en uno de dos ciclos de vida: persistido (propiedad del
//! Vehicle Store, con id durable) o temporal (construido desde el proveedor
//! externo, nunca escrito, con id `temp-<VIN>`). El VIN es la clave natural.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use super::listing::{ExternalListing, Photo, Specifications};
use crate::utils::vin::{self, TEMP_ID_PREFIX};

/// Origen del registro
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleSource {
    Manual,
    Api,
}

/// Estado de sincronización con el proveedor externo
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiSyncStatus {
    Synced,
    Pending,
    Failed,
    Outdated,
}

/// Disponibilidad comercial del vehículo
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleStatus {
    Available,
    Reserved,
    Sold,
    Inactive,
}

text_enum!(VehicleSource { Manual => "MANUAL", Api => "API" });
text_enum!(ApiSyncStatus {
    Synced => "SYNCED",
    Pending => "PENDING",
    Failed => "FAILED",
    Outdated => "OUTDATED",
});
text_enum!(VehicleStatus {
    Available => "AVAILABLE",
    Reserved => "RESERVED",
    Sold => "SOLD",
    Inactive => "INACTIVE",
});

/// Identidad de un vehículo: durable o temporal (`temp-<VIN>`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VehicleId {
    Persisted(Uuid),
    Temporary(String),
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VehicleId::Persisted(id) => write!(f, "{}", id),
            VehicleId::Temporary(vin) => write!(f, "{}{}", TEMP_ID_PREFIX, vin),
        }
    }
}

impl FromStr for VehicleId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(vin) = vin::vin_from_temp_id(s) {
            return Ok(VehicleId::Temporary(vin));
        }
        Uuid::parse_str(s.trim())
            .map(VehicleId::Persisted)
            .map_err(|_| format!("invalid vehicle id '{}'", s))
    }
}

impl Serialize for VehicleId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VehicleId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Entrada del historial de precios (solo se agregan, nunca se modifican)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceHistoryEntry {
    pub recorded_at: DateTime<Utc>,
    pub price: Decimal,
    pub previous_price: Decimal,
    pub change_amount: Decimal,
    pub change_percent: Decimal,
    pub reason: String,
    pub source: VehicleSource,
}

impl PriceHistoryEntry {
    pub fn new(
        previous_price: Decimal,
        price: Decimal,
        reason: impl Into<String>,
        source: VehicleSource,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        let change_amount = price - previous_price;
        let change_percent = if previous_price.is_zero() {
            Decimal::ZERO
        } else {
            (change_amount / previous_price * Decimal::ONE_HUNDRED).round_dp(2)
        };
        Self {
            recorded_at,
            price,
            previous_price,
            change_amount,
            change_percent,
            reason: reason.into(),
            source,
        }
    }
}

/// Vehículo canónico, persistido o temporal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub vin: String,
    pub slug: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub trim: Option<String>,
    pub price_usd: Decimal,
    pub mileage: Option<i32>,
    pub body_type: Option<String>,
    pub fuel_type: Option<String>,
    pub transmission: Option<String>,
    pub exterior_color: Option<String>,
    pub region: Option<String>,
    pub status: VehicleStatus,
    pub featured: bool,
    pub source: VehicleSource,
    pub api_sync_status: ApiSyncStatus,
    pub last_api_sync: Option<DateTime<Utc>>,
    pub external_listing_id: Option<String>,
    pub price_history: Vec<PriceHistoryEntry>,
    pub photos: Vec<Photo>,
    pub specifications: Option<Specifications>,
    pub view_count: i64,
    pub is_temporary: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vehicle {
    /// Construir un vehículo temporal desde un listado externo.
    ///
    /// Devuelve `None` si el listado no trae un precio positivo.
    pub fn ephemeral(
        listing: &ExternalListing,
        photos: Vec<Photo>,
        specifications: Option<Specifications>,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let price_usd = listing.positive_price()?;
        let photos = if photos.is_empty() {
            listing.photos()
        } else {
            photos
        };

        Some(Self {
            id: VehicleId::Temporary(listing.vin.clone()),
            vin: listing.vin.clone(),
            slug: vin::vehicle_slug(&listing.make, &listing.model, listing.year, &listing.vin),
            make: listing.make.clone(),
            model: listing.model.clone(),
            year: listing.year,
            trim: listing.trim.clone(),
            price_usd,
            mileage: listing.mileage,
            body_type: listing.body_type.clone(),
            fuel_type: listing.fuel_type.clone(),
            transmission: listing.transmission.clone(),
            exterior_color: listing.exterior_color.clone(),
            region: listing.region.clone(),
            status: VehicleStatus::Available,
            featured: false,
            source: VehicleSource::Api,
            api_sync_status: ApiSyncStatus::Pending,
            last_api_sync: None,
            external_listing_id: listing.listing_id.clone(),
            price_history: Vec::new(),
            photos,
            specifications,
            view_count: 0,
            is_temporary: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Id durable, si el vehículo está persistido
    pub fn persisted_id(&self) -> Option<Uuid> {
        match self.id {
            VehicleId::Persisted(id) => Some(id),
            VehicleId::Temporary(_) => None,
        }
    }
}

/// Datos para insertar un vehículo nuevo en el store
#[derive(Debug, Clone)]
pub struct NewVehicle {
    pub vin: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub trim: Option<String>,
    pub price_usd: Decimal,
    pub mileage: Option<i32>,
    pub body_type: Option<String>,
    pub fuel_type: Option<String>,
    pub transmission: Option<String>,
    pub exterior_color: Option<String>,
    pub region: Option<String>,
    pub status: VehicleStatus,
    pub featured: bool,
    pub source: VehicleSource,
    pub api_sync_status: ApiSyncStatus,
    pub last_api_sync: Option<DateTime<Utc>>,
    pub external_listing_id: Option<String>,
    pub photos: Vec<Photo>,
    pub specifications: Option<Specifications>,
}

impl NewVehicle {
    pub fn slug(&self) -> String {
        vin::vehicle_slug(&self.make, &self.model, self.year, &self.vin)
    }

    /// Registro sincronizado a partir de un listado externo (promoción)
    pub fn from_listing(
        listing: &ExternalListing,
        price_usd: Decimal,
        photos: Vec<Photo>,
        specifications: Option<Specifications>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            vin: listing.vin.clone(),
            make: listing.make.clone(),
            model: listing.model.clone(),
            year: listing.year,
            trim: listing.trim.clone(),
            price_usd,
            mileage: listing.mileage,
            body_type: listing.body_type.clone(),
            fuel_type: listing.fuel_type.clone(),
            transmission: listing.transmission.clone(),
            exterior_color: listing.exterior_color.clone(),
            region: listing.region.clone(),
            status: VehicleStatus::Available,
            featured: false,
            source: VehicleSource::Api,
            api_sync_status: ApiSyncStatus::Synced,
            last_api_sync: Some(now),
            external_listing_id: listing.listing_id.clone(),
            photos,
            specifications,
        }
    }
}

/// Cambios parciales sobre un vehículo persistido
#[derive(Debug, Clone, Default)]
pub struct VehicleUpdate {
    pub mileage: Option<i32>,
    pub status: Option<VehicleStatus>,
    pub featured: Option<bool>,
    pub body_type: Option<String>,
    pub region: Option<String>,
    pub api_sync_status: Option<ApiSyncStatus>,
    pub last_api_sync: Option<DateTime<Utc>>,
    pub external_listing_id: Option<String>,
    pub photos: Option<Vec<Photo>>,
    pub specifications: Option<Specifications>,
}

/// Campo de ordenamiento explícito
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Price,
    Year,
    Mileage,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortKey {
    /// Comparar por este campo; un kilometraje ausente siempre va al final
    pub fn compare(&self, a: &Vehicle, b: &Vehicle, order: SortOrder) -> Ordering {
        let ordering = match self {
            SortKey::Price => a.price_usd.cmp(&b.price_usd),
            SortKey::Year => a.year.cmp(&b.year),
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            SortKey::Mileage => match (a.mileage, b.mileage) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => return Ordering::Less,
                (None, Some(_)) => return Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        };
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// Orden por defecto de los persistidos: destacados primero, luego los más recientes
pub fn default_ordering(a: &Vehicle, b: &Vehicle) -> Ordering {
    b.featured
        .cmp(&a.featured)
        .then_with(|| b.created_at.cmp(&a.created_at))
}

/// Filtros para búsqueda de vehículos
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehicleFilters {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
    pub mileage_max: Option<i32>,
    pub body_type: Option<String>,
    pub status: Option<VehicleStatus>,
    pub region: Option<String>,
    /// Texto libre; solo se busca en modelo y VIN (nunca en marca)
    pub search: Option<String>,
    pub sort_by: Option<SortKey>,
    #[serde(default)]
    pub sort_order: SortOrder,
}

impl VehicleFilters {
    /// Sin filtro de marca ni de tipo de carrocería
    pub fn is_unscoped(&self) -> bool {
        self.make.as_deref().map_or(true, |m| m.trim().is_empty())
            && self.body_type.as_deref().map_or(true, |b| b.trim().is_empty())
    }

    /// Evaluar los filtros sobre un vehículo en memoria
    pub fn matches(&self, vehicle: &Vehicle) -> bool {
        fn eq_ci(filter: &Option<String>, value: &str) -> bool {
            filter
                .as_deref()
                .map_or(true, |f| f.trim().is_empty() || f.trim().eq_ignore_ascii_case(value))
        }
        fn eq_ci_opt(filter: &Option<String>, value: &Option<String>) -> bool {
            match filter.as_deref().map(str::trim) {
                None | Some("") => true,
                Some(f) => value.as_deref().map_or(false, |v| f.eq_ignore_ascii_case(v)),
            }
        }

        if !eq_ci(&self.make, &vehicle.make) || !eq_ci(&self.model, &vehicle.model) {
            return false;
        }
        if !eq_ci_opt(&self.body_type, &vehicle.body_type)
            || !eq_ci_opt(&self.region, &vehicle.region)
        {
            return false;
        }
        if self.year_min.map_or(false, |y| vehicle.year < y)
            || self.year_max.map_or(false, |y| vehicle.year > y)
        {
            return false;
        }
        if self.price_min.map_or(false, |p| vehicle.price_usd < p)
            || self.price_max.map_or(false, |p| vehicle.price_usd > p)
        {
            return false;
        }
        if let Some(max) = self.mileage_max {
            if vehicle.mileage.map_or(false, |m| m > max) {
                return false;
            }
        }
        if self.status.map_or(false, |s| s != vehicle.status) {
            return false;
        }
        if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let term = term.to_lowercase();
            if !vehicle.model.to_lowercase().contains(&term)
                && !vehicle.vin.to_lowercase().contains(&term)
            {
                return false;
            }
        }
        true
    }
}

/// Paginación normalizada: page ≥ 1, limit ∈ [1, 100]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    pub const MAX_LIMIT: u32 = 100;
    pub const DEFAULT_LIMIT: u32 = 20;

    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Página combinada de resultados persistidos + temporales
#[derive(Debug, Clone, Serialize)]
pub struct VehicleListResult {
    pub items: Vec<Vehicle>,
    pub total: i64,
    pub page: u32,
    pub pages: i64,
    pub external_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_pagination_clamps() {
        assert_eq!(Pagination::new(Some(0), Some(0)), Pagination { page: 1, limit: 1 });
        assert_eq!(Pagination::new(Some(3), Some(500)).limit, 100);
        assert_eq!(Pagination::new(Some(3), Some(10)).offset(), 20);
    }

    #[test]
    fn test_vehicle_id_parsing() {
        let temp: VehicleId = "temp-1HGCM82633A004352".parse().unwrap();
        assert_eq!(temp, VehicleId::Temporary("1HGCM82633A004352".into()));
        assert_eq!(temp.to_string(), "temp-1HGCM82633A004352");

        let id = Uuid::new_v4();
        let persisted: VehicleId = id.to_string().parse().unwrap();
        assert_eq!(persisted, VehicleId::Persisted(id));
        assert!("garbage".parse::<VehicleId>().is_err());
    }

    #[test]
    fn test_price_history_entry_delta() {
        let entry = PriceHistoryEntry::new(
            dec!(20000),
            dec!(19000),
            "api_sync",
            VehicleSource::Api,
            Utc::now(),
        );
        assert_eq!(entry.change_amount, dec!(-1000));
        assert_eq!(entry.change_percent, dec!(-5.00));
    }

    #[test]
    fn test_text_enums() {
        assert_eq!("api".parse::<VehicleSource>(), Ok(VehicleSource::Api));
        assert_eq!(ApiSyncStatus::Outdated.as_str(), "OUTDATED");
        assert!("BROKEN".parse::<VehicleStatus>().is_err());
    }
}
