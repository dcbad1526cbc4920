use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::listing::{Photo, Specifications};
use crate::models::vehicle::{Pagination, SortKey, SortOrder, VehicleFilters, VehicleStatus};
use crate::services::vehicle_resolution::IdentifierKind;
use crate::utils::validation::{validate_positive_amount, validate_vin};

// Query string del listado de vehículos
#[derive(Debug, Default, Deserialize)]
pub struct VehicleListQuery {
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
    pub search: Option<String>,
    pub sort_by: Option<SortKey>,
    pub sort_order: Option<SortOrder>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub include_external: Option<bool>,
}

impl VehicleListQuery {
    /// Separar filtros, paginación y la bandera de listados externos
    pub fn into_parts(self) -> (VehicleFilters, Pagination, bool) {
        let pagination = Pagination::new(self.page, self.limit);
        let include_external = self.include_external.unwrap_or(true);
        let filters = VehicleFilters {
            make: self.make,
            model: self.model,
            year_min: self.year_min,
            year_max: self.year_max,
            price_min: self.price_min,
            price_max: self.price_max,
            mileage_max: self.mileage_max,
            body_type: self.body_type,
            status: self.status,
            region: self.region,
            search: self.search,
            sort_by: self.sort_by,
            sort_order: self.sort_order.unwrap_or_default(),
        };
        (filters, pagination, include_external)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct VehicleLookupQuery {
    #[serde(default)]
    pub kind: IdentifierKind,
}

// Request para crear un vehículo manual
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateVehicleRequest {
    #[validate(custom = "validate_vin")]
    pub vin: String,
    #[validate(length(min = 1, max = 64))]
    pub make: String,
    #[validate(length(min = 1, max = 64))]
    pub model: String,
    #[validate(range(min = 1900, max = 2100))]
    pub year: i32,
    pub trim: Option<String>,
    #[validate(custom = "validate_positive_amount")]
    pub price_usd: Decimal,
    #[validate(range(min = 0))]
    pub mileage: Option<i32>,
    pub body_type: Option<String>,
    pub fuel_type: Option<String>,
    pub transmission: Option<String>,
    pub exterior_color: Option<String>,
    pub region: Option<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub photos: Vec<Photo>,
    pub specifications: Option<Specifications>,
}

// Request para cambiar el precio de un vehículo
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateVehiclePriceRequest {
    #[validate(custom = "validate_positive_amount")]
    pub price_usd: Decimal,
    #[validate(length(max = 200))]
    pub reason: Option<String>,
}

// Request para actualizar un vehículo
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateVehicleRequest {
    #[validate(range(min = 0))]
    pub mileage: Option<i32>,
    pub status: Option<VehicleStatus>,
    pub featured: Option<bool>,
    pub body_type: Option<String>,
    pub region: Option<String>,
    pub photos: Option<Vec<Photo>>,
    pub specifications: Option<Specifications>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub vehicle_id: Option<Uuid>,
    pub limit: Option<i64>,
}

// Response de purga de cache
#[derive(Debug, Serialize)]
pub struct CachePurgeResponse {
    pub deleted_keys: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_list_query_defaults() {
        let (filters, pagination, include_external) = VehicleListQuery::default().into_parts();
        assert!(include_external);
        assert_eq!(pagination, Pagination::default());
        assert_eq!(filters.sort_order, SortOrder::Desc);
        assert!(filters.is_unscoped());
    }

    #[test]
    fn test_create_request_validation() {
        let request = CreateVehicleRequest {
            vin: "1HGCM82633A00435O".into(),
            make: "Honda".into(),
            model: "".into(),
            year: 2003,
            trim: None,
            price_usd: dec!(0),
            mileage: Some(-5),
            body_type: None,
            fuel_type: None,
            transmission: None,
            exterior_color: None,
            region: None,
            featured: false,
            photos: vec![],
            specifications: None,
        };
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("vin"));
        assert!(fields.contains_key("model"));
        assert!(fields.contains_key("price_usd"));
        assert!(fields.contains_key("mileage"));
    }
}
