use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::VehicleStore;
use crate::models::listing::{Photo, Specifications};
use crate::models::vehicle::{
    ApiSyncStatus, NewVehicle, Pagination, PriceHistoryEntry, SortKey, SortOrder, Vehicle,
    VehicleFilters, VehicleId, VehicleUpdate,
};
use crate::utils::errors::{conflict_error, is_unique_violation, not_found_error, AppError, AppResult};

const VEHICLE_COLUMNS: &str = "id, vin, slug, make, model, year, trim, price_usd, mileage, \
    body_type, fuel_type, transmission, exterior_color, region, status, featured, source, \
    api_sync_status, last_api_sync, external_listing_id, price_history, photos, specifications, \
    view_count, created_at, updated_at";

// Fila de la tabla vehicles
#[derive(Debug, sqlx::FromRow)]
struct VehicleRow {
    id: Uuid,
    vin: String,
    slug: String,
    make: String,
    model: String,
    year: i32,
    trim: Option<String>,
    price_usd: Decimal,
    mileage: Option<i32>,
    body_type: Option<String>,
    fuel_type: Option<String>,
    transmission: Option<String>,
    exterior_color: Option<String>,
    region: Option<String>,
    status: String,
    featured: bool,
    source: String,
    api_sync_status: String,
    last_api_sync: Option<DateTime<Utc>>,
    external_listing_id: Option<String>,
    price_history: Json<Vec<PriceHistoryEntry>>,
    photos: Json<Vec<Photo>>,
    specifications: Option<Json<Specifications>>,
    view_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<VehicleRow> for Vehicle {
    type Error = AppError;

    fn try_from(row: VehicleRow) -> Result<Self, Self::Error> {
        Ok(Vehicle {
            id: VehicleId::Persisted(row.id),
            vin: row.vin,
            slug: row.slug,
            make: row.make,
            model: row.model,
            year: row.year,
            trim: row.trim,
            price_usd: row.price_usd,
            mileage: row.mileage,
            body_type: row.body_type,
            fuel_type: row.fuel_type,
            transmission: row.transmission,
            exterior_color: row.exterior_color,
            region: row.region,
            status: row.status.parse().map_err(AppError::Internal)?,
            featured: row.featured,
            source: row.source.parse().map_err(AppError::Internal)?,
            api_sync_status: row.api_sync_status.parse().map_err(AppError::Internal)?,
            last_api_sync: row.last_api_sync,
            external_listing_id: row.external_listing_id,
            price_history: row.price_history.0,
            photos: row.photos.0,
            specifications: row.specifications.map(|s| s.0),
            view_count: row.view_count,
            is_temporary: false,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct PgVehicleStore {
    pool: PgPool,
}

impl PgVehicleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Agregar el WHERE de los filtros (la búsqueda libre nunca mira la marca)
fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filters: &VehicleFilters) {
    qb.push(" WHERE deleted_at IS NULL");

    if let Some(make) = non_empty(&filters.make) {
        qb.push(" AND LOWER(make) = LOWER(").push_bind(make).push(")");
    }
    if let Some(model) = non_empty(&filters.model) {
        qb.push(" AND LOWER(model) = LOWER(").push_bind(model).push(")");
    }
    if let Some(year) = filters.year_min {
        qb.push(" AND year >= ").push_bind(year);
    }
    if let Some(year) = filters.year_max {
        qb.push(" AND year <= ").push_bind(year);
    }
    if let Some(price) = filters.price_min {
        qb.push(" AND price_usd >= ").push_bind(price);
    }
    if let Some(price) = filters.price_max {
        qb.push(" AND price_usd <= ").push_bind(price);
    }
    if let Some(mileage) = filters.mileage_max {
        qb.push(" AND (mileage IS NULL OR mileage <= ").push_bind(mileage).push(")");
    }
    if let Some(body_type) = non_empty(&filters.body_type) {
        qb.push(" AND LOWER(body_type) = LOWER(").push_bind(body_type).push(")");
    }
    if let Some(status) = filters.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(region) = non_empty(&filters.region) {
        qb.push(" AND LOWER(region) = LOWER(").push_bind(region).push(")");
    }
    if let Some(term) = non_empty(&filters.search) {
        let pattern = format!("%{}%", term.to_lowercase());
        qb.push(" AND (LOWER(model) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(vin) LIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn order_clause(filters: &VehicleFilters) -> String {
    let Some(key) = filters.sort_by else {
        return " ORDER BY featured DESC, created_at DESC".to_string();
    };
    let column = match key {
        SortKey::Price => "price_usd",
        SortKey::Year => "year",
        SortKey::Mileage => "mileage",
        SortKey::CreatedAt => "created_at",
    };
    let direction = match filters.sort_order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };
    format!(" ORDER BY {} {} NULLS LAST, id", column, direction)
}

#[async_trait]
impl VehicleStore for PgVehicleStore {
    async fn search(
        &self,
        filters: &VehicleFilters,
        pagination: Pagination,
    ) -> AppResult<(Vec<Vehicle>, i64)> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM vehicles");
        push_filters(&mut count_qb, filters);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM vehicles", VEHICLE_COLUMNS));
        push_filters(&mut qb, filters);
        qb.push(order_clause(filters));
        qb.push(" LIMIT ")
            .push_bind(pagination.limit as i64)
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let rows = qb.build_query_as::<VehicleRow>().fetch_all(&self.pool).await?;
        let vehicles = rows
            .into_iter()
            .map(Vehicle::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((vehicles, total))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Vehicle>> {
        let row = sqlx::query_as::<_, VehicleRow>(&format!(
            "SELECT {} FROM vehicles WHERE id = $1 AND deleted_at IS NULL",
            VEHICLE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Vehicle::try_from).transpose()
    }

    async fn find_by_vin(&self, vin: &str) -> AppResult<Option<Vehicle>> {
        let row = sqlx::query_as::<_, VehicleRow>(&format!(
            "SELECT {} FROM vehicles WHERE vin = $1 AND deleted_at IS NULL",
            VEHICLE_COLUMNS
        ))
        .bind(vin)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Vehicle::try_from).transpose()
    }

    async fn find_existing_vins(&self, vins: &[String]) -> AppResult<HashSet<String>> {
        if vins.is_empty() {
            return Ok(HashSet::new());
        }
        // Incluye borrados: el VIN sigue reservado
        let existing: Vec<String> = sqlx::query_scalar("SELECT vin FROM vehicles WHERE vin = ANY($1)")
            .bind(vins)
            .fetch_all(&self.pool)
            .await?;

        Ok(existing.into_iter().collect())
    }

    async fn insert(&self, vehicle: NewVehicle) -> AppResult<Vehicle> {
        let now = Utc::now();
        let slug = vehicle.slug();

        let row = sqlx::query_as::<_, VehicleRow>(&format!(
            r#"
            INSERT INTO vehicles (
                id, vin, slug, make, model, year, trim, price_usd, mileage, body_type,
                fuel_type, transmission, exterior_color, region, status, featured, source,
                api_sync_status, last_api_sync, external_listing_id, price_history, photos,
                specifications, view_count, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18, $19, $20, '[]'::jsonb, $21, $22, 0, $23, $23)
            RETURNING {}
            "#,
            VEHICLE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&vehicle.vin)
        .bind(slug)
        .bind(&vehicle.make)
        .bind(&vehicle.model)
        .bind(vehicle.year)
        .bind(&vehicle.trim)
        .bind(vehicle.price_usd)
        .bind(vehicle.mileage)
        .bind(&vehicle.body_type)
        .bind(&vehicle.fuel_type)
        .bind(&vehicle.transmission)
        .bind(&vehicle.exterior_color)
        .bind(&vehicle.region)
        .bind(vehicle.status.as_str())
        .bind(vehicle.featured)
        .bind(vehicle.source.as_str())
        .bind(vehicle.api_sync_status.as_str())
        .bind(vehicle.last_api_sync)
        .bind(&vehicle.external_listing_id)
        .bind(Json(&vehicle.photos))
        .bind(vehicle.specifications.as_ref().map(Json))
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                conflict_error("Vehicle", "VIN", &vehicle.vin)
            } else {
                AppError::Database(e)
            }
        })?;

        row.try_into()
    }

    async fn update(&self, id: Uuid, update: VehicleUpdate) -> AppResult<Vehicle> {
        let row = sqlx::query_as::<_, VehicleRow>(&format!(
            r#"
            UPDATE vehicles SET
                mileage = COALESCE($2, mileage),
                status = COALESCE($3, status),
                featured = COALESCE($4, featured),
                body_type = COALESCE($5, body_type),
                region = COALESCE($6, region),
                api_sync_status = COALESCE($7, api_sync_status),
                last_api_sync = COALESCE($8, last_api_sync),
                external_listing_id = COALESCE($9, external_listing_id),
                photos = COALESCE($10, photos),
                specifications = COALESCE($11, specifications),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {}
            "#,
            VEHICLE_COLUMNS
        ))
        .bind(id)
        .bind(update.mileage)
        .bind(update.status.map(|s| s.as_str()))
        .bind(update.featured)
        .bind(update.body_type)
        .bind(update.region)
        .bind(update.api_sync_status.map(|s| s.as_str()))
        .bind(update.last_api_sync)
        .bind(update.external_listing_id)
        .bind(update.photos.map(Json))
        .bind(update.specifications.map(Json))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found_error("Vehicle", &id.to_string()))?;

        row.try_into()
    }

    async fn record_price_change(
        &self,
        id: Uuid,
        entry: PriceHistoryEntry,
        synced_at: Option<DateTime<Utc>>,
    ) -> AppResult<Vehicle> {
        let price = entry.price;
        let sql = format!(
            r#"
            UPDATE vehicles SET
                price_usd = $2,
                price_history = price_history || $3::jsonb,
                last_api_sync = COALESCE($4, last_api_sync),
                api_sync_status = CASE WHEN $4 IS NULL THEN api_sync_status ELSE 'SYNCED' END,
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {}
            "#,
            VEHICLE_COLUMNS
        );

        let row = sqlx::query_as::<_, VehicleRow>(&sql)
            .bind(id)
            .bind(price)
            .bind(Json(vec![entry]))
            .bind(synced_at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found_error("Vehicle", &id.to_string()))?;

        row.try_into()
    }

    async fn mark_synced(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query(
            "UPDATE vehicles SET last_api_sync = $2, api_sync_status = 'SYNCED', updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_sync_status(&self, id: Uuid, status: ApiSyncStatus) -> AppResult<()> {
        sqlx::query("UPDATE vehicles SET api_sync_status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn increment_view_count(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE vehicles SET view_count = view_count + 1 WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn soft_delete(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE vehicles SET deleted_at = $2, updated_at = $2 WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
