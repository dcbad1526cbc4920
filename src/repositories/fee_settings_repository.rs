use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::FeeSettingsStore;
use crate::models::fee_settings::FeeSettings;
use crate::utils::errors::AppResult;

const FEE_COLUMNS: &str = "import_duty_percent, vat_percent, ciss_percent, inspection_fee, \
    sourcing_fee, handling_fee, shipping_fee, clearing_fee, port_charges, local_delivery_fee, \
    updated_at, updated_by";

// Fila única (id = 1)
#[derive(Debug, sqlx::FromRow)]
struct FeeSettingsRow {
    import_duty_percent: Decimal,
    vat_percent: Decimal,
    ciss_percent: Decimal,
    inspection_fee: Decimal,
    sourcing_fee: Decimal,
    handling_fee: Decimal,
    shipping_fee: Decimal,
    clearing_fee: Decimal,
    port_charges: Decimal,
    local_delivery_fee: Decimal,
    updated_at: DateTime<Utc>,
    updated_by: Option<Uuid>,
}

impl From<FeeSettingsRow> for FeeSettings {
    fn from(row: FeeSettingsRow) -> Self {
        FeeSettings {
            import_duty_percent: row.import_duty_percent,
            vat_percent: row.vat_percent,
            ciss_percent: row.ciss_percent,
            inspection_fee: row.inspection_fee,
            sourcing_fee: row.sourcing_fee,
            handling_fee: row.handling_fee,
            shipping_fee: row.shipping_fee,
            clearing_fee: row.clearing_fee,
            port_charges: row.port_charges,
            local_delivery_fee: row.local_delivery_fee,
            updated_at: row.updated_at,
            updated_by: row.updated_by,
        }
    }
}

pub struct PgFeeSettingsStore {
    pool: PgPool,
}

impl PgFeeSettingsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn upsert(&self, settings: &FeeSettings, overwrite: bool) -> AppResult<FeeSettings> {
        let conflict = if overwrite {
            "ON CONFLICT (id) DO UPDATE SET \
                import_duty_percent = EXCLUDED.import_duty_percent, \
                vat_percent = EXCLUDED.vat_percent, \
                ciss_percent = EXCLUDED.ciss_percent, \
                inspection_fee = EXCLUDED.inspection_fee, \
                sourcing_fee = EXCLUDED.sourcing_fee, \
                handling_fee = EXCLUDED.handling_fee, \
                shipping_fee = EXCLUDED.shipping_fee, \
                clearing_fee = EXCLUDED.clearing_fee, \
                port_charges = EXCLUDED.port_charges, \
                local_delivery_fee = EXCLUDED.local_delivery_fee, \
                updated_at = EXCLUDED.updated_at, \
                updated_by = EXCLUDED.updated_by"
        } else {
            "ON CONFLICT (id) DO NOTHING"
        };

        sqlx::query(&format!(
            "INSERT INTO fee_settings (id, {}) \
             VALUES (1, $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) {}",
            FEE_COLUMNS, conflict
        ))
        .bind(settings.import_duty_percent)
        .bind(settings.vat_percent)
        .bind(settings.ciss_percent)
        .bind(settings.inspection_fee)
        .bind(settings.sourcing_fee)
        .bind(settings.handling_fee)
        .bind(settings.shipping_fee)
        .bind(settings.clearing_fee)
        .bind(settings.port_charges)
        .bind(settings.local_delivery_fee)
        .bind(settings.updated_at)
        .bind(settings.updated_by)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, FeeSettingsRow>(&format!(
            "SELECT {} FROM fee_settings WHERE id = 1",
            FEE_COLUMNS
        ))
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }
}

#[async_trait]
impl FeeSettingsStore for PgFeeSettingsStore {
    async fn load_or_init(&self, defaults: &FeeSettings) -> AppResult<FeeSettings> {
        let row = sqlx::query_as::<_, FeeSettingsRow>(&format!(
            "SELECT {} FROM fee_settings WHERE id = 1",
            FEE_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.into()),
            None => {
                info!("💾 Creando configuración de tarifas por defecto");
                self.upsert(defaults, false).await
            }
        }
    }

    async fn save(&self, settings: &FeeSettings) -> AppResult<FeeSettings> {
        self.upsert(settings, true).await
    }
}
