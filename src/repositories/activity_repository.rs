use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::ActivityLog;
use crate::models::activity::ActivityRecord;
use crate::utils::errors::{AppError, AppResult};

#[derive(Debug, sqlx::FromRow)]
struct ActivityRow {
    id: Uuid,
    kind: String,
    vehicle_id: Option<Uuid>,
    vin: String,
    actor_id: Option<Uuid>,
    message: String,
    metadata: Json<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ActivityRow> for ActivityRecord {
    type Error = AppError;

    fn try_from(row: ActivityRow) -> Result<Self, Self::Error> {
        Ok(ActivityRecord {
            id: row.id,
            kind: row.kind.parse().map_err(AppError::Internal)?,
            vehicle_id: row.vehicle_id,
            vin: row.vin,
            actor_id: row.actor_id,
            message: row.message,
            metadata: row.metadata.0,
            created_at: row.created_at,
        })
    }
}

pub struct PgActivityLog {
    pool: PgPool,
}

impl PgActivityLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityLog for PgActivityLog {
    async fn record(&self, record: ActivityRecord) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO vehicle_activity (id, kind, vehicle_id, vin, actor_id, message, metadata, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(record.id)
        .bind(record.kind.as_str())
        .bind(record.vehicle_id)
        .bind(&record.vin)
        .bind(record.actor_id)
        .bind(&record.message)
        .bind(Json(&record.metadata))
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent(&self, vehicle_id: Option<Uuid>, limit: i64) -> AppResult<Vec<ActivityRecord>> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            "SELECT id, kind, vehicle_id, vin, actor_id, message, metadata, created_at \
             FROM vehicle_activity WHERE ($1::uuid IS NULL OR vehicle_id = $1) \
             ORDER BY created_at DESC LIMIT $2",
        )
        .bind(vehicle_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ActivityRecord::try_from).collect()
    }
}
