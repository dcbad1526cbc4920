//! Registros de actividad del inventario (log de auditoría)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    PriceChanged,
    RefreshFailed,
    VehiclePromoted,
    VehicleCreated,
    VehicleDeleted,
}

text_enum!(ActivityKind {
    PriceChanged => "PRICE_CHANGED",
    RefreshFailed => "REFRESH_FAILED",
    VehiclePromoted => "VEHICLE_PROMOTED",
    VehicleCreated => "VEHICLE_CREATED",
    VehicleDeleted => "VEHICLE_DELETED",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityRecord {
    pub id: Uuid,
    pub kind: ActivityKind,
    pub vehicle_id: Option<Uuid>,
    pub vin: String,
    pub actor_id: Option<Uuid>,
    pub message: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl ActivityRecord {
    pub fn new(kind: ActivityKind, vehicle_id: Option<Uuid>, vin: &str, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            vehicle_id,
            vin: vin.to_string(),
            actor_id: None,
            message: message.into(),
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    pub fn with_actor(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
