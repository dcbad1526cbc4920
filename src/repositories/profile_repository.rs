use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::ProfileDirectory;
use crate::models::profile::ShippingAddress;
use crate::utils::errors::AppResult;

// Lectura de la dirección por defecto; el CRUD de perfiles vive en otro servicio
#[derive(Debug, sqlx::FromRow)]
struct AddressRow {
    id: Uuid,
    full_name: String,
    phone: Option<String>,
    street: String,
    city: String,
    state: Option<String>,
    country: String,
    postal_code: Option<String>,
}

impl From<AddressRow> for ShippingAddress {
    fn from(row: AddressRow) -> Self {
        ShippingAddress {
            address_id: row.id,
            full_name: row.full_name,
            phone: row.phone,
            street: row.street,
            city: row.city,
            state: row.state,
            country: row.country,
            postal_code: row.postal_code,
        }
    }
}

pub struct PgProfileDirectory {
    pool: PgPool,
}

impl PgProfileDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileDirectory for PgProfileDirectory {
    async fn default_shipping_address(&self, user_id: Uuid) -> AppResult<Option<ShippingAddress>> {
        let row = sqlx::query_as::<_, AddressRow>(
            "SELECT id, full_name, phone, street, city, state, country, postal_code \
             FROM addresses WHERE user_id = $1 AND is_default = TRUE AND deleted_at IS NULL \
             LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ShippingAddress::from))
    }
}
