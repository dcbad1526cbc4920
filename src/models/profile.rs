//! Dirección de envío provista por el servicio de perfiles/direcciones

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Copia de la dirección de envío por defecto del perfil
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShippingAddress {
    pub address_id: Uuid,
    pub full_name: String,
    pub phone: Option<String>,
    pub street: String,
    pub city: String,
    pub state: Option<String>,
    pub country: String,
    pub postal_code: Option<String>,
}
