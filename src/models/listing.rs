//! Listados del proveedor externo en forma canónica
//!
//! El esquema crudo del proveedor nunca pasa de `clients::listing_mapper`;
//! aquí solo viven las formas ya normalizadas.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Listado externo normalizado (VIN ya validado y en mayúsculas)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalListing {
    pub vin: String,
    pub listing_id: Option<String>,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub trim: Option<String>,
    pub price_usd: Option<Decimal>,
    pub mileage: Option<i32>,
    pub body_type: Option<String>,
    pub fuel_type: Option<String>,
    pub transmission: Option<String>,
    pub exterior_color: Option<String>,
    pub region: Option<String>,
    pub dealer_name: Option<String>,
    #[serde(default)]
    pub photo_urls: Vec<String>,
}

impl ExternalListing {
    /// Precio solo si es estrictamente positivo
    pub fn positive_price(&self) -> Option<Decimal> {
        self.price_usd.filter(|p| *p > Decimal::ZERO)
    }

    /// Fotos embebidas en el propio listado
    pub fn photos(&self) -> Vec<Photo> {
        self.photo_urls
            .iter()
            .enumerate()
            .map(|(index, url)| Photo {
                url: url.clone(),
                is_primary: index == 0,
                caption: None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Photo {
    pub url: String,
    #[serde(default)]
    pub is_primary: bool,
    pub caption: Option<String>,
}

/// Especificaciones técnicas
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Specifications {
    pub engine: Option<String>,
    pub horsepower: Option<i32>,
    pub drivetrain: Option<String>,
    pub transmission: Option<String>,
    pub fuel_type: Option<String>,
    pub doors: Option<i32>,
    pub seats: Option<i32>,
    pub exterior_color: Option<String>,
    pub interior_color: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
}

/// Parámetros de búsqueda en el vocabulario del proveedor
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ListingQuery {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
    pub miles_max: Option<i32>,
    pub body_type: Option<String>,
    pub page: u32,
    pub per_page: u32,
}

impl ListingQuery {
    /// Pares clave/valor para la query string del proveedor
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(make) = &self.make {
            params.push(("make", make.clone()));
        }
        if let Some(model) = &self.model {
            params.push(("model", model.clone()));
        }
        if let Some(year) = self.year_min {
            params.push(("year_min", year.to_string()));
        }
        if let Some(year) = self.year_max {
            params.push(("year_max", year.to_string()));
        }
        if let Some(price) = self.price_min {
            params.push(("price_min", price.to_string()));
        }
        if let Some(price) = self.price_max {
            params.push(("price_max", price.to_string()));
        }
        if let Some(miles) = self.miles_max {
            params.push(("miles_max", miles.to_string()));
        }
        if let Some(body) = &self.body_type {
            params.push(("body_type", body.clone()));
        }
        params.push(("page", self.page.to_string()));
        params.push(("per_page", self.per_page.to_string()));
        params
    }

    /// Checksum estable de la consulta, usado en claves de cache
    pub fn checksum(&self) -> String {
        let serialized = serde_json::to_string(self).unwrap_or_default();
        format!("{:x}", md5::compute(serialized.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_positive_price_filters_zero() {
        let mut listing = ExternalListing {
            vin: "1HGCM82633A004352".into(),
            listing_id: None,
            make: "Honda".into(),
            model: "Accord".into(),
            year: 2003,
            trim: None,
            price_usd: Some(dec!(0)),
            mileage: None,
            body_type: None,
            fuel_type: None,
            transmission: None,
            exterior_color: None,
            region: None,
            dealer_name: None,
            photo_urls: vec!["a.jpg".into(), "b.jpg".into()],
        };
        assert_eq!(listing.positive_price(), None);
        listing.price_usd = Some(dec!(4500));
        assert_eq!(listing.positive_price(), Some(dec!(4500)));

        let photos = listing.photos();
        assert!(photos[0].is_primary);
        assert!(!photos[1].is_primary);
    }

    #[test]
    fn test_query_checksum_is_stable() {
        let query = ListingQuery {
            make: Some("Toyota".into()),
            page: 1,
            per_page: 20,
            ..Default::default()
        };
        assert_eq!(query.checksum(), query.clone().checksum());
        let other = ListingQuery { page: 2, ..query.clone() };
        assert_ne!(query.checksum(), other.checksum());
        assert!(query.to_params().contains(&("make", "Toyota".to_string())));
    }
}
