//! Normalización de las respuestas del proveedor de listados
//!
//! El proveedor devuelve campos presentes o ausentes según el anuncio; las
//! estructuras crudas son todas opcionales y `normalize_listing` es la única
//! puerta hacia las formas canónicas de `models::listing`.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

use crate::models::listing::{ExternalListing, Photo, Specifications};
use crate::utils::vin::parse_vin;

/// Página de resultados de búsqueda
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawListingsPage {
    #[serde(default)]
    pub listings: Vec<RawListing>,
    pub num_found: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawListing {
    pub id: Option<String>,
    pub vin: Option<String>,
    pub heading: Option<String>,
    pub price: Option<Value>,
    pub miles: Option<Value>,
    pub exterior_color: Option<String>,
    // Algunos anuncios traen los datos de fabricación en la raíz
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<Value>,
    pub build: Option<RawBuild>,
    pub dealer: Option<RawDealer>,
    pub media: Option<RawMedia>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawBuild {
    pub year: Option<Value>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub trim: Option<String>,
    pub body_type: Option<String>,
    pub fuel_type: Option<String>,
    pub transmission: Option<String>,
    pub drivetrain: Option<String>,
    pub engine: Option<String>,
    pub doors: Option<Value>,
    pub std_seating: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDealer {
    pub name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMedia {
    #[serde(default)]
    pub photo_links: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSpecifications {
    pub engine: Option<String>,
    pub horsepower: Option<Value>,
    pub drivetrain: Option<String>,
    pub transmission: Option<String>,
    pub fuel_type: Option<String>,
    pub doors: Option<Value>,
    pub std_seating: Option<Value>,
    pub exterior_color: Option<String>,
    pub interior_color: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
}

/// Convertir un listado crudo a la forma canónica.
///
/// Devuelve `None` si falta un VIN válido, la marca, el modelo o el año.
pub fn normalize_listing(raw: &RawListing) -> Option<ExternalListing> {
    let vin = raw.vin.as_deref().and_then(parse_vin)?;
    let build = raw.build.clone().unwrap_or_default();

    let make = non_empty(build.make.as_ref().or(raw.make.as_ref()))?;
    let model = non_empty(build.model.as_ref().or(raw.model.as_ref()))?;
    let year = build
        .year
        .as_ref()
        .or(raw.year.as_ref())
        .and_then(value_to_i32)?;

    Some(ExternalListing {
        vin,
        listing_id: non_empty(raw.id.as_ref()),
        make,
        model,
        year,
        trim: non_empty(build.trim.as_ref()),
        price_usd: raw.price.as_ref().and_then(value_to_decimal),
        mileage: raw.miles.as_ref().and_then(value_to_i32),
        body_type: non_empty(build.body_type.as_ref()),
        fuel_type: non_empty(build.fuel_type.as_ref()),
        transmission: non_empty(build.transmission.as_ref()),
        exterior_color: non_empty(raw.exterior_color.as_ref()),
        region: raw.dealer.as_ref().and_then(|d| non_empty(d.state.as_ref())),
        dealer_name: raw.dealer.as_ref().and_then(|d| non_empty(d.name.as_ref())),
        photo_urls: raw
            .media
            .as_ref()
            .map(|m| clean_links(&m.photo_links))
            .unwrap_or_default(),
    })
}

/// Normalizar una página completa descartando los listados inválidos
pub fn normalize_page(page: &RawListingsPage) -> Vec<ExternalListing> {
    page.listings.iter().filter_map(normalize_listing).collect()
}

pub fn normalize_photos(media: &RawMedia) -> Vec<Photo> {
    clean_links(&media.photo_links)
        .into_iter()
        .enumerate()
        .map(|(index, url)| Photo {
            url,
            is_primary: index == 0,
            caption: None,
        })
        .collect()
}

pub fn normalize_specifications(raw: &RawSpecifications) -> Specifications {
    Specifications {
        engine: non_empty(raw.engine.as_ref()),
        horsepower: raw.horsepower.as_ref().and_then(value_to_i32),
        drivetrain: non_empty(raw.drivetrain.as_ref()),
        transmission: non_empty(raw.transmission.as_ref()),
        fuel_type: non_empty(raw.fuel_type.as_ref()),
        doors: raw.doors.as_ref().and_then(value_to_i32),
        seats: raw.std_seating.as_ref().and_then(value_to_i32),
        exterior_color: non_empty(raw.exterior_color.as_ref()),
        interior_color: non_empty(raw.interior_color.as_ref()),
        features: raw
            .features
            .iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect(),
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn clean_links(links: &[String]) -> Vec<String> {
    links
        .iter()
        .map(|l| l.trim())
        .filter(|l| l.starts_with("http"))
        .map(str::to_string)
        .collect()
}

/// Números que llegan como número JSON o como texto ("$24,500")
fn value_to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            Decimal::from_str(&cleaned).ok()
        }
        _ => None,
    }
}

fn value_to_i32(value: &Value) -> Option<i32> {
    let decimal = value_to_decimal(value)?;
    decimal.trunc().to_string().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawListing {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_normalize_nested_build() {
        let listing = normalize_listing(&raw(json!({
            "id": "abc-1",
            "vin": "1hgcm82633a004352",
            "price": 24500,
            "miles": "38,120",
            "build": { "year": 2021, "make": "Honda", "model": "Accord", "body_type": "Sedan" },
            "dealer": { "name": "Best Cars", "state": "TX" },
            "media": { "photo_links": ["https://img/1.jpg", "", "https://img/2.jpg"] }
        })))
        .unwrap();

        assert_eq!(listing.vin, "1HGCM82633A004352");
        assert_eq!(listing.price_usd, Some(dec!(24500)));
        assert_eq!(listing.mileage, Some(38120));
        assert_eq!(listing.region.as_deref(), Some("TX"));
        assert_eq!(listing.photo_urls.len(), 2);
    }

    #[test]
    fn test_normalize_flat_fields_and_string_price() {
        let listing = normalize_listing(&raw(json!({
            "vin": "5YJSA1E26HF000001",
            "make": "Tesla",
            "model": "Model S",
            "year": "2017",
            "price": "$31,999.50"
        })))
        .unwrap();
        assert_eq!(listing.year, 2017);
        assert_eq!(listing.price_usd, Some(dec!(31999.50)));
        assert!(listing.photo_urls.is_empty());
    }

    #[test]
    fn test_listings_without_identity_are_discarded() {
        assert!(normalize_listing(&raw(json!({ "make": "Honda", "model": "Civic", "year": 2020 }))).is_none());
        assert!(normalize_listing(&raw(json!({ "vin": "BAD", "make": "Honda", "model": "Civic", "year": 2020 }))).is_none());
        assert!(normalize_listing(&raw(json!({ "vin": "1HGCM82633A004352", "model": "Civic", "year": 2020 }))).is_none());

        let page: RawListingsPage = serde_json::from_value(json!({
            "num_found": 2,
            "listings": [
                { "vin": "1HGCM82633A004352", "make": "Honda", "model": "Accord", "year": 2003 },
                { "vin": null }
            ]
        }))
        .unwrap();
        assert_eq!(normalize_page(&page).len(), 1);
    }

    #[test]
    fn test_normalize_specifications() {
        let specs: RawSpecifications = serde_json::from_value(json!({
            "engine": "2.0L I4",
            "horsepower": "252",
            "std_seating": 5,
            "features": ["Sunroof", " "]
        }))
        .unwrap();
        let specs = normalize_specifications(&specs);
        assert_eq!(specs.horsepower, Some(252));
        assert_eq!(specs.seats, Some(5));
        assert_eq!(specs.features, vec!["Sunroof"]);
    }
}
