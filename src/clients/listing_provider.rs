//! Cliente HTTP del proveedor externo de listados
//!
//! Un 404 significa "no existe" (no es error); cualquier otro status no 2xx
//! es una falla transitoria.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

use super::listing_mapper::{
    normalize_listing, normalize_page, normalize_photos, normalize_specifications, RawListing,
    RawListingsPage, RawMedia, RawSpecifications,
};
use crate::models::listing::{ExternalListing, ListingQuery, Photo, Specifications};

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("listing provider transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("listing provider returned status {0}")]
    Status(u16),

    #[error("listing provider payload could not be decoded: {0}")]
    Decode(String),
}

/// Contrato del proveedor externo de inventario
#[async_trait]
pub trait ListingProvider: Send + Sync {
    async fn fetch_listings(&self, query: &ListingQuery) -> Result<Vec<ExternalListing>, ProviderError>;

    async fn fetch_listing_by_vin(&self, vin: &str) -> Result<Option<ExternalListing>, ProviderError>;

    async fn fetch_photos(&self, vin: &str) -> Result<Vec<Photo>, ProviderError>;

    async fn fetch_specifications(&self, vin: &str) -> Result<Option<Specifications>, ProviderError>;
}

/// Configuración del proveedor
#[derive(Debug, Clone)]
pub struct ListingProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

pub struct HttpListingProvider {
    client: Client,
    config: ListingProviderConfig,
}

impl HttpListingProvider {
    pub fn new(config: ListingProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// GET + JSON; `Ok(None)` en 404
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Option<T>, ProviderError> {
        let url = self.url(path);
        let mut request = self.client.get(&url).query(params);
        if let Some(key) = &self.config.api_key {
            request = request.query(&[("api_key", key)]);
        }

        log::debug!("🌐 GET {}", url);
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            log::debug!("🔍 Proveedor sin resultados (404) para {}", path);
            return Ok(None);
        }
        if !status.is_success() {
            log::warn!("⚠️ Proveedor respondió {} para {}", status, path);
            return Err(ProviderError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }

    fn vin_path(prefix: &str, vin: &str, suffix: &str) -> String {
        format!("{}/{}{}", prefix, urlencoding::encode(vin), suffix)
    }
}

#[async_trait]
impl ListingProvider for HttpListingProvider {
    async fn fetch_listings(&self, query: &ListingQuery) -> Result<Vec<ExternalListing>, ProviderError> {
        let page: Option<RawListingsPage> = self.get_json("search", &query.to_params()).await?;
        let listings = page.map(|p| normalize_page(&p)).unwrap_or_default();
        log::info!("📦 Proveedor devolvió {} listados válidos", listings.len());
        Ok(listings)
    }

    async fn fetch_listing_by_vin(&self, vin: &str) -> Result<Option<ExternalListing>, ProviderError> {
        let raw: Option<RawListing> = self
            .get_json(&Self::vin_path("listing/vin", vin, ""), &[])
            .await?;
        Ok(raw.as_ref().and_then(normalize_listing))
    }

    async fn fetch_photos(&self, vin: &str) -> Result<Vec<Photo>, ProviderError> {
        let media: Option<RawMedia> = self
            .get_json(&Self::vin_path("listing/vin", vin, "/media"), &[])
            .await?;
        Ok(media.map(|m| normalize_photos(&m)).unwrap_or_default())
    }

    async fn fetch_specifications(&self, vin: &str) -> Result<Option<Specifications>, ProviderError> {
        let raw: Option<RawSpecifications> = self
            .get_json(&Self::vin_path("specs/vin", vin, ""), &[])
            .await?;
        Ok(raw.map(|r| normalize_specifications(&r)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let provider = HttpListingProvider::new(ListingProviderConfig {
            base_url: "https://listings.example.com/v2/".into(),
            api_key: None,
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        assert_eq!(provider.url("search"), "https://listings.example.com/v2/search");
        assert_eq!(
            HttpListingProvider::vin_path("listing/vin", "1HGCM82633A004352", "/media"),
            "listing/vin/1HGCM82633A004352/media"
        );
    }
}
