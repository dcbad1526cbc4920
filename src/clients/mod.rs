//! Clients - HTTP Clients for External APIs
//!
//! This module contains HTTP clients for communicating with external APIs:
//! the vehicle listing provider and the exchange-rate source.

pub mod exchange_rate;
pub mod listing_mapper;
pub mod listing_provider;

pub use exchange_rate::{ExchangeRateService, HttpRateSource, RateSource};
pub use listing_provider::{HttpListingProvider, ListingProvider, ListingProviderConfig, ProviderError};
