//! Services module
//!
//! Este módulo contiene la lógica de negocio: resolución de vehículos,
//! inventario, precios, órdenes y pagos.

pub mod inventory_service;
pub mod order_service;
pub mod payment_service;
pub mod pricing_service;
pub mod vehicle_refresh;
pub mod vehicle_resolution;

pub use inventory_service::InventoryService;
pub use order_service::{OrderConfig, OrderService};
pub use payment_service::{ManualPaymentGateway, PaymentGateway, PaymentService};
pub use pricing_service::{PricingConfig, PricingService};
pub use vehicle_refresh::VehicleRefresher;
pub use vehicle_resolution::{IdentifierKind, ResolutionConfig, VehicleResolutionEngine};
