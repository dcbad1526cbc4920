pub mod common_dto;
pub mod order_dto;
pub mod pricing_dto;
pub mod vehicle_dto;

pub use common_dto::{ApiResponse, PagedResponse};
