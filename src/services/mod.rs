pub mod companies;
pub mod orders;
pub mod pricing;
pub mod serials;

pub use companies::CompanyService;
pub use orders::OrderService;
