//! Database schema, models and queries

pub mod init;
pub mod models;
pub mod settings;
pub mod tenants;

pub use init::*;
pub use models::*;
pub use settings::*;
pub use tenants::*;
