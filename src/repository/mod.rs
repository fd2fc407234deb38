//! Database repository layer

pub mod audit_repo;
pub mod geography_repo;
pub mod observation_repo;
pub mod role_repo;
pub mod user_repo;

pub use audit_repo::*;
pub use geography_repo::*;
pub use observation_repo::*;
pub use role_repo::*;
pub use user_repo::*;
