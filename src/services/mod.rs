//! Business logic services layer

pub mod access_engine;
pub mod audit_service;
pub mod geography_catalog;
pub mod observation_service;
pub mod query_filter;
pub mod role_registry;
pub mod scope_resolver;
pub mod user_service;

pub use access_engine::AccessDecisionEngine;
pub use audit_service::AuditService;
pub use geography_catalog::GeographicEntityCatalog;
pub use observation_service::ObservationService;
pub use query_filter::{Predicate, QueryFilterBuilder, ResourceLocationColumns};
pub use role_registry::RoleHierarchyRegistry;
pub use scope_resolver::{LocationScope, LocationScopeResolver};
pub use user_service::UserService;
