//! Actor resolution and policy enforcement

pub mod middleware;
pub mod store;

pub use middleware::{actor_middleware, enforce_policy, CurrentActor, PolicyGuard};
pub use store::ActorStore;
