//! Inventory client: the read-only collaborator the reconciler pulls
//! environments/hosts/stacks/services from. This is one of the two
//! external interfaces spec.md §1 calls out as out of scope for the
//! reconciliation engine itself; it is kept narrow (a plain trait) so the
//! phases in [`crate::reconcile`] can be tested against an in-memory fake
//! instead of a live Rancher server.

mod cache;
mod client;
mod error;
pub mod types;

pub use cache::CachingInventoryClient;
pub use client::RancherHttpClient;
pub use error::InventoryError;
pub use types::{Environment, Host, Service, Stack};

/// Read-only access to the inventory platform. Grounded on the
/// `#[cfg_attr(test, mockall::automock)]` trait pattern in
/// `agent-control/src/agent_control/config_repository/repository.rs`.
#[cfg_attr(test, mockall::automock)]
pub trait InventoryClient {
    fn list_environments(&self) -> Result<Vec<Environment>, InventoryError>;
    fn list_hosts(&self) -> Result<Vec<Host>, InventoryError>;
    fn list_stacks(&self) -> Result<Vec<Stack>, InventoryError>;
    fn list_services(&self) -> Result<Vec<Service>, InventoryError>;

    fn get_environment(&self, id: &str) -> Result<Environment, InventoryError>;
    fn get_stack(&self, id: &str) -> Result<Stack, InventoryError>;
    fn get_service(&self, id: &str) -> Result<Service, InventoryError>;
}
