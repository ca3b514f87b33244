//! Monitoring backend client: the mutable collaborator the reconciler
//! creates/updates/deletes host groups, hosts, and services on. The other
//! of the two external interfaces spec.md §1 calls out as out of scope;
//! kept narrow as a trait for the same reason as [`crate::inventory`].

mod client;
mod error;
pub mod types;

pub use client::IcingaHttpClient;
pub use error::MonitoringError;
pub use types::{Host, HostGroup, Service};

/// Mutating access to the monitoring backend.
#[cfg_attr(test, mockall::automock)]
pub trait MonitoringClient {
    fn list_host_groups(&self) -> Result<Vec<HostGroup>, MonitoringError>;
    fn list_hosts(&self) -> Result<Vec<Host>, MonitoringError>;
    fn list_services(&self) -> Result<Vec<Service>, MonitoringError>;

    fn create_host_group(&self, obj: &HostGroup) -> Result<(), MonitoringError>;
    fn update_host_group(&self, obj: &HostGroup) -> Result<(), MonitoringError>;
    fn delete_host_group(&self, name: &str) -> Result<(), MonitoringError>;

    fn create_host(&self, obj: &Host) -> Result<(), MonitoringError>;
    fn update_host(&self, obj: &Host) -> Result<(), MonitoringError>;
    fn delete_host(&self, name: &str, cascade: bool) -> Result<(), MonitoringError>;

    fn create_service(&self, obj: &Service) -> Result<(), MonitoringError>;
    fn update_service(&self, obj: &Service) -> Result<(), MonitoringError>;
    fn delete_service(&self, host_name: &str, name: &str) -> Result<(), MonitoringError>;
}
