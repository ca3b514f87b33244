//! Inventory entity types (§3). Field names are grounded on
//! `original_source/rancher-client.go` and `rancher-icinga_test.go`
//! (`client.Project`, `client.Host`, `client.Stack`, `client.Service`).

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub id: String,
    pub hostname: String,
    /// The agent's reachable address; becomes the monitoring host's
    /// display address.
    pub agent_address: String,
    pub labels: BTreeMap<String, String>,
    pub environment_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stack {
    pub id: String,
    pub name: String,
    pub environment_id: String,
    pub system: bool,
    pub service_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub stack_id: String,
    pub environment_id: String,
    pub system: bool,
    pub launch_labels: BTreeMap<String, String>,
}
