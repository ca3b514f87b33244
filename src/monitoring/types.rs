//! Monitoring entity types (§3): the mutable outputs this engine
//! reconciles inventory into. Field names follow the Icinga2 object API's
//! own attribute names (`check_command`, `notes_url`, `groups`, `vars`).

use crate::vars::VarBag;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct HostGroup {
    pub name: String,
    pub vars: VarBag,
}

/// A monitoring host. Per §3 this represents either a Rancher **agent**
/// (one per inventory host) or a **stack** (one per inventory stack); the
/// two are told apart only by the `rancher_object_type` marker in `vars`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Host {
    pub name: String,
    pub address: String,
    pub groups: Vec<String>,
    pub check_command: String,
    pub notes_url: String,
    pub vars: VarBag,
}

/// A monitoring service. Represents an agent-liveness check, a
/// stack-service check, or a custom check, told apart by
/// `rancher_object_type`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Service {
    pub name: String,
    pub host_name: String,
    pub check_command: String,
    pub notes_url: String,
    pub vars: VarBag,
}
