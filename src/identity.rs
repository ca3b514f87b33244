//! Identity & ownership matcher: decides whether a monitoring object was
//! created by this engine for a given inventory coordinate.
//!
//! Grounded on the ownership-check shape of
//! `agent-control/src/k8s/labels.rs::is_managed_by_agentcontrol` and
//! `agent-control/src/k8s/garbage_collector.rs::should_delete_dynamic_object`
//! (installation marker gates everything else).

use crate::vars::VarBag;

pub const RANCHER_INSTALLATION: &str = "rancher_installation";
pub const RANCHER_OBJECT_TYPE: &str = "rancher_object_type";
pub const RANCHER_ENVIRONMENT: &str = "rancher_environment";
pub const RANCHER_STACK: &str = "rancher_stack";
pub const RANCHER_SERVICE: &str = "rancher_service";
pub const RANCHER_HOST: &str = "rancher_host";
pub const RANCHER_URL: &str = "rancher_url";
pub const RANCHER_ACCESS_KEY: &str = "rancher_access_key";
pub const RANCHER_SECRET_KEY: &str = "rancher_secret_key";

/// The concrete or composite `rancher_object_type` probe used when matching
/// ownership. Composite probes are a scanning optimization (§4.9): list the
/// backend once per reverse phase instead of once per subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    Environment,
    Host,
    Stack,
    Service,
    RancherAgent,
    CustomCheck,
    /// Matches `host` or `stack` tagged objects (phase 6).
    HostOrStack,
    /// Matches `rancher-agent`, `service`, or `custom-check` tagged objects
    /// (phase 7).
    AgentServiceOrCustomCheck,
    /// Suppresses the type dimension entirely; matches any tag.
    Any,
}

impl ObjectType {
    /// The literal tag stored in `rancher_object_type` for concrete types.
    /// Composite probes have no single tag and are handled in [`matches`].
    fn tag(self) -> Option<&'static str> {
        match self {
            ObjectType::Environment => Some("environment"),
            ObjectType::Host => Some("host"),
            ObjectType::Stack => Some("stack"),
            ObjectType::Service => Some("service"),
            ObjectType::RancherAgent => Some("rancher-agent"),
            ObjectType::CustomCheck => Some("custom-check"),
            ObjectType::HostOrStack | ObjectType::AgentServiceOrCustomCheck | ObjectType::Any => {
                None
            }
        }
    }

    fn matches_tag(self, tag: &str) -> bool {
        match self {
            ObjectType::HostOrStack => tag == "host" || tag == "stack",
            ObjectType::AgentServiceOrCustomCheck => {
                tag == "rancher-agent" || tag == "service" || tag == "custom-check"
            }
            ObjectType::Any => true,
            other => other.tag() == Some(tag),
        }
    }
}

/// A coordinate identifies one inventory object to the matcher. Any field
/// left `None` suppresses that dimension from the comparison.
#[derive(Debug, Clone, Copy, Default)]
pub struct Coordinate<'a> {
    pub environment: Option<&'a str>,
    pub stack: Option<&'a str>,
    pub service: Option<&'a str>,
    pub host: Option<&'a str>,
}

/// Returns true iff `bag` was created by this engine (`installation`
/// matches), is of the probed `object_type`, and every non-`None` field of
/// `coord` equals the bag's corresponding marker. An object failing the
/// installation check is invisible to the engine regardless of the rest.
pub fn matches(bag: &VarBag, installation: &str, object_type: ObjectType, coord: Coordinate) -> bool {
    if bag.get(RANCHER_INSTALLATION) != Some(installation) {
        return false;
    }

    let Some(tag) = bag.get(RANCHER_OBJECT_TYPE) else {
        return false;
    };
    if !object_type.matches_tag(tag) {
        return false;
    }

    if let Some(env) = coord.environment {
        if bag.get(RANCHER_ENVIRONMENT) != Some(env) {
            return false;
        }
    }
    if let Some(stack) = coord.stack {
        if bag.get(RANCHER_STACK) != Some(stack) {
            return false;
        }
    }
    if let Some(service) = coord.service {
        if bag.get(RANCHER_SERVICE) != Some(service) {
            return false;
        }
    }
    if let Some(host) = coord.host {
        if bag.get(RANCHER_HOST) != Some(host) {
            return false;
        }
    }
    true
}

/// Builds the marker bag for a freshly mapped object; callers overlay this
/// with defaults and user-supplied vars (§4.5).
pub fn markers(installation: &str, object_type: ObjectType, coord: Coordinate) -> VarBag {
    let mut bag = VarBag::new();
    bag.insert(RANCHER_INSTALLATION, installation);
    if let Some(tag) = object_type.tag() {
        bag.insert(RANCHER_OBJECT_TYPE, tag);
    }
    if let Some(env) = coord.environment {
        bag.insert(RANCHER_ENVIRONMENT, env);
    }
    if let Some(stack) = coord.stack {
        bag.insert(RANCHER_STACK, stack);
    }
    if let Some(service) = coord.service {
        bag.insert(RANCHER_SERVICE, service);
    }
    if let Some(host) = coord.host {
        bag.insert(RANCHER_HOST, host);
    }
    bag
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned_bag() -> VarBag {
        markers(
            "default",
            ObjectType::Stack,
            Coordinate {
                environment: Some("Default"),
                stack: Some("mystack"),
                ..Default::default()
            },
        )
    }

    #[test]
    fn installation_mismatch_is_invisible() {
        let bag = owned_bag();
        assert!(!matches(&bag, "other", ObjectType::Stack, Coordinate::default()));
    }

    #[test]
    fn composite_probe_matches_either_member() {
        let bag = owned_bag();
        assert!(matches(&bag, "default", ObjectType::HostOrStack, Coordinate::default()));
        assert!(!matches(
            &bag,
            "default",
            ObjectType::AgentServiceOrCustomCheck,
            Coordinate::default()
        ));
    }

    #[test]
    fn empty_coordinate_field_suppresses_dimension() {
        let bag = owned_bag();
        assert!(matches(
            &bag,
            "default",
            ObjectType::Stack,
            Coordinate {
                environment: Some("Default"),
                ..Default::default()
            }
        ));
        assert!(!matches(
            &bag,
            "default",
            ObjectType::Stack,
            Coordinate {
                environment: Some("Other"),
                ..Default::default()
            }
        ));
    }
}
