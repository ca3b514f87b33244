//! Entity mappers (§4.5): pure functions producing the variable bag and
//! identity-fields a monitoring object must currently have for a given
//! inventory object.
//!
//! Every mapper follows the same overlay order: kind-specific operator
//! default bag (already carrying the injected `rancher_url` /
//! `rancher_access_key` / `rancher_secret_key` values, folded in once at
//! config load time), then the ownership markers from [`crate::identity`],
//! then any user-supplied `icinga.*_vars` label. Grounded on
//! `original_source/rancher-icinga_test.go`'s fixtures for merge order and
//! the `icinga.stack_vars`/`icinga.stack_notes_url` "last service found
//! wins" iteration rule.

use crate::identity::{self, Coordinate, ObjectType};
use crate::inventory::{Host, Service, Stack};
use crate::vars::VarBag;

pub const LABEL_HOST_NOTES_URL: &str = "icinga.host_notes_url";
pub const LABEL_STACK_NOTES_URL: &str = "icinga.stack_notes_url";
pub const LABEL_SERVICE_NOTES_URL: &str = "icinga.service_notes_url";
pub const LABEL_HOST_VARS: &str = "icinga.host_vars";
pub const LABEL_STACK_VARS: &str = "icinga.stack_vars";
pub const LABEL_SERVICE_VARS: &str = "icinga.service_vars";
pub const LABEL_CUSTOM_CHECKS: &str = "icinga.custom_checks";

fn label<'a>(labels: &'a std::collections::BTreeMap<String, String>, key: &str) -> &'a str {
    labels.get(key).map(String::as_str).unwrap_or_default()
}

/// `icinga.host_notes_url` / host's bag, for the agent host and its
/// liveness service (both share the same notes URL, §6's labels table).
pub struct HostMapping {
    pub notes_url: String,
    pub host_vars: VarBag,
    pub liveness_vars: VarBag,
}

pub fn map_host(host: &Host, environment_name: &str, installation: &str, host_default: &VarBag) -> HostMapping {
    let notes_url = label(&host.labels, LABEL_HOST_NOTES_URL).to_string();
    let user_vars = VarBag::unpack(label(&host.labels, LABEL_HOST_VARS));

    let host_markers = identity::markers(
        installation,
        ObjectType::Host,
        Coordinate { environment: Some(environment_name), host: Some(&host.hostname), ..Default::default() },
    );
    let host_vars = VarBag::merge(&VarBag::merge(host_default, &host_markers), &user_vars);

    let liveness_markers = identity::markers(
        installation,
        ObjectType::RancherAgent,
        Coordinate { environment: Some(environment_name), host: Some(&host.hostname), ..Default::default() },
    );
    // The agent-liveness service has no default bag of its own in §6;
    // it shares the host's default bag, matching the original's single
    // `hostDefault` config knob covering both objects.
    let liveness_vars = VarBag::merge(&VarBag::merge(host_default, &liveness_markers), &user_vars);

    HostMapping { notes_url, host_vars, liveness_vars }
}

/// `icinga.stack_vars` / `icinga.stack_notes_url` fold over every service
/// in the stack, in `service_ids` order, later entries winning.
pub struct StackMapping {
    pub notes_url: String,
    pub vars: VarBag,
}

pub fn map_stack(
    stack: &Stack,
    environment_name: &str,
    services: &[Service],
    installation: &str,
    stack_default: &VarBag,
) -> StackMapping {
    let mut notes_url = String::new();
    let mut user_vars = VarBag::new();
    for service in services {
        let url = label(&service.launch_labels, LABEL_STACK_NOTES_URL);
        if !url.is_empty() {
            notes_url = url.to_string();
        }
        let vars = VarBag::unpack(label(&service.launch_labels, LABEL_STACK_VARS));
        user_vars = VarBag::merge(&user_vars, &vars);
    }

    let markers = identity::markers(
        installation,
        ObjectType::Stack,
        Coordinate { environment: Some(environment_name), stack: Some(&stack.name), ..Default::default() },
    );
    let vars = VarBag::merge(&VarBag::merge(stack_default, &markers), &user_vars);
    StackMapping { notes_url, vars }
}

/// The main service check for an inventory service.
pub struct ServiceMapping {
    pub notes_url: String,
    pub vars: VarBag,
}

pub fn map_service(
    service: &Service,
    environment_name: &str,
    stack_name: &str,
    installation: &str,
    service_default: &VarBag,
) -> ServiceMapping {
    let notes_url = label(&service.launch_labels, LABEL_SERVICE_NOTES_URL).to_string();
    let user_vars = VarBag::unpack(label(&service.launch_labels, LABEL_SERVICE_VARS));

    let markers = identity::markers(
        installation,
        ObjectType::Service,
        Coordinate {
            environment: Some(environment_name),
            stack: Some(stack_name),
            service: Some(&service.name),
            ..Default::default()
        },
    );
    let vars = VarBag::merge(&VarBag::merge(service_default, &markers), &user_vars);
    ServiceMapping { notes_url, vars }
}

/// A custom check's bag: `check.vars ⊕ serviceVars ⊕ {rancher_object_type:
/// custom-check}` (§4.5). `service_vars` is the same bag [`map_service`]
/// would compute, so custom checks inherit the service's defaults, markers
/// coordinate, and user-supplied `icinga.service_vars`; per §4.3 the
/// right-hand side of `⊕` wins, so `serviceVars` overrides `check.vars` on a
/// shared key, and the object-type marker is forced back to `custom-check`
/// last (it must never be overridden by either input).
pub fn map_custom_check(
    check: &crate::customcheck::CustomCheck,
    environment_name: &str,
    stack_name: &str,
    service_name: &str,
    installation: &str,
    service_vars: &VarBag,
) -> VarBag {
    let check_vars = VarBag::from_pairs(check.vars.clone());
    let merged = VarBag::merge(&check_vars, service_vars);
    let type_marker = identity::markers(
        installation,
        ObjectType::CustomCheck,
        Coordinate {
            environment: Some(environment_name),
            stack: Some(stack_name),
            service: Some(service_name),
            ..Default::default()
        },
    );
    VarBag::merge(&merged, &type_marker)
}

pub fn map_hostgroup(environment_name: &str, installation: &str, hostgroup_default: &VarBag) -> VarBag {
    let markers = identity::markers(
        installation,
        ObjectType::Environment,
        Coordinate { environment: Some(environment_name), ..Default::default() },
    );
    VarBag::merge(hostgroup_default, &markers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn service(name: &str, stack_vars: &str, notes_url: &str) -> Service {
        let mut labels = BTreeMap::new();
        if !stack_vars.is_empty() {
            labels.insert(LABEL_STACK_VARS.to_string(), stack_vars.to_string());
        }
        if !notes_url.is_empty() {
            labels.insert(LABEL_STACK_NOTES_URL.to_string(), notes_url.to_string());
        }
        Service {
            id: format!("1s{name}"),
            name: name.to_string(),
            stack_id: "1st1".into(),
            environment_id: "1a5".into(),
            system: false,
            launch_labels: labels,
        }
    }

    #[test]
    fn stack_vars_fold_with_later_service_winning() {
        let stack = Stack { id: "1st1".into(), name: "mystack".into(), environment_id: "1a5".into(), system: false, service_ids: vec!["1s1".into(), "1s2".into()] };
        let services = vec![
            service("service1", "var3=val1,other=a", ""),
            service("service2", "var3=newval3", "http://docs.mysite.com/mystack.html"),
        ];
        let mapping = map_stack(&stack, "Default", &services, "default", &VarBag::new());
        assert_eq!(mapping.vars.get("var3"), Some("newval3"));
        assert_eq!(mapping.vars.get("other"), Some("a"));
        assert_eq!(mapping.notes_url, "http://docs.mysite.com/mystack.html");
    }

    #[test]
    fn hostgroup_vars_carry_markers_over_defaults() {
        let default = VarBag::from_pairs([("rancher_object_type", "should-be-overridden")]);
        let vars = map_hostgroup("Default", "default", &default);
        assert_eq!(vars.get("rancher_object_type"), Some("environment"));
        assert_eq!(vars.get("rancher_environment"), Some("Default"));
    }

    #[test]
    fn custom_check_marker_wins_over_service_and_check_vars() {
        let service_vars = VarBag::from_pairs([
            ("rancher_object_type", "service"),
            ("monitor", "true"),
        ]);
        let check = crate::customcheck::CustomCheck {
            name: "check1".into(),
            command: Some("http".into()),
            notes_url: None,
            vars: [("http_port".to_string(), "80".to_string())].into_iter().collect(),
        };
        let bag = map_custom_check(&check, "Default", "mystack", "service1", "default", &service_vars);
        assert_eq!(bag.get("rancher_object_type"), Some("custom-check"));
        assert_eq!(bag.get("http_port"), Some("80"));
        assert_eq!(bag.get("monitor"), Some("true"));
    }
}
