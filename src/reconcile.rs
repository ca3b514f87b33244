//! Reconciliation phases (§4.7): the seven ordered passes that drive the
//! inventory-to-backend diff and emit create/update/delete operations.
//! This is the core of the engine; everything else in the crate is a
//! narrow collaborator this module composes.
//!
//! Grounded on the overall shape of `agent-control/src/agent_control/run.rs`
//! (a driver that walks a fixed list of reconciliation steps against
//! injected collaborator traits) and on `original_source/rancher-icinga.go`
//! for the phase ordering, tie-break rules ("first match wins, no dedup"),
//! and the forward-then-reverse split within a tick.

use std::collections::BTreeMap;

use tracing::warn;

use crate::changeevent::{ChangeEvent, ChangeEventEmitter, ObjectKind, Operation, VarsJson};
use crate::config::Config;
use crate::customcheck;
use crate::error::PhaseError;
use crate::filter::{EnvironmentSubject, HostSubject, ServiceSubject, StackSubject};
use crate::identity::{self, Coordinate, ObjectType};
use crate::inventory::{Environment, Host, InventoryClient, InventoryError, Service, Stack};
use crate::mapper;
use crate::monitoring::{Host as MHost, HostGroup as MHostGroup, MonitoringClient, Service as MService};
use crate::template::TemplateParams;
use crate::vars::VarBag;

/// Drives one sync tick's worth of phases against injected collaborators.
/// Generic over the client traits (rather than `dyn`) so tests can plug in
/// in-memory fakes with zero dynamic-dispatch overhead, matching the
/// teacher's preference for statically-typed dependency injection.
pub struct Reconciler<'a, I, M> {
    inventory: &'a I,
    monitoring: &'a M,
    change_events: &'a ChangeEventEmitter,
    config: &'a Config,
}

impl<'a, I: InventoryClient, M: MonitoringClient> Reconciler<'a, I, M> {
    pub fn new(inventory: &'a I, monitoring: &'a M, change_events: &'a ChangeEventEmitter, config: &'a Config) -> Self {
        Self { inventory, monitoring, change_events, config }
    }

    /// Runs all seven phases in fixed order (§4.7). A list/fetch error
    /// aborts the tick (propagated to the caller); per-object mutation
    /// errors are logged and do not abort.
    pub fn run_tick(&self) -> Result<(), PhaseError> {
        self.phase1_environments_to_hostgroups()?;
        self.phase2_hostgroups_to_environments()?;
        self.phase3_hosts()?;
        self.phase4_stacks_to_hosts()?;
        self.phase5_services()?;
        self.phase6_hosts_reverse()?;
        self.phase7_services_reverse()?;
        Ok(())
    }

    // ---- phase 1: environments -> host groups (forward) ----

    fn phase1_environments_to_hostgroups(&self) -> Result<(), PhaseError> {
        let environments = self.inventory.list_environments()?;
        let existing = self.monitoring.list_host_groups()?;

        for env in &environments {
            if !self.config.filter_environments.evaluate_environment(&EnvironmentSubject { name: &env.name })? {
                continue;
            }

            let vars = mapper::map_hostgroup(&env.name, &self.config.installation, &self.config.hostgroup_default);
            let coord = Coordinate { environment: Some(&env.name), ..Default::default() };

            match find_host_group(&existing, &self.config.installation, coord) {
                Some(found) if !VarBag::equal(&found.vars, &vars) => {
                    let updated = MHostGroup { name: found.name.clone(), vars };
                    match self.monitoring.update_host_group(&updated) {
                        Ok(()) => self.emit_hostgroup(Operation::Update, &updated),
                        Err(err) => warn!(hostgroup = %updated.name, error = %err, "failed to update host group"),
                    }
                }
                Some(_) => {}
                None => {
                    let name = self.config.environment_name_template.render(&TemplateParams {
                        environment: &env.name,
                        ..Default::default()
                    })?;
                    let created = MHostGroup { name, vars };
                    match self.monitoring.create_host_group(&created) {
                        Ok(()) => self.emit_hostgroup(Operation::Create, &created),
                        Err(err) => warn!(hostgroup = %created.name, error = %err, "failed to create host group"),
                    }
                }
            }
        }
        Ok(())
    }

    // ---- phase 2: host groups -> environments (reverse) ----

    fn phase2_hostgroups_to_environments(&self) -> Result<(), PhaseError> {
        let environments = self.inventory.list_environments()?;
        let existing = self.monitoring.list_host_groups()?;

        for hg in &existing {
            if !identity::matches(&hg.vars, &self.config.installation, ObjectType::Environment, Coordinate::default()) {
                continue;
            }
            let env_name = hg.vars.get(identity::RANCHER_ENVIRONMENT).unwrap_or_default().to_string();
            if self.environment_by_name_passing(&environments, &env_name)?.is_some() {
                continue;
            }
            match self.monitoring.delete_host_group(&hg.name) {
                Ok(()) => self.emit_hostgroup(Operation::Delete, hg),
                Err(err) => warn!(hostgroup = %hg.name, error = %err, "failed to delete host group"),
            }
        }
        Ok(())
    }

    // ---- phase 3: hosts -> (hosts + agent-liveness services) (forward) ----

    fn phase3_hosts(&self) -> Result<(), PhaseError> {
        let hosts = self.inventory.list_hosts()?;
        let existing_hosts = self.monitoring.list_hosts()?;
        let existing_services = self.monitoring.list_services()?;

        for host in &hosts {
            let env = self.environment_or_unreachable(&host.environment_id)?;
            if !self.config.filter_environments.evaluate_environment(&EnvironmentSubject { name: &env.name })? {
                continue;
            }
            let labels = labels_vec(&host.labels);
            let subject = HostSubject { hostname: &host.hostname, environment_name: &env.name, labels: &labels };
            if !self.config.filter_hosts.evaluate_host(&subject)? {
                continue;
            }

            let group_name = self.config.environment_name_template.render(&TemplateParams {
                environment: &env.name,
                ..Default::default()
            })?;
            let mapping = mapper::map_host(host, &env.name, &self.config.installation, &self.config.host_default);
            let coord = Coordinate { environment: Some(&env.name), host: Some(&host.hostname), ..Default::default() };

            match find_host(&existing_hosts, &self.config.installation, ObjectType::Host, coord) {
                Some(existing) if existing.notes_url != mapping.notes_url || !VarBag::equal(&existing.vars, &mapping.host_vars) => {
                    let updated = MHost {
                        name: existing.name.clone(),
                        address: host.agent_address.clone(),
                        groups: vec![group_name.clone()],
                        check_command: self.config.host_check_command.clone(),
                        notes_url: mapping.notes_url.clone(),
                        vars: mapping.host_vars.clone(),
                    };
                    match self.monitoring.update_host(&updated) {
                        Ok(()) => self.emit_host(Operation::Update, &updated),
                        Err(err) => warn!(host = %updated.name, error = %err, "failed to update agent host"),
                    }
                }
                Some(_) => {}
                None => {
                    let created = MHost {
                        name: host.hostname.clone(),
                        address: host.agent_address.clone(),
                        groups: vec![group_name.clone()],
                        check_command: self.config.host_check_command.clone(),
                        notes_url: mapping.notes_url.clone(),
                        vars: mapping.host_vars.clone(),
                    };
                    match self.monitoring.create_host(&created) {
                        Ok(()) => self.emit_host(Operation::Create, &created),
                        Err(err) => warn!(host = %created.name, error = %err, "failed to create agent host"),
                    }
                }
            }

            match find_service(&existing_services, &self.config.installation, ObjectType::RancherAgent, coord) {
                Some(existing) if existing.notes_url != mapping.notes_url || !VarBag::equal(&existing.vars, &mapping.liveness_vars) => {
                    let updated = MService {
                        name: existing.name.clone(),
                        host_name: host.hostname.clone(),
                        check_command: self.config.agent_service_check_command.clone(),
                        notes_url: mapping.notes_url.clone(),
                        vars: mapping.liveness_vars.clone(),
                    };
                    match self.monitoring.update_service(&updated) {
                        Ok(()) => self.emit_service(Operation::Update, &updated),
                        Err(err) => warn!(service = %updated.name, error = %err, "failed to update agent-liveness service"),
                    }
                }
                Some(_) => {}
                None => {
                    let created = MService {
                        name: "rancher-agent".to_string(),
                        host_name: host.hostname.clone(),
                        check_command: self.config.agent_service_check_command.clone(),
                        notes_url: mapping.notes_url.clone(),
                        vars: mapping.liveness_vars.clone(),
                    };
                    match self.monitoring.create_service(&created) {
                        Ok(()) => self.emit_service(Operation::Create, &created),
                        Err(err) => warn!(service = %created.name, error = %err, "failed to create agent-liveness service"),
                    }
                }
            }
        }
        Ok(())
    }

    // ---- phase 4: stacks -> hosts (forward) ----

    fn phase4_stacks_to_hosts(&self) -> Result<(), PhaseError> {
        let stacks = self.inventory.list_stacks()?;
        let existing_hosts = self.monitoring.list_hosts()?;

        for stack in &stacks {
            let env = self.environment_or_unreachable(&stack.environment_id)?;
            if !self.config.filter_environments.evaluate_environment(&EnvironmentSubject { name: &env.name })? {
                continue;
            }
            let services = self.stack_services(stack)?;
            let (names, labels) = stack_filter_inputs(&services);
            let subject = StackSubject {
                name: &stack.name,
                environment_name: &env.name,
                system: stack.system,
                service_names: &names,
                service_labels: &labels,
            };
            if !self.config.filter_stacks.evaluate_stack(&subject)? {
                continue;
            }

            let group_name = self.config.environment_name_template.render(&TemplateParams {
                environment: &env.name,
                ..Default::default()
            })?;
            let mapping = mapper::map_stack(stack, &env.name, &services, &self.config.installation, &self.config.stack_default);
            let coord = Coordinate { environment: Some(&env.name), stack: Some(&stack.name), ..Default::default() };

            match find_host(&existing_hosts, &self.config.installation, ObjectType::Stack, coord) {
                Some(existing) if existing.notes_url != mapping.notes_url || !VarBag::equal(&existing.vars, &mapping.vars) => {
                    let updated = MHost {
                        name: existing.name.clone(),
                        address: existing.name.clone(),
                        groups: vec![group_name.clone()],
                        check_command: self.config.stack_check_command.clone(),
                        notes_url: mapping.notes_url.clone(),
                        vars: mapping.vars.clone(),
                    };
                    match self.monitoring.update_host(&updated) {
                        Ok(()) => self.emit_host(Operation::Update, &updated),
                        Err(err) => warn!(stack_host = %updated.name, error = %err, "failed to update stack host"),
                    }
                }
                Some(_) => {}
                None => {
                    let name = self.config.stack_name_template.render(&TemplateParams {
                        environment: &env.name,
                        stack: &stack.name,
                        ..Default::default()
                    })?;
                    let created = MHost {
                        name: name.clone(),
                        address: name,
                        groups: vec![group_name.clone()],
                        check_command: self.config.stack_check_command.clone(),
                        notes_url: mapping.notes_url.clone(),
                        vars: mapping.vars.clone(),
                    };
                    match self.monitoring.create_host(&created) {
                        Ok(()) => self.emit_host(Operation::Create, &created),
                        Err(err) => warn!(stack_host = %created.name, error = %err, "failed to create stack host"),
                    }
                }
            }
        }
        Ok(())
    }

    // ---- phase 5: services -> services (+ custom checks) (forward) ----

    fn phase5_services(&self) -> Result<(), PhaseError> {
        let services = self.inventory.list_services()?;
        let existing_services = self.monitoring.list_services()?;

        for service in &services {
            let env = self.environment_or_unreachable(&service.environment_id)?;
            if !self.config.filter_environments.evaluate_environment(&EnvironmentSubject { name: &env.name })? {
                continue;
            }
            let stack = self.inventory.get_stack(&service.stack_id)?;
            let stack_services = self.stack_services(&stack)?;
            let (names, labels) = stack_filter_inputs(&stack_services);
            let stack_subject = StackSubject {
                name: &stack.name,
                environment_name: &env.name,
                system: stack.system,
                service_names: &names,
                service_labels: &labels,
            };
            if !self.config.filter_stacks.evaluate_stack(&stack_subject)? {
                continue;
            }
            let service_labels = labels_vec(&service.launch_labels);
            let service_subject = ServiceSubject {
                name: &service.name,
                environment_name: &env.name,
                stack_name: &stack.name,
                system: service.system,
                labels: &service_labels,
            };
            if !self.config.filter_services.evaluate_service(&service_subject)? {
                continue;
            }

            let stack_host_name = self.config.stack_name_template.render(&TemplateParams {
                environment: &env.name,
                stack: &stack.name,
                ..Default::default()
            })?;
            let mapping = mapper::map_service(service, &env.name, &stack.name, &self.config.installation, &self.config.service_default);
            let coord = Coordinate {
                environment: Some(&env.name),
                stack: Some(&stack.name),
                service: Some(&service.name),
                ..Default::default()
            };

            match find_service(&existing_services, &self.config.installation, ObjectType::Service, coord) {
                Some(existing) if existing.notes_url != mapping.notes_url || !VarBag::equal(&existing.vars, &mapping.vars) => {
                    let updated = MService {
                        name: existing.name.clone(),
                        host_name: stack_host_name.clone(),
                        check_command: self.config.service_check_command.clone(),
                        notes_url: mapping.notes_url.clone(),
                        vars: mapping.vars.clone(),
                    };
                    match self.monitoring.update_service(&updated) {
                        Ok(()) => self.emit_service(Operation::Update, &updated),
                        Err(err) => warn!(service = %updated.name, error = %err, "failed to update service check"),
                    }
                }
                Some(_) => {}
                None => {
                    let created = MService {
                        name: service.name.clone(),
                        host_name: stack_host_name.clone(),
                        check_command: self.config.service_check_command.clone(),
                        notes_url: mapping.notes_url.clone(),
                        vars: mapping.vars.clone(),
                    };
                    match self.monitoring.create_service(&created) {
                        Ok(()) => self.emit_service(Operation::Create, &created),
                        Err(err) => warn!(service = %created.name, error = %err, "failed to create service check"),
                    }
                }
            }

            let payload = label_value(&service.launch_labels, mapper::LABEL_CUSTOM_CHECKS);
            let checks = customcheck::parse(payload)?;
            for check in &checks {
                let check_vars =
                    mapper::map_custom_check(check, &env.name, &stack.name, &service.name, &self.config.installation, &mapping.vars);
                let check_notes_url = check.notes_url.clone().unwrap_or_default();
                let check_command = check.command.clone().unwrap_or_else(|| self.config.service_check_command.clone());

                match find_custom_check(&existing_services, &check.name, &self.config.installation, coord) {
                    Some(existing) if existing.notes_url != check_notes_url || !VarBag::equal(&existing.vars, &check_vars) => {
                        let updated = MService {
                            name: existing.name.clone(),
                            host_name: stack_host_name.clone(),
                            check_command: check_command.clone(),
                            notes_url: check_notes_url.clone(),
                            vars: check_vars.clone(),
                        };
                        match self.monitoring.update_service(&updated) {
                            Ok(()) => self.emit_service(Operation::Update, &updated),
                            Err(err) => warn!(service = %updated.name, error = %err, "failed to update custom check"),
                        }
                    }
                    Some(_) => {}
                    None => {
                        let created = MService {
                            name: check.name.clone(),
                            host_name: stack_host_name.clone(),
                            check_command: check_command.clone(),
                            notes_url: check_notes_url.clone(),
                            vars: check_vars.clone(),
                        };
                        match self.monitoring.create_service(&created) {
                            Ok(()) => self.emit_service(Operation::Create, &created),
                            Err(err) => warn!(service = %created.name, error = %err, "failed to create custom check"),
                        }
                    }
                }
            }
        }
        Ok(())
    }

    // ---- phase 6: hosts -> (inventory hosts | stacks) (reverse) ----

    fn phase6_hosts_reverse(&self) -> Result<(), PhaseError> {
        let environments = self.inventory.list_environments()?;
        let hosts = self.inventory.list_hosts()?;
        let stacks = self.inventory.list_stacks()?;
        let existing_hosts = self.monitoring.list_hosts()?;

        for existing in &existing_hosts {
            if !identity::matches(&existing.vars, &self.config.installation, ObjectType::HostOrStack, Coordinate::default()) {
                continue;
            }
            let tag = existing.vars.get(identity::RANCHER_OBJECT_TYPE).unwrap_or_default();
            let env_name = existing.vars.get(identity::RANCHER_ENVIRONMENT).unwrap_or_default().to_string();

            let survives = match tag {
                "host" => {
                    let host_name = existing.vars.get(identity::RANCHER_HOST).unwrap_or_default().to_string();
                    self.host_survives(&environments, &hosts, &env_name, &host_name)?
                }
                "stack" => {
                    let stack_name = existing.vars.get(identity::RANCHER_STACK).unwrap_or_default().to_string();
                    self.stack_survives(&environments, &stacks, &env_name, &stack_name)?
                }
                _ => false,
            };
            if survives {
                continue;
            }
            match self.monitoring.delete_host(&existing.name, true) {
                Ok(()) => self.emit_host(Operation::DeleteCascade, existing),
                Err(err) => warn!(host = %existing.name, error = %err, "failed to delete orphaned monitoring host"),
            }
        }
        Ok(())
    }

    // ---- phase 7: services -> (inventory services | hosts | custom-checks) (reverse) ----

    fn phase7_services_reverse(&self) -> Result<(), PhaseError> {
        let environments = self.inventory.list_environments()?;
        let hosts = self.inventory.list_hosts()?;
        let stacks = self.inventory.list_stacks()?;
        let existing_services = self.monitoring.list_services()?;

        for existing in &existing_services {
            if !identity::matches(&existing.vars, &self.config.installation, ObjectType::AgentServiceOrCustomCheck, Coordinate::default())
            {
                continue;
            }
            let tag = existing.vars.get(identity::RANCHER_OBJECT_TYPE).unwrap_or_default();
            let env_name = existing.vars.get(identity::RANCHER_ENVIRONMENT).unwrap_or_default().to_string();

            let survives = match tag {
                "rancher-agent" => {
                    let host_name = existing.vars.get(identity::RANCHER_HOST).unwrap_or_default().to_string();
                    self.host_survives(&environments, &hosts, &env_name, &host_name)?
                }
                "service" => {
                    let stack_name = existing.vars.get(identity::RANCHER_STACK).unwrap_or_default().to_string();
                    let service_name = existing.vars.get(identity::RANCHER_SERVICE).unwrap_or_default().to_string();
                    self.service_survives(&environments, &stacks, &env_name, &stack_name, &service_name)?
                }
                "custom-check" => {
                    let stack_name = existing.vars.get(identity::RANCHER_STACK).unwrap_or_default().to_string();
                    let service_name = existing.vars.get(identity::RANCHER_SERVICE).unwrap_or_default().to_string();
                    self.custom_check_survives(&environments, &stacks, &env_name, &stack_name, &service_name, &existing.name)?
                }
                _ => false,
            };
            if survives {
                continue;
            }
            match self.monitoring.delete_service(&existing.host_name, &existing.name) {
                Ok(()) => self.emit_service(Operation::Delete, existing),
                Err(err) => warn!(service = %existing.name, error = %err, "failed to delete orphaned monitoring service"),
            }
        }
        Ok(())
    }

    // ---- shared survival / lookup helpers ----

    /// Looks up an environment by id, treating "credentials cannot reach
    /// this environment" (a not-found id lookup) as a recoverable empty
    /// environment rather than aborting the tick (§9, open question). An
    /// empty environment name fails every real filter and every ownership
    /// coordinate, so the owning object is simply skipped this tick instead
    /// of derailing every other object still being reconciled.
    fn environment_or_unreachable(&self, id: &str) -> Result<Environment, PhaseError> {
        match self.inventory.get_environment(id) {
            Ok(env) => Ok(env),
            Err(InventoryError::NotFound(_)) => Ok(Environment { id: id.to_string(), name: String::new() }),
            Err(InventoryError::UnsuccessfulStatus { status, .. }) if status == reqwest::StatusCode::NOT_FOUND => {
                Ok(Environment { id: id.to_string(), name: String::new() })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn environment_by_name_passing<'b>(
        &self,
        environments: &'b [Environment],
        name: &str,
    ) -> Result<Option<&'b Environment>, PhaseError> {
        for env in environments {
            if env.name == name && self.config.filter_environments.evaluate_environment(&EnvironmentSubject { name: &env.name })? {
                return Ok(Some(env));
            }
        }
        Ok(None)
    }

    fn stack_by_name_passing<'b>(
        &self,
        env: &Environment,
        stacks: &'b [Stack],
        name: &str,
    ) -> Result<Option<(&'b Stack, Vec<Service>)>, PhaseError> {
        for stack in stacks {
            if stack.environment_id != env.id || stack.name != name {
                continue;
            }
            let services = self.stack_services(stack)?;
            let (names, labels) = stack_filter_inputs(&services);
            let subject = StackSubject {
                name: &stack.name,
                environment_name: &env.name,
                system: stack.system,
                service_names: &names,
                service_labels: &labels,
            };
            if self.config.filter_stacks.evaluate_stack(&subject)? {
                return Ok(Some((stack, services)));
            }
        }
        Ok(None)
    }

    fn host_survives(&self, environments: &[Environment], hosts: &[Host], env_name: &str, host_name: &str) -> Result<bool, PhaseError> {
        let Some(env) = self.environment_by_name_passing(environments, env_name)? else {
            return Ok(false);
        };
        for host in hosts {
            if host.environment_id != env.id || host.hostname != host_name {
                continue;
            }
            let labels = labels_vec(&host.labels);
            let subject = HostSubject { hostname: &host.hostname, environment_name: &env.name, labels: &labels };
            if self.config.filter_hosts.evaluate_host(&subject)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn stack_survives(&self, environments: &[Environment], stacks: &[Stack], env_name: &str, stack_name: &str) -> Result<bool, PhaseError> {
        let Some(env) = self.environment_by_name_passing(environments, env_name)? else {
            return Ok(false);
        };
        Ok(self.stack_by_name_passing(env, stacks, stack_name)?.is_some())
    }

    fn service_survives(
        &self,
        environments: &[Environment],
        stacks: &[Stack],
        env_name: &str,
        stack_name: &str,
        service_name: &str,
    ) -> Result<bool, PhaseError> {
        let Some(env) = self.environment_by_name_passing(environments, env_name)? else {
            return Ok(false);
        };
        let Some((stack, services)) = self.stack_by_name_passing(env, stacks, stack_name)? else {
            return Ok(false);
        };
        for service in &services {
            if service.name != service_name {
                continue;
            }
            let labels = labels_vec(&service.launch_labels);
            let subject = ServiceSubject {
                name: &service.name,
                environment_name: &env.name,
                stack_name: &stack.name,
                system: service.system,
                labels: &labels,
            };
            if self.config.filter_services.evaluate_service(&subject)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn custom_check_survives(
        &self,
        environments: &[Environment],
        stacks: &[Stack],
        env_name: &str,
        stack_name: &str,
        service_name: &str,
        check_name: &str,
    ) -> Result<bool, PhaseError> {
        let Some(env) = self.environment_by_name_passing(environments, env_name)? else {
            return Ok(false);
        };
        let Some((stack, services)) = self.stack_by_name_passing(env, stacks, stack_name)? else {
            return Ok(false);
        };
        for service in &services {
            if service.name != service_name {
                continue;
            }
            let labels = labels_vec(&service.launch_labels);
            let subject = ServiceSubject {
                name: &service.name,
                environment_name: &env.name,
                stack_name: &stack.name,
                system: service.system,
                labels: &labels,
            };
            if !self.config.filter_services.evaluate_service(&subject)? {
                continue;
            }
            let payload = label_value(&service.launch_labels, mapper::LABEL_CUSTOM_CHECKS);
            let checks = customcheck::parse(payload)?;
            if checks.iter().any(|c| c.name == check_name) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn stack_services(&self, stack: &Stack) -> Result<Vec<Service>, PhaseError> {
        stack.service_ids.iter().map(|id| Ok(self.inventory.get_service(id)?)).collect()
    }

    // ---- change-event emission ----

    fn emit_hostgroup(&self, operation: Operation, obj: &MHostGroup) {
        self.change_events.emit(&ChangeEvent {
            operation,
            name: obj.name.clone(),
            kind: ObjectKind::Hostgroup,
            vars: VarsJson(obj.vars.clone()),
            object: serde_json::to_value(obj).unwrap_or(serde_json::Value::Null),
        });
    }

    fn emit_host(&self, operation: Operation, obj: &MHost) {
        self.change_events.emit(&ChangeEvent {
            operation,
            name: obj.name.clone(),
            kind: ObjectKind::Host,
            vars: VarsJson(obj.vars.clone()),
            object: serde_json::to_value(obj).unwrap_or(serde_json::Value::Null),
        });
    }

    fn emit_service(&self, operation: Operation, obj: &MService) {
        self.change_events.emit(&ChangeEvent {
            operation,
            name: obj.name.clone(),
            kind: ObjectKind::Service,
            vars: VarsJson(obj.vars.clone()),
            object: serde_json::to_value(obj).unwrap_or(serde_json::Value::Null),
        });
    }
}

fn labels_vec(labels: &BTreeMap<String, String>) -> Vec<(String, String)> {
    labels.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

fn label_value<'a>(labels: &'a BTreeMap<String, String>, key: &str) -> &'a str {
    labels.get(key).map(String::as_str).unwrap_or_default()
}

fn stack_filter_inputs(services: &[Service]) -> (Vec<String>, Vec<(String, Vec<(String, String)>)>) {
    let names = services.iter().map(|s| s.name.clone()).collect();
    let labels = services.iter().map(|s| (s.name.clone(), labels_vec(&s.launch_labels))).collect();
    (names, labels)
}

/// First-match-wins lookup (§4.7 tie-break: "no deduplication is
/// attempted").
fn find_host_group<'m>(existing: &'m [MHostGroup], installation: &str, coord: Coordinate) -> Option<&'m MHostGroup> {
    existing.iter().find(|hg| identity::matches(&hg.vars, installation, ObjectType::Environment, coord))
}

fn find_host<'m>(existing: &'m [MHost], installation: &str, object_type: ObjectType, coord: Coordinate) -> Option<&'m MHost> {
    existing.iter().find(|h| identity::matches(&h.vars, installation, object_type, coord))
}

fn find_service<'m>(existing: &'m [MService], installation: &str, object_type: ObjectType, coord: Coordinate) -> Option<&'m MService> {
    existing.iter().find(|s| identity::matches(&s.vars, installation, object_type, coord))
}

/// Custom checks have no marker dimension of their own beyond the owning
/// service's coordinate, so disambiguating siblings (`check1` vs `check2`
/// on the same service) additionally requires a name match.
fn find_custom_check<'m>(existing: &'m [MService], name: &str, installation: &str, coord: Coordinate) -> Option<&'m MService> {
    existing.iter().find(|s| s.name == name && identity::matches(&s.vars, installation, ObjectType::CustomCheck, coord))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeevent::ChangeEventEmitter;
    use crate::inventory::MockInventoryClient;
    use crate::monitoring::MockMonitoringClient;
    use std::sync::Mutex;

    fn base_config() -> Config {
        let _guard = ENV_LOCK.lock().unwrap();
        for var in [
            "RANCHER_URL", "RANCHER_ACCESS_KEY", "RANCHER_SECRET_KEY", "ICINGA_URL", "ICINGA_USER",
            "ICINGA_PASSWORD", "REFRESH_INTERVAL", "FILTER_ENVIRONMENTS", "FILTER_HOSTS", "FILTER_STACKS",
            "FILTER_SERVICES",
        ] {
            std::env::remove_var(var);
        }
        std::env::set_var("RANCHER_URL", "https://rancher.example.com");
        std::env::set_var("RANCHER_ACCESS_KEY", "ak");
        std::env::set_var("RANCHER_SECRET_KEY", "sk");
        std::env::set_var("ICINGA_URL", "https://icinga.example.com");
        std::env::set_var("ICINGA_USER", "root");
        std::env::set_var("ICINGA_PASSWORD", "secret");
        Config::from_env().unwrap()
    }

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn phase1_creates_hostgroup_for_new_environment() {
        let config = base_config();
        let mut inventory = MockInventoryClient::new();
        inventory.expect_list_environments().returning(|| {
            Ok(vec![Environment { id: "1a5".into(), name: "Default".into() }])
        });
        let mut monitoring = MockMonitoringClient::new();
        monitoring.expect_list_host_groups().returning(|| Ok(vec![]));
        monitoring
            .expect_create_host_group()
            .withf(|hg| hg.name == "Default" && hg.vars.get("rancher_environment") == Some("Default"))
            .times(1)
            .returning(|_| Ok(()));

        let emitter = ChangeEventEmitter::disabled();
        let reconciler = Reconciler::new(&inventory, &monitoring, &emitter, &config);
        reconciler.phase1_environments_to_hostgroups().unwrap();
    }

    #[test]
    fn phase1_is_idempotent_when_bag_already_matches() {
        let config = base_config();
        let vars = mapper::map_hostgroup("Default", &config.installation, &config.hostgroup_default);
        let mut inventory = MockInventoryClient::new();
        inventory.expect_list_environments().returning(|| {
            Ok(vec![Environment { id: "1a5".into(), name: "Default".into() }])
        });
        let mut monitoring = MockMonitoringClient::new();
        monitoring
            .expect_list_host_groups()
            .returning(move || Ok(vec![MHostGroup { name: "Default".into(), vars: vars.clone() }]));
        monitoring.expect_create_host_group().times(0);
        monitoring.expect_update_host_group().times(0);

        let emitter = ChangeEventEmitter::disabled();
        let reconciler = Reconciler::new(&inventory, &monitoring, &emitter, &config);
        reconciler.phase1_environments_to_hostgroups().unwrap();
    }

    #[test]
    fn phase2_deletes_hostgroup_whose_environment_vanished() {
        let config = base_config();
        let vars = mapper::map_hostgroup("Gone", &config.installation, &config.hostgroup_default);
        let mut inventory = MockInventoryClient::new();
        inventory.expect_list_environments().returning(|| Ok(vec![]));
        let mut monitoring = MockMonitoringClient::new();
        monitoring
            .expect_list_host_groups()
            .returning(move || Ok(vec![MHostGroup { name: "Gone".into(), vars: vars.clone() }]));
        monitoring.expect_delete_host_group().withf(|n| n == "Gone").times(1).returning(|_| Ok(()));

        let emitter = ChangeEventEmitter::disabled();
        let reconciler = Reconciler::new(&inventory, &monitoring, &emitter, &config);
        reconciler.phase2_hostgroups_to_environments().unwrap();
    }

    #[test]
    fn phase2_ignores_hostgroup_from_another_installation() {
        let config = base_config();
        let mut foreign_vars = VarBag::new();
        foreign_vars.insert("rancher_installation", "other");
        foreign_vars.insert("rancher_object_type", "environment");
        foreign_vars.insert("rancher_environment", "Gone");

        let mut inventory = MockInventoryClient::new();
        inventory.expect_list_environments().returning(|| Ok(vec![]));
        let mut monitoring = MockMonitoringClient::new();
        monitoring
            .expect_list_host_groups()
            .returning(move || Ok(vec![MHostGroup { name: "Gone".into(), vars: foreign_vars.clone() }]));
        monitoring.expect_delete_host_group().times(0);

        let emitter = ChangeEventEmitter::disabled();
        let reconciler = Reconciler::new(&inventory, &monitoring, &emitter, &config);
        reconciler.phase2_hostgroups_to_environments().unwrap();
    }
}
