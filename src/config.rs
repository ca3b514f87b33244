//! Configuration loader (§6, SPEC_FULL §6 [AMBIENT]): reads and validates
//! every environment variable from §6's tables once at startup into a
//! typed, immutable [`Config`]. No other component reads `std::env`
//! directly.
//!
//! Grounded on the teacher's config-from-env pattern in
//! `agent-control/src/agent_control/config.rs` (typed config struct built
//! from a fallible constructor, defaults applied inline) and on
//! `src/filter.rs`/`src/template.rs` for the "compile once at startup, a
//! syntax error is fatal" rule (§4.1/§4.2/§7).

use std::env;

use url::Url;

use crate::filter::{Filter, FilterError};
use crate::template::{NameTemplate, TemplateError};
use crate::vars::VarBag;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingRequired(&'static str),
    #[error("REFRESH_INTERVAL must be a non-negative integer number of seconds, got `{0}`")]
    InvalidInterval(String),
    #[error("REGISTER_CHANGES is not a valid URL: {0}")]
    InvalidRegisterChangesUrl(#[from] url::ParseError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// The verbosity tier `ICINGA_DEBUG` selects (§2, component 11): absent is
/// `warn`, and `1`/`2`/`3` step up through `info`/`debug`/`trace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugLevel {
    Warn,
    Info,
    Debug,
    Trace,
}

impl DebugLevel {
    fn from_env(raw: &str) -> Self {
        match raw {
            "1" => DebugLevel::Info,
            "2" => DebugLevel::Debug,
            "3" => DebugLevel::Trace,
            _ => DebugLevel::Warn,
        }
    }

    pub fn as_tracing_level(self) -> tracing::Level {
        match self {
            DebugLevel::Warn => tracing::Level::WARN,
            DebugLevel::Info => tracing::Level::INFO,
            DebugLevel::Debug => tracing::Level::DEBUG,
            DebugLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub rancher_url: String,
    pub rancher_access_key: String,
    pub rancher_secret_key: String,

    pub icinga_url: String,
    pub icinga_user: String,
    pub icinga_password: String,
    pub icinga_insecure_tls: bool,
    pub debug_level: DebugLevel,

    pub host_check_command: String,
    pub stack_check_command: String,
    pub service_check_command: String,
    pub agent_service_check_command: String,

    pub installation: String,

    pub filter_environments: Filter,
    pub filter_hosts: Filter,
    pub filter_stacks: Filter,
    pub filter_services: Filter,

    pub hostgroup_default: VarBag,
    pub host_default: VarBag,
    pub stack_default: VarBag,
    pub service_default: VarBag,

    pub refresh_interval_secs: u64,

    pub environment_name_template: NameTemplate,
    pub stack_name_template: NameTemplate,

    pub register_changes: Option<Url>,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingRequired(name))
}

fn optional(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Folds the three injected marker defaults (`rancher_url`,
/// `rancher_access_key`, `rancher_secret_key`) into an operator-supplied
/// default bag, matching §6's "overlaid with RANCHER_URL/access/secret
/// keys" rule. Done once here rather than per-object in the mappers.
fn default_bag_with_injected(raw: &str, rancher_url: &str, access_key: &str, secret_key: &str) -> VarBag {
    let mut bag = VarBag::unpack(raw);
    bag.insert(crate::identity::RANCHER_URL, rancher_url);
    bag.insert(crate::identity::RANCHER_ACCESS_KEY, access_key);
    bag.insert(crate::identity::RANCHER_SECRET_KEY, secret_key);
    bag
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let rancher_url = required("RANCHER_URL")?;
        let rancher_access_key = required("RANCHER_ACCESS_KEY")?;
        let rancher_secret_key = required("RANCHER_SECRET_KEY")?;

        let icinga_url = required("ICINGA_URL")?;
        let icinga_user = required("ICINGA_USER")?;
        let icinga_password = required("ICINGA_PASSWORD")?;
        let icinga_insecure_tls = !optional("ICINGA_INSECURE_TLS", "").is_empty();
        let debug_level = DebugLevel::from_env(&optional("ICINGA_DEBUG", ""));

        let host_check_command = optional("HOST_CHECK_COMMAND", "hostalive");
        let stack_check_command = optional("STACK_CHECK_COMMAND", "check_rancher_stack");
        let service_check_command = optional("SERVICE_CHECK_COMMAND", "check_rancher_service");
        let agent_service_check_command = optional("AGENT_SERVICE_CHECK_COMMAND", "check_rancher_host");

        let installation = optional("RANCHER_INSTALLATION", "default");

        let filter_environments = Filter::compile(&optional("FILTER_ENVIRONMENTS", ""))?;
        let filter_hosts = Filter::compile(&optional("FILTER_HOSTS", ""))?;
        let filter_stacks = Filter::compile(&optional("FILTER_STACKS", ""))?;
        let filter_services = Filter::compile(&optional("FILTER_SERVICES", ""))?;

        let hostgroup_default = default_bag_with_injected(
            &optional("HOSTGROUP_DEFAULT_ICINGA_VARS", ""),
            &rancher_url,
            &rancher_access_key,
            &rancher_secret_key,
        );
        let host_default = default_bag_with_injected(
            &optional("HOST_DEFAULT_ICINGA_VARS", ""),
            &rancher_url,
            &rancher_access_key,
            &rancher_secret_key,
        );
        let stack_default = default_bag_with_injected(
            &optional("STACK_DEFAULT_ICINGA_VARS", ""),
            &rancher_url,
            &rancher_access_key,
            &rancher_secret_key,
        );
        let service_default = default_bag_with_injected(
            &optional("SERVICE_DEFAULT_ICINGA_VARS", ""),
            &rancher_url,
            &rancher_access_key,
            &rancher_secret_key,
        );

        let refresh_raw = optional("REFRESH_INTERVAL", "0");
        let refresh_interval_secs: u64 =
            refresh_raw.parse().map_err(|_| ConfigError::InvalidInterval(refresh_raw.clone()))?;

        let environment_name_template = match env::var("ENVIRONMENT_NAME_TEMPLATE") {
            Ok(raw) => NameTemplate::compile("environment-name", raw)?,
            Err(_) => NameTemplate::environment_default(),
        };
        let stack_name_template = match env::var("STACK_NAME_TEMPLATE") {
            Ok(raw) => NameTemplate::compile("stack-host-name", raw)?,
            Err(_) => NameTemplate::stack_default(),
        };

        let register_changes = match env::var("REGISTER_CHANGES") {
            Ok(raw) if !raw.is_empty() => Some(Url::parse(&raw)?),
            _ => None,
        };

        Ok(Config {
            rancher_url,
            rancher_access_key,
            rancher_secret_key,
            icinga_url,
            icinga_user,
            icinga_password,
            icinga_insecure_tls,
            debug_level,
            host_check_command,
            stack_check_command,
            service_check_command,
            agent_service_check_command,
            installation,
            filter_environments,
            filter_hosts,
            filter_stacks,
            filter_services,
            hostgroup_default,
            host_default,
            stack_default,
            service_default,
            refresh_interval_secs,
            environment_name_template,
            stack_name_template,
            register_changes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that
    // mutate them so they don't race under the default parallel test
    // runner.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_all() {
        for var in [
            "RANCHER_URL", "RANCHER_ACCESS_KEY", "RANCHER_SECRET_KEY", "ICINGA_URL", "ICINGA_USER",
            "ICINGA_PASSWORD", "ICINGA_INSECURE_TLS", "ICINGA_DEBUG", "HOST_CHECK_COMMAND",
            "STACK_CHECK_COMMAND", "SERVICE_CHECK_COMMAND", "AGENT_SERVICE_CHECK_COMMAND",
            "RANCHER_INSTALLATION", "FILTER_ENVIRONMENTS", "FILTER_HOSTS", "FILTER_STACKS",
            "FILTER_SERVICES", "HOSTGROUP_DEFAULT_ICINGA_VARS", "HOST_DEFAULT_ICINGA_VARS",
            "STACK_DEFAULT_ICINGA_VARS", "SERVICE_DEFAULT_ICINGA_VARS", "REFRESH_INTERVAL",
            "ENVIRONMENT_NAME_TEMPLATE", "STACK_NAME_TEMPLATE", "REGISTER_CHANGES",
        ] {
            env::remove_var(var);
        }
    }

    fn set_required() {
        env::set_var("RANCHER_URL", "https://rancher.example.com");
        env::set_var("RANCHER_ACCESS_KEY", "ak");
        env::set_var("RANCHER_SECRET_KEY", "sk");
        env::set_var("ICINGA_URL", "https://icinga.example.com");
        env::set_var("ICINGA_USER", "root");
        env::set_var("ICINGA_PASSWORD", "secret");
    }

    #[test]
    fn missing_required_var_is_fatal() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        assert!(matches!(Config::from_env(), Err(ConfigError::MissingRequired("RANCHER_URL"))));
    }

    #[test]
    fn defaults_apply_when_optional_vars_absent() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        set_required();
        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.host_check_command, "hostalive");
        assert_eq!(cfg.installation, "default");
        assert_eq!(cfg.refresh_interval_secs, 0);
        assert_eq!(cfg.hostgroup_default.get("rancher_url"), Some("https://rancher.example.com"));
    }

    #[test]
    fn invalid_refresh_interval_is_fatal() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        set_required();
        env::set_var("REFRESH_INTERVAL", "soon");
        assert!(matches!(Config::from_env(), Err(ConfigError::InvalidInterval(_))));
    }

    #[test]
    fn malformed_template_is_fatal() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        set_required();
        env::set_var("ENVIRONMENT_NAME_TEMPLATE", "{{unbalanced");
        assert!(Config::from_env().is_err());
    }
}
