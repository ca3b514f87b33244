//! Name templater: expands the two user-configurable name templates
//! (`ENVIRONMENT_NAME_TEMPLATE`, `STACK_NAME_TEMPLATE`) from a fixed
//! parameter record.
//!
//! The original tool used Go's `text/template`; its grammar here is a
//! strict subset (plain `{{key}}` substitution, no conditionals or
//! functions), so rather than pull in a full template engine this mirrors
//! the teacher's own small regex-driven substitution approach in
//! `agent-control/src/agent_type/templates.rs` (a cached, compiled `Regex`
//! behind a `OnceLock`, one substitution pass over capture matches).

use regex::Regex;
use std::sync::OnceLock;

const DEFAULT_ENVIRONMENT_NAME_TEMPLATE: &str = "{{environment}}";
const DEFAULT_STACK_NAME_TEMPLATE: &str = "{{environment}}.{{stack}}";

#[derive(thiserror::Error, Debug)]
pub enum TemplateError {
    #[error("failed to parse name template {which}: unbalanced braces in `{template}`")]
    UnbalancedBraces { which: &'static str, template: String },
    #[error("template `{template}` references unknown placeholder `{key}`")]
    UnknownKey { template: String, key: String },
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*)\s*\}\}").unwrap())
}

/// The fixed parameter record every template call site renders against.
/// Fields not meaningful for a particular call (e.g. `service` when naming
/// a host group) are passed as the empty string.
#[derive(Debug, Clone, Default)]
pub struct TemplateParams<'a> {
    pub hostname: &'a str,
    pub rancher_url: &'a str,
    pub rancher_access_key: &'a str,
    pub rancher_secret_key: &'a str,
    pub environment: &'a str,
    pub stack: &'a str,
    pub service: &'a str,
}

impl<'a> TemplateParams<'a> {
    fn lookup(&self, key: &str) -> Option<&'a str> {
        match key {
            "hostname" => Some(self.hostname),
            "rancherUrl" | "rancher_url" => Some(self.rancher_url),
            "rancherAccessKey" | "rancher_access_key" => Some(self.rancher_access_key),
            "rancherSecretKey" | "rancher_secret_key" => Some(self.rancher_secret_key),
            "environment" => Some(self.environment),
            "stack" => Some(self.stack),
            "service" => Some(self.service),
            _ => None,
        }
    }
}

/// A compiled name template. Construction validates brace-balance so that a
/// malformed template is rejected at startup (§4.2); rendering further
/// validates that every placeholder resolves, which is the Rust analogue of
/// the original's "panic on template execution error".
#[derive(Debug, Clone)]
pub struct NameTemplate {
    which: &'static str,
    source: String,
}

impl NameTemplate {
    pub fn compile(which: &'static str, source: impl Into<String>) -> Result<Self, TemplateError> {
        let source = source.into();
        if source.matches("{{").count() != source.matches("}}").count() {
            return Err(TemplateError::UnbalancedBraces { which, template: source });
        }
        Ok(Self { which, source })
    }

    pub fn environment_default() -> Self {
        Self::compile("environment-name", DEFAULT_ENVIRONMENT_NAME_TEMPLATE)
            .expect("built-in default template must be valid")
    }

    pub fn stack_default() -> Self {
        Self::compile("stack-host-name", DEFAULT_STACK_NAME_TEMPLATE)
            .expect("built-in default template must be valid")
    }

    pub fn render(&self, params: &TemplateParams) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.source.len());
        let mut last_end = 0;
        for caps in placeholder_re().captures_iter(&self.source) {
            let whole = caps.get(0).unwrap();
            let key = caps.get(1).unwrap().as_str();
            out.push_str(&self.source[last_end..whole.start()]);
            let value = params.lookup(key).ok_or_else(|| TemplateError::UnknownKey {
                template: self.source.clone(),
                key: key.to_string(),
            })?;
            out.push_str(value);
            last_end = whole.end();
        }
        out.push_str(&self.source[last_end..]);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_default_environment_template() {
        let tmpl = NameTemplate::environment_default();
        let params = TemplateParams { environment: "Default", ..Default::default() };
        assert_eq!(tmpl.render(&params).unwrap(), "Default");
    }

    #[test]
    fn renders_default_stack_template() {
        let tmpl = NameTemplate::stack_default();
        let params = TemplateParams { environment: "Default", stack: "mystack", ..Default::default() };
        assert_eq!(tmpl.render(&params).unwrap(), "Default.mystack");
    }

    #[test]
    fn unknown_placeholder_is_rejected() {
        let tmpl = NameTemplate::compile("test", "{{nope}}").unwrap();
        assert!(tmpl.render(&TemplateParams::default()).is_err());
    }

    #[test]
    fn unbalanced_braces_rejected_at_compile_time() {
        assert!(NameTemplate::compile("test", "{{environment}").is_err());
    }
}
