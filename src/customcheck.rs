//! Custom-check parser (§4.6): decodes the `icinga.custom_checks` label's
//! YAML payload into a list of auxiliary check definitions.
//!
//! Grounded on `original_source/rancher-icinga_test.go`'s `TestCustomCheck`
//! fixture, which shows the payload is a YAML sequence of mappings with
//! `name` (required), `command`/`notes_url` (optional strings), and `vars`
//! (an optional mapping whose scalar values may be any YAML type and must
//! be stringified on the way out, matching the original's `// yes, a
//! string` assertion on an integer-valued `http_port`).

use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(thiserror::Error, Debug)]
pub enum CustomCheckError {
    #[error("failed to parse icinga.custom_checks payload: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),
    #[error("custom check at index {0} is missing a required `name`")]
    MissingName(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomCheck {
    pub name: String,
    pub command: Option<String>,
    pub notes_url: Option<String>,
    pub vars: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawCustomCheck {
    name: Option<String>,
    command: Option<String>,
    notes_url: Option<String>,
    #[serde(default)]
    vars: BTreeMap<String, serde_yaml::Value>,
}

/// Parses the `icinga.custom_checks` label. An absent label is represented
/// upstream as `None`/empty string and yields the empty list; this function
/// only ever sees a non-empty payload.
pub fn parse(payload: &str) -> Result<Vec<CustomCheck>, CustomCheckError> {
    if payload.trim().is_empty() {
        return Ok(Vec::new());
    }
    let raw: Vec<RawCustomCheck> = serde_yaml::from_str(payload)?;
    raw.into_iter()
        .enumerate()
        .map(|(i, r)| {
            let name = r.name.ok_or(CustomCheckError::MissingName(i))?;
            let vars = r.vars.into_iter().map(|(k, v)| (k, stringify(v))).collect();
            Ok(CustomCheck { name, command: r.command, notes_url: r.notes_url, vars })
        })
        .collect()
}

/// Normalizes a YAML scalar to its string form, matching §4.3's "values
/// coming from user input must be normalized to string form" rule.
fn stringify(value: serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => String::new(),
        other => serde_yaml::to_string(&other).unwrap_or_default().trim_end().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = "- name: check1\n  command: http\n  notes_url: http://docs.mysite.com/check1.html\n  vars:\n    http_address: service1.mystack.rancher.internal\n    http_port: 80\n    http_uri: /health\n- name: check2\n  command: http\n  notes_url: http://docs.mysite.com/check2.html\n  vars:\n    http_address: www.mysite.com\n    http_port: 80\n    http_uri: /health";

    #[test]
    fn parses_two_checks_with_stringified_vars() {
        let checks = parse(PAYLOAD).unwrap();
        assert_eq!(checks.len(), 2);
        assert_eq!(checks[0].name, "check1");
        assert_eq!(checks[0].command.as_deref(), Some("http"));
        assert_eq!(checks[0].vars.get("http_port").map(String::as_str), Some("80"));
        assert_eq!(checks[1].name, "check2");
        assert_eq!(checks[1].vars.get("http_address").map(String::as_str), Some("www.mysite.com"));
    }

    #[test]
    fn empty_payload_is_empty_list() {
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn missing_name_is_an_error() {
        let bad = "- command: http\n  vars:\n    a: b";
        assert!(parse(bad).is_err());
    }
}
