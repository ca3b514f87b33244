//! Filter evaluator (§4.1): compiles and evaluates a comma-separated
//! include/exclude rule list against an entity of a known kind.
//!
//! Grounded on `original_source/filter.go`: the rule-splitting regex, the
//! `!L` last-match-wins-terminate suffix, and the kind-specific predicate
//! dispatch (`%ENV=`, `%SYSTEM`, `%STACK=`, `%HAS_SERVICE(...)`, bare glob,
//! `key=value`) are all translated one-to-one. Glob matching uses the
//! `globset` crate (whole-string match), the same role `gobwas/glob` played
//! in the original; this choice is grounded in the tagged filterer of the
//! `other_examples` reference `watchexec-watchexec` repository, which uses
//! `globset` for the same single-string-against-pattern purpose.

use globset::{Glob, GlobMatcher};
use regex::Regex;
use std::sync::OnceLock;

#[derive(thiserror::Error, Debug)]
pub enum FilterError {
    #[error("malformed filter rule `{0}`")]
    MalformedRule(String),
    #[error("invalid glob pattern `{pattern}`: {source}")]
    InvalidGlob { pattern: String, source: globset::Error },
}

fn rule_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([+-]?)([a-zA-Z0-9.=_*%()-]*)(!L)?$").unwrap())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sign {
    Include,
    Exclude,
}

#[derive(Debug, Clone)]
struct Rule {
    sign: Sign,
    predicate: String,
    terminal: bool,
}

fn compile_glob(pattern: &str) -> Result<GlobMatcher, FilterError> {
    Glob::new(pattern)
        .map(|g| g.compile_matcher())
        .map_err(|source| FilterError::InvalidGlob { pattern: pattern.to_string(), source })
}

fn glob_match(pattern: &str, candidate: &str) -> Result<bool, FilterError> {
    Ok(compile_glob(pattern)?.is_match(candidate))
}

/// A compiled filter expression, ready to be evaluated against entities of
/// one kind via [`Filter::evaluate`].
#[derive(Debug, Clone)]
pub struct Filter {
    rules: Vec<Rule>,
}

impl Filter {
    /// Compiles a comma-separated rule list. A filter-syntax error is
    /// fatal (§7); an empty expression is permissive and always matches.
    pub fn compile(expr: &str) -> Result<Self, FilterError> {
        if expr.is_empty() {
            // A purely empty rule string is permissive (§4.1): seed the
            // accumulator with a single empty-predicate include rule rather
            // than leaving the rule list empty, which would make
            // `evaluate`'s `matched = false` start value the final answer.
            return Ok(Filter { rules: vec![Rule { sign: Sign::Include, predicate: String::new(), terminal: false }] });
        }
        let mut rules = Vec::new();
        for raw in expr.split(',') {
            let caps = rule_re()
                .captures(raw)
                .ok_or_else(|| FilterError::MalformedRule(raw.to_string()))?;
            let sign = match caps.get(1).map(|m| m.as_str()) {
                Some("-") => Sign::Exclude,
                _ => Sign::Include,
            };
            let predicate = caps.get(2).map(|m| m.as_str()).unwrap_or_default().to_string();
            let terminal = caps.get(3).is_some();
            rules.push(Rule { sign, predicate, terminal });
        }
        Ok(Filter { rules })
    }

    /// Evaluates the filter against one entity, dispatching each rule's
    /// predicate through `eval_predicate`. Returns the final `matched`
    /// value, short-circuiting on the first `!L`-terminated matching rule.
    fn evaluate(&self, mut eval_predicate: impl FnMut(&str) -> Result<bool, FilterError>) -> Result<bool, FilterError> {
        let mut matched = false;
        for rule in &self.rules {
            if eval_predicate(&rule.predicate)? {
                matched = rule.sign == Sign::Include;
                if rule.terminal {
                    return Ok(matched);
                }
            }
        }
        Ok(matched)
    }

    pub fn evaluate_environment(&self, env: &EnvironmentSubject) -> Result<bool, FilterError> {
        self.evaluate(|predicate| predicate_environment(predicate, env))
    }

    pub fn evaluate_host(&self, host: &HostSubject) -> Result<bool, FilterError> {
        self.evaluate(|predicate| predicate_host(predicate, host))
    }

    pub fn evaluate_stack(&self, stack: &StackSubject) -> Result<bool, FilterError> {
        self.evaluate(|predicate| predicate_stack(predicate, stack))
    }

    pub fn evaluate_service(&self, service: &ServiceSubject) -> Result<bool, FilterError> {
        self.evaluate(|predicate| predicate_service(predicate, service))
    }
}

/// Minimal views of each inventory kind the filter predicates need; kept
/// separate from the inventory module's full entity types so this module
/// has no dependency on the client layer.
pub struct EnvironmentSubject<'a> {
    pub name: &'a str,
}

pub struct HostSubject<'a> {
    pub hostname: &'a str,
    pub environment_name: &'a str,
    pub labels: &'a [(String, String)],
}

pub struct StackSubject<'a> {
    pub name: &'a str,
    pub environment_name: &'a str,
    pub system: bool,
    pub service_names: &'a [String],
    pub service_labels: &'a [(String, Vec<(String, String)>)],
}

pub struct ServiceSubject<'a> {
    pub name: &'a str,
    pub environment_name: &'a str,
    pub stack_name: &'a str,
    pub system: bool,
    pub labels: &'a [(String, String)],
}

fn strip_prefix_suffix<'a>(s: &'a str, prefix: &str, suffix: &str) -> Option<&'a str> {
    s.strip_prefix(prefix)?.strip_suffix(suffix)
}

fn predicate_environment(predicate: &str, env: &EnvironmentSubject) -> Result<bool, FilterError> {
    if predicate.is_empty() {
        return Ok(true);
    }
    glob_match(predicate, env.name)
}

fn predicate_host(predicate: &str, host: &HostSubject) -> Result<bool, FilterError> {
    if predicate.is_empty() {
        return Ok(true);
    }
    if let Some(glob) = predicate.strip_prefix("%ENV=") {
        return glob_match(glob, host.environment_name);
    }
    if predicate.contains('=') && !predicate.starts_with('%') {
        for (k, v) in host.labels {
            if glob_match(predicate, &format!("{k}={v}"))? {
                return Ok(true);
            }
        }
        return Ok(false);
    }
    glob_match(predicate, host.hostname)
}

fn predicate_stack(predicate: &str, stack: &StackSubject) -> Result<bool, FilterError> {
    if predicate.is_empty() {
        return Ok(true);
    }
    if let Some(glob) = predicate.strip_prefix("%ENV=") {
        return glob_match(glob, stack.environment_name);
    }
    if predicate == "%SYSTEM" {
        return Ok(stack.system);
    }
    if let Some(inner) = strip_prefix_suffix(predicate, "%HAS_SERVICE(", ")") {
        if let Some((key_glob, value_glob)) = inner.split_once('=') {
            let combined = format!("{key_glob}={value_glob}");
            for (_service_name, labels) in stack.service_labels {
                for (k, v) in labels {
                    if glob_match(&combined, &format!("{k}={v}"))? {
                        return Ok(true);
                    }
                }
            }
            return Ok(false);
        }
        for name in stack.service_names {
            if glob_match(inner, name)? {
                return Ok(true);
            }
        }
        return Ok(false);
    }
    glob_match(predicate, stack.name)
}

fn predicate_service(predicate: &str, service: &ServiceSubject) -> Result<bool, FilterError> {
    if predicate.is_empty() {
        return Ok(true);
    }
    if let Some(glob) = predicate.strip_prefix("%ENV=") {
        return glob_match(glob, service.environment_name);
    }
    if predicate == "%SYSTEM" {
        return Ok(service.system);
    }
    if let Some(glob) = predicate.strip_prefix("%STACK=") {
        return glob_match(glob, service.stack_name);
    }
    if predicate.contains('=') && !predicate.starts_with('%') {
        for (k, v) in service.labels {
            if glob_match(predicate, &format!("{k}={v}"))? {
                return Ok(true);
            }
        }
        return Ok(false);
    }
    glob_match(predicate, service.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    #[case("*", "Default", true)]
    #[case("", "whatever", true)]
    #[case("-*", "Default", false)]
    #[case("Default,prod,dev,test", "Default", true)]
    #[case("Default,prod,dev,test", "myuser-Default", false)]
    fn environment_filter_monotonicity(#[case] expr: &str, #[case] name: &str, #[case] expected: bool) {
        let f = Filter::compile(expr).unwrap();
        assert_eq!(f.evaluate_environment(&EnvironmentSubject { name }).unwrap(), expected);
    }

    #[test]
    fn host_label_predicate() {
        let labels = vec![("monitor".to_string(), "true".to_string()), ("stage".to_string(), "develop".to_string())];
        let host = HostSubject { hostname: "agent01.mysite.com", environment_name: "Default", labels: &labels };

        assert!(Filter::compile("agent01.mysite.com,stage=develop").unwrap().evaluate_host(&host).unwrap());
        assert!(!Filter::compile("agent02.mysite.com").unwrap().evaluate_host(&host).unwrap());
        assert!(!Filter::compile("*,-stage=develop").unwrap().evaluate_host(&host).unwrap());
    }

    #[test]
    fn last_match_wins_terminates() {
        let labels = vec![("stage".to_string(), "develop".to_string())];
        let host = HostSubject { hostname: "agent01.mysite.com", environment_name: "Default", labels: &labels };
        assert!(!Filter::compile("-agent01.mysite.com!L,stage=develop").unwrap().evaluate_host(&host).unwrap());
    }

    #[test]
    fn host_env_predicate() {
        let labels: Vec<(String, String)> = vec![];
        let host = HostSubject { hostname: "agent01.mysite.com", environment_name: "Default", labels: &labels };
        assert!(Filter::compile("%ENV=Default").unwrap().evaluate_host(&host).unwrap());
        assert!(!Filter::compile("%ENV=something").unwrap().evaluate_host(&host).unwrap());
        assert!(!Filter::compile("*,-%ENV=Default").unwrap().evaluate_host(&host).unwrap());
    }

    #[test]
    fn stack_system_and_has_service() {
        let service_labels =
            vec![("service1".to_string(), vec![("monitor".to_string(), "true".to_string())])];
        let stack1 = StackSubject {
            name: "mygreatapp",
            environment_name: "Default",
            system: false,
            service_names: &["service1".to_string()],
            service_labels: &service_labels,
        };
        assert!(Filter::compile("%HAS_SERVICE(service1)").unwrap().evaluate_stack(&stack1).unwrap());
        assert!(Filter::compile("%HAS_SERVICE(monitor=true)").unwrap().evaluate_stack(&stack1).unwrap());
        assert!(!Filter::compile("%SYSTEM").unwrap().evaluate_stack(&stack1).unwrap());

        let stack2 = StackSubject {
            name: "healthcheck",
            environment_name: "Default",
            system: true,
            service_names: &[],
            service_labels: &[],
        };
        assert!(Filter::compile("%SYSTEM").unwrap().evaluate_stack(&stack2).unwrap());
        assert!(!Filter::compile("-%SYSTEM").unwrap().evaluate_stack(&stack2).unwrap());
    }

    #[test]
    fn service_stack_predicate() {
        let labels = vec![("monitor".to_string(), "true".to_string())];
        let service = ServiceSubject {
            name: "service1",
            environment_name: "Default",
            stack_name: "mystack",
            system: false,
            labels: &labels,
        };
        assert!(Filter::compile("%STACK=mystack").unwrap().evaluate_service(&service).unwrap());
        assert!(!Filter::compile("%STACK=anotherstack").unwrap().evaluate_service(&service).unwrap());
        assert!(Filter::compile("monitor=true").unwrap().evaluate_service(&service).unwrap());
        assert!(!Filter::compile("monitor=whatever").unwrap().evaluate_service(&service).unwrap());
    }

    #[test]
    fn combined_stack_and_service_filters_idempotent_over_two_runs() {
        let f_stack = Filter::compile("*,-%HAS_SERVICE(monitor=false)").unwrap();
        let f_service = Filter::compile("*,-monitor=false").unwrap();

        let labels_a = vec![("monitor".to_string(), "true".to_string())];
        let labels_b = vec![("monitor".to_string(), "false".to_string())];
        let service_labels = vec![
            ("svcA".to_string(), labels_a.clone()),
            ("svcB".to_string(), labels_b.clone()),
        ];
        let stack = StackSubject {
            name: "mixed",
            environment_name: "Default",
            system: false,
            service_names: &["svcA".to_string(), "svcB".to_string()],
            service_labels: &service_labels,
        };
        // stack contains a disabled service, so it is excluded both times.
        for _ in 0..2 {
            assert!(!f_stack.evaluate_stack(&stack).unwrap());
        }

        let svc_a = ServiceSubject {
            name: "svcA",
            environment_name: "Default",
            stack_name: "mixed",
            system: false,
            labels: &labels_a,
        };
        let svc_b = ServiceSubject {
            name: "svcB",
            environment_name: "Default",
            stack_name: "mixed",
            system: false,
            labels: &labels_b,
        };
        for _ in 0..2 {
            assert!(f_service.evaluate_service(&svc_a).unwrap());
            assert!(!f_service.evaluate_service(&svc_b).unwrap());
        }
    }

    #[test]
    fn malformed_rule_is_an_error() {
        assert!(Filter::compile("@@@").is_err());
    }
}
