//! Variable-bag algebra: the string-keyed, string-valued maps ("custom
//! variables") attached to every monitoring object.
//!
//! Grounded on the `Labels` newtype over `BTreeMap` in
//! `agent-control/src/k8s/labels.rs` (ownership/default-merge shape) and on
//! `agent-control/src/values/yaml_config.rs`'s `merge_override` (later value
//! wins on conflict).

use std::collections::BTreeMap;
use std::fmt;

/// A variable bag: `BTreeMap` gives deterministic iteration, which keeps
/// rendered payloads (change events, logs) stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct VarBag(BTreeMap<String, String>);

impl VarBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `b`'s values win on key conflict.
    pub fn merge(a: &VarBag, b: &VarBag) -> VarBag {
        let mut merged = a.0.clone();
        for (k, v) in &b.0 {
            merged.insert(k.clone(), v.clone());
        }
        VarBag(merged)
    }

    /// Parses `k1=v1,k2=v2,...`. Entries without exactly one `=` are
    /// skipped silently, matching the original tool's `strings.Split`-based
    /// parser.
    pub fn unpack(s: &str) -> VarBag {
        let mut bag = VarBag::new();
        if s.is_empty() {
            return bag;
        }
        for entry in s.split(',') {
            let mut parts = entry.split('=');
            let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            if key.is_empty() {
                continue;
            }
            bag.insert(key, value);
        }
        bag
    }

    /// True iff every key in `a` has an equal counterpart in `b` and vice
    /// versa. `varsNeedUpdate` in the reconciler is `!equal(a, b)`.
    pub fn equal(a: &VarBag, b: &VarBag) -> bool {
        a.0 == b.0
    }
}

impl fmt::Display for VarBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.0 {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{k}={v}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_right_hand_side() {
        let a = VarBag::from_pairs([("k1", "v1"), ("k2", "a")]);
        let b = VarBag::from_pairs([("k2", "b"), ("k3", "v3")]);
        let merged = VarBag::merge(&a, &b);
        assert_eq!(merged.get("k1"), Some("v1"));
        assert_eq!(merged.get("k2"), Some("b"));
        assert_eq!(merged.get("k3"), Some("v3"));
    }

    #[test]
    fn unpack_skips_malformed_entries() {
        let bag = VarBag::unpack("a=1,b,=c,d=2,e=f=g");
        assert_eq!(bag.get("a"), Some("1"));
        assert_eq!(bag.get("d"), Some("2"));
        assert_eq!(bag.get("b"), None);
        assert_eq!(bag.get(""), None);
        assert_eq!(bag.get("e"), None);
    }

    #[test]
    fn unpack_empty_string_is_empty_bag() {
        assert!(VarBag::unpack("").is_empty());
    }

    #[test]
    fn equal_is_symmetric_key_coverage() {
        let a = VarBag::from_pairs([("a", "1"), ("b", "2")]);
        let b = VarBag::from_pairs([("a", "1"), ("b", "2")]);
        assert!(VarBag::equal(&a, &b));

        let c = VarBag::from_pairs([("a", "1")]);
        assert!(!VarBag::equal(&a, &c));
        assert!(!VarBag::equal(&c, &a));
    }

    #[test]
    fn needs_update_is_negation_of_equal() {
        let a = VarBag::from_pairs([("a", "1")]);
        let b = VarBag::from_pairs([("a", "2")]);
        assert!(!VarBag::equal(&a, &b));
    }
}
