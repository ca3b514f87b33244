//! Change-event emitter (§4.8): best-effort HTTP POST of each mutation to
//! an external URL, if `REGISTER_CHANGES` is configured.
//!
//! Grounded on `original_source/eventlistener/rancher-icinga-event-listener.go`
//! for the wire shape (`{operation, name, type, vars, object}`) and on
//! `inventory::client::RancherHttpClient`/`monitoring::client::IcingaHttpClient`
//! for the `reqwest::blocking` usage. Delivery failures are logged and
//! otherwise have no effect on reconciliation, per §7.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;
use url::Url;

use crate::vars::VarBag;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Create,
    Update,
    Delete,
    DeleteCascade,
}

/// A monitoring object's kind tag, as recorded in the `type` field of the
/// emitted event. Distinct from [`crate::identity::ObjectType`], which is
/// the ownership-marker tag stored inside `vars`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Hostgroup,
    Host,
    Service,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    pub operation: Operation,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    pub vars: VarsJson,
    pub object: Value,
}

/// `VarBag` serialized as a plain JSON object of strings, matching the
/// wire shape consumed by the original event listener.
#[derive(Debug, Clone)]
pub struct VarsJson(pub VarBag);

impl Serialize for VarsJson {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.0.iter().count()))?;
        for (k, v) in self.0.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Posts [`ChangeEvent`]s to a configured URL, or does nothing when
/// unconfigured. TLS verification is intentionally disabled for this sink
/// (§6), independent of the monitoring backend's own TLS setting.
pub struct ChangeEventEmitter {
    http: Client,
    url: Option<Url>,
}

impl ChangeEventEmitter {
    pub fn new(url: Option<Url>) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()
            .expect("reqwest client with no exotic configuration must build");
        Self { http, url }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn emit(&self, event: &ChangeEvent) {
        let Some(url) = &self.url else { return };
        let response = self.http.post(url.clone()).json(event).send();
        match response {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => warn!(status = %resp.status(), name = %event.name, "change event delivery returned a non-success status"),
            Err(err) => warn!(error = %err, name = %event.name, "change event delivery failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_emitter_does_not_panic() {
        let emitter = ChangeEventEmitter::disabled();
        let event = ChangeEvent {
            operation: Operation::Create,
            name: "Default".into(),
            kind: ObjectKind::Hostgroup,
            vars: VarsJson(VarBag::new()),
            object: Value::Null,
        };
        emitter.emit(&event);
    }

    #[test]
    fn operation_serializes_as_kebab_case() {
        let json = serde_json::to_string(&Operation::DeleteCascade).unwrap();
        assert_eq!(json, "\"delete-cascade\"");
    }
}
