//! HTTP-backed [`MonitoringClient`] implementation against the Icinga2
//! object REST API.
//!
//! Grounded on the same `reqwest::blocking` wrapper shape as
//! `inventory::client::RancherHttpClient`: a connect-and-request-timeout
//! client, one `send`/`list` helper, and `From` conversions between wire
//! shapes and the domain types in [`super::types`]. TLS verification is
//! toggled off via `danger_accept_invalid_certs` per §6's
//! `ICINGA_INSECURE_TLS`.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use super::error::MonitoringError;
use super::types::{Host, HostGroup, Service};
use super::MonitoringClient;
use crate::vars::VarBag;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct IcingaHttpClient {
    http: Client,
    base_url: Url,
    user: String,
    password: String,
}

impl IcingaHttpClient {
    pub fn new(base_url: &str, user: &str, password: &str, insecure_tls: bool) -> Result<Self, MonitoringError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(insecure_tls)
            .build()
            .map_err(MonitoringError::ClientBuild)?;
        let base_url = Url::parse(base_url)
            .map_err(|_| MonitoringError::UnsuccessfulStatus { url: base_url.to_string(), status: reqwest::StatusCode::BAD_REQUEST })?;
        Ok(Self { http, base_url, user: user.to_string(), password: password.to_string() })
    }

    fn url(&self, path: &str) -> Url {
        self.base_url.join(path).unwrap_or_else(|_| self.base_url.clone())
    }

    fn list<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<Vec<T>, MonitoringError> {
        let url = self.url(path);
        let url_str = url.to_string();
        let response = self
            .http
            .get(url)
            .basic_auth(&self.user, Some(&self.password))
            .header("Accept", "application/json")
            .send()
            .map_err(|source| MonitoringError::Request { url: url_str.clone(), source })?;
        if !response.status().is_success() {
            return Err(MonitoringError::UnsuccessfulStatus { url: url_str, status: response.status() });
        }
        let envelope: ResultsEnvelope<T> = response
            .json()
            .map_err(|source| MonitoringError::Decode { url: url_str, source })?;
        Ok(envelope.results)
    }

    fn put(&self, path: &str, body: serde_json::Value) -> Result<(), MonitoringError> {
        self.mutate(reqwest::Method::PUT, path, Some(body), &[])
    }

    fn post(&self, path: &str, body: serde_json::Value) -> Result<(), MonitoringError> {
        self.mutate(reqwest::Method::POST, path, Some(body), &[])
    }

    fn delete(&self, path: &str, query: &[(&str, &str)]) -> Result<(), MonitoringError> {
        self.mutate(reqwest::Method::DELETE, path, None, query)
    }

    fn mutate(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
        query: &[(&str, &str)],
    ) -> Result<(), MonitoringError> {
        let url = self.url(path);
        let url_str = url.to_string();
        let mut builder = self
            .http
            .request(method, url)
            .basic_auth(&self.user, Some(&self.password))
            .header("Accept", "application/json")
            .query(query);
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        let response = builder.send().map_err(|source| MonitoringError::Request { url: url_str.clone(), source })?;
        if !response.status().is_success() {
            return Err(MonitoringError::UnsuccessfulStatus { url: url_str, status: response.status() });
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ResultsEnvelope<T> {
    results: Vec<T>,
}

fn vars_to_json(vars: &VarBag) -> serde_json::Value {
    let map: BTreeMap<&str, &str> = vars.iter().collect();
    json!(map)
}

fn vars_from_json(value: Option<BTreeMap<String, serde_json::Value>>) -> VarBag {
    let mut bag = VarBag::new();
    for (k, v) in value.unwrap_or_default() {
        let s = match v {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => continue,
            other => other.to_string(),
        };
        bag.insert(k, s);
    }
    bag
}

#[derive(Debug, Deserialize)]
struct RawHostGroupAttrs {
    #[serde(default)]
    vars: Option<BTreeMap<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct RawHostGroup {
    name: String,
    attrs: RawHostGroupAttrs,
}

impl From<RawHostGroup> for HostGroup {
    fn from(r: RawHostGroup) -> Self {
        HostGroup { name: r.name, vars: vars_from_json(r.attrs.vars) }
    }
}

#[derive(Debug, Deserialize)]
struct RawHostAttrs {
    #[serde(default)]
    address: String,
    #[serde(default)]
    groups: Vec<String>,
    #[serde(default)]
    check_command: String,
    #[serde(default)]
    notes_url: String,
    #[serde(default)]
    vars: Option<BTreeMap<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct RawHost {
    name: String,
    attrs: RawHostAttrs,
}

impl From<RawHost> for Host {
    fn from(r: RawHost) -> Self {
        Host {
            name: r.name,
            address: r.attrs.address,
            groups: r.attrs.groups,
            check_command: r.attrs.check_command,
            notes_url: r.attrs.notes_url,
            vars: vars_from_json(r.attrs.vars),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawServiceAttrs {
    #[serde(default)]
    host_name: String,
    #[serde(default)]
    check_command: String,
    #[serde(default)]
    notes_url: String,
    #[serde(default)]
    vars: Option<BTreeMap<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct RawService {
    name: String,
    attrs: RawServiceAttrs,
}

impl From<RawService> for Service {
    fn from(r: RawService) -> Self {
        // Icinga's joint object name is `host!service`; the host half is
        // authoritative in `attrs.host_name` but some Icinga versions omit
        // it from list responses, so fall back to splitting the name.
        let host_name = if r.attrs.host_name.is_empty() {
            r.name.split_once('!').map(|(h, _)| h.to_string()).unwrap_or_default()
        } else {
            r.attrs.host_name
        };
        let short_name = r.name.split_once('!').map(|(_, s)| s.to_string()).unwrap_or(r.name);
        Service {
            name: short_name,
            host_name,
            check_command: r.attrs.check_command,
            notes_url: r.attrs.notes_url,
            vars: vars_from_json(r.attrs.vars),
        }
    }
}

#[derive(Serialize)]
struct Attrs<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    groups: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    check_command: Option<&'a str>,
    notes_url: &'a str,
    vars: serde_json::Value,
}

impl MonitoringClient for IcingaHttpClient {
    fn list_host_groups(&self) -> Result<Vec<HostGroup>, MonitoringError> {
        Ok(self.list::<RawHostGroup>("v1/objects/hostgroups")?.into_iter().map(Into::into).collect())
    }

    fn list_hosts(&self) -> Result<Vec<Host>, MonitoringError> {
        Ok(self.list::<RawHost>("v1/objects/hosts")?.into_iter().map(Into::into).collect())
    }

    fn list_services(&self) -> Result<Vec<Service>, MonitoringError> {
        Ok(self.list::<RawService>("v1/objects/services")?.into_iter().map(Into::into).collect())
    }

    fn create_host_group(&self, obj: &HostGroup) -> Result<(), MonitoringError> {
        let attrs = Attrs { address: None, groups: None, check_command: None, notes_url: "", vars: vars_to_json(&obj.vars) };
        self.put(&format!("v1/objects/hostgroups/{}", obj.name), json!({ "attrs": attrs }))
    }

    fn update_host_group(&self, obj: &HostGroup) -> Result<(), MonitoringError> {
        self.post(&format!("v1/objects/hostgroups/{}", obj.name), json!({ "attrs": { "vars": vars_to_json(&obj.vars) } }))
    }

    fn delete_host_group(&self, name: &str) -> Result<(), MonitoringError> {
        self.delete(&format!("v1/objects/hostgroups/{name}"), &[])
    }

    fn create_host(&self, obj: &Host) -> Result<(), MonitoringError> {
        let attrs = Attrs {
            address: Some(&obj.address),
            groups: Some(&obj.groups),
            check_command: Some(&obj.check_command),
            notes_url: &obj.notes_url,
            vars: vars_to_json(&obj.vars),
        };
        self.put(&format!("v1/objects/hosts/{}", obj.name), json!({ "attrs": attrs }))
    }

    fn update_host(&self, obj: &Host) -> Result<(), MonitoringError> {
        self.post(
            &format!("v1/objects/hosts/{}", obj.name),
            json!({ "attrs": { "notes_url": obj.notes_url, "vars": vars_to_json(&obj.vars) } }),
        )
    }

    fn delete_host(&self, name: &str, cascade: bool) -> Result<(), MonitoringError> {
        let query: &[(&str, &str)] = if cascade { &[("cascade", "1")] } else { &[] };
        self.delete(&format!("v1/objects/hosts/{name}"), query)
    }

    fn create_service(&self, obj: &Service) -> Result<(), MonitoringError> {
        let attrs = Attrs {
            address: None,
            groups: None,
            check_command: Some(&obj.check_command),
            notes_url: &obj.notes_url,
            vars: vars_to_json(&obj.vars),
        };
        self.put(&format!("v1/objects/services/{}!{}", obj.host_name, obj.name), json!({ "attrs": attrs }))
    }

    fn update_service(&self, obj: &Service) -> Result<(), MonitoringError> {
        self.post(
            &format!("v1/objects/services/{}!{}", obj.host_name, obj.name),
            json!({ "attrs": { "notes_url": obj.notes_url, "vars": vars_to_json(&obj.vars) } }),
        )
    }

    fn delete_service(&self, host_name: &str, name: &str) -> Result<(), MonitoringError> {
        self.delete(&format!("v1/objects/services/{host_name}!{name}"), &[])
    }
}
