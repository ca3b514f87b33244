//! HTTP-backed [`InventoryClient`] implementation against the Rancher
//! Cattle v2 REST API.
//!
//! Grounded on `agent-control/src/http/client.rs`'s reqwest-blocking-client
//! wrapper (connect/request timeouts, mapped error variants) and on
//! `original_source/rancher-client.go`'s pagination loop
//! (`Pagination.Partial` / `.Next()`), translated into a `next`-link walk.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use url::Url;

use super::error::InventoryError;
use super::types::{Environment, Host, Service, Stack};
use super::InventoryClient;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RancherHttpClient {
    http: Client,
    base_url: Url,
    access_key: String,
    secret_key: String,
}

impl RancherHttpClient {
    pub fn new(base_url: &str, access_key: &str, secret_key: &str) -> Result<Self, InventoryError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| InventoryError::Request { url: base_url.to_string(), source })?;
        let base_url = Url::parse(base_url)
            .map_err(|_| InventoryError::NotFound(format!("invalid RANCHER_URL: {base_url}")))?;
        Ok(Self { http, base_url, access_key: access_key.to_string(), secret_key: secret_key.to_string() })
    }

    fn url(&self, path: &str) -> Url {
        self.base_url.join(path).unwrap_or_else(|_| self.base_url.clone())
    }

    fn list<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<Vec<T>, InventoryError> {
        let mut items = Vec::new();
        let mut next: Option<Url> = Some(self.url(path));
        while let Some(url) = next {
            let page: Page<T> = self.send(url.clone())?;
            items.extend(page.data);
            next = page.pagination.and_then(|p| p.next).and_then(|n| Url::parse(&n).ok());
        }
        Ok(items)
    }

    fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, InventoryError> {
        self.send(self.url(path))
    }

    fn send<T: for<'de> Deserialize<'de>>(&self, url: Url) -> Result<T, InventoryError> {
        let url_str = url.to_string();
        let response = self
            .http
            .get(url)
            .basic_auth(&self.access_key, Some(&self.secret_key))
            .send()
            .map_err(|source| InventoryError::Request { url: url_str.clone(), source })?;

        if !response.status().is_success() {
            return Err(InventoryError::UnsuccessfulStatus { url: url_str, status: response.status() });
        }

        response
            .json()
            .map_err(|source| InventoryError::Decode { url: url_str, source })
    }
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    data: Vec<T>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawProject {
    id: String,
    name: String,
}

impl From<RawProject> for Environment {
    fn from(r: RawProject) -> Self {
        Environment { id: r.id, name: r.name }
    }
}

#[derive(Debug, Deserialize)]
struct RawHost {
    id: String,
    hostname: String,
    #[serde(rename = "agentIpAddress", default)]
    agent_ip_address: String,
    #[serde(default)]
    labels: std::collections::BTreeMap<String, String>,
    #[serde(rename = "accountId")]
    account_id: String,
}

impl From<RawHost> for Host {
    fn from(r: RawHost) -> Self {
        Host {
            id: r.id,
            hostname: r.hostname,
            agent_address: r.agent_ip_address,
            labels: r.labels,
            environment_id: r.account_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawStack {
    id: String,
    name: String,
    #[serde(rename = "accountId")]
    account_id: String,
    #[serde(default)]
    system: bool,
    #[serde(rename = "serviceIds", default)]
    service_ids: Vec<String>,
}

impl From<RawStack> for Stack {
    fn from(r: RawStack) -> Self {
        Stack { id: r.id, name: r.name, environment_id: r.account_id, system: r.system, service_ids: r.service_ids }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawLaunchConfig {
    #[serde(default)]
    labels: std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawService {
    id: String,
    name: String,
    #[serde(rename = "stackId")]
    stack_id: String,
    #[serde(rename = "accountId")]
    account_id: String,
    #[serde(default)]
    system: bool,
    #[serde(rename = "launchConfig", default)]
    launch_config: Option<RawLaunchConfig>,
}

impl From<RawService> for Service {
    fn from(r: RawService) -> Self {
        Service {
            id: r.id,
            name: r.name,
            stack_id: r.stack_id,
            environment_id: r.account_id,
            system: r.system,
            launch_labels: r.launch_config.unwrap_or_default().labels,
        }
    }
}

impl InventoryClient for RancherHttpClient {
    fn list_environments(&self) -> Result<Vec<Environment>, InventoryError> {
        Ok(self.list::<RawProject>("v2-beta/projects")?.into_iter().map(Into::into).collect())
    }

    fn list_hosts(&self) -> Result<Vec<Host>, InventoryError> {
        Ok(self.list::<RawHost>("v2-beta/hosts")?.into_iter().map(Into::into).collect())
    }

    fn list_stacks(&self) -> Result<Vec<Stack>, InventoryError> {
        Ok(self.list::<RawStack>("v2-beta/stacks")?.into_iter().map(Into::into).collect())
    }

    fn list_services(&self) -> Result<Vec<Service>, InventoryError> {
        Ok(self.list::<RawService>("v2-beta/services")?.into_iter().map(Into::into).collect())
    }

    fn get_environment(&self, id: &str) -> Result<Environment, InventoryError> {
        Ok(self.get::<RawProject>(&format!("v2-beta/projects/{id}"))?.into())
    }

    fn get_stack(&self, id: &str) -> Result<Stack, InventoryError> {
        Ok(self.get::<RawStack>(&format!("v2-beta/stacks/{id}"))?.into())
    }

    fn get_service(&self, id: &str) -> Result<Service, InventoryError> {
        Ok(self.get::<RawService>(&format!("v2-beta/services/{id}"))?.into())
    }
}
