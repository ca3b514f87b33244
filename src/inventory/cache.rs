//! Id-keyed caching wrapper around an [`InventoryClient`] (§5: "the
//! inventory client caches fetched-by-id objects for the duration of the
//! process; repeated lookups within a tick must not re-fetch"). Caches are
//! populated both by bulk-list operations and by on-demand id lookups.

use std::cell::RefCell;
use std::collections::HashMap;

use super::error::InventoryError;
use super::types::{Environment, Host, Service, Stack};
use super::InventoryClient;

pub struct CachingInventoryClient<C> {
    inner: C,
    environments: RefCell<HashMap<String, Environment>>,
    stacks: RefCell<HashMap<String, Stack>>,
    services: RefCell<HashMap<String, Service>>,
}

impl<C: InventoryClient> CachingInventoryClient<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            environments: RefCell::new(HashMap::new()),
            stacks: RefCell::new(HashMap::new()),
            services: RefCell::new(HashMap::new()),
        }
    }
}

impl<C: InventoryClient> InventoryClient for CachingInventoryClient<C> {
    fn list_environments(&self) -> Result<Vec<Environment>, InventoryError> {
        let items = self.inner.list_environments()?;
        let mut cache = self.environments.borrow_mut();
        for item in &items {
            cache.insert(item.id.clone(), item.clone());
        }
        Ok(items)
    }

    fn list_hosts(&self) -> Result<Vec<Host>, InventoryError> {
        self.inner.list_hosts()
    }

    fn list_stacks(&self) -> Result<Vec<Stack>, InventoryError> {
        let items = self.inner.list_stacks()?;
        let mut cache = self.stacks.borrow_mut();
        for item in &items {
            cache.insert(item.id.clone(), item.clone());
        }
        Ok(items)
    }

    fn list_services(&self) -> Result<Vec<Service>, InventoryError> {
        let items = self.inner.list_services()?;
        let mut cache = self.services.borrow_mut();
        for item in &items {
            cache.insert(item.id.clone(), item.clone());
        }
        Ok(items)
    }

    fn get_environment(&self, id: &str) -> Result<Environment, InventoryError> {
        if let Some(hit) = self.environments.borrow().get(id) {
            return Ok(hit.clone());
        }
        let item = self.inner.get_environment(id)?;
        self.environments.borrow_mut().insert(id.to_string(), item.clone());
        Ok(item)
    }

    fn get_stack(&self, id: &str) -> Result<Stack, InventoryError> {
        if let Some(hit) = self.stacks.borrow().get(id) {
            return Ok(hit.clone());
        }
        let item = self.inner.get_stack(id)?;
        self.stacks.borrow_mut().insert(id.to_string(), item.clone());
        Ok(item)
    }

    fn get_service(&self, id: &str) -> Result<Service, InventoryError> {
        if let Some(hit) = self.services.borrow().get(id) {
            return Ok(hit.clone());
        }
        let item = self.inner.get_service(id)?;
        self.services.borrow_mut().insert(id.to_string(), item.clone());
        Ok(item)
    }
}
