//! Synchronous facade over [`Client`].

use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};

use crate::domain::{Asset, ContentType, Entry, Link, Resource, ResourceArray, Space, Value};
use crate::query::Query;

use super::{
    builder::Built,
    client::{Client, SpaceConfig},
    error::ClientError,
    logs::RequestLog,
    orchestrator::FetchRequest,
};

/// Drives an async [`Client`] on a private current-thread runtime.
///
/// Must not be used from inside another tokio runtime.
pub struct BlockingClient {
    runtime: Runtime,
    client: Client,
}

impl BlockingClient {
    pub fn new(client: Client) -> Result<Self, ClientError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| {
                ClientError::configuration(format!("failed to start blocking runtime: {err}"))
            })?;
        Ok(Self { runtime, client })
    }

    pub fn for_space(name: impl Into<String>, config: SpaceConfig) -> Result<Self, ClientError> {
        Self::new(Client::new(name, config)?)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn get_space(&self, space: &str) -> Result<Arc<Space>, ClientError> {
        self.runtime.block_on(self.client.get_space(space))
    }

    pub fn get_entry(
        &self,
        space: &str,
        id: &str,
        locale: Option<&str>,
    ) -> Result<Arc<Entry>, ClientError> {
        self.runtime.block_on(self.client.get_entry(space, id, locale))
    }

    pub fn get_entries(&self, space: &str, query: Query) -> Result<Arc<ResourceArray>, ClientError> {
        self.runtime.block_on(self.client.get_entries(space, query))
    }

    pub fn get_asset(
        &self,
        space: &str,
        id: &str,
        locale: Option<&str>,
    ) -> Result<Arc<Asset>, ClientError> {
        self.runtime.block_on(self.client.get_asset(space, id, locale))
    }

    pub fn get_assets(&self, space: &str, query: Query) -> Result<Arc<ResourceArray>, ClientError> {
        self.runtime.block_on(self.client.get_assets(space, query))
    }

    pub fn get_content_type(&self, space: &str, id: &str) -> Result<Arc<ContentType>, ClientError> {
        self.runtime.block_on(self.client.get_content_type(space, id))
    }

    pub fn get_content_types(
        &self,
        space: &str,
        query: Query,
    ) -> Result<Arc<ResourceArray>, ClientError> {
        self.runtime
            .block_on(self.client.get_content_types(space, query))
    }

    pub fn get_content_type_by_name(
        &self,
        space: &str,
        name: &str,
    ) -> Result<Arc<ContentType>, ClientError> {
        self.runtime
            .block_on(self.client.get_content_type_by_name(space, name))
    }

    pub fn resolve_link(
        &self,
        space: &str,
        link: &Link,
        locale: Option<&str>,
    ) -> Result<Resource, ClientError> {
        self.runtime
            .block_on(self.client.resolve_link(space, link, locale))
    }

    pub fn fetch(&self, space: &str, request: FetchRequest) -> Result<Built, ClientError> {
        self.runtime.block_on(self.client.fetch(space, request))
    }

    /// Reads a field, resolving links the same way [`Entry::field`] does.
    pub fn field(&self, entry: &Entry, name: &str) -> Option<Value> {
        self.runtime.block_on(entry.field(name))
    }

    pub fn flush_cache(&self, space: &str) -> Result<(), ClientError> {
        self.runtime.block_on(self.client.flush_cache(space))
    }

    pub fn get_logs(&self) -> Vec<RequestLog> {
        self.client.get_logs()
    }
}
