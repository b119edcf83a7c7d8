//! The content client: per-space configuration and the query surface.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::cache::{CacheConfig, CacheStore, MemoryCache};
use crate::config::SpaceSettings;
use crate::domain::{
    ApiMode, Asset, AssetDecorator, ContentType, Entry, EnvelopePool, IdentityDecorator, Link,
    Resource, ResourceArray, ResourceEnvelope, Space,
};
use crate::infra::transport::{HttpTransport, ReqwestTransport};
use crate::query::{Query, QueryType};

use super::{
    builder::{Built, ResourceBuilder},
    error::ClientError,
    logs::{MemoryLogSink, RequestLog, RequestLogSink},
    orchestrator::FetchRequest,
    resolver::ClientLinkResolver,
};

const DEFAULT_API_DOMAIN: &str = "contentful.com";
const DEFAULT_MAX_RATE_LIMIT_RETRIES: u32 = 5;

/// Connection and caching settings for one space.
#[derive(Clone)]
pub struct SpaceConfig {
    /// The space key used in request paths.
    pub space_id: String,
    pub access_token: String,
    /// Base domain, or a full base URL when it carries a scheme.
    pub api_domain: Option<String>,
    pub mode: ApiMode,
    /// Delay before retrying a rate-limited request; zero disables retries.
    pub rate_limit_retry_delay: Duration,
    pub max_rate_limit_retries: u32,
    /// Default link depth for collection queries.
    pub include_level: Option<u8>,
    pub typed_resources: bool,
    pub cache: CacheConfig,
    pub primary_cache: Option<Arc<dyn CacheStore>>,
    pub fallback_cache: Option<Arc<dyn CacheStore>>,
    pub decorator: Arc<dyn AssetDecorator>,
}

impl SpaceConfig {
    pub fn new(space_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            space_id: space_id.into(),
            access_token: access_token.into(),
            api_domain: None,
            mode: ApiMode::Delivery,
            rate_limit_retry_delay: Duration::ZERO,
            max_rate_limit_retries: DEFAULT_MAX_RATE_LIMIT_RETRIES,
            include_level: None,
            typed_resources: false,
            cache: CacheConfig::default(),
            primary_cache: None,
            fallback_cache: None,
            decorator: Arc::new(IdentityDecorator),
        }
    }

    pub fn api_domain(mut self, domain: impl Into<String>) -> Self {
        self.api_domain = Some(domain.into());
        self
    }

    pub fn mode(mut self, mode: ApiMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn preview(self) -> Self {
        self.mode(ApiMode::Preview)
    }

    pub fn rate_limit_retry(mut self, delay: Duration, max_retries: u32) -> Self {
        self.rate_limit_retry_delay = delay;
        self.max_rate_limit_retries = max_retries;
        self
    }

    pub fn include_level(mut self, level: u8) -> Self {
        self.include_level = Some(level);
        self
    }

    pub fn typed_resources(mut self, typed: bool) -> Self {
        self.typed_resources = typed;
        self
    }

    pub fn cache_fail_responses(mut self, enabled: bool) -> Self {
        self.cache.cache_fail_responses = enabled;
        self
    }

    pub fn cache_config(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn primary_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.primary_cache = Some(cache);
        self
    }

    pub fn fallback_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.fallback_cache = Some(cache);
        self
    }

    pub fn decorator(mut self, decorator: Arc<dyn AssetDecorator>) -> Self {
        self.decorator = decorator;
        self
    }

    /// Scheme and host requests are sent to.
    pub fn base_url(&self) -> Result<Url, ClientError> {
        let raw = match self.api_domain.as_deref() {
            Some(domain) if domain.contains("://") => domain.to_string(),
            Some(domain) => format!("https://{}.{domain}", self.mode.subdomain()),
            None => format!("https://{}.{DEFAULT_API_DOMAIN}", self.mode.subdomain()),
        };
        Url::parse(&raw)
            .map_err(|err| ClientError::configuration(format!("invalid api domain `{raw}`: {err}")))
    }

    pub fn accept_header(&self) -> String {
        format!("application/vnd.contentful.{}.v1+json", self.mode.as_str())
    }

    fn validate(&self, name: &str) -> Result<(), ClientError> {
        if self.space_id.trim().is_empty() {
            return Err(ClientError::configuration(format!(
                "space `{name}` has no space id"
            )));
        }
        if self.access_token.trim().is_empty() {
            return Err(ClientError::configuration(format!(
                "space `{name}` has no access token"
            )));
        }
        self.base_url().map(|_| ())
    }
}

impl fmt::Debug for SpaceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpaceConfig")
            .field("space_id", &self.space_id)
            .field("api_domain", &self.api_domain)
            .field("mode", &self.mode)
            .field("rate_limit_retry_delay", &self.rate_limit_retry_delay)
            .field("max_rate_limit_retries", &self.max_rate_limit_retries)
            .field("include_level", &self.include_level)
            .field("typed_resources", &self.typed_resources)
            .field("cache", &self.cache)
            .field("primary_cache", &self.primary_cache.is_some())
            .field("fallback_cache", &self.fallback_cache.is_some())
            .finish_non_exhaustive()
    }
}

impl From<&SpaceSettings> for SpaceConfig {
    fn from(settings: &SpaceSettings) -> Self {
        let defaults = CacheConfig::default();
        let cache = CacheConfig {
            cache_fail_responses: settings.cache_fail_responses,
            primary_capacity: settings.cache_capacity.unwrap_or(defaults.primary_capacity),
            fallback_capacity: settings
                .fallback_cache_capacity
                .unwrap_or(defaults.fallback_capacity),
            primary_codec: settings.primary_codec,
            fallback_codec: settings.fallback_codec,
        };

        let mut config = SpaceConfig::new(&settings.space_id, &settings.access_token)
            .mode(settings.mode)
            .rate_limit_retry(
                settings.rate_limit_retry_delay,
                settings.max_rate_limit_retries,
            )
            .typed_resources(settings.typed_resources);
        config.api_domain = settings.api_domain.clone();
        config.include_level = settings.include_level;

        if settings.cache_capacity.is_some() {
            config.primary_cache = Some(Arc::new(MemoryCache::new(
                cache.primary_capacity_non_zero(),
            )));
        }
        if settings.fallback_cache_capacity.is_some() {
            config.fallback_cache = Some(Arc::new(MemoryCache::new(
                cache.fallback_capacity_non_zero(),
            )));
        }
        config.cache_config(cache)
    }
}

pub(crate) struct SpaceContext {
    pub(crate) name: String,
    pub(crate) config: SpaceConfig,
    pub(crate) builder: ResourceBuilder,
}

pub(crate) struct ClientInner {
    pub(crate) spaces: HashMap<String, SpaceContext>,
    pub(crate) transport: Arc<dyn HttpTransport>,
    pub(crate) pool: EnvelopePool,
    pub(crate) logs: Arc<dyn RequestLogSink>,
}

#[derive(Default)]
pub struct ClientBuilder {
    spaces: Vec<(String, SpaceConfig)>,
    transport: Option<Arc<dyn HttpTransport>>,
    logs: Option<Arc<dyn RequestLogSink>>,
}

impl ClientBuilder {
    pub fn space(mut self, name: impl Into<String>, config: SpaceConfig) -> Self {
        self.spaces.push((name.into(), config));
        self
    }

    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn log_sink(mut self, logs: Arc<dyn RequestLogSink>) -> Self {
        self.logs = Some(logs);
        self
    }

    pub fn build(self) -> Result<Client, ClientError> {
        if self.spaces.is_empty() {
            return Err(ClientError::configuration("no spaces configured"));
        }
        for (name, config) in &self.spaces {
            config.validate(name)?;
        }

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };
        let logs = self
            .logs
            .unwrap_or_else(|| Arc::new(MemoryLogSink::new()));

        let inner = Arc::new_cyclic(|weak| {
            let pool = EnvelopePool::new();
            let spaces = self
                .spaces
                .into_iter()
                .map(|(name, config)| {
                    let envelope = Arc::new(ResourceEnvelope::new(name.clone()));
                    pool.register_envelope_for_space(Arc::clone(&envelope), &name);
                    let resolver = Arc::new(ClientLinkResolver::new(weak.clone(), name.clone()));
                    let builder = ResourceBuilder::new(envelope, name.clone())
                        .with_resolver(resolver)
                        .with_decorator(Arc::clone(&config.decorator))
                        .typed(config.typed_resources);
                    let context = SpaceContext {
                        name: name.clone(),
                        config,
                        builder,
                    };
                    (name, context)
                })
                .collect();

            ClientInner {
                spaces,
                transport,
                pool,
                logs,
            }
        });

        Ok(Client { inner })
    }
}

/// Asynchronous client over one or more configured spaces.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Client with a single space using the default transport.
    pub fn new(name: impl Into<String>, config: SpaceConfig) -> Result<Self, ClientError> {
        Self::builder().space(name, config).build()
    }

    pub async fn get_space(&self, space: &str) -> Result<Arc<Space>, ClientError> {
        self.inner.get_space(space).await
    }

    pub async fn get_entry(
        &self,
        space: &str,
        id: &str,
        locale: Option<&str>,
    ) -> Result<Arc<Entry>, ClientError> {
        self.inner.get_entry(space, id, locale).await
    }

    pub async fn get_entries(
        &self,
        space: &str,
        query: Query,
    ) -> Result<Arc<ResourceArray>, ClientError> {
        self.inner.get_collection(space, QueryType::Entries, query).await
    }

    pub async fn get_asset(
        &self,
        space: &str,
        id: &str,
        locale: Option<&str>,
    ) -> Result<Arc<Asset>, ClientError> {
        self.inner.get_asset(space, id, locale).await
    }

    pub async fn get_assets(
        &self,
        space: &str,
        query: Query,
    ) -> Result<Arc<ResourceArray>, ClientError> {
        self.inner.get_collection(space, QueryType::Assets, query).await
    }

    pub async fn get_content_type(
        &self,
        space: &str,
        id: &str,
    ) -> Result<Arc<ContentType>, ClientError> {
        self.inner.get_content_type(space, id).await
    }

    pub async fn get_content_types(
        &self,
        space: &str,
        query: Query,
    ) -> Result<Arc<ResourceArray>, ClientError> {
        self.inner.get_content_types(space, query).await
    }

    pub async fn get_content_type_by_name(
        &self,
        space: &str,
        name: &str,
    ) -> Result<Arc<ContentType>, ClientError> {
        self.inner.get_content_type_by_name(space, name).await
    }

    /// Resolve a link, consulting the space's envelope before fetching.
    pub async fn resolve_link(
        &self,
        space: &str,
        link: &Link,
        locale: Option<&str>,
    ) -> Result<Resource, ClientError> {
        Ok(self.inner.resolve_link(space, link, locale).await?)
    }

    /// Run a request through the cache and fetch pipeline as is.
    pub async fn fetch(&self, space: &str, request: FetchRequest) -> Result<Built, ClientError> {
        self.inner.fetch(space, request).await
    }

    /// Clear the primary cache and forget every built resource.
    ///
    /// The fallback cache is kept so stale payloads stay available.
    pub async fn flush_cache(&self, space: &str) -> Result<(), ClientError> {
        self.inner.flush_cache(space).await
    }

    pub fn get_logs(&self) -> Vec<RequestLog> {
        self.inner.logs.logs()
    }

    pub fn envelope(&self, space: &str) -> Result<Arc<ResourceEnvelope>, ClientError> {
        Ok(self.inner.pool.get_envelope_for_space(space)?)
    }

    pub fn spaces(&self) -> Vec<String> {
        self.inner.pool.spaces()
    }
}

impl ClientInner {
    pub(crate) fn space(&self, name: &str) -> Result<&SpaceContext, ClientError> {
        self.spaces
            .get(name)
            .ok_or_else(|| ClientError::not_found(format!("space `{name}` is not configured")))
    }

    pub(crate) async fn get_space(&self, space: &str) -> Result<Arc<Space>, ClientError> {
        let built = self.fetch(space, FetchRequest::new(QueryType::Space)).await?;
        expect(built, "space", Resource::as_space)
    }

    pub(crate) async fn get_entry(
        &self,
        space: &str,
        id: &str,
        locale: Option<&str>,
    ) -> Result<Arc<Entry>, ClientError> {
        let request = FetchRequest::new(QueryType::Entry)
            .id(id)
            .query(localized(locale));
        let built = self.fetch(space, request).await?;
        expect(built, "entry", Resource::as_entry)
    }

    pub(crate) async fn get_asset(
        &self,
        space: &str,
        id: &str,
        locale: Option<&str>,
    ) -> Result<Arc<Asset>, ClientError> {
        let request = FetchRequest::new(QueryType::Asset)
            .id(id)
            .query(localized(locale));
        let built = self.fetch(space, request).await?;
        expect(built, "asset", Resource::as_asset)
    }

    pub(crate) async fn get_content_type(
        &self,
        space: &str,
        id: &str,
    ) -> Result<Arc<ContentType>, ClientError> {
        let request = FetchRequest::new(QueryType::ContentType).id(id);
        let built = self.fetch(space, request).await?;
        expect(built, "content type", Resource::as_content_type)
    }

    pub(crate) async fn get_collection(
        &self,
        space: &str,
        query_type: QueryType,
        query: Query,
    ) -> Result<Arc<ResourceArray>, ClientError> {
        let built = self
            .fetch(space, FetchRequest::new(query_type).query(query))
            .await?;
        expect(built, "collection", Resource::as_array)
    }

    /// A listing fetched without parameters is remembered as the full catalog.
    pub(crate) async fn get_content_types(
        &self,
        space: &str,
        query: Query,
    ) -> Result<Arc<ResourceArray>, ClientError> {
        let full_catalog = query.parameters().is_empty();
        let array = self
            .get_collection(space, QueryType::ContentTypes, query)
            .await?;
        if full_catalog {
            let content_types = array
                .iter()
                .filter_map(Resource::as_content_type)
                .cloned()
                .collect();
            self.pool
                .insert_all_content_types_for_space(content_types, space)?;
        }
        Ok(array)
    }

    pub(crate) async fn get_content_type_by_name(
        &self,
        space: &str,
        name: &str,
    ) -> Result<Arc<ContentType>, ClientError> {
        let envelope = self.pool.get_envelope_for_space(space)?;
        if let Some(content_type) = envelope.find_content_type_by_name(name) {
            return Ok(content_type);
        }

        let catalog = match self.pool.get_all_content_types_for_space(space)? {
            Some(catalog) => catalog,
            None => self
                .get_content_types(space, Query::new())
                .await?
                .iter()
                .filter_map(Resource::as_content_type)
                .cloned()
                .collect(),
        };
        catalog
            .into_iter()
            .find(|content_type| content_type.name == name)
            .ok_or_else(|| {
                ClientError::not_found(format!("content type named `{name}` in space `{space}`"))
            })
    }

    pub(crate) async fn flush_cache(&self, space: &str) -> Result<(), ClientError> {
        let context = self.space(space)?;
        if let Some(primary) = context.config.primary_cache.as_ref() {
            primary.clear().await.map_err(ClientError::from_cache)?;
        }
        context.builder.envelope().clear();
        Ok(())
    }
}

fn localized(locale: Option<&str>) -> Query {
    match locale {
        Some(locale) => Query::new().locale(locale),
        None => Query::new(),
    }
}

fn expect<T>(
    built: Built,
    what: &str,
    pick: impl Fn(&Resource) -> Option<&Arc<T>>,
) -> Result<Arc<T>, ClientError> {
    built
        .as_resource()
        .and_then(pick)
        .cloned()
        .ok_or_else(|| ClientError::InvalidInput(format!("response did not describe a {what}")))
}
