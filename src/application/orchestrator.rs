//! The request pipeline behind every client read.
//!
//! A request moves through: primary cache lookup, fetch (with bounded
//! rate-limit retries), validation of the built result, and cache writes.
//! Any failure along the way first tries the fallback cache, which holds
//! the last payload that was fetched successfully.

use std::sync::Arc;
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt};
use metrics::{counter, histogram};
use serde_json::Value as Json;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::cache::{CacheStore, FAIL_MARKER, PayloadCodec, decode_payload, generate_cache_key};
use crate::domain::error::BoxError;
use crate::infra::error::InfraError;
use crate::infra::telemetry::{
    METRIC_FALLBACK_HIT, METRIC_FETCH_FAILURE, METRIC_PRIMARY_HIT, METRIC_PRIMARY_MISS,
    METRIC_RATE_LIMIT_RETRY, METRIC_REQUEST_MS,
};
use crate::infra::transport::{ApiRequest, ApiResponse};
use crate::query::{ContentTypeFilter, Completion, Parameter, Query, QueryType, Validator};

use super::{
    builder::Built,
    client::{ClientInner, SpaceContext},
    error::ClientError,
    logs::{LogType, RequestLog},
};

/// One read against a space.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub query_type: QueryType,
    /// Resource id; also disambiguates the cache key.
    pub id: Option<String>,
    pub query: Query,
}

impl FetchRequest {
    pub fn new(query_type: QueryType) -> Self {
        Self {
            query_type,
            id: None,
            query: Query::new(),
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    fn describe(&self) -> String {
        match self.id.as_deref() {
            Some(id) => format!("{} {id}", self.query_type),
            None => self.query_type.to_string(),
        }
    }
}

/// Why a fetch did not produce a usable response.
enum FetchFailure {
    Transport(InfraError),
    Status(ApiResponse),
}

impl FetchFailure {
    fn is_rate_limited(&self) -> bool {
        matches!(self, FetchFailure::Status(response) if response.is_rate_limited())
    }

    fn into_error(self, request: &ApiRequest) -> ClientError {
        let url = request.full_url();
        match self {
            FetchFailure::Transport(err) => {
                ClientError::unavailable_because(format!("request to {url} failed"), err)
            }
            FetchFailure::Status(response) => ClientError::unavailable(format!(
                "request to {url} returned status {}: {}",
                response.status,
                response.body.trim()
            )),
        }
    }
}

/// Result of reading one cache tier.
enum Lookup {
    Miss,
    FailMarker,
    Payload(String, Json),
}

impl ClientInner {
    /// Serve a request from cache, the network or the fallback cache.
    pub(crate) fn fetch<'a>(
        &'a self,
        space: &'a str,
        request: FetchRequest,
    ) -> BoxFuture<'a, Result<Built, ClientError>> {
        let span = info_span!(
            "fetch",
            space = %space,
            query_type = %request.query_type,
            id = request.id.as_deref().unwrap_or_default()
        );
        async move {
            let started = Instant::now();
            let context = self.space(space)?;
            let description = request.describe();
            let query_type = request.query_type;

            let result = self.run(context, request).await;

            let elapsed = started.elapsed();
            histogram!(METRIC_REQUEST_MS, "space" => space.to_string())
                .record(elapsed.as_secs_f64() * 1000.0);
            let log_type = match &result {
                Ok((_, log_type)) => *log_type,
                Err(_) => LogType::Failure,
            };
            self.logs.record(RequestLog {
                description,
                cache_hit: matches!(log_type, LogType::Cache | LogType::Fallback),
                duration: elapsed,
                log_type,
                resource_type: query_type,
                api_mode: context.config.mode,
            });

            result.map(|(built, _)| built)
        }
        .instrument(span)
        .boxed()
    }

    async fn run(
        &self,
        context: &SpaceContext,
        request: FetchRequest,
    ) -> Result<(Built, LogType), ClientError> {
        let config = &context.config;
        let query = self.complete(&context.name, request.query).await?;
        let test = query.test().cloned();
        let request = FetchRequest { query, ..request };

        let key = if config.mode.is_cacheable() {
            Some(generate_cache_key(
                &config.space_id,
                request.query_type,
                config.mode,
                request.id.as_deref(),
                request.query.parameters(),
            )?)
        } else {
            debug!("management request bypasses the cache");
            None
        };

        if let (Some(key), Some(primary)) = (key.as_deref(), config.primary_cache.as_deref()) {
            match read_tier(primary, key, config.cache.primary_codec).await? {
                Lookup::Payload(_, json) => {
                    counter!(METRIC_PRIMARY_HIT).increment(1);
                    match context.builder.build(&json).await {
                        Ok(built) if built.is_truthy() && passes(test.as_ref(), &built) => {
                            debug!(cache_key = key, outcome = "primary_hit", "served from cache");
                            return Ok((built, LogType::Cache));
                        }
                        Ok(_) => debug!(
                            cache_key = key,
                            outcome = "primary_rejected",
                            "cached payload rejected; fetching"
                        ),
                        Err(err) => warn!(
                            cache_key = key,
                            outcome = "primary_unbuildable",
                            error = %err,
                            "cached payload could not be built; fetching"
                        ),
                    }
                }
                Lookup::FailMarker => {
                    counter!(METRIC_PRIMARY_HIT).increment(1);
                    if config.cache.cache_fail_responses
                        && let Some(built) = self.serve_fallback(context, key, test.as_ref()).await?
                    {
                        return Ok((built, LogType::Fallback));
                    }
                    return Err(ClientError::unavailable(format!(
                        "`{key}` is cached as a failed response"
                    )));
                }
                Lookup::Miss => {
                    counter!(METRIC_PRIMARY_MISS).increment(1);
                    debug!(cache_key = key, outcome = "primary_miss", "cache miss");
                }
            }
        }

        let api_request = api_request(context, &request)?;
        let mut attempt: u32 = 0;
        let response = loop {
            let failure = match self.transport.send(api_request.clone()).await {
                Ok(response) if response.is_success() => break response,
                Ok(response) => FetchFailure::Status(response),
                Err(err) => FetchFailure::Transport(err),
            };
            counter!(METRIC_FETCH_FAILURE).increment(1);

            if let Some(key) = key.as_deref()
                && let Some(built) = self.serve_fallback(context, key, test.as_ref()).await?
            {
                return Ok((built, LogType::Fallback));
            }

            let delay = config.rate_limit_retry_delay;
            if failure.is_rate_limited() && !delay.is_zero() {
                if attempt < config.max_rate_limit_retries {
                    attempt += 1;
                    counter!(METRIC_RATE_LIMIT_RETRY).increment(1);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "rate limited; retrying after delay"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                self.remember_failure(context, key.as_deref()).await?;
                return Err(ClientError::unavailable(format!(
                    "rate limit retries exhausted after {attempt} attempts for {}",
                    api_request.full_url()
                )));
            }

            self.remember_failure(context, key.as_deref()).await?;
            return Err(failure.into_error(&api_request));
        };

        let outcome = match serde_json::from_str::<Json>(&response.body) {
            Ok(json) => context
                .builder
                .build(&json)
                .await
                .map_err(|err| Some(BoxError::from(err))),
            Err(err) => Err(Some(BoxError::from(err))),
        };
        let rejection = match outcome {
            Ok(built) if passes(test.as_ref(), &built) => {
                if let Some(key) = key.as_deref() {
                    self.store_success(context, key, &response.body).await?;
                }
                debug!(outcome = "fetched", "served from the network");
                return Ok((built, LogType::Fetch));
            }
            Ok(_) => None,
            Err(source) => source,
        };

        if let Some(key) = key.as_deref()
            && let Some(built) = self.serve_fallback(context, key, test.as_ref()).await?
        {
            return Ok((built, LogType::Fallback));
        }
        Err(match rejection {
            Some(source) => ClientError::unavailable_because(
                format!("response from {} could not be built", api_request.full_url()),
                source,
            ),
            None => ClientError::unavailable("valid response but did not pass the provided test"),
        })
    }

    /// Replace incomplete parameters with the concrete ones they stand for.
    async fn complete(&self, space: &str, query: Query) -> Result<Query, ClientError> {
        if query
            .parameters()
            .iter()
            .all(|parameter| parameter.completion().is_none())
        {
            return Ok(query);
        }

        let mut completed = query.without_parameters();
        for parameter in query.parameters() {
            let Some(completion) = parameter.completion() else {
                completed.push(Arc::clone(parameter));
                continue;
            };
            let concrete: Parameter = match completion {
                Completion::ContentTypeName(name) => {
                    let content_type = self
                        .get_content_type_by_name(space, &name)
                        .await
                        .map_err(|err| {
                            ClientError::UnresolvableParameter(format!(
                                "content type named `{name}`: {err}"
                            ))
                        })?;
                    Arc::new(ContentTypeFilter::new(content_type.id()))
                }
            };
            completed.push(concrete);
        }
        Ok(completed)
    }

    /// Serve the fallback payload for `key`, promoting it into the primary cache.
    async fn serve_fallback(
        &self,
        context: &SpaceContext,
        key: &str,
        test: Option<&Validator>,
    ) -> Result<Option<Built>, ClientError> {
        let config = &context.config;
        let Some(fallback) = config.fallback_cache.as_deref() else {
            return Ok(None);
        };
        let (payload, json) = match read_tier(fallback, key, config.cache.fallback_codec).await? {
            Lookup::Payload(payload, json) => (payload, json),
            Lookup::Miss | Lookup::FailMarker => {
                debug!(cache_key = key, "fallback cache has no usable payload");
                return Ok(None);
            }
        };

        let built = match context.builder.build(&json).await {
            Ok(built) if built.is_truthy() && passes(test, &built) => built,
            Ok(_) => {
                debug!(cache_key = key, "fallback payload rejected");
                return Ok(None);
            }
            Err(err) => {
                warn!(cache_key = key, error = %err, "fallback payload could not be built");
                return Ok(None);
            }
        };

        counter!(METRIC_FALLBACK_HIT).increment(1);
        info!(cache_key = key, outcome = "fallback_hit", "serving stale payload from fallback cache");
        if let Some(primary) = config.primary_cache.as_deref() {
            write_tier(primary, key, &payload, config.cache.primary_codec).await?;
        }
        Ok(Some(built))
    }

    async fn store_success(
        &self,
        context: &SpaceContext,
        key: &str,
        body: &str,
    ) -> Result<(), ClientError> {
        let config = &context.config;
        if let Some(primary) = config.primary_cache.as_deref() {
            write_tier(primary, key, body, config.cache.primary_codec).await?;
        }
        if let Some(fallback) = config.fallback_cache.as_deref() {
            write_tier(fallback, key, body, config.cache.fallback_codec).await?;
        }
        Ok(())
    }

    /// Store the fail marker in the primary cache when failures are cached.
    async fn remember_failure(
        &self,
        context: &SpaceContext,
        key: Option<&str>,
    ) -> Result<(), ClientError> {
        let config = &context.config;
        if !config.cache.cache_fail_responses {
            return Ok(());
        }
        if let (Some(key), Some(primary)) = (key, config.primary_cache.as_deref()) {
            write_tier(primary, key, FAIL_MARKER, config.cache.primary_codec).await?;
        }
        Ok(())
    }
}

fn passes(test: Option<&Validator>, built: &Built) -> bool {
    test.is_none_or(|test| (**test)(built))
}

/// Read one tier; backend failures read as a miss, undecodable payloads are fatal.
async fn read_tier(
    store: &dyn CacheStore,
    key: &str,
    codec: PayloadCodec,
) -> Result<Lookup, ClientError> {
    let stored = match store.get(key).await {
        Ok(Some(stored)) => stored,
        Ok(None) => return Ok(Lookup::Miss),
        Err(err) => {
            warn!(cache_key = key, error = %err, "cache read failed; treating as a miss");
            return Ok(Lookup::Miss);
        }
    };
    let payload = codec.decompress(&stored).map_err(ClientError::from_cache)?;
    match decode_payload(&payload).map_err(ClientError::from_cache)? {
        Some(json) => Ok(Lookup::Payload(payload, json)),
        None => Ok(Lookup::FailMarker),
    }
}

async fn write_tier(
    store: &dyn CacheStore,
    key: &str,
    payload: &str,
    codec: PayloadCodec,
) -> Result<(), ClientError> {
    let stored = codec.compress(payload).map_err(ClientError::from_cache)?;
    if let Err(err) = store.set(key, stored).await {
        warn!(cache_key = key, error = %err, "cache write failed");
    }
    Ok(())
}

fn api_request(context: &SpaceContext, request: &FetchRequest) -> Result<ApiRequest, ClientError> {
    let config = &context.config;
    let mut url = config.base_url()?;
    {
        let mut segments = url.path_segments_mut().map_err(|_| {
            ClientError::configuration(format!(
                "api domain for space `{}` cannot carry a path",
                context.name
            ))
        })?;
        segments.pop_if_empty().push("spaces").push(&config.space_id);
        if let Some(collection) = request.query_type.collection() {
            segments.push(collection);
        }
        if let Some(id) = request.id.as_deref() {
            segments.push(id);
        }
    }

    let mut api_request = ApiRequest::get(url)
        .header("Authorization", format!("Bearer {}", config.access_token))
        .header("Accept", config.accept_header());
    for (key, value) in request.query.query_pairs() {
        api_request = api_request.query_pair(key, value);
    }
    if request.query_type.is_collection()
        && !request.query.has("include")
        && let Some(level) = config.include_level
    {
        api_request = api_request.query_pair("include", level.to_string());
    }
    Ok(api_request)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::application::builder::ResourceBuilder;
    use crate::application::client::SpaceConfig;
    use crate::domain::ResourceEnvelope;

    fn context(config: SpaceConfig) -> SpaceContext {
        SpaceContext {
            name: "main".to_string(),
            builder: ResourceBuilder::new(Arc::new(ResourceEnvelope::new("main")), "main"),
            config,
        }
    }

    #[test]
    fn request_carries_auth_and_mode_headers() {
        let context = context(SpaceConfig::new("cfexampleapi", "secret").preview());
        let request = FetchRequest::new(QueryType::Entry).id("nyancat");
        let api_request = api_request(&context, &request).expect("request");

        assert_eq!(
            api_request.full_url().as_str(),
            "https://preview.contentful.com/spaces/cfexampleapi/entries/nyancat"
        );
        assert!(api_request
            .headers
            .contains(&("Authorization".to_string(), "Bearer secret".to_string())));
        assert!(api_request.headers.contains(&(
            "Accept".to_string(),
            "application/vnd.contentful.preview.v1+json".to_string()
        )));
    }

    #[test]
    fn include_level_applies_to_collections_only() {
        let context = context(SpaceConfig::new("s", "t").include_level(3));

        let collection = FetchRequest::new(QueryType::Entries).query(Query::new().limit(5));
        let url = api_request(&context, &collection).expect("request").full_url();
        assert_eq!(url.query(), Some("limit=5&include=3"));

        let explicit = FetchRequest::new(QueryType::Entries).query(Query::new().include(1));
        let url = api_request(&context, &explicit).expect("request").full_url();
        assert_eq!(url.query(), Some("include=1"));

        let single = FetchRequest::new(QueryType::Entry).id("x");
        let url = api_request(&context, &single).expect("request").full_url();
        assert_eq!(url.query(), None);
    }

    #[test]
    fn space_requests_stop_at_the_space_path() {
        let context = context(SpaceConfig::new("s", "t").api_domain("http://127.0.0.1:9000"));
        let url = api_request(&context, &FetchRequest::new(QueryType::Space))
            .expect("request")
            .full_url();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/spaces/s");
    }
}
