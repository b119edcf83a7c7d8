//! Cache key derivation.
//!
//! A key names one request: the space, the kind of query, the API mode,
//! an optional disambiguator (typically a resource id) and the parameter
//! set. Parameter order never affects the key.

use thiserror::Error;

use crate::domain::ApiMode;
use crate::query::{Parameter, QueryType};

/// Characters the cache backends reject in keys.
const RESERVED: &[char] = &['{', '}', '(', ')', '/', '\\', '@', ':'];

#[derive(Debug, Error, PartialEq, Eq)]
#[error("parameter `{name}` must be completed before it can be keyed")]
pub struct IncompleteParameter {
    pub name: String,
}

/// Build the cache key for a request.
///
/// Fragments are sorted by parameter name, then key; ties keep their
/// insertion order.
pub fn generate_cache_key(
    space_key: &str,
    query_type: QueryType,
    mode: ApiMode,
    disambiguator: Option<&str>,
    parameters: &[Parameter],
) -> Result<String, IncompleteParameter> {
    if let Some(incomplete) = parameters
        .iter()
        .find(|parameter| parameter.completion().is_some())
    {
        return Err(IncompleteParameter {
            name: incomplete.name().to_string(),
        });
    }

    let mut key = format!("{space_key}-{}", query_type.as_str());
    if mode == ApiMode::Preview {
        key.push_str("-preview");
    }
    if let Some(disambiguator) = disambiguator {
        key.push('↦');
        key.push_str(disambiguator);
    }

    if !parameters.is_empty() {
        let mut sorted: Vec<&Parameter> = parameters.iter().collect();
        sorted.sort_by_cached_key(|parameter| (parameter.name(), parameter.key()));
        let fragments: Vec<String> = sorted.into_iter().map(fragment).collect();
        key.push('-');
        key.push_str(&fragments.join(","));
    }

    key.retain(|c| !RESERVED.contains(&c));
    Ok(key)
}

fn fragment(parameter: &Parameter) -> String {
    parameter.cache_key().unwrap_or_else(|| {
        format!(
            "|{}|{}↦{}",
            parameter.name(),
            parameter.key(),
            parameter.value()
        )
    })
}
