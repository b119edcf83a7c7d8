//! Binary assets and the hook that rewrites them before exposure.

use serde_json::{Map, Value as Json};

use super::metadata::Metadata;

#[derive(Debug, Clone, Default)]
pub struct AssetFile {
    pub file_name: String,
    pub content_type: String,
    pub details: Map<String, Json>,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Asset {
    pub metadata: Metadata,
    pub title: String,
    pub description: String,
    pub file: AssetFile,
}

impl Asset {
    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn url(&self) -> &str {
        &self.file.url
    }

    /// File size in bytes, when the API reported one.
    pub fn size(&self) -> Option<u64> {
        self.file.details.get("size").and_then(Json::as_u64)
    }
}

/// Last-mile rewrite applied to every asset the builder produces.
pub trait AssetDecorator: Send + Sync {
    fn decorate(&self, asset: Asset) -> Asset;
}

/// Leaves assets untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityDecorator;

impl AssetDecorator for IdentityDecorator {
    fn decorate(&self, asset: Asset) -> Asset {
        asset
    }
}
