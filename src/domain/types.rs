//! Shared enumerations for resource kinds and API modes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The `sys.type` (or `sys.linkType`) of a raw resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Space,
    Entry,
    Asset,
    ContentType,
    Link,
    Array,
}

impl ResourceKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Space" => Some(Self::Space),
            "Entry" => Some(Self::Entry),
            "Asset" => Some(Self::Asset),
            "ContentType" => Some(Self::ContentType),
            "Link" => Some(Self::Link),
            "Array" => Some(Self::Array),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Space => "Space",
            ResourceKind::Entry => "Entry",
            ResourceKind::Asset => "Asset",
            ResourceKind::ContentType => "ContentType",
            ResourceKind::Link => "Link",
            ResourceKind::Array => "Array",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which API surface a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApiMode {
    #[default]
    Delivery,
    Preview,
    Management,
}

impl ApiMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ApiMode::Delivery => "delivery",
            ApiMode::Preview => "preview",
            ApiMode::Management => "management",
        }
    }

    /// Subdomain prefix used when no domain override is configured.
    pub fn subdomain(self) -> &'static str {
        match self {
            ApiMode::Delivery => "cdn",
            ApiMode::Preview => "preview",
            ApiMode::Management => "api",
        }
    }

    /// Management requests are never cached.
    pub fn is_cacheable(self) -> bool {
        !matches!(self, ApiMode::Management)
    }
}

impl fmt::Display for ApiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
