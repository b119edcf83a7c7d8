//! Resource model: value objects built from raw API payloads.

pub mod asset;
pub mod content_type;
pub mod entry;
pub mod envelope;
pub mod error;
pub mod fields;
pub mod link;
pub mod metadata;
pub mod resource;
pub mod space;
pub mod types;

pub use asset::{Asset, AssetDecorator, AssetFile, IdentityDecorator};
pub use content_type::{ContentType, ContentTypeField, FieldItems, FieldType};
pub use entry::{Entry, FieldValue};
pub use envelope::{EnvelopePool, ResourceEnvelope};
pub use error::{BoxError, DomainError};
pub use fields::{DynamicEntry, Location, Value};
pub use link::{Link, LinkResolver};
pub use metadata::Metadata;
pub use resource::{Resource, ResourceArray};
pub use space::{Locale, Space};
pub use types::{ApiMode, ResourceKind};
