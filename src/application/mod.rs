//! Client engine: resource building, request orchestration and the public clients.

pub mod blocking;
pub mod builder;
pub mod client;
pub mod error;
pub mod logs;
pub mod orchestrator;
mod resolver;

pub use blocking::BlockingClient;
pub use builder::{Built, ResourceBuilder};
pub use client::{Client, ClientBuilder, SpaceConfig};
pub use error::{ClientError, ErrorReport};
pub use logs::{LogType, MemoryLogSink, RequestLog, RequestLogSink};
pub use orchestrator::FetchRequest;
