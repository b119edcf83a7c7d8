pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod query;
pub(crate) mod util;

pub use application::{BlockingClient, Client, ClientError, FetchRequest, SpaceConfig};
pub use query::{Query, QueryType};
