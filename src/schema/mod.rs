//! Local cache of the Cloudflare OpenAPI document and the queries run against it.

pub mod cache;
pub mod query;
pub mod render;
pub mod store;

pub use cache::{CacheMeta, SchemaCache};
pub use store::{DEFAULT_SCHEMA_URL, SchemaStore};
