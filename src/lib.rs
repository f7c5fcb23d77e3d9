//! Command-line helpers for the Cloudflare v4 REST API: an authenticated
//! request forwarder (`cf-api`) and an OpenAPI schema browser (`cf-schema`).

pub mod cli;
pub mod client;
pub mod envelope;
pub mod output;
pub mod schema;
pub mod sources;
