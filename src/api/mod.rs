//! HTTP API.
//!
//! Exposes letter ingestion, search, draft revision and chat over HTTP.
//! Routes are nested under `/api/`; everything except the health check
//! goes through bearer-token authentication, which resolves the owner
//! that scopes every storage operation.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_api_server, ApiServer, ServerError};
pub use types::ApiContext;
