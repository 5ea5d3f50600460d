//! API endpoint handlers. Each handler is a thin adapter over the pipeline.

pub mod chat;
pub mod documents;
pub mod health;
