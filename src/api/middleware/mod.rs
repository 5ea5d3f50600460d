//! API middleware. Only bearer authentication; CORS and response headers
//! are tower-http layers set up in the router.

pub mod auth;
