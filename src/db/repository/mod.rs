//! Repository layer: owner-scoped database operations.
//!
//! Every function takes the caller's `OwnerId` and filters by it; there is
//! no unscoped read or write path.

mod document;

pub use document::*;
