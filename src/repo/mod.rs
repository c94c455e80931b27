//! Typed queries over a pooled connection, one module per aggregate.

pub mod analyses;
pub mod drive;
pub mod files;
pub mod rules_cache;
pub mod users;
