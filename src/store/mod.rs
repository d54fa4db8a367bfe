//! Store persistence - repository, tag reconciliation and schema bootstrap

pub mod repository;
pub mod schema;
pub mod tags;

pub use repository::{RepoError, StoreRepository, StoreWithTags};
