// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "graduation/json_store.rs"]
pub mod graduation;

#[path = "karma/sqlite_store.rs"]
pub mod karma;

#[path = "rolerestore/sqlite_store.rs"]
pub mod rolerestore;
