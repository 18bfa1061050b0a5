// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "graduation/mod.rs"]
pub mod graduation;

#[path = "karma/karma_service.rs"]
pub mod karma;

#[path = "role_mutation/role_mutation.rs"]
pub mod role_mutation;

#[path = "rolerestore/role_restore_service.rs"]
pub mod rolerestore;
