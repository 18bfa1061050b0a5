pub mod graduation_models;
pub mod graduation_service;
pub mod graduation_store;
pub mod registry;

pub use graduation_models::{GuildConfig, MemberRoles, PromotionReport, RegisteredRole};
pub use graduation_service::{
    pick_response, render_response, GraduationError, GraduationService, MemberOutcome,
};
pub use graduation_store::{GraduationStore, StoreError};
