//! `atrium-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod authority;
pub mod entity;
pub mod error;
pub mod id;
pub mod scope;
pub mod slug;
pub mod subscription;

pub use entity::Entity;
pub use error::{AccessError, AccessResult};
pub use id::{ModuleId, OrganizationId, PermissionId, RefreshTokenId, RoleId, TeamId, UserId};
pub use scope::Scope;
pub use slug::{slugify, ModuleSlug, OrganizationSlug, PermissionSlug, RoleSlug, TeamSlug};
pub use subscription::SubscriptionStatus;
