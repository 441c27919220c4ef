//! Well-known role slugs with system meaning.
//!
//! Two administrative authorities exist and are deliberately disjoint:
//! the per-user super-admin flag (operational bypass), and the global-scoped
//! `admin` role (role/permission catalog management). Holding one never
//! implies the other.

/// Pseudo role slug carried in claims for users with the super-admin flag.
pub const SUPER_ADMIN_ROLE: &str = "superadmin";

/// Slug of the global-administrator role (must be global-scoped to count).
pub const GLOBAL_ADMIN_ROLE: &str = "admin";

/// Organization-level roles granting the full-module bypass.
pub const ORG_BYPASS_ROLES: [&str; 2] = ["owner", "admin"];

/// Organization owner role slug.
pub const ORG_OWNER_ROLE: &str = "owner";
