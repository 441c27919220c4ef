//! Slug value objects.
//!
//! Slugs are modeled as opaque strings at this layer; uniqueness constraints
//! ((scope, slug) for roles/permissions, per-organization for teams) are
//! enforced by the stores that persist them.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

macro_rules! impl_slug_newtype {
    ($t:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(Cow<'static, str>);

        impl $t {
            pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
                Self(name.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&'static str> for $t {
            fn from(value: &'static str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $t {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

impl_slug_newtype!(RoleSlug, "Role identifier used for RBAC (e.g. `admin`).");
impl_slug_newtype!(PermissionSlug, "Permission identifier (e.g. `invoices.read`).");
impl_slug_newtype!(ModuleSlug, "Feature module identifier (e.g. `inventory`).");
impl_slug_newtype!(TeamSlug, "Team identifier, unique within an organization.");
impl_slug_newtype!(OrganizationSlug, "Organization identifier used in URLs and claims.");

/// Derive a slug from a display name: lowercase alphanumerics joined by dashes.
///
/// Returns `None` when nothing slug-worthy survives (e.g. all punctuation).
pub fn slugify(name: &str) -> Option<String> {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_dash = false;
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash && !slug.is_empty() {
            slug.push('-');
            last_was_dash = true;
        }
    }
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() { None } else { Some(slug) }
}
