//! Authority scope: organization-specific or global.
//!
//! Roles, permissions, and direct grants carry a scope. The legacy data model
//! expressed this as a nullable string column holding an organization id, the
//! literal `"global"`, or null; both non-organization forms mean global here.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::id::OrganizationId;

/// Scope of a role or permission record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Applies to every organization.
    Global,
    /// Applies to exactly one organization.
    Organization(OrganizationId),
}

impl Scope {
    /// Whether a record with this scope applies to the target organization.
    ///
    /// A record scoped to the target organization applies; a global record
    /// applies everywhere. Two records sharing a slug (one global, one
    /// organization-specific) are both independently valid; deduplication is
    /// by row identity, never by slug.
    pub fn applies_to(&self, organization_id: OrganizationId) -> bool {
        match self {
            Scope::Global => true,
            Scope::Organization(id) => *id == organization_id,
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Scope::Global)
    }

    /// Normalize the legacy column form: null and `"global"` both map to
    /// `Global`; anything else must parse as an organization id.
    pub fn from_legacy(column: Option<&str>) -> Result<Self, uuid::Error> {
        match column {
            None => Ok(Scope::Global),
            Some("global") => Ok(Scope::Global),
            Some(raw) => Ok(Scope::Organization(OrganizationId::from_uuid(
                uuid::Uuid::from_str(raw)?,
            ))),
        }
    }

    /// The column form written back to storage.
    pub fn to_column(&self) -> Option<String> {
        match self {
            Scope::Global => Some("global".to_string()),
            Scope::Organization(id) => Some(id.to_string()),
        }
    }
}

impl core::fmt::Display for Scope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Scope::Global => f.write_str("global"),
            Scope::Organization(id) => core::fmt::Display::fmt(id, f),
        }
    }
}
