//! Module catalog and per-organization enablement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atrium_core::{Entity, ModuleId, ModuleSlug, OrganizationId};

/// Catalog entry for a licensable feature area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub code: String,
    pub name: String,
    pub slug: ModuleSlug,
    pub description: Option<String>,
    pub category: Option<String>,
    pub display_order: i32,
    /// Slugs of modules that must be enabled before this one.
    pub dependencies: Vec<ModuleSlug>,
    pub is_core: bool,
    pub is_active: bool,
    pub requires_license: bool,
}

impl Module {
    pub fn new(code: impl Into<String>, name: impl Into<String>, slug: ModuleSlug) -> Self {
        Self {
            id: ModuleId::new(),
            code: code.into(),
            name: name.into(),
            slug,
            description: None,
            category: None,
            display_order: 0,
            dependencies: Vec::new(),
            is_core: false,
            is_active: true,
            requires_license: false,
        }
    }

    pub fn has_dependencies(&self) -> bool {
        !self.dependencies.is_empty()
    }
}

impl Entity for Module {
    type Id = ModuleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Organization↔Module enablement row.
///
/// A module not enabled (or expired) here is unreachable for the organization
/// regardless of any role or team grants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationModule {
    pub organization_id: OrganizationId,
    pub module_id: ModuleId,
    pub is_enabled: bool,
    pub enabled_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub settings: serde_json::Value,
    pub limits: serde_json::Value,
}

impl OrganizationModule {
    pub fn new(organization_id: OrganizationId, module_id: ModuleId, now: DateTime<Utc>) -> Self {
        Self {
            organization_id,
            module_id,
            is_enabled: true,
            enabled_at: now,
            expires_at: None,
            settings: serde_json::Value::Null,
            limits: serde_json::Value::Null,
        }
    }

    /// Enabled and not past its expiry.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_enabled && self.expires_at.is_none_or(|t| t > now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn enablement_expiry_disables_the_module() {
        let now = Utc::now();
        let mut row = OrganizationModule::new(OrganizationId::new(), ModuleId::new(), now);
        assert!(row.is_live(now));

        row.expires_at = Some(now + Duration::days(30));
        assert!(row.is_live(now));
        assert!(!row.is_live(now + Duration::days(31)));
    }

    #[test]
    fn disabled_enablement_is_not_live() {
        let now = Utc::now();
        let mut row = OrganizationModule::new(OrganizationId::new(), ModuleId::new(), now);
        row.is_enabled = false;
        assert!(!row.is_live(now));
    }
}
