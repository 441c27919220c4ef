//! Organization (tenant) record and membership join row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atrium_core::{Entity, OrganizationId, OrganizationSlug, SubscriptionStatus, UserId};

/// Identity-bearing tenant; root of all scoping.
///
/// # Invariants
/// - `slug` is globally unique.
/// - Soft-deleted (never hard-deleted while referenced by history).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub slug: OrganizationSlug,
    pub domain: Option<String>,
    pub description: Option<String>,
    pub settings: serde_json::Value,
    pub is_active: bool,
    pub subscription_status: SubscriptionStatus,
    /// Seat limit; `None` means unlimited.
    pub max_users: Option<u32>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    /// Opaque billing references owned by the billing collaborator.
    pub subscription_id: Option<String>,
    pub plan_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Organization {
    pub fn new(name: impl Into<String>, slug: OrganizationSlug, now: DateTime<Utc>) -> Self {
        Self {
            id: OrganizationId::new(),
            name: name.into(),
            slug,
            domain: None,
            description: None,
            settings: serde_json::Value::Null,
            is_active: true,
            subscription_status: SubscriptionStatus::Trial,
            max_users: None,
            trial_ends_at: None,
            subscription_id: None,
            plan_id: None,
            created_at: now,
            deleted_at: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }

    pub fn has_active_subscription(&self) -> bool {
        self.subscription_status.allows_access()
    }

    pub fn is_on_trial(&self, now: DateTime<Utc>) -> bool {
        self.subscription_status == SubscriptionStatus::Trial
            && self.trial_ends_at.is_some_and(|t| t > now)
    }

    pub fn is_trial_expired(&self, now: DateTime<Utc>) -> bool {
        self.subscription_status == SubscriptionStatus::Trial
            && self.trial_ends_at.is_some_and(|t| t <= now)
    }

    /// Whether `additional` more active members fit under the seat limit.
    pub fn can_add_users(&self, active_members: u32, additional: u32) -> bool {
        match self.max_users {
            None => true,
            Some(max) => active_members + additional <= max,
        }
    }

    pub fn activate_subscription(&mut self, subscription_id: String, plan_id: Option<String>) {
        self.subscription_status = SubscriptionStatus::Active;
        self.subscription_id = Some(subscription_id);
        self.plan_id = plan_id;
    }

    pub fn suspend_subscription(&mut self) {
        self.subscription_status = SubscriptionStatus::Suspended;
    }

    pub fn cancel_subscription(&mut self) {
        self.subscription_status = SubscriptionStatus::Cancelled;
    }

    pub fn soft_delete(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.deleted_at = Some(now);
    }
}

impl Entity for Organization {
    type Id = OrganizationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// User×Organization join row.
///
/// # Invariants
/// - A user appears at most once per organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: UserId,
    pub organization_id: OrganizationId,
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
}

impl Membership {
    pub fn new(user_id: UserId, organization_id: OrganizationId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            organization_id,
            is_active: true,
            joined_at: now,
        }
    }
}

/// Usage snapshot for billing collaborators.
#[derive(Debug, Clone, Serialize)]
pub struct UsageSummary {
    pub organization_id: OrganizationId,
    pub organization_name: String,
    pub subscription_status: SubscriptionStatus,
    pub subscription_id: Option<String>,
    pub plan_id: Option<String>,
    pub max_users: Option<u32>,
    pub active_users_count: u32,
    pub total_users_count: u32,
    pub enabled_modules: Vec<String>,
    pub is_trial: bool,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn unlimited_seats_when_max_users_is_none() {
        let org = Organization::new("Acme", OrganizationSlug::new("acme"), Utc::now());
        assert!(org.can_add_users(10_000, 1));
    }

    #[test]
    fn seat_limit_is_inclusive() {
        let mut org = Organization::new("Acme", OrganizationSlug::new("acme"), Utc::now());
        org.max_users = Some(10);
        assert!(org.can_add_users(9, 1));
        assert!(!org.can_add_users(10, 1));
        assert!(!org.can_add_users(9, 2));
    }

    #[test]
    fn trial_expiry_is_clock_driven() {
        let now = Utc::now();
        let mut org = Organization::new("Acme", OrganizationSlug::new("acme"), now);
        org.trial_ends_at = Some(now + Duration::days(7));
        assert!(org.is_on_trial(now));
        assert!(!org.is_trial_expired(now));
        assert!(org.is_trial_expired(now + Duration::days(8)));
    }

    #[test]
    fn subscription_lifecycle() {
        let mut org = Organization::new("Acme", OrganizationSlug::new("acme"), Utc::now());
        org.activate_subscription("sub_123".into(), Some("plan_pro".into()));
        assert!(org.has_active_subscription());

        org.suspend_subscription();
        assert!(!org.has_active_subscription());
        assert_eq!(org.subscription_status, SubscriptionStatus::Suspended);

        org.cancel_subscription();
        assert_eq!(org.subscription_status, SubscriptionStatus::Cancelled);
    }

    #[test]
    fn soft_delete_marks_inactive() {
        let now = Utc::now();
        let mut org = Organization::new("Acme", OrganizationSlug::new("acme"), now);
        org.soft_delete(now);
        assert!(!org.is_live());
        assert_eq!(org.deleted_at, Some(now));
    }
}
