//! Organization subscription status.

use serde::{Deserialize, Serialize};

/// Billing/subscription state of an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Trial,
    #[default]
    Active,
    Suspended,
    Cancelled,
    Pending,
}

impl SubscriptionStatus {
    /// Active and trial organizations may transact.
    pub fn allows_access(&self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::Trial)
    }
}

impl core::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            SubscriptionStatus::Trial => "trial",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Suspended => "suspended",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Pending => "pending",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_active_and_trial_allow_access() {
        assert!(SubscriptionStatus::Active.allows_access());
        assert!(SubscriptionStatus::Trial.allows_access());
        assert!(!SubscriptionStatus::Suspended.allows_access());
        assert!(!SubscriptionStatus::Cancelled.allows_access());
        assert!(!SubscriptionStatus::Pending.allows_access());
    }
}
