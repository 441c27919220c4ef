//! Access-control error model.

use thiserror::Error;

/// Result type used across the access-control domain.
pub type AccessResult<T> = Result<T, AccessError>;

/// Access-control error taxonomy.
///
/// Keep this focused on deterministic authorization/identity failures.
/// Infrastructure concerns (pool exhaustion, IO) belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// Missing, expired, or malformed credential (401-equivalent).
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Valid identity, insufficient grant (403-equivalent). Always names the
    /// capability or module that was missing.
    #[error("forbidden: missing {missing}")]
    Authorization { missing: String },

    /// No organization context could be determined where one is required
    /// (400-equivalent).
    #[error("organization context required")]
    ContextMissing,

    /// A referenced organization/role/permission/team/module does not exist
    /// (404-equivalent).
    #[error("{0} not found")]
    NotFound(String),

    /// A structural invariant was violated: leadership retention, childless
    /// deletion, duplicate scope/slug (422-equivalent).
    #[error("conflict: {0}")]
    ConflictInvariant(String),

    /// Infrastructure failure (storage, pool, serialization). Surfaces as a
    /// 500; never carries backend details to the caller beyond this message.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AccessError {
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    pub fn forbidden(missing: impl Into<String>) -> Self {
        Self::Authorization {
            missing: missing.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::ConflictInvariant(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True for failures that must surface verbatim to the caller (no retry).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AccessError::Authentication(_) | AccessError::ContextMissing
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_error_names_missing_capability() {
        let err = AccessError::forbidden("permission 'invoices.read'");
        assert_eq!(err.to_string(), "forbidden: missing permission 'invoices.read'");
    }

    #[test]
    fn authentication_and_context_errors_are_terminal() {
        assert!(AccessError::authentication("expired").is_terminal());
        assert!(AccessError::ContextMissing.is_terminal());
        assert!(!AccessError::forbidden("x").is_terminal());
        assert!(!AccessError::not_found("role").is_terminal());
    }
}
