//! API-side authorization glue over the claims guard.
//!
//! Claims checks are pure (see `atrium_auth::guard`); the one impure path is
//! the degraded-claims fallback, which queries the organization's currently
//! enabled modules instead of denying outright.

use chrono::Utc;

use atrium_auth::{check_module, AccessClaims, ModuleDecision};
use atrium_core::{AccessError, AccessResult, ModuleSlug};
use atrium_directory::{DirectoryStore, Resolver};

use crate::context::OrganizationContext;

/// Enforce module access for the request.
///
/// The fast path never touches the directory. Only a credential carrying no
/// module claims at all (an older schema) falls back to the organization's
/// live module set.
pub async fn ensure_module_access(
    directory: &dyn DirectoryStore,
    organization: Option<&OrganizationContext>,
    claims: &AccessClaims,
    module: &ModuleSlug,
) -> AccessResult<()> {
    match check_module(claims, module) {
        ModuleDecision::Granted => Ok(()),
        ModuleDecision::Denied(err) => Err(err),
        ModuleDecision::Unresolved => {
            let Some(organization) = organization else {
                return Err(AccessError::ContextMissing);
            };
            let enabled = Resolver::new(directory)
                .enabled_modules(organization.organization_id(), Utc::now())
                .await?;
            if enabled.iter().any(|m| &m.slug == module) {
                Ok(())
            } else {
                Err(AccessError::forbidden(format!(
                    "module '{module}' (not enabled for organization)"
                )))
            }
        }
    }
}
