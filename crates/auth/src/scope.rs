use aether_core::TenantId;
use thiserror::Error;

use crate::{PrincipalContext, TenantContext};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScopeError {
    #[error("caller's role does not permit overriding tenant scope")]
    TenantOverrideDenied,
}

/// Resolves the tenant a request should actually operate against.
///
/// `admin` and `operator` callers may override the tenant via an explicit
/// query parameter; every other caller is forced to the tenant resolved
/// from the request context header, regardless of what they asked for.
pub fn resolve_tenant_scope(
    tenant_ctx: &TenantContext,
    principal: &PrincipalContext,
    requested_tenant: Option<&str>,
) -> Result<TenantId, ScopeError> {
    match requested_tenant {
        Some(requested) if principal.roles().is_admin_or_operator() => Ok(TenantId::new(requested)),
        Some(_) => Err(ScopeError::TenantOverrideDenied),
        None => Ok(tenant_ctx.tenant_id().clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aether_core::{Role, RoleSet};

    fn roles(rs: &[Role]) -> PrincipalContext {
        let mut set = RoleSet::empty();
        for r in rs {
            set = RoleSet::parse_header(&format!("{},{}", r, r));
        }
        PrincipalContext::new(set)
    }

    #[test]
    fn admin_may_override_tenant() {
        let tenant_ctx = TenantContext::new(TenantId::new("home"));
        let principal = roles(&[Role::Admin]);
        let resolved = resolve_tenant_scope(&tenant_ctx, &principal, Some("other")).unwrap();
        assert_eq!(resolved, TenantId::new("other"));
    }

    #[test]
    fn viewer_cannot_override_tenant() {
        let tenant_ctx = TenantContext::new(TenantId::new("home"));
        let principal = roles(&[Role::Viewer]);
        let err = resolve_tenant_scope(&tenant_ctx, &principal, Some("other")).unwrap_err();
        assert_eq!(err, ScopeError::TenantOverrideDenied);
    }

    #[test]
    fn no_override_requested_uses_context_tenant() {
        let tenant_ctx = TenantContext::new(TenantId::new("home"));
        let principal = roles(&[Role::Viewer]);
        let resolved = resolve_tenant_scope(&tenant_ctx, &principal, None).unwrap();
        assert_eq!(resolved, TenantId::new("home"));
    }
}
