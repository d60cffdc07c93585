use aether_core::{RoleSet, TenantId};

/// The tenant resolved from `X-Tenant-ID` (or `"system"` if absent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }
}

/// The caller identity resolved from `X-User-Roles`. There is no distinct
/// principal id in this system — roles are the entire authorization surface.
#[derive(Debug, Clone)]
pub struct PrincipalContext {
    roles: RoleSet,
}

impl PrincipalContext {
    pub fn new(roles: RoleSet) -> Self {
        Self { roles }
    }

    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }
}
