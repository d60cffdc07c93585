//! Request-scoped identity: the tenant and role context resolved from
//! `X-Tenant-ID` / `X-User-Roles`, and the tenant-scoping rule applied
//! uniformly across the Query & Admin API.

mod context;
mod scope;

pub use context::{PrincipalContext, TenantContext};
pub use scope::{resolve_tenant_scope, ScopeError};
