//! Header-based request identity. There is no bearer token or local JWT
//! validation here: `X-Tenant-ID` and `X-User-Roles` are consumed as
//! authoritative, already having been established by an external auth
//! collaborator in front of this service.

use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use aether_auth::{PrincipalContext, TenantContext};
use aether_core::{RoleSet, TenantId};

const TENANT_HEADER: &str = "x-tenant-id";
const ROLES_HEADER: &str = "x-user-roles";

/// Resolves `TenantContext`/`PrincipalContext` from request headers and
/// inserts both into the request's extensions for downstream handlers.
pub async fn auth_middleware(mut req: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    let tenant_id = tenant_id_from_headers(req.headers());
    let roles = roles_from_headers(req.headers());

    req.extensions_mut().insert(TenantContext::new(tenant_id));
    req.extensions_mut().insert(PrincipalContext::new(roles));

    next.run(req).await
}

fn tenant_id_from_headers(headers: &HeaderMap) -> TenantId {
    headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(TenantId::new)
        .unwrap_or_default()
}

fn roles_from_headers(headers: &HeaderMap) -> RoleSet {
    headers
        .get(ROLES_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(RoleSet::parse_header)
        .unwrap_or_else(RoleSet::empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aether_core::Role;
    use axum::http::HeaderValue;

    #[test]
    fn missing_tenant_header_defaults_to_system() {
        let headers = HeaderMap::new();
        assert_eq!(tenant_id_from_headers(&headers), TenantId::system());
    }

    #[test]
    fn tenant_header_is_honored() {
        let mut headers = HeaderMap::new();
        headers.insert(TENANT_HEADER, HeaderValue::from_static("acme"));
        assert_eq!(tenant_id_from_headers(&headers), TenantId::new("acme"));
    }

    #[test]
    fn roles_header_parses_comma_list() {
        let mut headers = HeaderMap::new();
        headers.insert(ROLES_HEADER, HeaderValue::from_static("admin,viewer"));
        let roles = roles_from_headers(&headers);
        assert!(roles.contains(Role::Admin));
        assert!(roles.contains(Role::Viewer));
    }

    #[test]
    fn missing_roles_header_yields_empty_set() {
        let headers = HeaderMap::new();
        assert!(!roles_from_headers(&headers).is_admin_or_operator());
    }
}
