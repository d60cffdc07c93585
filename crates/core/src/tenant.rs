//! Tenant identity and the flat role vocabulary read from `X-User-Roles`.
//!
//! Unlike the UUID-keyed identifiers elsewhere in this corpus, a tenant here
//! is a caller-supplied free-form string (`X-Tenant-ID`), not a generated id
//! the system owns — there is no tenant registry to look it up against.

use std::borrow::Cow;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// The tenant scope assigned to an event, rule, or request.
///
/// Defaults to `"system"` when no tenant context is supplied, per the
/// ingestion and rule-scoping rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub const SYSTEM: &'static str = "system";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn system() -> Self {
        Self(Self::SYSTEM.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_system(&self) -> bool {
        self.0 == Self::SYSTEM
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::system()
    }
}

impl core::fmt::Display for TenantId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TenantId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// One of the four canonical roles carried by `X-User-Roles`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Operator,
    Viewer,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Operator => "operator",
            Self::Viewer => "viewer",
            Self::System => "system",
        }
    }

    /// Parses a single role token, case-insensitively. Unknown tokens are
    /// dropped by the caller rather than rejected: an unrecognized role in a
    /// comma list should not deny the other roles carried alongside it.
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "operator" => Some(Self::Operator),
            "viewer" => Some(Self::Viewer),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of roles resolved for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(HashSet<Role>);

impl RoleSet {
    pub fn empty() -> Self {
        Self(HashSet::new())
    }

    /// Parses `X-User-Roles`, accepting either a comma-separated list
    /// (`admin,operator`) or a JSON array (`["admin","operator"]`).
    pub fn parse_header(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() {
            return Self::empty();
        }

        if value.starts_with('[') {
            if let Ok(tokens) = serde_json::from_str::<Vec<Cow<'_, str>>>(value) {
                return Self(tokens.iter().filter_map(|t| Role::parse(t)).collect());
            }
        }

        Self(value.split(',').filter_map(Role::parse).collect())
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn is_admin_or_operator(&self) -> bool {
        self.contains(Role::Admin) || self.contains(Role::Operator)
    }

    pub fn is_admin(&self) -> bool {
        self.contains(Role::Admin)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_roles() {
        let roles = RoleSet::parse_header("admin, operator");
        assert!(roles.contains(Role::Admin));
        assert!(roles.contains(Role::Operator));
        assert!(!roles.contains(Role::Viewer));
    }

    #[test]
    fn parses_json_array_roles() {
        let roles = RoleSet::parse_header(r#"["viewer","system"]"#);
        assert!(roles.contains(Role::Viewer));
        assert!(roles.contains(Role::System));
    }

    #[test]
    fn unknown_tokens_are_dropped_not_rejected() {
        let roles = RoleSet::parse_header("admin,bogus");
        assert!(roles.contains(Role::Admin));
        assert_eq!(roles.0.len(), 1);
    }

    #[test]
    fn empty_header_yields_empty_set() {
        let roles = RoleSet::parse_header("");
        assert!(!roles.is_admin_or_operator());
    }

    #[test]
    fn tenant_defaults_to_system() {
        assert_eq!(TenantId::default().as_str(), "system");
        assert!(TenantId::default().is_system());
    }
}
