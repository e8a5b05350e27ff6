use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::permission::{Permission, PermissionSet};
use crate::role::{Area, Role, RoleSet};
use crate::types::{Email, PrincipalId, TenantId, TenantSlug};

/// Authenticated user held in session.
///
/// A principal is either platform-scoped (`superadmin`, no tenant) or scoped
/// to exactly one tenant. Both constructors and deserialization enforce this,
/// so a `Principal` value is always consistent.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawPrincipal")]
pub struct Principal {
    id: PrincipalId,
    email: Email,
    display_name: String,
    role: Role,
    tenant_id: Option<TenantId>,
    tenant_slug: Option<TenantSlug>,
    #[serde(skip_serializing_if = "Option::is_none")]
    permissions: Option<Vec<Permission>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPrincipal {
    id: PrincipalId,
    email: Email,
    #[serde(alias = "name")]
    display_name: String,
    role: Role,
    #[serde(default, alias = "empresaId")]
    tenant_id: Option<TenantId>,
    #[serde(default, alias = "empresaSubdomain")]
    tenant_slug: Option<TenantSlug>,
    #[serde(default)]
    permissions: Option<Vec<Permission>>,
}

impl TryFrom<RawPrincipal> for Principal {
    type Error = Error;

    fn try_from(raw: RawPrincipal) -> Result<Self> {
        let principal = Self {
            id: raw.id,
            email: raw.email,
            display_name: raw.display_name,
            role: raw.role,
            tenant_id: raw.tenant_id,
            tenant_slug: raw.tenant_slug,
            permissions: raw.permissions,
        };
        principal.check_scope()?;
        Ok(principal)
    }
}

impl Principal {
    /// Creates a platform-scoped superadmin.
    pub fn platform(id: PrincipalId, email: Email, display_name: impl Into<String>) -> Self {
        Self {
            id,
            email,
            display_name: display_name.into(),
            role: Role::Superadmin,
            tenant_id: None,
            tenant_slug: None,
            permissions: None,
        }
    }

    /// Creates a tenant-scoped principal.
    ///
    /// Fails with [`Error::InvalidPrincipal`] when `role` is platform-scoped.
    pub fn tenant(
        id: PrincipalId,
        email: Email,
        display_name: impl Into<String>,
        role: Role,
        tenant_id: TenantId,
        tenant_slug: TenantSlug,
    ) -> Result<Self> {
        let principal = Self {
            id,
            email,
            display_name: display_name.into(),
            role,
            tenant_id: Some(tenant_id),
            tenant_slug: Some(tenant_slug),
            permissions: None,
        };
        principal.check_scope()?;
        Ok(principal)
    }

    /// Replaces the role's permission row with an explicit list.
    pub fn with_permissions(mut self, permissions: Vec<Permission>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    fn check_scope(&self) -> Result<()> {
        match (self.role.area(), &self.tenant_id, &self.tenant_slug) {
            (Area::Platform, None, None) | (Area::Tenant, Some(_), Some(_)) => Ok(()),
            (Area::Platform, _, _) => Err(Error::InvalidPrincipal(format!(
                "{} must not be scoped to a tenant",
                self.role
            ))),
            (Area::Tenant, _, _) => Err(Error::InvalidPrincipal(format!(
                "{} requires both tenant id and tenant slug",
                self.role
            ))),
        }
    }

    /// Directory id.
    pub fn id(&self) -> PrincipalId {
        self.id
    }

    /// Sign-in email.
    pub fn email(&self) -> &Email {
        &self.email
    }

    /// Name shown in the console header.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Single role held by this principal.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Area this principal may sign in to.
    pub fn area(&self) -> Area {
        self.role.area()
    }

    /// Tenant id, `None` for superadmins.
    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    /// Tenant slug, `None` for superadmins.
    pub fn tenant_slug(&self) -> Option<&TenantSlug> {
        self.tenant_slug.as_ref()
    }

    /// Effective permission set.
    pub fn permissions(&self) -> PermissionSet {
        PermissionSet::resolve(self.role, self.permissions.as_deref())
    }

    /// Returns whether the principal holds `permission`.
    pub fn has_permission(&self, permission: &Permission) -> bool {
        self.permissions().allows(permission)
    }

    /// Returns whether the principal may act inside `tenant`.
    pub fn belongs_to(&self, tenant: &TenantSlug) -> bool {
        self.tenant_slug.as_ref() == Some(tenant)
    }
}

/// Permission check tolerant of a missing principal.
pub fn has_permission(principal: Option<&Principal>, permission: &Permission) -> bool {
    principal.is_some_and(|principal| principal.has_permission(permission))
}

/// Role check tolerant of a missing principal.
pub fn has_role(principal: Option<&Principal>, roles: RoleSet) -> bool {
    principal.is_some_and(|principal| roles.contains(principal.role()))
}
