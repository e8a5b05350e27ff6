use crate::config::GateConfig;
use crate::context::AuthHandle;
use crate::principal::Principal;
use crate::role::{Area, Role, RoleSet};
use crate::types::TenantSlug;

/// A client-side navigation that replaces the current history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    /// Target path.
    pub to: String,
    /// Always true for guard redirects, so the back button never loops.
    pub replace: bool,
}

impl Redirect {
    /// Redirect that replaces the current history entry.
    pub fn replace(to: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            replace: true,
        }
    }
}

/// What a guarded subtree should do on this render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Session restore still running; render a neutral placeholder.
    Loading,
    /// Send the user elsewhere.
    Redirect(Redirect),
    /// Render the children unchanged.
    Render,
}

/// Route-level access check.
///
/// The platform, tenant and role-scoped variants are the same type with
/// different parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    area: Area,
    login_path: String,
    unauthorized_path: String,
    required: Option<RoleSet>,
    tenant_bound: bool,
}

impl Guard {
    /// Guard for `/a/*`: requires superadmin.
    pub fn platform(config: &GateConfig) -> Self {
        Self::role_scoped(config, Area::Platform, RoleSet::from(Role::Superadmin))
    }

    /// Guard for `/s/*`: requires a tenant role and a matching tenant slug.
    pub fn tenant(config: &GateConfig) -> Self {
        Self::role_scoped(config, Area::Tenant, RoleSet::for_area(Area::Tenant))
    }

    /// Guard restricted to `roles` inside `area`.
    pub fn role_scoped(config: &GateConfig, area: Area, roles: RoleSet) -> Self {
        Self {
            area,
            login_path: config.login_path(area).to_string(),
            unauthorized_path: config.unauthorized.clone(),
            required: Some(roles),
            tenant_bound: area == Area::Tenant,
        }
    }

    /// Guard that only requires a signed-in principal.
    pub fn authenticated(config: &GateConfig, area: Area) -> Self {
        Self {
            required: None,
            ..Self::role_scoped(config, area, RoleSet::empty())
        }
    }

    /// Area this guard protects.
    pub fn area(&self) -> Area {
        self.area
    }

    /// Roles admitted, `None` for any signed-in principal.
    pub fn required(&self) -> Option<RoleSet> {
        self.required
    }

    /// Evaluates against a mounted context.
    ///
    /// The caller picks the context matching [`Guard::area`].
    pub fn evaluate(&self, handle: &dyn AuthHandle) -> GuardOutcome {
        let tenant = if self.tenant_bound {
            handle.resolved_tenant()
        } else {
            None
        };
        let outcome = self.decide(
            handle.is_loading(),
            handle.principal().as_ref(),
            tenant.as_ref(),
        );
        tracing::debug!(area = %self.area, outcome = ?outcome, "guard evaluated");
        outcome
    }

    /// The pure decision behind [`Guard::evaluate`].
    pub fn decide(
        &self,
        loading: bool,
        principal: Option<&Principal>,
        tenant: Option<&TenantSlug>,
    ) -> GuardOutcome {
        if loading {
            return GuardOutcome::Loading;
        }
        let Some(principal) = principal else {
            return GuardOutcome::Redirect(Redirect::replace(&self.login_path));
        };
        let role_ok = self
            .required
            .is_none_or(|roles| roles.contains(principal.role()));
        let tenant_ok = !self.tenant_bound || tenant.is_some_and(|slug| principal.belongs_to(slug));
        if role_ok && tenant_ok {
            GuardOutcome::Render
        } else {
            GuardOutcome::Redirect(Redirect::replace(&self.unauthorized_path))
        }
    }
}
