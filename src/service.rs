use std::sync::Arc;

use crate::config::GateConfig;
use crate::directory::{Credentials, UserDirectory};
use crate::error::{Error, Result};
use crate::principal::Principal;
use crate::resolver::TenantResolver;
use crate::role::Area;
use crate::session::SessionStore;
use crate::tenant::TenantScope;
use crate::types::{Email, TenantSlug};

/// Checks that `principal` may act in `area` on a host resolving to `tenant`.
///
/// Tenant-area access additionally requires the principal's slug to equal
/// the resolved one; a host without a tenant admits no tenant principal.
pub fn check_scope(principal: &Principal, area: Area, tenant: Option<&TenantSlug>) -> Result<()> {
    if principal.area() != area {
        return Err(Error::AreaMismatch {
            expected: area,
            actual: principal.role(),
        });
    }
    match area {
        Area::Platform => Ok(()),
        Area::Tenant => match tenant {
            Some(tenant) if principal.belongs_to(tenant) => Ok(()),
            _ => Err(Error::TenantMismatch {
                expected: tenant.cloned(),
                actual: principal.tenant_slug().cloned(),
            }),
        },
    }
}

/// Credential validation and session writes for one area.
///
/// The platform and tenant variants are the same type bound to a different
/// [`Area`]; both share one [`SessionStore`].
#[derive(Debug)]
pub struct AuthService<D> {
    area: Area,
    directory: D,
    session: Arc<SessionStore>,
    tenants: TenantScope,
    config: Arc<GateConfig>,
}

impl<D> AuthService<D> {
    /// Creates a service scoped to `area`.
    pub fn new(area: Area, directory: D, session: Arc<SessionStore>, config: Arc<GateConfig>) -> Self {
        Self {
            area,
            directory,
            session,
            tenants: TenantScope::new(TenantResolver::from_config(&config)),
            config,
        }
    }

    /// Area this service signs principals into.
    pub fn area(&self) -> Area {
        self.area
    }

    /// Shared configuration.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Session store shared with the other area.
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Host-to-tenant cache behind [`AuthService::resolved_tenant`].
    pub fn tenant_scope(&self) -> &TenantScope {
        &self.tenants
    }

    /// Tenant resolved from the current host, cached until the host changes.
    pub fn resolved_tenant(&self) -> Option<TenantSlug> {
        self.tenants.resolve(&self.session.location().hostname())
    }

    /// Area of the active path, or this service's area off both prefixes.
    fn target_area(&self) -> Area {
        let path = self.session.location().pathname();
        self.config.area_of(&path).unwrap_or(self.area)
    }

    /// Clears the persisted session. Never fails.
    pub fn logout(&self) {
        if let Err(err) = self.session.clear() {
            tracing::warn!(area = %self.area, error = %err, "failed to clear session");
        }
        tracing::info!(area = %self.area, "logged out");
    }

    /// Reads the active principal from the session store.
    pub fn current_principal(&self) -> Option<Principal> {
        self.session.load()
    }

    /// Returns whether the stored principal may use the active path.
    ///
    /// Paths outside both area prefixes are never valid.
    pub fn is_valid_for_current_route(&self) -> bool {
        let Some(principal) = self.current_principal() else {
            return false;
        };
        let path = self.session.location().pathname();
        let Some(area) = self.config.area_of(&path) else {
            return false;
        };
        check_scope(&principal, area, self.resolved_tenant().as_ref()).is_ok()
    }
}

impl<D> AuthService<D>
where
    D: UserDirectory,
{
    /// Validates credentials for the active route and persists the principal.
    ///
    /// On failure the session is left untouched.
    pub async fn login(&self, credentials: &Credentials) -> Result<Principal> {
        let email = Email::new(&credentials.email).map_err(|_| Error::InvalidCredentials)?;
        let principal = self
            .directory
            .verify(&email, &credentials.password)
            .await
            .map_err(Error::Directory)?
            .ok_or(Error::InvalidCredentials)?;

        let target = self.target_area();
        check_scope(&principal, target, self.resolved_tenant().as_ref())?;
        if target != self.area {
            return Err(Error::AreaMismatch {
                expected: self.area,
                actual: principal.role(),
            });
        }

        if let Err(err) = self.session.save(&principal) {
            // Still signed in for this page; the session just won't survive a reload.
            tracing::warn!(error = %err, "login succeeded but session was not persisted");
        }
        tracing::info!(
            area = %self.area,
            principal = %principal.id(),
            role = %principal.role(),
            "login succeeded"
        );
        Ok(principal)
    }
}
