use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;

use crate::config::GateConfig;
use crate::directory::{Credentials, UserDirectory};
use crate::error::{Error, Result};
use crate::permission::{Permission, PermissionSet};
use crate::principal::Principal;
use crate::role::Area;
use crate::service::AuthService;
use crate::session::SessionStore;
use crate::types::TenantSlug;

/// Progress of the most recent login attempt.
///
/// `Rejected` is sticky: it stays until the next [`AuthHandle::login`] moves
/// the context to `Validating`, or [`AuthHandle::logout`] returns it to
/// `Idle`. The login form reads it to keep its error banner up while the
/// user edits the fields. The error itself comes back from `login`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginPhase {
    /// No attempt in flight.
    Idle,
    /// Waiting on the user directory.
    Validating,
    /// Last attempt succeeded.
    Authenticated,
    /// Last attempt failed and nothing has happened since.
    Rejected,
}

/// Object-safe view of an area's auth context, consumed by guards, the
/// router and the axum layer.
#[async_trait]
pub trait AuthHandle: Send + Sync {
    /// Area this context serves.
    fn area(&self) -> Area;

    /// Runs the mount-time session restore once.
    fn init(&self);

    /// Drops in-memory state; storage is left alone.
    fn dispose(&self);

    fn principal(&self) -> Option<Principal>;

    fn is_authenticated(&self) -> bool {
        self.principal().is_some()
    }

    /// True until [`AuthHandle::init`] has completed.
    fn is_loading(&self) -> bool;

    fn phase(&self) -> LoginPhase;

    /// Tenant resolved from the current host.
    fn resolved_tenant(&self) -> Option<TenantSlug>;

    /// Signs in; failures are returned unchanged for the form to display.
    async fn login(&self, credentials: Credentials) -> Result<Principal>;

    /// Signs out and runs logout hooks. Never fails.
    fn logout(&self);

    fn has_permission(&self, permission: &Permission) -> bool {
        self.principal()
            .is_some_and(|principal| principal.has_permission(permission))
    }
}

#[derive(Debug)]
struct ContextState {
    principal: Option<Principal>,
    loading: bool,
    phase: LoginPhase,
}

impl ContextState {
    fn unmounted() -> Self {
        Self {
            principal: None,
            loading: true,
            phase: LoginPhase::Idle,
        }
    }
}

type LogoutHook = Box<dyn Fn() + Send + Sync>;

/// Long-lived auth state for one area.
///
/// Construct once at application start, call [`AuthHandle::init`] at mount
/// and [`AuthHandle::dispose`] at unmount.
pub struct AuthContext<D> {
    service: AuthService<D>,
    state: RwLock<ContextState>,
    initialized: AtomicBool,
    logout_hooks: Mutex<Vec<LogoutHook>>,
}

impl<D> fmt::Debug for AuthContext<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read_state();
        f.debug_struct("AuthContext")
            .field("area", &self.service.area())
            .field("loading", &state.loading)
            .field("phase", &state.phase)
            .field("principal", &state.principal.as_ref().map(Principal::id))
            .finish()
    }
}

impl<D> AuthContext<D> {
    /// Wraps `service`; the context is loading until [`AuthHandle::init`].
    pub fn new(service: AuthService<D>) -> Self {
        Self {
            service,
            state: RwLock::new(ContextState::unmounted()),
            initialized: AtomicBool::new(false),
            logout_hooks: Mutex::new(Vec::new()),
        }
    }

    /// Underlying login service.
    pub fn service(&self) -> &AuthService<D> {
        &self.service
    }

    /// Registers a callback run after every logout, for route-local UI state.
    pub fn on_logout(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.logout_hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(hook));
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, ContextState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, ContextState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl<D> AuthHandle for AuthContext<D>
where
    D: UserDirectory,
{
    fn area(&self) -> Area {
        self.service.area()
    }

    fn init(&self) {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return;
        }
        let principal = self.service.current_principal();
        let mut state = self.write_state();
        state.phase = if principal.is_some() {
            LoginPhase::Authenticated
        } else {
            LoginPhase::Idle
        };
        tracing::debug!(
            area = %self.service.area(),
            principal = ?principal.as_ref().map(Principal::id),
            "auth context mounted"
        );
        state.principal = principal;
        state.loading = false;
    }

    fn dispose(&self) {
        *self.write_state() = ContextState::unmounted();
        self.initialized.store(false, Ordering::Release);
    }

    fn principal(&self) -> Option<Principal> {
        self.read_state().principal.clone()
    }

    fn is_loading(&self) -> bool {
        self.read_state().loading
    }

    fn phase(&self) -> LoginPhase {
        self.read_state().phase
    }

    fn resolved_tenant(&self) -> Option<TenantSlug> {
        self.service.resolved_tenant()
    }

    async fn login(&self, credentials: Credentials) -> Result<Principal> {
        self.write_state().phase = LoginPhase::Validating;
        let result = self.service.login(&credentials).await;
        let mut state = self.write_state();
        match &result {
            Ok(principal) => {
                state.principal = Some(principal.clone());
                state.phase = LoginPhase::Authenticated;
            }
            Err(err) if err.is_login_failure() => {
                tracing::info!(area = %self.service.area(), error = %err, "login rejected");
                state.phase = LoginPhase::Rejected;
            }
            Err(err) => {
                tracing::warn!(area = %self.service.area(), error = %err, "login failed");
                state.phase = LoginPhase::Rejected;
            }
        }
        result
    }

    fn logout(&self) {
        self.service.logout();
        {
            let mut state = self.write_state();
            state.principal = None;
            state.phase = LoginPhase::Idle;
        }
        let hooks = self.logout_hooks.lock().unwrap_or_else(PoisonError::into_inner);
        for hook in hooks.iter() {
            hook();
        }
    }
}

/// Read-only view handed to CRUD pages.
#[derive(Debug, Clone)]
pub struct PageContext {
    principal: Principal,
    tenant_slug: Option<TenantSlug>,
    permissions: PermissionSet,
}

impl PageContext {
    /// Builds the view from a signed-in principal.
    pub fn new(principal: Principal, tenant_slug: Option<TenantSlug>) -> Self {
        let permissions = principal.permissions();
        Self {
            principal,
            tenant_slug,
            permissions,
        }
    }

    /// Signed-in principal.
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Tenant of the current host, `None` in the platform area.
    pub fn tenant_slug(&self) -> Option<&TenantSlug> {
        self.tenant_slug.as_ref()
    }

    /// Shorthand for [`Principal::has_permission`].
    pub fn has_permission(&self, permission: &Permission) -> bool {
        self.permissions.allows(permission)
    }
}

/// The platform and tenant contexts mounted at the application root.
#[derive(Clone)]
pub struct AuthProviders {
    config: Arc<GateConfig>,
    platform: Option<Arc<dyn AuthHandle>>,
    tenant: Option<Arc<dyn AuthHandle>>,
}

impl fmt::Debug for AuthProviders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthProviders")
            .field("platform", &self.platform.is_some())
            .field("tenant", &self.tenant.is_some())
            .finish()
    }
}

impl AuthProviders {
    /// Creates an empty provider set.
    pub fn new(config: Arc<GateConfig>) -> Self {
        Self {
            config,
            platform: None,
            tenant: None,
        }
    }

    /// Mounts `handle` for its area, replacing any previous one.
    pub fn provide(mut self, handle: Arc<dyn AuthHandle>) -> Self {
        match handle.area() {
            Area::Platform => self.platform = Some(handle),
            Area::Tenant => self.tenant = Some(handle),
        }
        self
    }

    /// Builds and initializes both contexts over one shared session store.
    pub fn mount<D>(config: Arc<GateConfig>, session: Arc<SessionStore>, directory: D) -> Self
    where
        D: UserDirectory + Clone + 'static,
    {
        let mut providers = Self::new(config.clone());
        for area in [Area::Platform, Area::Tenant] {
            let service = AuthService::new(area, directory.clone(), session.clone(), config.clone());
            let context: Arc<dyn AuthHandle> = Arc::new(AuthContext::new(service));
            context.init();
            providers = providers.provide(context);
        }
        providers
    }

    /// Shared configuration.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Platform context; fails when it was not provided.
    pub fn platform(&self) -> Result<&Arc<dyn AuthHandle>> {
        self.for_area(Area::Platform)
    }

    /// Tenant context; fails when it was not provided.
    pub fn tenant(&self) -> Result<&Arc<dyn AuthHandle>> {
        self.for_area(Area::Tenant)
    }

    /// Context for `area`; fails when it was not provided.
    pub fn for_area(&self, area: Area) -> Result<&Arc<dyn AuthHandle>> {
        let handle = match area {
            Area::Platform => self.platform.as_ref(),
            Area::Tenant => self.tenant.as_ref(),
        };
        handle.ok_or(Error::ContextNotProvided { area })
    }

    /// Page view for `area`, `Ok(None)` when signed out.
    pub fn page_context(&self, area: Area) -> Result<Option<PageContext>> {
        let handle = self.for_area(area)?;
        let tenant = match area {
            Area::Platform => None,
            Area::Tenant => handle.resolved_tenant(),
        };
        Ok(handle
            .principal()
            .map(|principal| PageContext::new(principal, tenant)))
    }

    /// Disposes every mounted context.
    pub fn dispose(&self) {
        for handle in [&self.platform, &self.tenant].into_iter().flatten() {
            handle.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::handoff::{Base64JsonCodec, HandoffCodec};
    use crate::location::{Location, MemoryLocation};
    use crate::role::Role;
    use crate::router::{Dispatch, RouteKind, Router};
    use crate::storage::{BackendChain, MemoryBackend, UnavailableBackend};
    use crate::types::{Email, PrincipalId, TenantId};
    use futures::executor::block_on;
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone)]
    struct FixedDirectory(Vec<Principal>);

    #[async_trait]
    impl UserDirectory for FixedDirectory {
        async fn verify(
            &self,
            email: &Email,
            _password: &str,
        ) -> std::result::Result<Option<Principal>, StoreError> {
            Ok(self
                .0
                .iter()
                .find(|principal| principal.email().key() == email.key())
                .cloned())
        }
    }

    fn tenant_admin() -> Principal {
        Principal::tenant(
            PrincipalId::new(1),
            Email::try_from("admin@empresaA.com").unwrap(),
            "Company A Admin",
            Role::Admin,
            TenantId::new(1),
            TenantSlug::try_from("empresaa").unwrap(),
        )
        .unwrap()
    }

    fn context_at(area: Area, url: &str) -> (AuthContext<FixedDirectory>, Arc<SessionStore>) {
        let config = Arc::new(GateConfig::default());
        let location = Arc::new(MemoryLocation::parse(url).unwrap());
        let session = Arc::new(SessionStore::new(
            BackendChain::session_then_persistent(
                MemoryBackend::new("session"),
                MemoryBackend::new("local"),
            ),
            location,
            &config,
        ));
        let service = AuthService::new(
            area,
            FixedDirectory(vec![tenant_admin()]),
            session.clone(),
            config,
        );
        (AuthContext::new(service), session)
    }

    #[test]
    fn context_should_be_loading_until_init() {
        let (context, session) = context_at(Area::Tenant, "http://empresaa.localhost/s");
        session.save(&tenant_admin()).unwrap();

        assert!(context.is_loading());
        assert!(!context.is_authenticated());
        context.init();
        assert!(!context.is_loading());
        assert_eq!(context.principal(), Some(tenant_admin()));
        assert_eq!(context.phase(), LoginPhase::Authenticated);
    }

    #[test]
    fn init_should_consume_handoff_token() {
        let token = Base64JsonCodec.encode(&tenant_admin()).unwrap();
        let (context, session) =
            context_at(Area::Tenant, &format!("http://empresaa.localhost/s?auth={token}"));
        context.init();

        assert_eq!(context.principal(), Some(tenant_admin()));
        assert_eq!(session.location().current().query(), None);
    }

    #[test]
    fn failed_login_should_surface_error_and_keep_state() {
        let (context, _) = context_at(Area::Tenant, "http://empresaa.localhost/s/login");
        context.init();

        let result = block_on(context.login(Credentials::new("ghost@empresaA.com", "x")));
        assert!(matches!(result, Err(Error::InvalidCredentials)));
        assert_eq!(context.phase(), LoginPhase::Rejected);
        assert!(!context.is_authenticated());
        assert!(!context.is_loading());

        block_on(context.login(Credentials::new("admin@empresaA.com", "x"))).unwrap();
        assert_eq!(context.phase(), LoginPhase::Authenticated);
    }

    #[test]
    fn rejected_phase_should_clear_on_logout() {
        let (context, _) = context_at(Area::Tenant, "http://empresaa.localhost/s/login");
        context.init();

        let _ = block_on(context.login(Credentials::new("ghost@empresaA.com", "x")));
        assert_eq!(context.phase(), LoginPhase::Rejected);
        context.logout();
        assert_eq!(context.phase(), LoginPhase::Idle);
    }

    #[test]
    fn login_then_logout_should_toggle_authentication() {
        let (context, session) = context_at(Area::Tenant, "http://empresaa.localhost/s/login");
        context.init();
        let hook_calls = Arc::new(AtomicUsize::new(0));
        let counter = hook_calls.clone();
        context.on_logout(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        block_on(context.login(Credentials::new("admin@empresaA.com", "x"))).unwrap();
        assert!(context.is_authenticated());
        assert!(context.has_permission(&Permission::try_from("users:manage").unwrap()));

        context.logout();
        assert!(!context.is_authenticated());
        assert_eq!(context.phase(), LoginPhase::Idle);
        assert_eq!(session.load(), None);
        assert_eq!(hook_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dispose_should_reset_memory_but_keep_storage() {
        let (context, session) = context_at(Area::Tenant, "http://empresaa.localhost/s");
        session.save(&tenant_admin()).unwrap();
        context.init();
        context.dispose();

        assert!(context.is_loading());
        assert_eq!(context.principal(), None);
        context.init();
        assert_eq!(context.principal(), Some(tenant_admin()));
    }

    #[test]
    fn mount_should_share_handoff_principal_without_storage() {
        let config = Arc::new(GateConfig::default());
        let token = Base64JsonCodec.encode(&tenant_admin()).unwrap();
        let location = Arc::new(
            MemoryLocation::parse(&format!("http://empresaa.localhost/s?auth={token}")).unwrap(),
        );
        let session = Arc::new(SessionStore::new(
            BackendChain::session_then_persistent(UnavailableBackend, UnavailableBackend),
            location,
            &config,
        ));
        let providers = AuthProviders::mount(
            config.clone(),
            session,
            FixedDirectory(vec![tenant_admin()]),
        );

        assert_eq!(providers.platform().unwrap().principal(), Some(tenant_admin()));
        assert_eq!(providers.tenant().unwrap().principal(), Some(tenant_admin()));
        assert!(matches!(
            Router::new(config).dispatch("/s", &providers).unwrap(),
            Dispatch::Render(route) if route.kind == RouteKind::Page
        ));
    }

    #[test]
    fn missing_provider_should_fail_loudly() {
        let providers = AuthProviders::new(Arc::new(GateConfig::default()));
        assert!(matches!(
            providers.platform(),
            Err(Error::ContextNotProvided {
                area: Area::Platform
            })
        ));
        assert!(matches!(
            providers.page_context(Area::Tenant),
            Err(Error::ContextNotProvided { area: Area::Tenant })
        ));
    }

    #[test]
    fn page_context_should_expose_tenant_and_permissions() {
        let (context, session) = context_at(Area::Tenant, "http://empresaa.localhost/s");
        session.save(&tenant_admin()).unwrap();
        context.init();
        let providers = AuthProviders::new(Arc::new(GateConfig::default())).provide(Arc::new(context));

        let page = providers.page_context(Area::Tenant).unwrap().unwrap();
        assert_eq!(page.tenant_slug().map(|slug| slug.as_str()), Some("empresaa"));
        assert!(page.has_permission(&Permission::try_from("events:validate").unwrap()));
        assert!(!page.has_permission(&Permission::try_from("companies:manage").unwrap()));
        assert_eq!(page.principal().role(), Role::Admin);
    }
}
