use std::sync::Arc;

use crate::config::{GateConfig, path_has_prefix};
use crate::context::{AuthHandle, AuthProviders};
use crate::error::{Error, Result};
use crate::guard::{Guard, GuardOutcome, Redirect};
use crate::location::Location;
use crate::role::{Area, RoleSet};

/// Redirect chains longer than this are cut short.
const MAX_HOPS: usize = 4;

/// What a rendered route shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// Area login form.
    Login,
    /// Guarded area page.
    Page,
    /// Shared unauthorized page.
    Unauthorized,
}

/// A route that passed its guard and should render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// `None` for the shared unauthorized page.
    pub area: Option<Area>,
    /// Path that was dispatched.
    pub path: String,
    /// What the path renders.
    pub kind: RouteKind,
}

/// Result of dispatching one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Show the route.
    Render(Route),
    /// Auth state is still restoring.
    Loading,
    /// Send the user elsewhere.
    Redirect(Redirect),
}

#[derive(Debug, Clone)]
struct Restriction {
    prefix: String,
    guard: Guard,
}

/// Maps paths to areas and wraps each area in its guard.
#[derive(Debug, Clone)]
pub struct Router {
    config: Arc<GateConfig>,
    platform: Guard,
    tenant: Guard,
    restrictions: Vec<Restriction>,
}

impl Router {
    /// Router with no role restrictions.
    pub fn new(config: Arc<GateConfig>) -> Self {
        Self {
            platform: Guard::platform(&config),
            tenant: Guard::tenant(&config),
            restrictions: Vec::new(),
            config,
        }
    }

    /// Restricts everything under `prefix` to `roles`.
    ///
    /// `prefix` must lie inside one of the two areas. When restrictions
    /// nest, the longest matching prefix applies.
    pub fn restrict(mut self, prefix: impl Into<String>, roles: RoleSet) -> Result<Self> {
        let prefix = prefix.into();
        let area = self.config.area_of(&prefix).ok_or_else(|| {
            Error::InvalidRoute(format!("restricted prefix {prefix:?} is outside both areas"))
        })?;
        let guard = Guard::role_scoped(&self.config, area, roles);
        self.restrictions.push(Restriction { prefix, guard });
        self.restrictions
            .sort_by_key(|restriction| std::cmp::Reverse(restriction.prefix.len()));
        Ok(self)
    }

    /// Shared configuration.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Guard protecting `path`, or `None` for paths outside both areas.
    pub fn guard_for(&self, path: &str) -> Option<&Guard> {
        let area = self.config.area_of(path)?;
        let restricted = self
            .restrictions
            .iter()
            .find(|restriction| path_has_prefix(path, &restriction.prefix))
            .map(|restriction| &restriction.guard);
        Some(restricted.unwrap_or(self.area_guard(area)))
    }

    fn area_guard(&self, area: Area) -> &Guard {
        match area {
            Area::Platform => &self.platform,
            Area::Tenant => &self.tenant,
        }
    }

    /// Decides what to do with `path`.
    ///
    /// Fails only when the area's context was not provided.
    pub fn dispatch(&self, path: &str, providers: &AuthProviders) -> Result<Dispatch> {
        let path = if path.is_empty() { "/" } else { path };
        if path_has_prefix(path, &self.config.unauthorized) {
            return Ok(Dispatch::Render(Route {
                area: None,
                path: path.to_string(),
                kind: RouteKind::Unauthorized,
            }));
        }
        let Some(area) = self.config.area_of(path) else {
            return Ok(Dispatch::Redirect(Redirect::replace(
                self.config.home_path(Area::Platform),
            )));
        };
        let handle = providers.for_area(area)?;

        let dispatch = if is_same_path(path, self.config.login_path(area)) {
            self.dispatch_login(area, path, handle.as_ref())
        } else {
            let guard = self.guard_for(path).unwrap_or(self.area_guard(area));
            match guard.evaluate(handle.as_ref()) {
                GuardOutcome::Loading => Dispatch::Loading,
                GuardOutcome::Redirect(redirect) => Dispatch::Redirect(redirect),
                GuardOutcome::Render => Dispatch::Render(Route {
                    area: Some(area),
                    path: path.to_string(),
                    kind: RouteKind::Page,
                }),
            }
        };
        tracing::debug!(path, area = %area, dispatch = ?dispatch, "route dispatched");
        Ok(dispatch)
    }

    fn dispatch_login(&self, area: Area, path: &str, handle: &dyn AuthHandle) -> Dispatch {
        match self.area_guard(area).evaluate(handle) {
            GuardOutcome::Loading => Dispatch::Loading,
            GuardOutcome::Render => {
                Dispatch::Redirect(Redirect::replace(self.config.home_path(area)))
            }
            GuardOutcome::Redirect(_) => Dispatch::Render(Route {
                area: Some(area),
                path: path.to_string(),
                kind: RouteKind::Login,
            }),
        }
    }

    /// Dispatches the current location, following redirects with
    /// history replacement until something renders.
    pub fn navigate(&self, location: &dyn Location, providers: &AuthProviders) -> Result<Dispatch> {
        let mut dispatch = self.dispatch(&location.pathname(), providers)?;
        for _ in 0..MAX_HOPS {
            let Dispatch::Redirect(redirect) = &dispatch else {
                return Ok(dispatch);
            };
            let target = location.current().join(&redirect.to).map_err(|err| {
                Error::InvalidRoute(format!("redirect target {:?}: {err}", redirect.to))
            })?;
            location.replace(target);
            dispatch = self.dispatch(&location.pathname(), providers)?;
        }
        tracing::warn!(dispatch = ?dispatch, "redirect chain did not settle");
        Ok(dispatch)
    }
}

fn is_same_path(path: &str, other: &str) -> bool {
    path.trim_end_matches('/') == other.trim_end_matches('/')
}
