use serde::Deserialize;

use crate::role::Area;

/// Paths, storage keys and host rules shared by every component.
///
/// Defaults reproduce the production deployment; use the `with_*` methods
/// to override individual values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Host label marking a development host.
    pub dev_suffix: String,
    /// Path prefix of the platform area.
    pub platform_prefix: String,
    /// Path prefix of the tenant area.
    pub tenant_prefix: String,
    /// Login page of the platform area.
    pub platform_login: String,
    /// Login page of the tenant area.
    pub tenant_login: String,
    /// Landing page of the platform area.
    pub platform_home: String,
    /// Landing page of the tenant area.
    pub tenant_home: String,
    /// Shared redirect target for under-privileged navigation.
    pub unauthorized: String,
    /// Storage key holding the serialized principal.
    pub session_key: String,
    /// Query parameter carrying the hand-off token.
    pub handoff_param: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            dev_suffix: "localhost".to_string(),
            platform_prefix: "/a".to_string(),
            tenant_prefix: "/s".to_string(),
            platform_login: "/a/login".to_string(),
            tenant_login: "/s/login".to_string(),
            platform_home: "/a".to_string(),
            tenant_home: "/s".to_string(),
            unauthorized: "/unauthorized".to_string(),
            session_key: "user".to_string(),
            handoff_param: "auth".to_string(),
        }
    }
}

impl GateConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the development host label.
    pub fn with_dev_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.dev_suffix = suffix.into();
        self
    }

    /// Sets the storage key holding the principal.
    pub fn with_session_key(mut self, key: impl Into<String>) -> Self {
        self.session_key = key.into();
        self
    }

    /// Sets the hand-off query parameter.
    pub fn with_handoff_param(mut self, param: impl Into<String>) -> Self {
        self.handoff_param = param.into();
        self
    }

    /// Sets the unauthorized redirect target.
    pub fn with_unauthorized(mut self, path: impl Into<String>) -> Self {
        self.unauthorized = path.into();
        self
    }

    /// Login path of `area`.
    pub fn login_path(&self, area: Area) -> &str {
        match area {
            Area::Platform => &self.platform_login,
            Area::Tenant => &self.tenant_login,
        }
    }

    /// Home path of `area`.
    pub fn home_path(&self, area: Area) -> &str {
        match area {
            Area::Platform => &self.platform_home,
            Area::Tenant => &self.tenant_home,
        }
    }

    /// Path prefix of `area`.
    pub fn prefix(&self, area: Area) -> &str {
        match area {
            Area::Platform => &self.platform_prefix,
            Area::Tenant => &self.tenant_prefix,
        }
    }

    /// Classifies a path by area prefix, matching whole segments only.
    pub fn area_of(&self, path: &str) -> Option<Area> {
        [Area::Platform, Area::Tenant]
            .into_iter()
            .find(|area| path_has_prefix(path, self.prefix(*area)))
    }
}

/// Returns whether `path` is `prefix` or lies below it.
pub(crate) fn path_has_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return path.starts_with('/');
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
