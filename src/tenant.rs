use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::resolver::TenantResolver;
use crate::types::TenantSlug;

/// A CSS hex color (`#rgb` or `#rrggbb`), stored lower-case.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(String);

impl Color {
    /// Parses a hex color.
    pub fn new(value: impl AsRef<str>) -> Result<Self> {
        let value = value.as_ref().trim().to_ascii_lowercase();
        let digits = value
            .strip_prefix('#')
            .ok_or_else(|| Error::InvalidId(format!("color {value:?} must start with '#'")))?;
        let valid_len = matches!(digits.len(), 3 | 6);
        if !valid_len || !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return Err(Error::InvalidId(format!("color {value:?} is not a hex color")));
        }
        Ok(Self(value))
    }

    /// Lowercase `#rrggbb` or `#rgb` form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Color {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.0
    }
}

/// The five colors a tenant theme must define.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeColors {
    /// Primary brand color.
    pub primary: Color,
    /// Secondary brand color.
    pub secondary: Color,
    /// Sidebar background.
    pub sidebar_background: Color,
    /// Sidebar text.
    pub sidebar_text: Color,
    /// Accent for highlights.
    pub accent: Color,
}

impl ThemeColors {
    /// Builds a theme from five hex strings.
    pub fn parse(
        primary: &str,
        secondary: &str,
        sidebar_background: &str,
        sidebar_text: &str,
        accent: &str,
    ) -> Result<Self> {
        Ok(Self {
            primary: Color::new(primary)?,
            secondary: Color::new(secondary)?,
            sidebar_background: Color::new(sidebar_background)?,
            sidebar_text: Color::new(sidebar_text)?,
            accent: Color::new(accent)?,
        })
    }

    /// CSS custom properties applied to the document root.
    pub fn css_variables(&self) -> [(&'static str, &str); 5] {
        [
            ("--primary-color", self.primary.as_str()),
            ("--secondary-color", self.secondary.as_str()),
            ("--sidebar-bg", self.sidebar_background.as_str()),
            ("--sidebar-text", self.sidebar_text.as_str()),
            ("--accent-color", self.accent.as_str()),
        ]
    }
}

/// Company record as shown by the tenant area.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    /// Subdomain slug.
    pub slug: TenantSlug,
    /// Company name shown in the header.
    pub display_name: String,
    /// Console theme.
    pub theme: ThemeColors,
}

/// Slug-indexed tenant catalog with a fallback theme.
///
/// Auth never consults the registry: a slug is valid as soon as the host
/// yields one. Shells use it to theme the console for
/// [`AuthService::resolved_tenant`](crate::AuthService::resolved_tenant).
#[derive(Debug, Clone)]
pub struct TenantRegistry {
    tenants: HashMap<TenantSlug, Tenant>,
    default_theme: ThemeColors,
}

impl TenantRegistry {
    /// Creates an empty registry.
    pub fn new(default_theme: ThemeColors) -> Self {
        Self {
            tenants: HashMap::new(),
            default_theme,
        }
    }

    /// Adds or replaces a tenant.
    pub fn insert(&mut self, tenant: Tenant) {
        self.tenants.insert(tenant.slug.clone(), tenant);
    }

    /// Tenant registered for `slug`.
    pub fn get(&self, slug: &TenantSlug) -> Option<&Tenant> {
        self.tenants.get(slug)
    }

    /// Theme for `slug`, or the default theme for unknown tenants.
    pub fn theme_for(&self, slug: &TenantSlug) -> &ThemeColors {
        self.tenants
            .get(slug)
            .map_or(&self.default_theme, |tenant| &tenant.theme)
    }

    /// Theme used for unknown tenants.
    pub fn default_theme(&self) -> &ThemeColors {
        &self.default_theme
    }

    /// Registry with the three reference companies.
    #[cfg(feature = "memory-store")]
    pub fn demo() -> Result<Self> {
        let navy = ThemeColors::parse("#1E2C56", "#3b82f6", "#1E2C56", "#ffffff", "#10b981")?;
        let green = ThemeColors::parse("#10b981", "#059669", "#064e3b", "#d1fae5", "#f59e0b")?;
        let red = ThemeColors::parse("#ef4444", "#dc2626", "#7f1d1d", "#fee2e2", "#f59e0b")?;

        let mut registry = Self::new(navy.clone());
        for (slug, name, theme) in [
            ("empresaa", "Company A", navy),
            ("empresab", "Company B", green),
            ("clientec", "Client C", red),
        ] {
            registry.insert(Tenant {
                slug: TenantSlug::new(slug)?,
                display_name: name.to_string(),
                theme,
            });
        }
        Ok(registry)
    }
}

/// Per-page-load tenant resolution cache.
///
/// The slug is resolved once for a host and reused until a different host
/// is presented.
#[derive(Debug)]
pub struct TenantScope {
    resolver: TenantResolver,
    cached: RwLock<Option<(String, Option<TenantSlug>)>>,
}

impl TenantScope {
    /// Empty cache over `resolver`.
    pub fn new(resolver: TenantResolver) -> Self {
        Self {
            resolver,
            cached: RwLock::new(None),
        }
    }

    /// Returns the tenant for `hostname`, resolving only on host change.
    pub fn resolve(&self, hostname: &str) -> Option<TenantSlug> {
        {
            let guard = self.cached.read().unwrap_or_else(PoisonError::into_inner);
            if let Some((host, slug)) = guard.as_ref()
                && host == hostname
            {
                return slug.clone();
            }
        }
        let slug = self.resolver.resolve(hostname);
        tracing::debug!(host = hostname, tenant = ?slug, "resolved tenant for host");
        let mut guard = self.cached.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some((hostname.to_string(), slug.clone()));
        slug
    }

    /// Host the cached resolution belongs to.
    pub fn cached_host(&self) -> Option<String> {
        let guard = self.cached.read().unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().map(|(host, _)| host.clone())
    }
}
