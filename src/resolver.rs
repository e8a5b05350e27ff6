//! Host name to tenant resolution.

use std::net::IpAddr;

use crate::config::GateConfig;
use crate::types::TenantSlug;

/// Derives the tenant slug from a host name.
///
/// Resolution is a pure function of the host: path and query are never
/// consulted. Anything that does not yield a valid slug resolves to `None`,
/// which callers treat as the platform context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantResolver {
    dev_labels: Vec<String>,
}

impl Default for TenantResolver {
    fn default() -> Self {
        Self::new("localhost")
    }
}

impl TenantResolver {
    /// Creates a resolver treating hosts containing `dev_suffix` as development hosts.
    pub fn new(dev_suffix: impl AsRef<str>) -> Self {
        let dev_labels = dev_suffix
            .as_ref()
            .trim_matches('.')
            .split('.')
            .filter(|label| !label.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();
        Self { dev_labels }
    }

    /// Creates a resolver from shared configuration.
    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(&config.dev_suffix)
    }

    /// Resolves a bare host name (no port).
    pub fn resolve(&self, hostname: &str) -> Option<TenantSlug> {
        let host = hostname.trim().trim_end_matches('.').to_ascii_lowercase();
        if host.is_empty() || host.parse::<IpAddr>().is_ok() {
            return None;
        }
        let labels: Vec<&str> = host.split('.').collect();
        let first = *labels.first()?;

        let candidate = if self.is_dev_host(&labels) {
            let is_suffix_itself = self.dev_labels.first().is_some_and(|dev| dev == first);
            (labels.len() > 1 && !is_suffix_itself).then_some(first)
        } else {
            (labels.len() > 2).then_some(first)
        }?;

        TenantSlug::new(candidate).ok()
    }

    /// Resolves an HTTP authority such as `empresaa.localhost:5173`.
    pub fn resolve_authority(&self, authority: &str) -> Option<TenantSlug> {
        self.resolve(strip_port(authority))
    }

    fn is_dev_host(&self, labels: &[&str]) -> bool {
        if self.dev_labels.is_empty() {
            return false;
        }
        labels
            .windows(self.dev_labels.len())
            .any(|window| window.iter().zip(&self.dev_labels).all(|(a, b)| *a == b.as_str()))
    }
}

fn strip_port(authority: &str) -> &str {
    let authority = authority.trim();
    if authority.starts_with('[') {
        // Bracketed IPv6 literal, never a tenant host.
        return authority;
    }
    match authority.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|ch| ch.is_ascii_digit()) => host,
        _ => authority,
    }
}
