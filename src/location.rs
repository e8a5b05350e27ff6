use std::fmt;
use std::sync::{PoisonError, RwLock};

use url::Url;

use crate::error::{Error, Result};

/// The current page URL and its history entry.
///
/// Mirrors the subset of `window.location` / `window.history` the session
/// layer needs: read the URL, and rewrite it in place without a navigation.
pub trait Location: Send + Sync {
    /// Returns the current URL.
    fn current(&self) -> Url;

    /// Replaces the current history entry with `url` without reloading.
    fn replace(&self, url: Url);

    /// Pushes a new history entry for `url`.
    fn push(&self, url: Url);

    /// Host name without port.
    fn hostname(&self) -> String {
        self.current().host_str().unwrap_or_default().to_string()
    }

    /// Path component.
    fn pathname(&self) -> String {
        self.current().path().to_string()
    }
}

/// In-process [`Location`] with an explicit history stack.
pub struct MemoryLocation {
    state: RwLock<History>,
}

#[derive(Debug)]
struct History {
    current: Url,
    entries: usize,
}

impl MemoryLocation {
    /// Starts at `url` with a single history entry.
    pub fn new(url: Url) -> Self {
        Self {
            state: RwLock::new(History {
                current: url,
                entries: 1,
            }),
        }
    }

    /// Parses `url` and starts there.
    pub fn parse(url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|err| Error::InvalidRoute(format!("url {url:?}: {err}")))?;
        Ok(Self::new(url))
    }

    /// Number of history entries.
    pub fn history_len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
    }

    /// Navigates to `path` on the current origin, pushing a history entry.
    pub fn navigate(&self, path: &str) -> Result<()> {
        let url = self
            .current()
            .join(path)
            .map_err(|err| Error::InvalidRoute(format!("path {path:?}: {err}")))?;
        self.push(url);
        Ok(())
    }
}

impl fmt::Debug for MemoryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryLocation")
            .field("current", &self.current().as_str())
            .field("history_len", &self.history_len())
            .finish()
    }
}

impl Location for MemoryLocation {
    fn current(&self) -> Url {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        guard.current.clone()
    }

    fn replace(&self, url: Url) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        guard.current = url;
    }

    fn push(&self, url: Url) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        guard.current = url;
        guard.entries += 1;
    }
}

/// Returns `url` without query parameter `param`, keeping every other pair.
pub(crate) fn without_query_param(url: &Url, param: &str) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != param)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    let mut stripped = url.clone();
    if kept.is_empty() {
        stripped.set_query(None);
    } else {
        stripped.query_pairs_mut().clear().extend_pairs(kept);
    }
    stripped
}

/// Returns the value of query parameter `param`, if present.
pub(crate) fn query_param(url: &Url, param: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == param)
        .map(|(_, value)| value.into_owned())
}
