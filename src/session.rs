use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::GateConfig;
use crate::error::{Error, Result};
use crate::handoff::{Base64JsonCodec, HandoffCodec};
use crate::location::{Location, query_param, without_query_param};
use crate::principal::Principal;
use crate::storage::BackendChain;

/// Owner of the single persisted principal slot.
///
/// Besides plain storage, the first [`SessionStore::load`] of a process
/// consumes a hand-off token from the current URL. The token is stripped
/// from the URL in place whether or not it decodes.
///
/// The last principal saved or handed off is also held in memory. When no
/// backend can be read, [`load`](SessionStore::load) answers from that copy,
/// so every reader in the process agrees on the principal even if no backend
/// accepted the write. [`clear`](SessionStore::clear) drops it.
///
/// Several browser tabs share the persistent backend; the last
/// [`save`](SessionStore::save) or [`clear`](SessionStore::clear) wins.
pub struct SessionStore {
    backends: BackendChain,
    location: Arc<dyn Location>,
    codec: Arc<dyn HandoffCodec>,
    session_key: String,
    handoff_param: String,
    handoff_checked: AtomicBool,
    held: RwLock<Option<Principal>>,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("backends", &self.backends)
            .field("session_key", &self.session_key)
            .field("handoff_param", &self.handoff_param)
            .field("handoff_checked", &self.handoff_checked.load(Ordering::Acquire))
            .finish()
    }
}

impl SessionStore {
    /// Creates a store using the unsigned base64 hand-off codec.
    pub fn new(backends: BackendChain, location: Arc<dyn Location>, config: &GateConfig) -> Self {
        Self {
            backends,
            location,
            codec: Arc::new(Base64JsonCodec),
            session_key: config.session_key.clone(),
            handoff_param: config.handoff_param.clone(),
            handoff_checked: AtomicBool::new(false),
            held: RwLock::new(None),
        }
    }

    /// Replaces the hand-off codec.
    pub fn with_codec(mut self, codec: Arc<dyn HandoffCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Location this store reads hand-off tokens from.
    pub fn location(&self) -> &Arc<dyn Location> {
        &self.location
    }

    /// Codec used for hand-off tokens.
    pub fn codec(&self) -> &dyn HandoffCodec {
        self.codec.as_ref()
    }

    /// Persists `principal` to every backend.
    ///
    /// The principal is held in memory even when every backend fails.
    pub fn save(&self, principal: &Principal) -> Result<()> {
        *self.held.write().unwrap_or_else(PoisonError::into_inner) = Some(principal.clone());
        let json = serde_json::to_string(principal)
            .map_err(|err| Error::StorageUnavailable(format!("serialize principal: {err}")))?;
        self.backends.write_all(&self.session_key, &json)
    }

    /// Returns the active principal, or `None` when logged out.
    ///
    /// Never fails: malformed tokens, malformed stored values and unavailable
    /// storage all degrade to `None`.
    pub fn load(&self) -> Option<Principal> {
        if !self.handoff_checked.swap(true, Ordering::AcqRel)
            && let Some(principal) = self.consume_handoff()
        {
            return Some(principal);
        }
        match self.read_persisted() {
            Ok(principal) => principal,
            Err(err) => {
                tracing::warn!(error = %err, "session storage unavailable, using in-memory session");
                self.held.read().unwrap_or_else(PoisonError::into_inner).clone()
            }
        }
    }

    /// Removes the principal from memory and from every backend.
    pub fn clear(&self) -> Result<()> {
        *self.held.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.backends.remove_all(&self.session_key)
    }

    fn consume_handoff(&self) -> Option<Principal> {
        let url = self.location.current();
        let token = query_param(&url, &self.handoff_param)?;
        self.location.replace(without_query_param(&url, &self.handoff_param));

        match self.codec.decode(&token) {
            Ok(principal) => {
                if let Err(err) = self.save(&principal) {
                    tracing::warn!(error = %err, "hand-off principal could not be persisted");
                }
                tracing::info!(
                    principal = %principal.id(),
                    role = %principal.role(),
                    tenant = ?principal.tenant_slug().map(|slug| slug.as_str()),
                    "session restored from hand-off token"
                );
                Some(principal)
            }
            Err(err) => {
                tracing::warn!(error = %err, "ignoring hand-off token");
                None
            }
        }
    }

    fn read_persisted(&self) -> Result<Option<Principal>> {
        self.backends.read_in_order_with(&self.session_key, |raw| {
            serde_json::from_str::<Principal>(raw)
                .map_err(|err| tracing::warn!(error = %err, "discarding malformed stored session"))
                .ok()
        })
    }
}
