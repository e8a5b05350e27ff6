//! Tenant resolution, dual-area authentication and role-gated routing for a
//! multi-tenant fleet console.
//!
//! Two audiences share one deployment: a platform area under `/a` for
//! superadmins and a tenant area under `/s` for company staff, with the
//! tenant picked from the first host label (`empresaa.example.com`).
//! [`TenantResolver`] maps hosts to tenants, [`SessionStore`] owns the single
//! persisted principal, [`AuthService`] validates logins per area,
//! [`AuthContext`] holds the mounted state and [`Guard`]/[`Router`] decide
//! what a navigation renders.
//!
//! # Examples
//!
//! Mounting both contexts over the demo directory (enable `memory-store`):
//! ```no_run
//! # #[cfg(feature = "memory-store")]
//! # {
//! use std::sync::Arc;
//! use fleet_gate::{
//!     AuthProviders, BackendChain, Dispatch, GateConfig, MemoryBackend, MemoryDirectory,
//!     MemoryLocation, Router, SessionStore,
//! };
//!
//! let config = Arc::new(GateConfig::default());
//! let location = Arc::new(MemoryLocation::parse("http://empresaa.localhost/s/dashboard").unwrap());
//! let session = Arc::new(SessionStore::new(
//!     BackendChain::session_then_persistent(MemoryBackend::new("session"), MemoryBackend::new("local")),
//!     location.clone(),
//!     &config,
//! ));
//! let providers = AuthProviders::mount(config.clone(), session, MemoryDirectory::demo().unwrap());
//! let router = Router::new(config);
//! let dispatch = router.navigate(location.as_ref(), &providers).unwrap();
//! assert!(matches!(dispatch, Dispatch::Render(_)));
//! # }
//! ```
//!
//! Building the hand-off redirect after a platform-host login:
//! ```no_run
//! use fleet_gate::{Base64JsonCodec, GateConfig, HandoffTarget, Principal};
//! # fn demo(principal: &Principal) -> fleet_gate::Result<()> {
//! let here = url::Url::parse("http://localhost:5173/login").unwrap();
//! let target = HandoffTarget::from_url(&here)?;
//! let redirect = target.url_for(principal, &Base64JsonCodec, &GateConfig::default())?;
//! # let _ = redirect;
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]

mod config;
mod context;
mod directory;
mod error;
mod guard;
mod handoff;
mod location;
mod permission;
mod principal;
mod resolver;
mod role;
mod router;
mod service;
mod session;
mod storage;
mod tenant;
mod types;

#[cfg(feature = "memory-store")]
mod memory_directory;

#[cfg(feature = "axum")]
pub mod axum;

pub use crate::config::GateConfig;
pub use crate::context::{AuthContext, AuthHandle, AuthProviders, LoginPhase, PageContext};
pub use crate::directory::{Credentials, UserDirectory};
pub use crate::error::{Error, Result, StoreError};
pub use crate::guard::{Guard, GuardOutcome, Redirect};
pub use crate::handoff::{Base64JsonCodec, HandoffCodec, HandoffTarget};
pub use crate::location::{Location, MemoryLocation};
pub use crate::permission::{Permission, PermissionSet, role_permissions};
pub use crate::principal::{Principal, has_permission, has_role};
pub use crate::resolver::TenantResolver;
pub use crate::role::{Area, Role, RoleSet};
pub use crate::router::{Dispatch, Route, RouteKind, Router};
pub use crate::service::{AuthService, check_scope};
pub use crate::session::SessionStore;
pub use crate::storage::{BackendChain, MemoryBackend, StorageBackend, UnavailableBackend};
pub use crate::tenant::{Color, Tenant, TenantRegistry, TenantScope, ThemeColors};
pub use crate::types::{Email, PrincipalId, TenantId, TenantSlug};

#[cfg(feature = "handoff-jwt")]
pub use crate::handoff::JwtHandoffCodec;

#[cfg(feature = "memory-store")]
pub use crate::memory_directory::MemoryDirectory;
