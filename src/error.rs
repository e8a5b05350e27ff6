use crate::role::{Area, Role};
use crate::types::TenantSlug;
use thiserror::Error;

/// Directory-layer error type.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
///
/// Only [`Error::InvalidCredentials`], [`Error::AreaMismatch`],
/// [`Error::TenantMismatch`] and [`Error::Directory`] ever reach a login form.
/// The remaining variants are recovered inside the crate and degrade to the
/// logged-out, platform-context state.
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown email or rejected password.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Principal belongs to the other area.
    #[error("{actual} account cannot sign in to the {expected} area")]
    AreaMismatch { expected: Area, actual: Role },
    /// Principal belongs to a different tenant than the resolved host.
    #[error("account belongs to tenant {actual:?}, resolved tenant is {expected:?}")]
    TenantMismatch {
        expected: Option<TenantSlug>,
        actual: Option<TenantSlug>,
    },
    /// Context accessed outside its provider.
    #[error("{area} auth context is not provided")]
    ContextNotProvided { area: Area },
    /// Hand-off token could not be decoded.
    #[error("malformed hand-off token: {0}")]
    MalformedHandoffToken(String),
    /// Durable storage could not be read or written.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    /// Invalid identifier input.
    #[error("invalid id: {0}")]
    InvalidId(String),
    /// Route path or URL that cannot be used for navigation.
    #[error("invalid route: {0}")]
    InvalidRoute(String),
    /// Invalid permission input.
    #[error("invalid permission: {0}")]
    InvalidPermission(String),
    /// Principal violates the role/tenant scoping rules.
    #[error("invalid principal: {0}")]
    InvalidPrincipal(String),
    /// User directory error wrapper.
    #[error("directory error: {0}")]
    Directory(#[source] StoreError),
}

impl From<StoreError> for Error {
    fn from(error: StoreError) -> Self {
        Self::Directory(error)
    }
}

impl Error {
    /// Returns whether the error is meant for the login form.
    pub fn is_login_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials
                | Self::AreaMismatch { .. }
                | Self::TenantMismatch { .. }
                | Self::Directory(_)
        )
    }
}
