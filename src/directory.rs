use async_trait::async_trait;
use serde::Deserialize;

use crate::error::StoreError;
use crate::principal::Principal;
use crate::types::Email;

/// Login form input.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    /// Email as typed into the form.
    pub email: String,
    /// Password as typed into the form.
    pub password: String,
}

impl Credentials {
    /// Bundles form input.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Backend contract for credential verification.
///
/// This is the only suspend point of a login attempt.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Returns the principal for `email` when `password` is accepted.
    ///
    /// `Ok(None)` means unknown email or rejected password; the two are not
    /// distinguished to the caller.
    async fn verify(
        &self,
        email: &Email,
        password: &str,
    ) -> std::result::Result<Option<Principal>, StoreError>;
}

#[async_trait]
impl<T> UserDirectory for std::sync::Arc<T>
where
    T: UserDirectory + ?Sized,
{
    async fn verify(
        &self,
        email: &Email,
        password: &str,
    ) -> std::result::Result<Option<Principal>, StoreError> {
        (**self).verify(email, password).await
    }
}
