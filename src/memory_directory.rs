use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::directory::UserDirectory;
use crate::error::{Result, StoreError};
use crate::principal::Principal;
use crate::role::Role;
use crate::types::{Email, PrincipalId, TenantId, TenantSlug};

/// In-memory user directory for tests and demos.
///
/// Accounts added without a password accept any password, matching the
/// mock backend the console ships with today.
#[derive(Debug, Default, Clone)]
pub struct MemoryDirectory {
    inner: Arc<RwLock<HashMap<String, Account>>>,
}

#[derive(Debug, Clone)]
struct Account {
    principal: Principal,
    password: Option<String>,
}

impl MemoryDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an account accepting any password.
    pub fn insert(&self, principal: Principal) {
        self.insert_account(principal, None);
    }

    /// Adds an account with a required password.
    pub fn insert_with_password(&self, principal: Principal, password: impl Into<String>) {
        self.insert_account(principal, Some(password.into()));
    }

    fn insert_account(&self, principal: Principal, password: Option<String>) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(principal.email().key(), Account { principal, password });
    }

    /// Number of accounts.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True when no accounts are loaded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Directory seeded with the reference accounts.
    pub fn demo() -> Result<Self> {
        let directory = Self::new();
        directory.insert(Principal::tenant(
            PrincipalId::new(1),
            Email::new("admin@empresaA.com")?,
            "Company A Admin",
            Role::Admin,
            TenantId::new(1),
            TenantSlug::new("empresaA")?,
        )?);
        directory.insert(Principal::tenant(
            PrincipalId::new(2),
            Email::new("admin@empresaB.com")?,
            "Company B Admin",
            Role::Admin,
            TenantId::new(2),
            TenantSlug::new("empresaB")?,
        )?);
        directory.insert(Principal::platform(
            PrincipalId::new(99),
            Email::new("superadmin@fuel.com")?,
            "Super Admin",
        ));
        Ok(directory)
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn verify(
        &self,
        email: &Email,
        password: &str,
    ) -> std::result::Result<Option<Principal>, StoreError> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(&email.key()).and_then(|account| {
            let accepted = account
                .password
                .as_deref()
                .is_none_or(|expected| expected == password);
            accepted.then(|| account.principal.clone())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn demo_directory_should_find_reference_accounts() {
        let directory = MemoryDirectory::demo().unwrap();
        assert_eq!(directory.len(), 3);

        let email = Email::try_from("admin@empresaA.com").unwrap();
        let principal = block_on(directory.verify(&email, "anything")).unwrap().unwrap();
        assert_eq!(principal.role(), Role::Admin);
        assert_eq!(principal.tenant_slug().unwrap().as_str(), "empresaa");
    }

    #[test]
    fn lookup_should_ignore_email_case() {
        let directory = MemoryDirectory::demo().unwrap();
        let email = Email::try_from("SUPERADMIN@fuel.com").unwrap();
        let principal = block_on(directory.verify(&email, "")).unwrap().unwrap();
        assert_eq!(principal.role(), Role::Superadmin);
    }

    #[test]
    fn password_should_be_checked_when_set() {
        let directory = MemoryDirectory::new();
        let principal = Principal::platform(
            PrincipalId::new(7),
            Email::try_from("ops@fuel.com").unwrap(),
            "Ops",
        );
        directory.insert_with_password(principal.clone(), "s3cret");
        let email = principal.email().clone();

        assert!(block_on(directory.verify(&email, "wrong")).unwrap().is_none());
        assert_eq!(
            block_on(directory.verify(&email, "s3cret")).unwrap(),
            Some(principal)
        );
    }

    #[test]
    fn unknown_email_should_return_none() {
        let directory = MemoryDirectory::demo().unwrap();
        let email = Email::try_from("nobody@fuel.com").unwrap();
        assert!(block_on(directory.verify(&email, "x")).unwrap().is_none());
    }
}
