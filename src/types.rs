use crate::error::{Error, Result};
use std::borrow::Borrow;
use std::fmt;

const MAX_LABEL_LEN: usize = 63;
const MAX_EMAIL_LEN: usize = 254;

fn validate_slug(value: &str, kind: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidId(format!("{kind} must not be empty")));
    }
    if trimmed.len() > MAX_LABEL_LEN {
        return Err(Error::InvalidId(format!(
            "{kind} length must be <= {MAX_LABEL_LEN}"
        )));
    }
    let lowered = trimmed.to_ascii_lowercase();
    if !lowered.chars().all(is_allowed_slug_char) {
        return Err(Error::InvalidId(format!(
            "{kind} contains invalid characters"
        )));
    }
    Ok(lowered)
}

fn is_allowed_slug_char(ch: char) -> bool {
    matches!(ch, 'a'..='z' | '0'..='9' | '-')
}

fn validate_email(value: &str, kind: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidId(format!("{kind} must not be empty")));
    }
    if trimmed.len() > MAX_EMAIL_LEN {
        return Err(Error::InvalidId(format!(
            "{kind} length must be <= {MAX_EMAIL_LEN}"
        )));
    }
    match trimmed.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
        _ => return Err(Error::InvalidId(format!("{kind} must contain '@'"))),
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(Error::InvalidId(format!("{kind} must not contain spaces")));
    }
    Ok(trimmed.to_string())
}

macro_rules! define_name_type {
    ($(#[$doc:meta])* $name:ident, $kind:expr, $validate:path) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a validated value.
            pub fn new(value: impl AsRef<str>) -> Result<Self> {
                $validate(value.as_ref(), $kind).map(Self)
            }

            /// Returns the underlying string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<&str> for $name {
            type Error = Error;

            fn try_from(value: &str) -> Result<Self> {
                Self::new(value)
            }
        }

        impl TryFrom<String> for $name {
            type Error = Error;

            fn try_from(value: String) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

define_name_type!(
    /// Canonical lower-case tenant identifier taken from a subdomain.
    ///
    /// Always matches `^[a-z0-9-]+$`; input is trimmed and lower-cased, so
    /// equality between two slugs is case-insensitive with respect to the
    /// original input.
    TenantSlug,
    "tenant slug",
    validate_slug
);
define_name_type!(
    /// Login email. Stored as entered; compare with [`Email::key`].
    Email,
    "email",
    validate_email
);

impl Email {
    /// Case-insensitive lookup key.
    pub fn key(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

macro_rules! define_numeric_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wraps a raw identifier.
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the raw identifier.
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

define_numeric_id!(
    /// Opaque principal identifier.
    PrincipalId
);
define_numeric_id!(
    /// Numeric tenant identifier.
    TenantId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_slug_should_lowercase_and_trim() {
        let slug = TenantSlug::try_from(" EmpresaA ").expect("slug");
        assert_eq!(slug.as_str(), "empresaa");
    }

    #[test]
    fn tenant_slug_should_reject_invalid_chars() {
        let err = TenantSlug::try_from("empresa_a").expect_err("must reject");
        assert!(err.to_string().contains("tenant slug"));
    }

    #[test]
    fn tenant_slug_should_reject_overlong_label() {
        let long = "a".repeat(64);
        assert!(TenantSlug::new(long).is_err());
    }

    #[test]
    fn tenant_slug_deserialize_should_normalize() {
        let slug: TenantSlug = serde_json::from_str("\"EmpresaB\"").expect("slug");
        assert_eq!(slug.as_str(), "empresab");
        assert!(serde_json::from_str::<TenantSlug>("\"bad slug\"").is_err());
    }

    #[test]
    fn email_should_require_at_sign() {
        assert!(Email::try_from("admin.example.com").is_err());
        assert!(Email::try_from("@example.com").is_err());
        assert!(Email::try_from("admin@").is_err());
    }

    #[test]
    fn email_key_should_be_case_insensitive() {
        let a = Email::try_from("Admin@EmpresaA.com").expect("email");
        let b = Email::try_from("admin@empresaa.com").expect("email");
        assert_ne!(a, b);
        assert_eq!(a.key(), b.key());
        assert_eq!(a.as_str(), "Admin@EmpresaA.com");
    }
}
