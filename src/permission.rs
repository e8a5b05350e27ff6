use crate::error::{Error, Result};
use crate::role::Role;
use std::borrow::Borrow;
use std::fmt;

/// Permission token (`resource:action`).
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Permission(String);

impl Permission {
    /// Parses and validates a permission token.
    ///
    /// This trims whitespace and normalizes to lowercase.
    pub fn new(value: impl AsRef<str>) -> Result<Self> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidPermission(
                "permission must not be empty".to_string(),
            ));
        }
        let normalized = trimmed.to_ascii_lowercase();
        validate(&normalized)?;
        Ok(Self(normalized))
    }

    /// Creates a permission from a trusted static token without validation.
    pub(crate) fn from_static(value: &'static str) -> Self {
        Self(value.to_string())
    }

    /// Returns the underlying string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns whether this granted permission covers `required`.
    ///
    /// A granted `*` action covers every action of the same resource.
    pub fn covers(&self, required: &Permission) -> bool {
        let Some((g_res, g_act)) = split_permission(&self.0) else {
            return false;
        };
        let Some((r_res, r_act)) = split_permission(&required.0) else {
            return false;
        };
        g_res == r_res && (g_act == "*" || g_act == r_act)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Permission {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Permission {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Permission {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<String> for Permission {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Permission> for String {
    fn from(value: Permission) -> Self {
        value.0
    }
}

fn validate(value: &str) -> Result<()> {
    let (resource, action) = split_permission(value).ok_or_else(|| {
        Error::InvalidPermission("permission must be in resource:action format".to_string())
    })?;
    if resource.is_empty() || action.is_empty() {
        return Err(Error::InvalidPermission(
            "permission must not have empty segments".to_string(),
        ));
    }
    if !is_valid_segment(resource) {
        return Err(Error::InvalidPermission(
            "resource segment contains invalid characters".to_string(),
        ));
    }
    if action != "*" && !is_valid_segment(action) {
        return Err(Error::InvalidPermission(
            "action segment contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|ch| matches!(ch, 'a'..='z' | '0'..='9' | '_' | '-'))
}

fn split_permission(value: &str) -> Option<(&str, &str)> {
    value.split_once(':')
}

/// Static permission table. Superadmin has no row: see [`PermissionSet::All`].
pub fn role_permissions(role: Role) -> &'static [&'static str] {
    match role {
        Role::Superadmin => &[],
        Role::Admin => &[
            "events:create",
            "events:edit",
            "events:delete",
            "events:validate",
            "events:view",
            "vehicles:manage",
            "users:manage",
            "reports:view",
            "reports:export",
            "settings:edit",
        ],
        Role::Supervisor => &[
            "events:create",
            "events:edit",
            "events:validate",
            "events:view",
            "reports:view",
            "reports:export",
        ],
        Role::Operator => &["events:create", "events:view"],
        Role::Auditor => &["events:view", "reports:view", "reports:export"],
    }
}

/// Effective permissions of a principal.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PermissionSet {
    /// Every permission, including ones added after this table was written.
    All,
    /// An explicit list.
    Listed(Vec<Permission>),
}

impl PermissionSet {
    /// Computes the effective set for a role and an optional per-user override.
    pub fn resolve(role: Role, overrides: Option<&[Permission]>) -> Self {
        match role {
            Role::Superadmin => Self::All,
            Role::Admin | Role::Supervisor | Role::Operator | Role::Auditor => match overrides {
                Some(list) => Self::Listed(list.to_vec()),
                None => Self::Listed(
                    role_permissions(role)
                        .iter()
                        .map(|token| Permission::from_static(token))
                        .collect(),
                ),
            },
        }
    }

    /// Returns whether `required` is granted.
    pub fn allows(&self, required: &Permission) -> bool {
        match self {
            Self::All => true,
            Self::Listed(granted) => granted.iter().any(|perm| perm.covers(required)),
        }
    }
}
