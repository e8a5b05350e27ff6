use std::fmt;

use serde::{Deserialize, Serialize};

/// Application area a route or principal belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Area {
    /// Super-admin section, not scoped to any tenant.
    Platform,
    /// Per-company section, scoped to the tenant of the host.
    Tenant,
}

impl Area {
    /// Returns the lower-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Platform => "platform",
            Self::Tenant => "tenant",
        }
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of user roles.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Platform operator, the only platform-area role.
    Superadmin,
    /// Tenant administrator.
    Admin,
    /// Tenant supervisor.
    Supervisor,
    /// Tenant operator.
    #[serde(alias = "operador")]
    Operator,
    /// Read-only tenant auditor.
    Auditor,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Role; 5] = [
        Role::Superadmin,
        Role::Admin,
        Role::Supervisor,
        Role::Operator,
        Role::Auditor,
    ];

    /// Area the role may sign in to.
    pub fn area(self) -> Area {
        match self {
            Self::Superadmin => Area::Platform,
            Self::Admin | Self::Supervisor | Self::Operator | Self::Auditor => Area::Tenant,
        }
    }

    /// Returns the lower-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Superadmin => "superadmin",
            Self::Admin => "admin",
            Self::Supervisor => "supervisor",
            Self::Operator => "operator",
            Self::Auditor => "auditor",
        }
    }

    fn bit(self) -> u8 {
        match self {
            Self::Superadmin => 1 << 0,
            Self::Admin => 1 << 1,
            Self::Supervisor => 1 << 2,
            Self::Operator => 1 << 3,
            Self::Auditor => 1 << 4,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of roles accepted by a guard or route.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct RoleSet(u8);

impl RoleSet {
    /// The empty set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Builds a set from a slice of roles.
    pub fn of(roles: &[Role]) -> Self {
        roles.iter().fold(Self::empty(), |set, role| set.with(*role))
    }

    /// Every role belonging to `area`.
    pub fn for_area(area: Area) -> Self {
        Role::ALL
            .iter()
            .filter(|role| role.area() == area)
            .fold(Self::empty(), |set, role| set.with(*role))
    }

    /// Returns a copy of the set with `role` added.
    pub fn with(self, role: Role) -> Self {
        Self(self.0 | role.bit())
    }

    /// Returns whether `role` is a member.
    pub fn contains(self, role: Role) -> bool {
        self.0 & role.bit() != 0
    }

    /// Returns whether the set has no members.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates members in declaration order.
    pub fn iter(self) -> impl Iterator<Item = Role> {
        Role::ALL.into_iter().filter(move |role| self.contains(*role))
    }
}

impl From<Role> for RoleSet {
    fn from(role: Role) -> Self {
        Self::empty().with(role)
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), |set, role| set.with(role))
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Role::as_str).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}
