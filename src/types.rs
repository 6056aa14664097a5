//! Roles and calendar days shared by models, services and tokens.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account roles. The role decides which schools a caller may act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Teacher,
    Parent,
    Student,
    SchoolAdmin,
    MainAdmin,
    DistrictAdmin,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Teacher,
        Role::Parent,
        Role::Student,
        Role::SchoolAdmin,
        Role::MainAdmin,
        Role::DistrictAdmin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Parent => "parent",
            Role::Student => "student",
            Role::SchoolAdmin => "school_admin",
            Role::MainAdmin => "main_admin",
            Role::DistrictAdmin => "district_admin",
        }
    }

    /// Roles bound to exactly one school.
    pub fn is_single_school(&self) -> bool {
        matches!(self, Role::Teacher | Role::Parent | Role::Student | Role::SchoolAdmin)
    }

    /// Roles that manage records rather than consume their own.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Teacher | Role::SchoolAdmin | Role::MainAdmin | Role::DistrictAdmin)
    }

    /// Roles allowed to create and change records.
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::SchoolAdmin | Role::MainAdmin | Role::DistrictAdmin)
    }

    /// Name is mandatory on the account record for these roles.
    pub fn requires_name(&self) -> bool {
        matches!(self, Role::Teacher | Role::Parent | Role::SchoolAdmin | Role::DistrictAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("unknown role '{}'", s))
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_wire_name() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
            assert_eq!(serde_json::to_value(role).unwrap(), role.as_str());
        }
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn single_school_roles() {
        assert!(Role::Teacher.is_single_school());
        assert!(Role::Parent.is_single_school());
        assert!(!Role::MainAdmin.is_single_school());
        assert!(!Role::DistrictAdmin.is_single_school());
    }
}
