use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account role as issued by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Creator,
    Reviewer,
    #[default]
    User,
}

/// Something a caller may be allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    TakeQuiz,
    AuthorQuestions,
    ReviewQuestions,
    PublishQuestions,
}

/// Capability → roles that hold it.
const PERMISSIONS: &[(Capability, &[Role])] = &[
    (
        Capability::TakeQuiz,
        &[Role::Admin, Role::Creator, Role::Reviewer, Role::User],
    ),
    (Capability::AuthorQuestions, &[Role::Admin, Role::Creator]),
    (Capability::ReviewQuestions, &[Role::Admin, Role::Reviewer]),
    (Capability::PublishQuestions, &[Role::Admin]),
];

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Creator => "creator",
            Role::Reviewer => "reviewer",
            Role::User => "user",
        }
    }

    #[must_use]
    pub fn can(self, capability: Capability) -> bool {
        PERMISSIONS
            .iter()
            .find(|(cap, _)| *cap == capability)
            .is_some_and(|(_, roles)| roles.contains(&self))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognised role name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRoleError(String);

impl fmt::Display for ParseRoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role: {}", self.0)
    }
}

impl std::error::Error for ParseRoleError {}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "creator" => Ok(Self::Creator),
            "reviewer" => Ok(Self::Reviewer),
            "user" => Ok(Self::User),
            _ => Err(ParseRoleError(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn everyone_can_take_quizzes() {
        for role in [Role::Admin, Role::Creator, Role::Reviewer, Role::User] {
            assert!(role.can(Capability::TakeQuiz));
        }
    }

    #[test]
    fn permission_table_matches_roles() {
        assert!(Role::Creator.can(Capability::AuthorQuestions));
        assert!(!Role::Reviewer.can(Capability::AuthorQuestions));
        assert!(Role::Reviewer.can(Capability::ReviewQuestions));
        assert!(!Role::Creator.can(Capability::ReviewQuestions));
        assert!(Role::Admin.can(Capability::PublishQuestions));
        assert!(!Role::Reviewer.can(Capability::PublishQuestions));
        assert!(!Role::User.can(Capability::AuthorQuestions));
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Reviewer".parse::<Role>().unwrap(), Role::Reviewer);
        assert!("owner".parse::<Role>().is_err());
    }
}
