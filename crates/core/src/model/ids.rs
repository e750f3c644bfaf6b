use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Error type for parsing an ID from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

macro_rules! uuid_ids {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(Uuid);

            impl $name {
                /// Wraps an existing UUID.
                #[must_use]
                pub fn new(id: Uuid) -> Self {
                    Self(id)
                }

                /// Generates a fresh random (v4) identifier.
                #[must_use]
                pub fn random() -> Self {
                    Self(Uuid::new_v4())
                }

                /// Returns the underlying UUID.
                #[must_use]
                pub fn value(&self) -> Uuid {
                    self.0
                }
            }

            impl From<Uuid> for $name {
                fn from(id: Uuid) -> Self {
                    Self(id)
                }
            }

            impl fmt::Debug for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, concat!(stringify!($name), "({})"), self.0)
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl FromStr for $name {
                type Err = ParseIdError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    Uuid::parse_str(s.trim())
                        .map($name::new)
                        .map_err(|_| ParseIdError {
                            kind: stringify!($name),
                        })
                }
            }
        )*
    };
}

uuid_ids!(
    /// Identity of an authenticated user, issued by the identity provider.
    UserId,
    /// Unique identifier for a quiz session
    SessionId,
    /// Unique identifier for a recorded answer
    AttemptId,
    /// Unique identifier for a question in the bank
    QuestionId,
    /// Unique identifier for an answer option
    OptionId,
    /// Unique identifier for a category
    CategoryId,
    /// Unique identifier for a tag
    TagId,
    /// Unique identifier for a question set
    QuestionSetId,
);

// ─── Tests ─────────────────────────────────────────────────────────────────────
