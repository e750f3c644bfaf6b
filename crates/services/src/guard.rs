//! Caller identity and the two authorization checks every service relies on.

use thiserror::Error;

use quiz_core::model::{Capability, Role, UserId};

/// An already-authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    #[must_use]
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    #[must_use]
    pub fn can(&self, capability: Capability) -> bool {
        self.role.can(capability)
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenied {
    #[error("caller does not own the resource")]
    NotOwner,
    #[error("role lacks capability {0:?}")]
    MissingCapability(Capability),
}

/// Owner check with no role override: admins are refused too.
///
/// # Errors
///
/// Returns `AccessDenied::NotOwner` when the ids differ.
pub fn ensure_owner(caller: &Caller, owner: UserId) -> Result<(), AccessDenied> {
    if caller.user_id == owner {
        Ok(())
    } else {
        Err(AccessDenied::NotOwner)
    }
}

/// # Errors
///
/// Returns `AccessDenied::MissingCapability` if the caller's role lacks it.
pub fn ensure_capability(caller: &Caller, capability: Capability) -> Result<(), AccessDenied> {
    if caller.can(capability) {
        Ok(())
    } else {
        Err(AccessDenied::MissingCapability(capability))
    }
}
