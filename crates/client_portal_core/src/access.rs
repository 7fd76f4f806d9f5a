//! crates/client_portal_core/src/access.rs
//!
//! Role checks, evaluated explicitly before any handler logic runs.

use uuid::Uuid;

use crate::domain::Role;
use crate::error::DomainError;

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub pan: String,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// The owner filter a listing should use: admins may pick any user (or none),
    /// everyone else only ever sees their own records.
    pub fn owner_scope(&self, requested: Option<Uuid>) -> Option<Uuid> {
        if self.is_admin() {
            requested
        } else {
            Some(self.user_id)
        }
    }

    /// Whether the caller may read a record owned by `owner_id`.
    pub fn can_read(&self, owner_id: Uuid) -> bool {
        self.is_admin() || self.user_id == owner_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Authenticated,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    AdminOnly,
}

impl DenialReason {
    pub fn message(&self) -> &'static str {
        match self {
            DenialReason::AdminOnly => "Admin access required",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Authorized(Role),
    Denied(DenialReason),
}

impl Authorization {
    pub fn into_result(self) -> Result<Role, DomainError> {
        match self {
            Authorization::Authorized(role) => Ok(role),
            Authorization::Denied(reason) => Err(DomainError::Forbidden(reason.message())),
        }
    }
}

pub fn authorize(principal: &Principal, requirement: Requirement) -> Authorization {
    match requirement {
        Requirement::Authenticated => Authorization::Authorized(principal.role),
        Requirement::Admin if principal.is_admin() => Authorization::Authorized(Role::Admin),
        Requirement::Admin => Authorization::Denied(DenialReason::AdminOnly),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Role) -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            pan: "ABCDE1234F".into(),
            role,
        }
    }

    #[test]
    fn admin_requirement() {
        assert_eq!(
            authorize(&principal(Role::Admin), Requirement::Admin),
            Authorization::Authorized(Role::Admin)
        );
        assert_eq!(
            authorize(&principal(Role::User), Requirement::Admin),
            Authorization::Denied(DenialReason::AdminOnly)
        );
        assert!(matches!(
            authorize(&principal(Role::User), Requirement::Admin).into_result(),
            Err(DomainError::Forbidden(_))
        ));
    }

    #[test]
    fn users_are_pinned_to_their_own_records() {
        let user = principal(Role::User);
        let other = Uuid::new_v4();
        assert_eq!(user.owner_scope(Some(other)), Some(user.user_id));
        assert_eq!(user.owner_scope(None), Some(user.user_id));
        assert!(!user.can_read(other));

        let admin = principal(Role::Admin);
        assert_eq!(admin.owner_scope(Some(other)), Some(other));
        assert_eq!(admin.owner_scope(None), None);
        assert!(admin.can_read(other));
    }
}
