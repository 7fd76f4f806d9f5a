//! services/api/src/services/profiles.rs
//!
//! Self-service profile edits and the administrative user maintenance that
//! lives alongside them.

use chrono::NaiveDate;
use client_portal_core::domain::{NewUser, Profile, ProfilePatch, Role, User, UserQuery, UserType};
use client_portal_core::error::{DomainError, DomainResult};
use client_portal_core::ports::{DatabaseService, PortError};
use client_portal_core::validation::{is_adult, normalize_email, normalize_pan};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::services::credentials::hash_password;

/// An account created directly by an administrator (or the seeding binary).
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub user_type: UserType,
    pub email: String,
    pub mobile: String,
    pub pan: String,
    pub password: String,
    pub role: Role,
    pub profile: Profile,
}

/// Account-level overwrites. Which of these a caller may set is decided by the route.
#[derive(Debug, Clone, Default)]
pub struct AccountChanges {
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub pan: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub user_type: Option<UserType>,
    pub is_active: Option<bool>,
    pub profile: ProfilePatch,
}

fn conflict_is_duplicate(e: PortError) -> DomainError {
    match e {
        PortError::Conflict(_) => DomainError::DuplicateIdentity,
        other => other.into(),
    }
}

pub struct ProfileService {
    db: Arc<dyn DatabaseService>,
}

impl ProfileService {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    pub async fn get(&self, user_id: Uuid) -> DomainResult<User> {
        match self.db.get_user(user_id).await {
            Ok(user) => Ok(user),
            Err(PortError::NotFound(_)) => Err(DomainError::NotFound("User")),
            Err(e) => Err(e.into()),
        }
    }

    /// The restricted self-service edit: profile fields only.
    pub async fn patch_own(&self, user_id: Uuid, patch: ProfilePatch) -> DomainResult<User> {
        let mut user = self.get(user_id).await?;
        patch.apply_to(&mut user.profile);
        let user = self.db.save_user(&user).await?;
        info!("User {} updated their profile", user.id);
        Ok(user)
    }

    /// The broader self-service edit. Email, PAN, role and password never change here.
    pub async fn update_own(&self, user_id: Uuid, changes: AccountChanges) -> DomainResult<User> {
        let restricted = AccountChanges {
            mobile: changes.mobile,
            profile: changes.profile,
            ..AccountChanges::default()
        };
        self.apply(user_id, restricted).await
    }

    pub async fn list_all(&self) -> DomainResult<Vec<User>> {
        let page = self
            .db
            .list_users(UserQuery {
                limit: i64::MAX,
                ..UserQuery::default()
            })
            .await?;
        Ok(page.items)
    }

    pub async fn create_account(&self, account: NewAccount, today: NaiveDate) -> DomainResult<User> {
        let email = normalize_email(&account.email);
        let mobile = account.mobile.trim().to_string();
        let pan = normalize_pan(&account.pan);

        if let Some(dob) = account.profile.date_of_birth {
            if account.user_type == UserType::Individual && !is_adult(dob, today) {
                return Err(DomainError::AgeRestriction);
            }
        }
        if self.db.identity_taken(&email, &mobile, &pan).await? {
            return Err(DomainError::DuplicateIdentity);
        }

        let user = self
            .db
            .create_user(NewUser {
                user_type: account.user_type,
                email,
                mobile,
                pan,
                password_hash: hash_password(&account.password)?,
                role: account.role,
                profile: account.profile,
            })
            .await
            .map_err(conflict_is_duplicate)?;
        info!("Created {} account {}", user.role, user.id);
        Ok(user)
    }

    /// Creates `account` as an administrator unless one already exists.
    pub async fn ensure_admin(
        &self,
        account: NewAccount,
        today: NaiveDate,
    ) -> DomainResult<Option<User>> {
        if self.db.admin_exists().await? {
            return Ok(None);
        }
        let admin = self
            .create_account(
                NewAccount {
                    role: Role::Admin,
                    ..account
                },
                today,
            )
            .await?;
        Ok(Some(admin))
    }

    /// Administrative overwrite of any account field, rehashing a new password.
    pub async fn admin_update(&self, user_id: Uuid, changes: AccountChanges) -> DomainResult<User> {
        self.apply(user_id, changes).await
    }

    /// Activation also clears any recorded deactivation reason.
    pub async fn set_active(
        &self,
        user_id: Uuid,
        active: bool,
        reason: Option<String>,
    ) -> DomainResult<User> {
        let mut user = self.get(user_id).await?;
        user.is_active = active;
        if active {
            user.deactivation_reason = None;
        } else if reason.is_some() {
            user.deactivation_reason = reason;
        }
        let user = self.db.save_user(&user).await?;
        info!(
            "User {} {}",
            user.id,
            if active { "activated" } else { "deactivated" }
        );
        Ok(user)
    }

    async fn apply(&self, user_id: Uuid, changes: AccountChanges) -> DomainResult<User> {
        let mut user = self.get(user_id).await?;
        if let Some(email) = changes.email {
            user.email = normalize_email(&email);
        }
        if let Some(mobile) = changes.mobile {
            user.mobile = mobile.trim().to_string();
        }
        if let Some(pan) = changes.pan {
            user.pan = normalize_pan(&pan);
        }
        if let Some(password) = changes.password {
            user.password_hash = hash_password(&password)?;
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        if let Some(user_type) = changes.user_type {
            user.user_type = user_type;
        }
        if let Some(active) = changes.is_active {
            user.is_active = active;
        }
        changes.profile.apply_to(&mut user.profile);

        self.db.save_user(&user).await.map_err(conflict_is_duplicate)
    }
}
