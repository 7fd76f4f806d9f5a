//! services/api/src/services/identity.rs
//!
//! Registration, PAN/password login, one-time passcodes and password resets.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use client_portal_core::domain::{NewUser, Otp, Profile, ResetToken, Role, User, UserType};
use client_portal_core::error::{DomainError, DomainResult};
use client_portal_core::ports::{DatabaseService, EmailMessage, EmailService, PortError};
use client_portal_core::validation::{is_adult, normalize_email, normalize_pan, FieldError};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::services::credentials::{
    generate_otp, generate_reset_token, hash_password, hash_reset_token, verify_password,
    TokenIssuer,
};

/// Minimum gap between two OTPs for the same user.
const OTP_RESEND_COOLDOWN_SECS: i64 = 30;

/// Timing and lockout rules for the identity flows.
#[derive(Debug, Clone)]
pub struct IdentityPolicy {
    pub otp_ttl: Duration,
    pub reset_token_ttl: Duration,
    pub max_failed_attempts: i32,
    pub lockout: Duration,
    pub login_lockout_enabled: bool,
    /// Base URL of the web client; reset links point at `<base>/reset-password?token=...`.
    pub frontend_url: String,
}

impl IdentityPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            otp_ttl: Duration::minutes(config.otp_ttl_minutes),
            reset_token_ttl: Duration::minutes(config.reset_token_ttl_minutes),
            max_failed_attempts: config.max_failed_attempts,
            lockout: Duration::minutes(config.lockout_minutes),
            login_lockout_enabled: config.login_lockout_enabled,
            frontend_url: config.frontend_url.clone(),
        }
    }
}

/// Everything a self-service registration submits.
#[derive(Debug, Clone)]
pub struct Registration {
    pub user_type: UserType,
    pub email: String,
    pub mobile: String,
    pub pan: String,
    pub password: String,
    pub profile: Profile,
}

/// A freshly minted bearer token and the user it belongs to.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// Generic acknowledgement returned by `forgot_password` whether or not the PAN exists.
pub const RESET_REQUESTED_MESSAGE: &str =
    "If a user with that PAN exists, a password reset link has been sent to their email.";

pub struct IdentityService {
    db: Arc<dyn DatabaseService>,
    mailer: Arc<dyn EmailService>,
    tokens: TokenIssuer,
    policy: IdentityPolicy,
}

impl IdentityService {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        mailer: Arc<dyn EmailService>,
        tokens: TokenIssuer,
        policy: IdentityPolicy,
    ) -> Self {
        Self {
            db,
            mailer,
            tokens,
            policy,
        }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    //-------------------------------------------------------------------------------------
    // Registration
    //-------------------------------------------------------------------------------------

    /// Creates an active `user`-role account. Does not log the user in. Field
    /// formats are checked on the request before this is called.
    pub async fn register(&self, registration: Registration, today: NaiveDate) -> DomainResult<User> {
        let email = normalize_email(&registration.email);
        let mobile = registration.mobile.trim().to_string();
        let pan = normalize_pan(&registration.pan);

        if self.db.identity_taken(&email, &mobile, &pan).await? {
            return Err(DomainError::DuplicateIdentity);
        }

        let profile = match registration.user_type {
            UserType::Individual => {
                let dob = registration.profile.date_of_birth.ok_or_else(|| {
                    DomainError::Validation(vec![FieldError::new(
                        "dateOfBirth",
                        "Date of birth is required",
                    )])
                })?;
                if !is_adult(dob, today) {
                    return Err(DomainError::AgeRestriction);
                }
                Profile {
                    company_name: None,
                    company_address: None,
                    date_of_incorporation: None,
                    director: None,
                    ..registration.profile
                }
            }
            UserType::Company => Profile {
                company_name: registration.profile.company_name,
                company_address: registration.profile.company_address,
                date_of_incorporation: registration.profile.date_of_incorporation,
                director: registration.profile.director,
                ..Profile::default()
            },
        };

        let user = self
            .db
            .create_user(NewUser {
                user_type: registration.user_type,
                email,
                mobile,
                pan,
                password_hash: hash_password(&registration.password)?,
                role: Role::User,
                profile,
            })
            .await
            .map_err(|e| match e {
                PortError::Conflict(_) => DomainError::DuplicateIdentity,
                other => other.into(),
            })?;
        info!("Registered user {} ({})", user.id, user.user_type);
        Ok(user)
    }

    //-------------------------------------------------------------------------------------
    // Login
    //-------------------------------------------------------------------------------------

    pub async fn login(&self, pan: &str, password: &str, now: DateTime<Utc>) -> DomainResult<Session> {
        let pan = normalize_pan(pan);
        let mut user = match self.db.get_user_by_pan(&pan).await {
            Ok(user) => user,
            Err(PortError::NotFound(_)) => {
                info!("Login rejected: unknown PAN");
                return Err(DomainError::NotFound("User"));
            }
            Err(e) => return Err(e.into()),
        };

        if !user.is_active {
            info!("Login rejected for deactivated user {}", user.id);
            return Err(DomainError::Deactivated);
        }

        if self.policy.login_lockout_enabled && user.is_locked(now) {
            return Err(DomainError::AccountLocked);
        }

        if !verify_password(password, &user.password_hash)? {
            if self.policy.login_lockout_enabled {
                self.record_failure(&mut user, now).await?;
            }
            info!("Login rejected for user {}: bad password", user.id);
            return Err(DomainError::InvalidCredentials);
        }

        if self.policy.login_lockout_enabled {
            user.login_attempts = 0;
            user.lock_until = None;
        }
        user.last_login = Some(now);
        let user = self.db.save_user(&user).await?;

        let token = self.tokens.issue(&user, now)?;
        info!("User {} logged in", user.id);
        Ok(Session { token, user })
    }

    /// Counts one failed attempt and locks the account once the limit is reached.
    async fn record_failure(&self, user: &mut User, now: DateTime<Utc>) -> DomainResult<()> {
        user.login_attempts += 1;
        if user.login_attempts >= self.policy.max_failed_attempts {
            user.lock_until = Some(now + self.policy.lockout);
            warn!("User {} locked after {} failed attempts", user.id, user.login_attempts);
        }
        *user = self.db.save_user(user).await?;
        Ok(())
    }

    //-------------------------------------------------------------------------------------
    // One-time passcodes
    //-------------------------------------------------------------------------------------

    /// Stores a fresh six-digit code on the user and returns it for delivery.
    pub async fn generate_otp(&self, user: &mut User, now: DateTime<Utc>) -> DomainResult<String> {
        let code = generate_otp();
        user.otp = Some(Otp {
            code: code.clone(),
            expires_at: now + self.policy.otp_ttl,
        });
        *user = self.db.save_user(user).await?;
        Ok(code)
    }

    /// Issues and emails a new OTP, unless the previous one is younger than the cooldown.
    pub async fn resend_otp(&self, user_id: Uuid, now: DateTime<Utc>) -> DomainResult<()> {
        let mut user = self.find_user(user_id).await?;

        if let Some(otp) = &user.otp {
            let issued_at = otp.expires_at - self.policy.otp_ttl;
            if now - issued_at < Duration::seconds(OTP_RESEND_COOLDOWN_SECS) {
                return Err(DomainError::OtpCooldown);
            }
        }

        let code = self.generate_otp(&mut user, now).await?;
        let minutes = self.policy.otp_ttl.num_minutes();
        self.mailer
            .send(EmailMessage {
                to: user.email.clone(),
                subject: "Your Login OTP".to_string(),
                text: format!("Your OTP for login is: {code}. It is valid for {minutes} minutes."),
                html: None,
            })
            .await
            .map_err(|e| {
                warn!("OTP email to user {} failed: {}", user.id, e);
                DomainError::Delivery
            })?;
        info!("OTP sent to user {}", user.id);
        Ok(())
    }

    /// Checks the code; failures count towards a temporary lock.
    pub async fn verify_otp(&self, user_id: Uuid, code: &str, now: DateTime<Utc>) -> DomainResult<Session> {
        let mut user = self.find_user(user_id).await?;

        if user.is_locked(now) {
            return Err(DomainError::AccountLocked);
        }

        let valid = user
            .otp
            .as_ref()
            .is_some_and(|otp| otp.code == code && otp.expires_at > now);
        if !valid {
            self.record_failure(&mut user, now).await?;
            return Err(DomainError::InvalidOrExpiredOtp);
        }

        user.otp = None;
        user.login_attempts = 0;
        user.lock_until = None;
        user.last_login = Some(now);
        let user = self.db.save_user(&user).await?;

        let token = self.tokens.issue(&user, now)?;
        info!("User {} verified OTP", user.id);
        Ok(Session { token, user })
    }

    //-------------------------------------------------------------------------------------
    // Password reset
    //-------------------------------------------------------------------------------------

    /// Emails a reset link when the PAN exists. The caller always reports the same
    /// generic outcome, so nothing here distinguishes an unknown PAN.
    pub async fn forgot_password(&self, pan: &str, now: DateTime<Utc>) -> DomainResult<()> {
        let pan = normalize_pan(pan);
        let mut user = match self.db.get_user_by_pan(&pan).await {
            Ok(user) => user,
            Err(PortError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let token = generate_reset_token();
        user.reset_token = Some(ResetToken {
            token_hash: hash_reset_token(&token),
            expires_at: now + self.policy.reset_token_ttl,
        });
        let mut user = self.db.save_user(&user).await?;

        let reset_url = format!("{}/reset-password?token={}", self.policy.frontend_url, token);
        let delivered = self
            .mailer
            .send(EmailMessage {
                to: user.email.clone(),
                subject: "Password Reset Token".to_string(),
                text: format!(
                    "You are receiving this email because you (or someone else) has requested \
                     the reset of a password. Please click the following link, or paste it into \
                     your browser to complete the process:\n\n{reset_url}"
                ),
                html: None,
            })
            .await;

        if let Err(e) = delivered {
            warn!("Reset email to user {} failed: {}", user.id, e);
            user.reset_token = None;
            self.db.save_user(&user).await?;
        } else {
            info!("Password reset link sent to user {}", user.id);
        }
        Ok(())
    }

    pub async fn reset_password(&self, token: &str, password: &str) -> DomainResult<()> {
        let mut user = match self.db.get_user_by_reset_token(&hash_reset_token(token)).await {
            Ok(user) => user,
            Err(PortError::NotFound(_)) => return Err(DomainError::InvalidOrExpiredToken),
            Err(e) => return Err(e.into()),
        };
        user.password_hash = hash_password(password)?;
        user.reset_token = None;
        self.db.save_user(&user).await?;
        info!("Password reset for user {}", user.id);
        Ok(())
    }

    //-------------------------------------------------------------------------------------
    // Bearer authentication
    //-------------------------------------------------------------------------------------

    /// Resolves a bearer token to an active user.
    pub async fn authenticate(&self, token: &str) -> DomainResult<User> {
        let claims = self.tokens.verify(token)?;
        let user = match self.db.get_user(claims.sub).await {
            Ok(user) => user,
            Err(PortError::NotFound(_)) => return Err(PortError::Unauthorized.into()),
            Err(e) => return Err(e.into()),
        };
        if !user.is_active {
            return Err(DomainError::Deactivated);
        }
        Ok(user)
    }

    async fn find_user(&self, user_id: Uuid) -> DomainResult<User> {
        match self.db.get_user(user_id).await {
            Ok(user) => Ok(user),
            Err(PortError::NotFound(_)) => Err(DomainError::NotFound("User")),
            Err(e) => Err(e.into()),
        }
    }
}
