//! Authentication and user account service

use std::sync::Arc;

use validator::Validate;

use super::{
    audit::{AuditLog, Auditor},
    hashing::CredentialHasher,
};
use crate::{
    error::{AppError, AppResult, ConflictError, RepositoryError, ValidationError},
    models::{
        audit::AuditEventType,
        user::{CreateUser, NewUserRecord, Role, UpdateUser, UpdateUserRecord, User},
    },
    repository::UserRepository,
};

#[derive(Clone)]
pub struct IdentityService {
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn CredentialHasher>,
    audit: Auditor,
}

impl IdentityService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        hasher: Arc<dyn CredentialHasher>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            users,
            hasher,
            audit: Auditor::new(audit),
        }
    }

    /// Authenticate a user by login and password.
    ///
    /// Unknown login, inactive account and wrong password all produce
    /// [`AppError::Authentication`]; only the audit log knows which one.
    pub async fn authenticate(&self, login: &str, password: &str) -> AppResult<User> {
        let credentials = self
            .audit
            .check(
                "authenticate",
                self.users.find_credentials_by_login(login).await,
            )
            .await?;

        let Some(credentials) = credentials else {
            self.hasher.verify_dummy(password);
            self.authentication_failed(login, "unknown login").await;
            return Err(AppError::Authentication);
        };

        // Verified before the account state so every failure pays one verification
        let verified = self
            .audit
            .check(
                "authenticate",
                self.hasher.verify(password, &credentials.password_hash),
            )
            .await?;

        if !credentials.user.active {
            self.authentication_failed(login, "inactive account").await;
            return Err(AppError::Authentication);
        }

        if !verified {
            self.authentication_failed(login, "wrong password").await;
            return Err(AppError::Authentication);
        }

        let user = credentials.user;
        self.audit
            .record(
                AuditEventType::AuthenticationSucceeded,
                format!("User authenticated: {} ({})", user.login, user.role),
            )
            .await;

        Ok(user)
    }

    async fn authentication_failed(&self, login: &str, reason: &str) {
        tracing::debug!("Authentication failed for {}: {}", login, reason);
        self.audit
            .record(
                AuditEventType::AuthenticationFailed,
                format!("Authentication failed for {}: {}", login, reason),
            )
            .await;
    }

    /// Register a new account. The plaintext password is hashed and dropped.
    pub async fn create_user(&self, user: CreateUser, password: String) -> AppResult<User> {
        user.validate()?;

        let exists = self
            .audit
            .check("create_user", self.users.login_exists(&user.login, None).await)
            .await?;
        if exists {
            return Err(ValidationError::DuplicateLogin(user.login).into());
        }

        let role = parse_role(&user.role)?;
        let password_hash = self.hash_password("create_user", password).await?;

        let record = NewUserRecord {
            login: user.login,
            firstname: user.firstname,
            lastname: user.lastname,
            email: user.email,
            role,
            active: true,
            password_hash,
        };

        let created = match self.users.create(&record).await {
            Ok(created) => created,
            Err(RepositoryError::UniqueViolation { .. }) => {
                return Err(ValidationError::DuplicateLogin(record.login).into())
            }
            Err(e) => return Err(self.audit.operation_failed("create_user", e).await),
        };

        tracing::info!("Identity: created user id={} login={}", created.id, created.login);
        self.audit
            .record(
                AuditEventType::UserCreated,
                format!("User created: {} ({})", created.login, created.role),
            )
            .await;

        Ok(created)
    }

    /// Update profile fields and role. Password and active flag are untouched.
    pub async fn update_user(&self, id: i32, user: UpdateUser) -> AppResult<User> {
        user.validate()?;

        self.get_user(id).await?;

        let taken = self
            .audit
            .check("update_user", self.users.login_exists(&user.login, Some(id)).await)
            .await?;
        if taken {
            return Err(ValidationError::DuplicateLogin(user.login).into());
        }

        let record = UpdateUserRecord {
            role: parse_role(&user.role)?,
            login: user.login,
            firstname: user.firstname,
            lastname: user.lastname,
            email: user.email,
        };

        let updated = match self.users.update(id, &record).await {
            Ok(Some(updated)) => updated,
            Ok(None) => return Err(not_found(id)),
            Err(RepositoryError::UniqueViolation { .. }) => {
                return Err(ValidationError::DuplicateLogin(record.login).into())
            }
            Err(e) => return Err(self.audit.operation_failed("update_user", e).await),
        };

        self.audit
            .record(
                AuditEventType::UserUpdated,
                format!("User updated: {}", updated.login),
            )
            .await;

        Ok(updated)
    }

    /// Replace the password after checking the current one
    pub async fn change_password(
        &self,
        user_id: i32,
        old_password: &str,
        new_password: String,
    ) -> AppResult<()> {
        let credentials = self
            .audit
            .check(
                "change_password",
                self.users.find_credentials_by_id(user_id).await,
            )
            .await?
            .ok_or_else(|| not_found(user_id))?;

        let verified = self
            .audit
            .check(
                "change_password",
                self.hasher.verify(old_password, &credentials.password_hash),
            )
            .await?;
        if !verified {
            return Err(ConflictError::InvalidCredentials.into());
        }

        let password_hash = self.hash_password("change_password", new_password).await?;

        let changed = self
            .audit
            .check(
                "change_password",
                self.users.set_password_hash(user_id, &password_hash).await,
            )
            .await?;
        if !changed {
            return Err(not_found(user_id));
        }

        self.audit
            .record(
                AuditEventType::PasswordChanged,
                format!("Password changed for: {}", credentials.user.login),
            )
            .await;

        Ok(())
    }

    pub async fn activate(&self, id: i32) -> AppResult<User> {
        let user = self.set_active("activate", id, true).await?;
        self.audit
            .record(
                AuditEventType::UserActivated,
                format!("User activated: {}", user.login),
            )
            .await;
        Ok(user)
    }

    pub async fn deactivate(&self, id: i32) -> AppResult<User> {
        let user = self.set_active("deactivate", id, false).await?;
        self.audit
            .record(
                AuditEventType::UserDeactivated,
                format!("User deactivated: {}", user.login),
            )
            .await;
        Ok(user)
    }

    async fn set_active(&self, operation: &str, id: i32, active: bool) -> AppResult<User> {
        self.audit
            .check(operation, self.users.set_active(id, active).await)
            .await?
            .ok_or_else(|| not_found(id))
    }

    /// Absent users are not admins
    pub fn is_admin(&self, user: Option<&User>) -> bool {
        user.map(User::is_admin).unwrap_or(false)
    }

    /// Get user by ID
    pub async fn get_user(&self, id: i32) -> AppResult<User> {
        self.audit
            .check("get_user", self.users.find_by_id(id).await)
            .await?
            .ok_or_else(|| not_found(id))
    }

    pub async fn find_by_login(&self, login: &str) -> AppResult<Option<User>> {
        self.audit
            .check("find_by_login", self.users.find_by_login(login).await)
            .await
    }

    pub async fn all_users(&self) -> AppResult<Vec<User>> {
        self.audit
            .check("all_users", self.users.find_all().await)
            .await
    }

    /// Create the administrator account unless the login is already taken.
    /// Returns true when an account was created.
    pub async fn ensure_admin(&self, login: &str, password: String) -> AppResult<bool> {
        if self.find_by_login(login).await?.is_some() {
            return Ok(false);
        }

        let admin = CreateUser {
            login: login.to_string(),
            firstname: None,
            lastname: None,
            email: None,
            role: Role::Admin.to_string(),
        };
        self.create_user(admin, password).await?;
        Ok(true)
    }

    async fn hash_password(&self, operation: &str, password: String) -> AppResult<String> {
        if password.is_empty() {
            return Err(ValidationError::InvalidField("password: Password is required".to_string()).into());
        }
        let result = self.hasher.hash(&password);
        drop(password);
        self.audit.check(operation, result).await
    }
}

fn parse_role(role: &str) -> AppResult<Role> {
    role.parse()
        .map_err(|_| ValidationError::InvalidRole(role.to_string()).into())
}

fn not_found(id: i32) -> AppError {
    AppError::NotFound(format!("User with id {} not found", id))
}
