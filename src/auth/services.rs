use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{
    dto::{LoginRequest, LoginResponse, PublicUser, RegisteredUser, SignupRequest, SignupResponse},
    jwt::JwtKeys,
    password::{hash_password_async, verify_decoy_async, verify_password_async},
    repo::{StoreError, UserStore},
    repo_types::User,
};
use crate::error::{AppError, AppResult, MSG_FIELDS_REQUIRED};

/// Longest password accepted before it reaches the hasher.
pub const MAX_PASSWORD_BYTES: usize = 1024;

/// Lowercase and trim; the store only ever sees this form.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Both fields present and non-empty, email normalized.
fn require_credentials(
    email: Option<String>,
    password: Option<String>,
) -> AppResult<(String, String)> {
    let email = email.as_deref().map(normalize_email).unwrap_or_default();
    let password = password.unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return Err(AppError::Validation(MSG_FIELDS_REQUIRED.into()));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AppError::Validation("Password is too long".into()));
    }
    Ok((email, password))
}

/// Signup and login over an injected [`UserStore`].
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn UserStore>,
    keys: JwtKeys,
}

impl AuthService {
    pub fn new(store: Arc<dyn UserStore>, keys: JwtKeys) -> Self {
        Self { store, keys }
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }

    pub async fn signup(&self, req: SignupRequest) -> AppResult<SignupResponse> {
        let (email, password) = require_credentials(req.email, req.password)?;

        // Fast path only; the insert below is what actually guards uniqueness.
        if self.store.find_by_email(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(AppError::DuplicateEmail);
        }

        let hash = hash_password_async(password).await?;

        let user = match self.store.insert(&email, &hash).await {
            Ok(u) => u,
            Err(StoreError::DuplicateEmail) => {
                warn!(email = %email, "lost signup race for email");
                return Err(AppError::DuplicateEmail);
            }
            Err(e) => return Err(e.into()),
        };

        let token = self.keys.issue(user.id, &user.email)?;

        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(SignupResponse {
            token,
            user: RegisteredUser::from(&user),
        })
    }

    pub async fn login(&self, req: LoginRequest) -> AppResult<LoginResponse> {
        let (email, password) = require_credentials(req.email, req.password)?;

        let Some(user) = self.store.find_by_email(&email).await? else {
            // Same Argon2 cost as a wrong password, so timing does not reveal
            // whether the email is registered.
            verify_decoy_async(password).await;
            warn!(email = %email, "login unknown email");
            return Err(AppError::InvalidCredentials);
        };

        if !verify_password_async(password, user.password_hash.clone()).await? {
            warn!(email = %email, user_id = %user.id, "login invalid password");
            return Err(AppError::InvalidCredentials);
        }

        let token = self.keys.issue(user.id, &user.email)?;

        info!(user_id = %user.id, email = %user.email, "user logged in");
        Ok(LoginResponse {
            token,
            user: PublicUser::from(&user),
        })
    }

    /// Load the user a verified token points at.
    pub async fn current_user(&self, user_id: Uuid) -> AppResult<User> {
        self.store
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User not found".into()))
    }
}
