use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::User;

/// Request body for signup. Fields are optional at the serde level so the
/// presence check answers with its own message instead of a rejection.
#[derive(Debug, Default, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Request body for login.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Response returned after signup.
#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub token: String,
    pub user: RegisteredUser,
}

/// Response returned after login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: PublicUser,
}

/// Public part of the user returned on login.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
}

/// Public user including its creation time, returned on signup and `/me`.
#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    pub id: Uuid,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            email: u.email.clone(),
        }
    }
}

impl From<&User> for RegisteredUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            email: u.email.clone(),
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub ok: bool,
    pub message: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_deserialize_to_none() {
        let req: SignupRequest = serde_json::from_str(r#"{"email":""}"#).expect("parse");
        assert_eq!(req.email.as_deref(), Some(""));
        assert!(req.password.is_none());
    }

    #[test]
    fn user_views_never_carry_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            email: "test@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            created_at: OffsetDateTime::now_utc(),
        };
        for json in [
            serde_json::to_string(&user).unwrap(),
            serde_json::to_string(&PublicUser::from(&user)).unwrap(),
            serde_json::to_string(&RegisteredUser::from(&user)).unwrap(),
        ] {
            assert!(json.contains("test@example.com"));
            assert!(!json.contains("password_hash"));
            assert!(!json.contains("argon2"));
        }
    }
}
