use std::sync::Arc;

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::claims::Claims;
use crate::config::{ConfigError, JwtConfig};

/// Session tokens are valid for seven days from issuance.
pub const TOKEN_TTL: TimeDuration = TimeDuration::days(7);

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token invalid")]
    Invalid,
    #[error("token signing failed: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// HS256 signing and verification keys derived from the server secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: Arc<EncodingKey>,
    decoding: Arc<DecodingKey>,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys").finish_non_exhaustive()
    }
}

impl JwtKeys {
    pub fn new(secret: &str) -> Result<Self, ConfigError> {
        if secret.trim().is_empty() {
            return Err(ConfigError::Missing("JWT_SECRET"));
        }
        Ok(Self {
            encoding: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
            decoding: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
        })
    }

    pub fn from_config(cfg: &JwtConfig) -> Result<Self, ConfigError> {
        Self::new(&cfg.secret)
    }

    pub fn issue(&self, user_id: Uuid, email: &str) -> Result<String, TokenError> {
        self.issue_at(user_id, email, OffsetDateTime::now_utc())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        user_id: Uuid,
        email: &str,
        now: OffsetDateTime,
    ) -> Result<String, TokenError> {
        let exp = now + TOKEN_TTL;
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            iat: now.unix_timestamp().max(0) as usize,
            exp: exp.unix_timestamp().max(0) as usize,
        };
        let token =
            encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(TokenError::Signing)?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(secret: &str) -> JwtKeys {
        JwtKeys::new(secret).expect("keys")
    }

    #[test]
    fn issue_and_verify_roundtrip() {
        let keys = make_keys("dev-secret");
        let user_id = Uuid::new_v4();
        let token = keys.issue(user_id, "a@x.com").expect("issue");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn token_older_than_seven_days_is_expired() {
        let keys = make_keys("dev-secret");
        let issued = OffsetDateTime::now_utc() - TOKEN_TTL - TimeDuration::seconds(1);
        let token = keys.issue_at(Uuid::new_v4(), "a@x.com", issued).expect("issue");
        assert!(matches!(keys.verify(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn token_just_inside_window_still_verifies() {
        let keys = make_keys("dev-secret");
        let issued = OffsetDateTime::now_utc() - TOKEN_TTL + TimeDuration::minutes(5);
        let token = keys.issue_at(Uuid::new_v4(), "a@x.com", issued).expect("issue");
        assert!(keys.verify(&token).is_ok());
    }

    #[test]
    fn token_from_other_secret_is_invalid() {
        let token = make_keys("secret-one")
            .issue(Uuid::new_v4(), "a@x.com")
            .expect("issue");
        assert!(matches!(
            make_keys("secret-two").verify(&token),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn garbage_token_is_invalid() {
        let keys = make_keys("dev-secret");
        assert!(matches!(keys.verify("not.a.jwt"), Err(TokenError::Invalid)));
        assert!(matches!(keys.verify(""), Err(TokenError::Invalid)));
    }

    #[test]
    fn empty_secret_is_a_config_error() {
        assert_eq!(
            JwtKeys::new("").unwrap_err(),
            ConfigError::Missing("JWT_SECRET")
        );
    }
}
