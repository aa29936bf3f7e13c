use std::sync::OnceLock;

use anyhow::anyhow;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand_core::OsRng;
use tracing::error;

// Argon2id, v19, crate default cost (19 MiB, 2 passes, 1 lane).
fn argon() -> Argon2<'static> {
    Argon2::default()
}

/// Salted Argon2id hash in PHC string form. Two calls with the same input
/// never return the same string.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    match argon().hash_password(plain.as_bytes(), &salt) {
        Ok(phc) => Ok(phc.to_string()),
        Err(e) => {
            error!(error = %e, "password hashing failed");
            Err(anyhow!("password hashing failed: {e}"))
        }
    }
}

/// `Ok(false)` on mismatch; errors only when `stored` is not a parsable PHC
/// string. The comparison inside argon2 is constant time.
pub fn verify_password(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| {
        error!(error = %e, "stored password hash is malformed");
        anyhow!("malformed password hash: {e}")
    })?;
    Ok(argon().verify_password(plain.as_bytes(), &parsed).is_ok())
}

/// Hash of a fixed throwaway password under the same parameters as real
/// hashes, computed on first use.
pub fn decoy_hash() -> &'static str {
    static DECOY: OnceLock<String> = OnceLock::new();
    DECOY.get_or_init(|| {
        hash_password("nexusflow-decoy-password").unwrap_or_else(|e| {
            error!(error = %e, "decoy hash unavailable");
            String::new()
        })
    })
}

/// Runs [`hash_password`] on the blocking pool.
pub async fn hash_password_async(plain: String) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&plain)).await?
}

/// Runs [`verify_password`] on the blocking pool.
pub async fn verify_password_async(plain: String, hash: String) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&plain, &hash)).await?
}

/// Spends one verification's worth of Argon2 work against [`decoy_hash`].
/// Used where no stored hash exists so the caller takes as long as a real
/// mismatch.
pub async fn verify_decoy_async(plain: String) {
    let _ = tokio::task::spawn_blocking(move || verify_password(&plain, decoy_hash())).await;
}
