use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT payload carried by session tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,     // user ID
    pub email: String, // normalized email at issuance
    pub iat: usize,    // issued at (unix timestamp)
    pub exp: usize,    // expires at (unix timestamp)
}
