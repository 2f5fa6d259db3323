use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Role;

/// Registered account. The password hash is an argon2 PHC string and is
/// never serialized into API responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: &str, password_hash: String, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: format!("U{}", Uuid::new_v4().simple()),
            email: email.to_string(),
            password_hash,
            role,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user_id: String,
    pub email: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

/// JWT claims carried by session tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Caller identity resolved from a verified token
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub email: String,
    pub role: Role,
}

impl From<SessionClaims> for AuthenticatedUser {
    fn from(claims: SessionClaims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// Upload authentication parameters for the image CDN
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdnAuthParameters {
    pub token: String,
    pub expire: i64,
    pub signature: String,
}
