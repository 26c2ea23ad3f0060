//! User domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::lifecycle::Lifecycle;
use super::role::Role;

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub role: String,
    pub vendor_id: Option<Uuid>,

    #[sqlx(flatten)]
    pub lifecycle: Lifecycle,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Delegated user creation request
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 1, max = 128, message = "password must not be empty"))]
    pub password: String,
    #[validate(length(max = 120))]
    pub full_name: Option<String>,
    pub role: Role,
    /// Vendor organization the new account is scoped to (required for VENDOR creators)
    pub vendor_id: Option<Uuid>,
}

/// Update user request
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(max = 120))]
    pub full_name: Option<String>,
    pub is_active: Option<bool>,
}

/// User response (without sensitive data)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub role: String,
    pub vendor_id: Option<Uuid>,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
            vendor_id: user.vendor_id,
            lifecycle: user.lifecycle,
            created_at: user.created_at,
        }
    }
}
