//! Audit/lifecycle envelope shared by every soft-deletable table

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Columns every opted-in table carries.
///
/// Invariant: `is_active == !is_deleted`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Lifecycle {
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_by: Option<String>,
    /// Id of the creating actor; ownership is decided on this, never on `created_by`
    pub created_by_id: Option<String>,
    pub updated_by: Option<String>,
    pub deleted_by: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Lifecycle {
    pub fn is_consistent(&self) -> bool {
        self.is_active != self.is_deleted
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            is_active: true,
            is_deleted: false,
            created_by: None,
            created_by_id: None,
            updated_by: None,
            deleted_by: None,
            deleted_at: None,
        }
    }
}
