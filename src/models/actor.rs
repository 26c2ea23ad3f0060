//! Acting identity threaded explicitly through every write

use serde::{Deserialize, Serialize};

/// The identity responsible for a request.
///
/// `role` is kept as the raw string from the identity token so that a role the
/// policy table does not know still reaches the hierarchy lookup (and ranks
/// lowest) instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: String,
    pub display_name: Option<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Value written to `createdBy` / `updatedBy`: display name, else id
    pub fn attribution(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.id)
    }

    /// `"{role}:{id}"` form used by some creators when stamping ownership
    pub fn composite_id(&self) -> String {
        format!("{}:{}", self.role, self.id)
    }
}
