//! User directory lookup backing the `find_user` capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A user profile as exposed to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bio: Option<String>,
}

/// Lookup seam over whatever holds the user directory.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Exact, case-insensitive match. `None` for no match — never an error.
    async fn find_user(&self, name: &str) -> Option<UserProfile>;
}

/// Directory backed by an in-memory list.
pub struct InMemoryDirectory {
    users: Vec<UserProfile>,
}

impl InMemoryDirectory {
    pub fn new(users: Vec<UserProfile>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn find_user(&self, name: &str) -> Option<UserProfile> {
        self.users
            .iter()
            .find(|u| u.name.eq_ignore_ascii_case(name))
            .cloned()
    }
}
