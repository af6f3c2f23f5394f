use serde::{Deserialize, Serialize};

/// The user fields every list row needs to render an author.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub full_name: Option<String>,
    pub avatar: Option<String>,
}

impl UserSummary {
    /// A summary that only knows the id, as produced by unpopulated owner refs.
    pub fn from_id(id: impl Into<String>) -> Self {
        Self { id: id.into(), ..Self::default() }
    }

    pub fn display_name(&self) -> &str {
        match self.full_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ if !self.username.is_empty() => &self.username,
            _ => "User",
        }
    }

    pub fn is_populated(&self) -> bool {
        !self.username.is_empty()
    }

    /// Copies fields this summary lacks from `other` when both describe the
    /// same user (or this one has no id at all).
    pub fn fill_missing(&mut self, other: &UserSummary) {
        if !self.id.is_empty() && self.id != other.id {
            return;
        }
        if self.id.is_empty() {
            self.id = other.id.clone();
        }
        if self.username.is_empty() {
            self.username = other.username.clone();
        }
        if self.full_name.is_none() {
            self.full_name = other.full_name.clone();
        }
        if self.avatar.is_none() {
            self.avatar = other.avatar.clone();
        }
    }
}
