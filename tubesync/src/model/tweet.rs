use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Editable, Entity, UserSummary};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tweet {
    pub id: String,
    pub content: String,
    pub owner: UserSummary,
    pub created_at: Option<DateTime<Utc>>,
}

impl Tweet {
    pub fn new_local(id: String, content: String, owner: UserSummary) -> Self {
        Self { id, content, owner, created_at: Some(Utc::now()) }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TweetPatch {
    pub content: Option<String>,
}

impl Entity for Tweet {
    type Patch = TweetPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn apply(&mut self, patch: &TweetPatch) {
        if let Some(content) = &patch.content {
            self.content = content.clone();
        }
    }

    fn absorb_local(&mut self, local: &Self) {
        self.owner.fill_missing(&local.owner);
        if self.created_at.is_none() {
            self.created_at = local.created_at;
        }
    }
}

impl Editable for Tweet {
    fn content(&self) -> &str {
        &self.content
    }

    fn content_patch(content: String) -> TweetPatch {
        TweetPatch { content: Some(content) }
    }
}
