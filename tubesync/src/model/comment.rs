use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Editable, Entity, UserSummary};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub content: String,
    pub owner: UserSummary,
    pub created_at: Option<DateTime<Utc>>,
    /// `None` for top-level comments.
    pub parent_comment: Option<String>,
    /// Empty until the replies of this comment are explicitly loaded.
    pub replies: Vec<Comment>,
}

impl Comment {
    pub fn new_local(id: String, content: String, owner: UserSummary, parent_comment: Option<String>) -> Self {
        Self { id, content, owner, created_at: Some(Utc::now()), parent_comment, replies: Vec::new() }
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_comment.is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommentPatch {
    pub content: Option<String>,
}

impl Entity for Comment {
    type Patch = CommentPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn apply(&mut self, patch: &CommentPatch) {
        if let Some(content) = &patch.content {
            self.content = content.clone();
        }
    }

    fn absorb_local(&mut self, local: &Self) {
        self.owner.fill_missing(&local.owner);
        if self.created_at.is_none() {
            self.created_at = local.created_at;
        }
        if self.parent_comment.is_none() {
            self.parent_comment = local.parent_comment.clone();
        }
        // Server payloads never carry replies; keep whatever was loaded.
        if self.replies.is_empty() {
            self.replies = local.replies.clone();
        }
    }
}

impl Editable for Comment {
    fn content(&self) -> &str {
        &self.content
    }

    fn content_patch(content: String) -> CommentPatch {
        CommentPatch { content: Some(content) }
    }
}
