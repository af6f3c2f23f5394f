use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use log::debug;
use serde::Serialize;

use super::{non_empty, ListController, ListStatus, ListView, Placement};
use crate::cache::{CacheKey, SharedCache};
use crate::context::AppContext;
use crate::error::ControllerError;
use crate::model::{local_id, Comment, CommentPatch, EntityKind, UserSummary};
use crate::remote::RemoteStore;
use crate::session::SessionHandle;

/// Render-ready comment section: top-level comments with whatever replies
/// have been loaded for each of them.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ThreadView {
    pub comments: ListView<Comment>,
    /// Reply lists by parent comment id, for parents whose replies were requested.
    pub replies: BTreeMap<String, ListView<Comment>>,
}

impl ThreadView {
    pub fn reply_status(&self, parent_id: &str) -> ListStatus {
        self.replies.get(parent_id).map(|view| view.status.clone()).unwrap_or_default()
    }
}

/// Comments of one video.
///
/// Replies are cached per parent (`reply` kind keyed by the parent comment
/// id), each with its own load state, so loading or mutating the replies of
/// one comment never touches another comment's replies.
pub struct CommentThread {
    remote: Arc<dyn RemoteStore>,
    cache: SharedCache,
    session: SessionHandle,
    video_id: String,
    comments: ListController<Comment>,
    replies: Mutex<BTreeMap<String, Arc<ListController<Comment>>>>,
}

impl CommentThread {
    pub fn new(ctx: &AppContext, video_id: impl Into<String>) -> Self {
        let video_id = video_id.into();
        let key = CacheKey::new(EntityKind::Comment, video_id.clone());
        Self {
            remote: ctx.remote(),
            cache: ctx.cache().clone(),
            session: ctx.session().clone(),
            comments: ListController::new(key, ctx.cache().clone(), ctx.session().clone()),
            replies: Mutex::new(BTreeMap::new()),
            video_id,
        }
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn comments(&self) -> &ListController<Comment> {
        &self.comments
    }

    /// Reply list of `parent_id`, created on first use.
    pub fn replies(&self, parent_id: &str) -> Arc<ListController<Comment>> {
        let mut replies = self.replies.lock().unwrap_or_else(PoisonError::into_inner);
        replies
            .entry(parent_id.to_string())
            .or_insert_with(|| {
                let key = CacheKey::new(EntityKind::Reply, parent_id);
                Arc::new(ListController::new(key, self.cache.clone(), self.session.clone()))
            })
            .clone()
    }

    fn reply_lists(&self) -> Vec<(String, Arc<ListController<Comment>>)> {
        let replies = self.replies.lock().unwrap_or_else(PoisonError::into_inner);
        replies.iter().map(|(id, list)| (id.clone(), list.clone())).collect()
    }

    pub fn view(&self) -> ThreadView {
        let replies: BTreeMap<String, ListView<Comment>> =
            self.reply_lists().into_iter().map(|(id, list)| (id, list.view())).collect();
        let mut comments = self.comments.view();
        comments.items.retain(Comment::is_top_level);
        for comment in comments.items.iter_mut() {
            if let Some(view) = replies.get(&comment.id) {
                comment.replies = view.items.clone();
            }
        }
        ThreadView { comments, replies }
    }

    pub async fn mount(&self) -> Result<(), ControllerError> {
        self.comments.mount(self.remote.list_comments(&self.video_id, None)).await
    }

    pub async fn refresh(&self) -> Result<(), ControllerError> {
        self.comments.refresh(self.remote.list_comments(&self.video_id, None)).await
    }

    pub fn unmount(&self) {
        self.comments.unmount();
        for (_, list) in self.reply_lists() {
            list.unmount();
        }
    }

    fn author(&self) -> UserSummary {
        self.session.user().unwrap_or_default()
    }

    pub async fn post(&self, content: &str) -> Result<Comment, ControllerError> {
        let content = non_empty(content)?;
        let local = Comment::new_local(local_id(), content.clone(), self.author(), None);
        self.comments.create(local, Placement::Head, self.remote.add_comment(&self.video_id, &content)).await
    }

    pub async fn edit(&self, id: &str, content: &str) -> Result<Option<Comment>, ControllerError> {
        let content = non_empty(content)?;
        let patch = CommentPatch { content: Some(content.clone()) };
        self.comments.update(id, patch, self.remote.update_comment(id, &content)).await
    }

    pub async fn save_edit(&self, id: &str) -> Result<Option<Comment>, ControllerError> {
        self.comments.save_edit(id, |content| async move { self.remote.update_comment(id, &content).await }).await
    }

    /// Deletes a top-level comment; its cached replies go with it.
    pub async fn delete(&self, id: &str) -> Result<bool, ControllerError> {
        let deleted = self.comments.delete(id, self.remote.delete_comment(id)).await?;
        if deleted {
            self.cache.with(|cache| cache.invalidate(&CacheKey::new(EntityKind::Reply, id)));
            if let Some(list) = self.replies.lock().unwrap_or_else(PoisonError::into_inner).remove(id) {
                list.unmount();
            }
        }
        Ok(deleted)
    }

    /// Loads the replies of one comment, from cache when already fetched.
    pub async fn load_replies(&self, parent_id: &str) -> Result<(), ControllerError> {
        let list = self.replies(parent_id);
        list.mount(self.remote.list_replies(parent_id)).await
    }

    pub async fn refresh_replies(&self, parent_id: &str) -> Result<(), ControllerError> {
        let list = self.replies(parent_id);
        list.refresh(self.remote.list_replies(parent_id)).await
    }

    /// Appends a reply. Replies of a parent that were never loaded are
    /// loaded first so the new reply lands in a complete list.
    pub async fn add_reply(&self, parent_id: &str, content: &str) -> Result<Comment, ControllerError> {
        let content = non_empty(content)?;
        let list = self.replies(parent_id);
        if !list.status().is_loaded() {
            debug!("loading replies of {parent_id} before replying");
            list.mount(self.remote.list_replies(parent_id)).await?;
        }
        let local = Comment::new_local(local_id(), content.clone(), self.author(), Some(parent_id.to_string()));
        list.create(local, Placement::Tail, self.remote.add_reply(parent_id, &content)).await
    }

    pub async fn edit_reply(&self, parent_id: &str, id: &str, content: &str) -> Result<Option<Comment>, ControllerError> {
        let content = non_empty(content)?;
        let patch = CommentPatch { content: Some(content.clone()) };
        self.replies(parent_id).update(id, patch, self.remote.update_reply(parent_id, id, &content)).await
    }

    pub async fn save_reply_edit(&self, parent_id: &str, id: &str) -> Result<Option<Comment>, ControllerError> {
        self.replies(parent_id)
            .save_edit(id, |content| async move { self.remote.update_reply(parent_id, id, &content).await })
            .await
    }

    pub async fn delete_reply(&self, parent_id: &str, id: &str) -> Result<bool, ControllerError> {
        self.replies(parent_id).delete(id, self.remote.delete_reply(parent_id, id)).await
    }
}
