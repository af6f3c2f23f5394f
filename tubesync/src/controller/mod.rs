//! Per-screen orchestration of cache, backend and render-ready view state.
//!
//! Every controller renders straight from its cache entry, so an optimistic
//! change applied to the cache is what the view shows. Controller-local state
//! (load status, inline errors, in-flight markers, edit drafts) lives next to
//! it and stops being updated once the controller is unmounted.

mod comments;
mod list;
mod playlists;
mod subscriptions;
mod tweets;

pub use comments::{CommentThread, ThreadView};
pub use list::{ListController, Placement};
pub use playlists::{PlaylistLibrary, PlaylistVideos};
pub use subscriptions::{SubscriptionContext, SubscriptionList};
pub use tweets::TweetFeed;

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::error::ControllerError;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum ListStatus {
    #[default]
    Unloaded,
    Loading,
    Loaded,
    Errored(String),
}

impl ListStatus {
    pub fn is_loaded(&self) -> bool {
        matches!(self, ListStatus::Loaded)
    }
}

/// Snapshot handed to the presentation layer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ListView<T> {
    pub status: ListStatus,
    /// Last load or mutation failure, rendered inline.
    pub error: Option<String>,
    pub items: Vec<T>,
    /// Ids with at least one mutation in flight.
    pub mutating: BTreeSet<String>,
    /// Failure message of the last mutation per entity id.
    pub failed: BTreeMap<String, String>,
    /// Open edit drafts by entity id.
    pub editing: BTreeMap<String, String>,
}

impl<T> ListView<T> {
    pub fn is_mutating(&self, id: &str) -> bool {
        self.mutating.contains(id)
    }
}

/// Trimmed user content, or `EmptyContent` when nothing is left.
pub(crate) fn non_empty(content: &str) -> Result<String, ControllerError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ControllerError::EmptyContent);
    }
    Ok(trimmed.to_string())
}
