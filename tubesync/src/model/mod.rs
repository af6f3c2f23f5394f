//! Canonical client-side shapes of the backend-owned entities.
//!
//! Everything in here is a transient copy: the backend owns the durable state
//! and the client only ever holds the last snapshot it fetched or the
//! optimistic value it is waiting to reconcile.

mod channel;
mod comment;
mod playlist;
mod tweet;
mod user;

pub use channel::{ChannelPatch, ChannelUser};
pub use comment::{Comment, CommentPatch};
pub use playlist::{Playlist, PlaylistDraft, PlaylistPatch, VideoSummary};
pub use tweet::{Tweet, TweetPatch};
pub use user::UserSummary;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

const LOCAL_ID_PREFIX: &str = "local-";

static NEXT_LOCAL_ID: AtomicU64 = AtomicU64::new(1);

/// Collection kinds the cache groups entities by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Comment,
    Reply,
    Tweet,
    Subscription,
    Playlist,
    PlaylistVideo,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Comment => write!(f, "comment"),
            EntityKind::Reply => write!(f, "reply"),
            EntityKind::Tweet => write!(f, "tweet"),
            EntityKind::Subscription => write!(f, "subscription"),
            EntityKind::Playlist => write!(f, "playlist"),
            EntityKind::PlaylistVideo => write!(f, "playlist-video"),
        }
    }
}

/// A record the cache and the controllers can track by id.
pub trait Entity: Clone + fmt::Debug + Send + Sync + 'static {
    /// Partial update applied in place; fields left as `None` are untouched.
    type Patch: Clone + fmt::Debug + Send + Sync;

    fn id(&self) -> &str;

    fn apply(&mut self, patch: &Self::Patch);

    /// Called on the authoritative copy returned by the server, with the
    /// local copy it replaces. Fills in whatever the server response left
    /// out (unpopulated owners, lazily loaded children).
    fn absorb_local(&mut self, _local: &Self) {}
}

/// Entities whose text body can be edited through a draft.
pub trait Editable: Entity {
    fn content(&self) -> &str;

    fn content_patch(content: String) -> Self::Patch;
}

/// Allocates an id for an optimistic entity. Unique for the process lifetime.
pub fn local_id() -> String {
    format!("{LOCAL_ID_PREFIX}{}", NEXT_LOCAL_ID.fetch_add(1, Ordering::Relaxed))
}

pub fn is_local_id(id: &str) -> bool {
    id.starts_with(LOCAL_ID_PREFIX)
}

/// Relative age label used next to comments and tweets.
pub fn time_ago(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - created_at).num_seconds().max(0);
    if seconds < 60 {
        return format!("{seconds}s ago");
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{minutes}m ago");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{hours}h ago");
    }
    format!("{}d ago", hours / 24)
}
