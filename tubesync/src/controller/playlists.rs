use std::future::Future;
use std::sync::Arc;

use super::{ListController, ListView, Placement};
use crate::cache::{CacheKey, SharedCache};
use crate::context::AppContext;
use crate::error::{ControllerError, MutationKind, RemoteError};
use crate::model::{local_id, EntityKind, Playlist, PlaylistDraft, PlaylistPatch, VideoSummary};
use crate::remote::RemoteStore;

/// Playlists owned by one user.
pub struct PlaylistLibrary {
    remote: Arc<dyn RemoteStore>,
    cache: SharedCache,
    user_id: String,
    list: ListController<Playlist>,
}

impl PlaylistLibrary {
    pub fn new(ctx: &AppContext, user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        let key = CacheKey::new(EntityKind::Playlist, user_id.clone());
        Self {
            remote: ctx.remote(),
            cache: ctx.cache().clone(),
            list: ListController::new(key, ctx.cache().clone(), ctx.session().clone()),
            user_id,
        }
    }

    pub fn list(&self) -> &ListController<Playlist> {
        &self.list
    }

    pub fn view(&self) -> ListView<Playlist> {
        self.list.view()
    }

    pub async fn mount(&self) -> Result<(), ControllerError> {
        self.list.mount(self.remote.list_playlists(&self.user_id)).await
    }

    pub async fn refresh(&self) -> Result<(), ControllerError> {
        self.list.refresh(self.remote.list_playlists(&self.user_id)).await
    }

    pub fn unmount(&self) {
        self.list.unmount();
    }

    /// Looks a playlist up by name, e.g. the "Watch Later" list.
    pub fn find_by_name(&self, name: &str) -> Option<Playlist> {
        self.list.items().into_iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub async fn create(&self, mut draft: PlaylistDraft) -> Result<Playlist, ControllerError> {
        draft.name = super::non_empty(&draft.name)?;
        if draft.owner_id.is_none() {
            draft.owner_id = Some(self.user_id.clone());
        }
        let local = draft.clone().into_local(local_id());
        self.list.create(local, Placement::Head, self.remote.create_playlist(&draft)).await
    }

    /// Renames or re-describes a playlist. Only the given fields are sent.
    pub async fn update(&self, id: &str, patch: PlaylistPatch) -> Result<Option<Playlist>, ControllerError> {
        if let Some(name) = &patch.name {
            super::non_empty(name)?;
        }
        let call = self.remote.update_playlist(id, &patch);
        self.list.update(id, patch.clone(), call).await
    }

    pub async fn delete(&self, id: &str) -> Result<bool, ControllerError> {
        let deleted = self.list.delete(id, self.remote.delete_playlist(id)).await?;
        if deleted {
            self.cache.with(|cache| cache.invalidate(&CacheKey::new(EntityKind::PlaylistVideo, id)));
        }
        Ok(deleted)
    }
}

/// The ordered videos of one playlist.
///
/// Every change sends the complete resulting id list; once the backend
/// accepts it, every cached copy of the playlist record is patched to match.
pub struct PlaylistVideos {
    remote: Arc<dyn RemoteStore>,
    cache: SharedCache,
    playlist_id: String,
    list: ListController<VideoSummary>,
}

impl PlaylistVideos {
    pub fn new(ctx: &AppContext, playlist_id: impl Into<String>) -> Self {
        let playlist_id = playlist_id.into();
        let key = CacheKey::new(EntityKind::PlaylistVideo, playlist_id.clone());
        Self {
            remote: ctx.remote(),
            cache: ctx.cache().clone(),
            list: ListController::new(key, ctx.cache().clone(), ctx.session().clone()),
            playlist_id,
        }
    }

    pub fn playlist_id(&self) -> &str {
        &self.playlist_id
    }

    pub fn list(&self) -> &ListController<VideoSummary> {
        &self.list
    }

    pub fn view(&self) -> ListView<VideoSummary> {
        self.list.view()
    }

    async fn fetch(&self) -> Result<Vec<VideoSummary>, RemoteError> {
        let videos = self.remote.get_playlist(&self.playlist_id).await?.videos;
        // keep cached playlist records in step with what was just fetched
        self.sync_playlists(&PlaylistPatch::videos(videos.clone()));
        Ok(videos)
    }

    pub async fn mount(&self) -> Result<(), ControllerError> {
        self.list.mount(self.fetch()).await
    }

    pub async fn refresh(&self) -> Result<(), ControllerError> {
        self.list.refresh(self.fetch()).await
    }

    pub fn unmount(&self) {
        self.list.unmount();
    }

    fn sync_playlists(&self, patch: &PlaylistPatch) -> usize {
        self.cache.with(|cache| cache.patch_across_keys::<Playlist, _>(EntityKind::Playlist, patch, |p| p.id == self.playlist_id))
    }

    /// Runs one change to the video list. Each change sends the whole id
    /// list, so a second one is refused with `InFlight` until the first
    /// settles.
    async fn exclusive<R>(&self, change: impl Future<Output = Result<R, ControllerError>>) -> Result<R, ControllerError> {
        self.list.begin(&self.playlist_id, MutationKind::Update)?;
        let result = change.await;
        self.list.release(&self.playlist_id, MutationKind::Update);
        result
    }

    /// Removes one video. `Ok(false)` when it is not in the playlist.
    pub async fn remove_video(&self, video_id: &str) -> Result<bool, ControllerError> {
        self.exclusive(async {
            let remaining: Vec<VideoSummary> = self.list.items().into_iter().filter(|v| v.id != video_id).collect();
            let patch = PlaylistPatch::videos(remaining);
            let call = async { self.remote.update_playlist(&self.playlist_id, &patch).await.map(|_| ()) };
            let removed = self.list.delete(video_id, call).await?;
            if removed {
                self.sync_playlists(&patch);
            }
            Ok(removed)
        })
        .await
    }

    /// Appends a video. `Ok(false)` when it is already in the playlist.
    pub async fn add_video(&self, video: VideoSummary) -> Result<bool, ControllerError> {
        self.exclusive(async {
            let mut videos = self.list.items();
            if videos.iter().any(|v| v.id == video.id) {
                return Ok(false);
            }
            videos.push(video.clone());
            let patch = PlaylistPatch::videos(videos);
            let call = async { self.remote.update_playlist(&self.playlist_id, &patch).await.map(|_| video.clone()) };
            self.list.create(video.clone(), Placement::Tail, call).await?;
            self.sync_playlists(&patch);
            Ok(true)
        })
        .await
    }
}
