use std::convert::Infallible;

use serde::Serialize;

use super::{Entity, UserSummary};

/// Canonical video shape. Endpoints return playlist videos either populated
/// or as bare ids; bare ids become summaries with nothing but the id.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub id: String,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<f64>,
    pub views: Option<u64>,
    pub owner: Option<UserSummary>,
}

impl VideoSummary {
    pub fn from_id(id: impl Into<String>) -> Self {
        Self { id: id.into(), ..Self::default() }
    }

    pub fn is_populated(&self) -> bool {
        self.title.is_some()
    }
}

impl Entity for VideoSummary {
    // Videos are never edited through a playlist.
    type Patch = Infallible;

    fn id(&self) -> &str {
        &self.id
    }

    fn apply(&mut self, patch: &Infallible) {
        match *patch {}
    }

    fn absorb_local(&mut self, local: &Self) {
        if !self.is_populated() && local.is_populated() && self.id == local.id {
            *self = local.clone();
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner_id: Option<String>,
    pub videos: Vec<VideoSummary>,
}

impl Playlist {
    pub fn video_ids(&self) -> Vec<String> {
        self.videos.iter().map(|v| v.id.clone()).collect()
    }
}

/// Input of a playlist creation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaylistDraft {
    pub name: String,
    pub description: String,
    pub video_ids: Vec<String>,
    pub owner_id: Option<String>,
}

impl PlaylistDraft {
    pub fn into_local(self, id: String) -> Playlist {
        Playlist {
            id,
            name: self.name,
            description: self.description,
            owner_id: self.owner_id,
            videos: self.video_ids.into_iter().map(VideoSummary::from_id).collect(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlaylistPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub videos: Option<Vec<VideoSummary>>,
}

impl PlaylistPatch {
    pub fn videos(videos: Vec<VideoSummary>) -> Self {
        Self { videos: Some(videos), ..Self::default() }
    }

    pub fn video_ids(&self) -> Option<Vec<String>> {
        self.videos.as_ref().map(|videos| videos.iter().map(|v| v.id.clone()).collect())
    }
}

impl Entity for Playlist {
    type Patch = PlaylistPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn apply(&mut self, patch: &PlaylistPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(videos) = &patch.videos {
            self.videos = videos.clone();
        }
    }

    fn absorb_local(&mut self, local: &Self) {
        if self.owner_id.is_none() {
            self.owner_id = local.owner_id.clone();
        }
        for video in self.videos.iter_mut() {
            if let Some(known) = local.videos.iter().find(|v| v.id == video.id) {
                video.absorb_local(known);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated(id: &str, title: &str) -> VideoSummary {
        VideoSummary { id: id.into(), title: Some(title.into()), ..VideoSummary::default() }
    }

    #[test]
    fn server_ids_keep_known_video_details() {
        let local = Playlist {
            id: "p1".into(),
            name: "Later".into(),
            description: String::new(),
            owner_id: Some("u1".into()),
            videos: vec![populated("v1", "Intro"), populated("v2", "Outro")],
        };
        let mut server = Playlist {
            id: "p1".into(),
            name: "Later".into(),
            description: String::new(),
            owner_id: None,
            videos: vec![VideoSummary::from_id("v2"), VideoSummary::from_id("v3")],
        };
        server.absorb_local(&local);
        assert_eq!(server.owner_id.as_deref(), Some("u1"));
        assert_eq!(server.videos[0], populated("v2", "Outro"));
        assert!(!server.videos[1].is_populated());
    }

    #[test]
    fn patch_touches_only_given_fields() {
        let mut playlist = PlaylistDraft { name: "a".into(), description: "d".into(), ..Default::default() }
            .into_local("p".into());
        playlist.apply(&PlaylistPatch { name: Some("b".into()), ..Default::default() });
        assert_eq!(playlist.name, "b");
        assert_eq!(playlist.description, "d");
    }
}
