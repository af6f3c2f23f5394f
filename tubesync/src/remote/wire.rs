//! Wire shapes of the REST backend and their normalization into the model.
//!
//! Upstream payloads are inconsistent: owners arrive as an array of users, a
//! single user object, a bare id or a sibling `userDetails` object; ids come
//! as `_id` or `id`; playlist videos are ids or populated objects. Every such
//! variant is accepted here and folded into one canonical shape.

use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RemoteError;
use crate::model::{ChannelUser, Comment, Entity, Playlist, PlaylistDraft, PlaylistPatch, Tweet, UserSummary, VideoSummary};

/// `{ success, data, message }` wrapper around every response body.
#[derive(Debug, Default, Deserialize)]
pub struct Envelope {
    pub success: Option<bool>,
    #[serde(default)]
    pub data: Value,
    pub message: Option<String>,
}

impl Envelope {
    pub fn decode(body: &[u8]) -> Result<Self, RemoteError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        Ok(serde_json::from_slice(body)?)
    }

    /// The payload of a 2xx response, or `Validation` when the backend
    /// flagged the call as unsuccessful anyway.
    pub fn into_data(self) -> Result<Value, RemoteError> {
        match self.success {
            Some(false) => Err(RemoteError::Validation(self.message.unwrap_or_else(|| "request was rejected".into()))),
            _ => Ok(self.data),
        }
    }
}

/// Best-effort message of an error body; non-JSON bodies yield `None`.
pub fn error_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<Envelope>(body).ok().and_then(|e| e.message).filter(|m| !m.is_empty())
}

fn pick_id(mongo_id: Option<String>, id: Option<String>) -> String {
    mongo_id.or(id).unwrap_or_default()
}

fn parse_timestamp(value: Option<Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::String(text) => DateTime::parse_from_rfc3339(&text).ok().map(|t| t.with_timezone(&Utc)),
        Value::Number(millis) => millis.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUser {
    #[serde(rename = "_id")]
    mongo_id: Option<String>,
    id: Option<String>,
    #[serde(default)]
    username: Option<String>,
    full_name: Option<String>,
    avatar: Option<String>,
}

impl From<WireUser> for UserSummary {
    fn from(wire: WireUser) -> Self {
        UserSummary {
            id: pick_id(wire.mongo_id, wire.id),
            username: wire.username.unwrap_or_default(),
            full_name: wire.full_name,
            avatar: wire.avatar,
        }
    }
}

/// Any of the shapes a user reference takes on the wire.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UserRef {
    Id(String),
    Many(Vec<UserRef>),
    One(WireUser),
}

impl UserRef {
    fn into_summary(self) -> Option<UserSummary> {
        match self {
            UserRef::Id(id) => Some(UserSummary::from_id(id)),
            UserRef::Many(many) => many.into_iter().next().and_then(UserRef::into_summary),
            UserRef::One(user) => Some(user.into()),
        }
    }
}

fn owner_of(owner: Option<UserRef>, details: Option<UserRef>) -> UserSummary {
    let owner = owner.and_then(UserRef::into_summary);
    let details = details.and_then(UserRef::into_summary);
    match (owner, details) {
        (Some(mut owner), Some(details)) => {
            owner.fill_missing(&details);
            owner
        }
        (Some(owner), None) => owner,
        (None, Some(details)) => details,
        (None, None) => UserSummary::default(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ParentRef {
    Id(String),
    Object {
        #[serde(rename = "_id")]
        mongo_id: Option<String>,
        id: Option<String>,
    },
}

impl ParentRef {
    fn into_id(self) -> Option<String> {
        let id = match self {
            ParentRef::Id(id) => id,
            ParentRef::Object { mongo_id, id } => pick_id(mongo_id, id),
        };
        Some(id).filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireComment {
    #[serde(rename = "_id")]
    mongo_id: Option<String>,
    id: Option<String>,
    #[serde(default)]
    content: Option<String>,
    owner: Option<UserRef>,
    user_details: Option<UserRef>,
    created_at: Option<Value>,
    parent_comment: Option<ParentRef>,
}

impl From<WireComment> for Comment {
    fn from(wire: WireComment) -> Self {
        Comment {
            id: pick_id(wire.mongo_id, wire.id),
            content: wire.content.unwrap_or_default(),
            owner: owner_of(wire.owner, wire.user_details),
            created_at: parse_timestamp(wire.created_at),
            parent_comment: wire.parent_comment.and_then(ParentRef::into_id),
            replies: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTweet {
    #[serde(rename = "_id")]
    mongo_id: Option<String>,
    id: Option<String>,
    #[serde(default)]
    content: Option<String>,
    owner: Option<UserRef>,
    user_details: Option<UserRef>,
    created_at: Option<Value>,
}

impl From<WireTweet> for Tweet {
    fn from(wire: WireTweet) -> Self {
        Tweet {
            id: pick_id(wire.mongo_id, wire.id),
            content: wire.content.unwrap_or_default(),
            owner: owner_of(wire.owner, wire.user_details),
            created_at: parse_timestamp(wire.created_at),
        }
    }
}

/// Subscription rows come flat (the user itself) or nested under
/// `subscriber` / `channel` next to the subscription document's own id.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireChannelRow {
    subscriber: Option<UserRef>,
    channel: Option<UserRef>,
    subscribed_to_subscriber: Option<bool>,
    is_subscribed: Option<bool>,
    #[serde(flatten)]
    user: WireUser,
}

impl From<WireChannelRow> for ChannelUser {
    fn from(wire: WireChannelRow) -> Self {
        let nested = wire.subscriber.or(wire.channel).and_then(UserRef::into_summary);
        let user = nested.unwrap_or_else(|| wire.user.into());
        ChannelUser {
            user,
            subscribed_to_subscriber: wire.subscribed_to_subscriber.or(wire.is_subscribed).unwrap_or(false),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireVideo {
    #[serde(rename = "_id")]
    mongo_id: Option<String>,
    id: Option<String>,
    title: Option<String>,
    thumbnail: Option<String>,
    duration: Option<f64>,
    views: Option<u64>,
    owner: Option<UserRef>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VideoRef {
    Id(String),
    Object(WireVideo),
}

impl From<VideoRef> for VideoSummary {
    fn from(wire: VideoRef) -> Self {
        match wire {
            VideoRef::Id(id) => VideoSummary::from_id(id),
            VideoRef::Object(video) => VideoSummary {
                id: pick_id(video.mongo_id, video.id),
                title: video.title,
                thumbnail: video.thumbnail,
                duration: video.duration,
                views: video.views,
                owner: video.owner.and_then(UserRef::into_summary),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePlaylist {
    #[serde(rename = "_id")]
    mongo_id: Option<String>,
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    owner: Option<UserRef>,
    #[serde(alias = "videos")]
    video: Option<Vec<VideoRef>>,
}

impl From<WirePlaylist> for Playlist {
    fn from(wire: WirePlaylist) -> Self {
        Playlist {
            id: pick_id(wire.mongo_id, wire.id),
            name: wire.name.unwrap_or_default(),
            description: wire.description.unwrap_or_default(),
            owner_id: wire.owner.and_then(UserRef::into_summary).map(|u| u.id).filter(|id| !id.is_empty()),
            videos: wire.video.unwrap_or_default().into_iter().map(VideoSummary::from).collect(),
        }
    }
}

/// Canonical types with a wire counterpart.
pub trait FromWire: Entity {
    type Wire: DeserializeOwned + Into<Self>;
}

impl FromWire for Comment {
    type Wire = WireComment;
}

impl FromWire for Tweet {
    type Wire = WireTweet;
}

impl FromWire for ChannelUser {
    type Wire = WireChannelRow;
}

impl FromWire for Playlist {
    type Wire = WirePlaylist;
}

/// A list payload: an array, `null`, or a paginated `{ docs: [...] }` object.
pub fn list<T: FromWire>(data: Value) -> Result<Vec<T>, RemoteError> {
    let items = match data {
        Value::Null => return Ok(Vec::new()),
        Value::Object(mut page) if page.contains_key("docs") => page.remove("docs").unwrap_or(Value::Null),
        other => other,
    };
    if items.is_null() {
        return Ok(Vec::new());
    }
    let wire: Vec<T::Wire> = serde_json::from_value(items)?;
    Ok(wire.into_iter().map(Into::into).collect())
}

/// A single entity that must be present and carry an id.
pub fn one<T: FromWire>(data: Value) -> Result<T, RemoteError> {
    optional(data)?.ok_or_else(|| RemoteError::Malformed("response carries no entity".into()))
}

/// A single entity, or `None` when the backend merely acknowledged.
pub fn optional<T: FromWire>(data: Value) -> Result<Option<T>, RemoteError> {
    if !data.is_object() {
        return Ok(None);
    }
    let wire: T::Wire = serde_json::from_value(data)?;
    let entity: T = wire.into();
    Ok(Some(entity).filter(|e| !e.id().is_empty()))
}

/// New subscription state from a toggle response, if the backend reports one.
pub fn subscription_state(data: &Value) -> Option<bool> {
    match data {
        Value::Bool(state) => Some(*state),
        Value::Object(fields) => ["subscribed", "isSubscribed", "subscribedToSubscriber"]
            .iter()
            .find_map(|key| fields.get(*key).and_then(Value::as_bool)),
        _ => None,
    }
}

#[derive(Debug, Serialize)]
pub struct ContentBody<'a> {
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub struct PlaylistBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<Vec<String>>,
}

impl<'a> From<&'a PlaylistDraft> for PlaylistBody<'a> {
    fn from(draft: &'a PlaylistDraft) -> Self {
        PlaylistBody { name: Some(&draft.name), description: Some(&draft.description), video: Some(draft.video_ids.clone()) }
    }
}

impl<'a> From<&'a PlaylistPatch> for PlaylistBody<'a> {
    fn from(patch: &'a PlaylistPatch) -> Self {
        PlaylistBody { name: patch.name.as_deref(), description: patch.description.as_deref(), video: patch.video_ids() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn owner_variants_normalize_to_one_summary() {
        let as_array: Comment = one(json!({
            "_id": "c1", "content": "a",
            "owner": [{ "_id": "u1", "username": "alice", "avatar": "x.png" }]
        }))
        .unwrap();
        let as_object: Comment = one(json!({
            "id": "c1", "content": "a",
            "owner": { "_id": "u1", "username": "alice", "avatar": "x.png" }
        }))
        .unwrap();
        let as_details: Comment = one(json!({
            "_id": "c1", "content": "a",
            "owner": "u1",
            "userDetails": { "_id": "u1", "username": "alice", "avatar": "x.png" }
        }))
        .unwrap();
        assert_eq!(as_array.owner, as_object.owner);
        assert_eq!(as_array.owner, as_details.owner);
        assert_eq!(as_array.owner.username, "alice");

        let bare: Comment = one(json!({ "_id": "c2", "content": "b", "owner": "u9" })).unwrap();
        assert_eq!(bare.owner, UserSummary::from_id("u9"));
        assert!(!bare.owner.is_populated());
    }

    #[test]
    fn parent_and_timestamp() {
        let reply: Comment = one(json!({
            "_id": "r1", "content": "hi",
            "parentComment": { "_id": "c1" },
            "createdAt": "2024-03-01T10:00:00.000Z"
        }))
        .unwrap();
        assert_eq!(reply.parent_comment.as_deref(), Some("c1"));
        assert_eq!(reply.created_at.unwrap().to_rfc3339(), "2024-03-01T10:00:00+00:00");

        let top: Comment = one(json!({ "_id": "c1", "content": "x", "parentComment": null, "createdAt": "yesterday" })).unwrap();
        assert!(top.is_top_level());
        assert!(top.created_at.is_none());
    }

    #[test]
    fn list_shapes() {
        assert!(list::<Tweet>(Value::Null).unwrap().is_empty());
        let paged: Vec<Tweet> = list(json!({ "docs": [{ "_id": "t1", "content": "a" }], "page": 1 })).unwrap();
        assert_eq!(paged[0].id, "t1");
        assert!(matches!(list::<Tweet>(json!("nope")), Err(RemoteError::Malformed(_))));
    }

    #[test]
    fn playlist_videos_as_ids_or_objects() {
        let playlist: Playlist = one(json!({
            "_id": "p1", "name": "Watch Later", "owner": "u1",
            "video": ["v1", { "_id": "v2", "title": "Intro", "views": 12 }]
        }))
        .unwrap();
        assert_eq!(playlist.owner_id.as_deref(), Some("u1"));
        assert_eq!(playlist.video_ids(), vec!["v1", "v2"]);
        assert!(!playlist.videos[0].is_populated());
        assert_eq!(playlist.videos[1].views, Some(12));
    }

    #[test]
    fn subscriber_rows_flat_or_nested() {
        let rows: Vec<ChannelUser> = list(json!([
            { "_id": "u1", "username": "alice", "subscribedToSubscriber": true },
            { "_id": "sub-doc", "subscriber": { "_id": "u2", "username": "bob" } },
            { "_id": "sub-doc2", "channel": [{ "_id": "u3", "username": "carol" }], "isSubscribed": true }
        ]))
        .unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.user.id.as_str()).collect();
        assert_eq!(ids, vec!["u1", "u2", "u3"]);
        assert!(rows[0].subscribed_to_subscriber);
        assert!(!rows[1].subscribed_to_subscriber);
        assert!(rows[2].subscribed_to_subscriber);
    }

    #[test]
    fn acknowledgements_and_envelopes() {
        assert_eq!(optional::<Tweet>(json!({})).unwrap(), None);
        assert_eq!(optional::<Tweet>(json!("ok")).unwrap(), None);
        let rejected = Envelope::decode(br#"{"success":false,"message":"content is required"}"#).unwrap();
        assert_eq!(rejected.into_data(), Err(RemoteError::Validation("content is required".into())));
        assert_eq!(Envelope::decode(b"").unwrap().into_data(), Ok(Value::Null));
        assert_eq!(error_message(b"<html>"), None);
    }

    #[test]
    fn toggle_state_extraction() {
        assert_eq!(subscription_state(&json!(true)), Some(true));
        assert_eq!(subscription_state(&json!({ "isSubscribed": false })), Some(false));
        assert_eq!(subscription_state(&json!({ "_id": "s1" })), None);
        assert_eq!(subscription_state(&Value::Null), None);
    }

    #[test]
    fn playlist_patch_body_skips_absent_fields() {
        let patch = PlaylistPatch::videos(vec![VideoSummary::from_id("v1")]);
        let body = serde_json::to_value(PlaylistBody::from(&patch)).unwrap();
        assert_eq!(body, json!({ "video": ["v1"] }));
    }
}
