use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tubesync::model::{ChannelUser, Comment, Playlist, PlaylistDraft, PlaylistPatch, Tweet, UserSummary, VideoSummary};
use tubesync::remote::{Page, RemoteStore};
use tubesync::{AppContext, RemoteError, SessionAction, SessionHandle};

/// Timestamp the scripted backend stamps on everything it creates.
pub fn server_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn viewer() -> UserSummary {
    UserSummary { id: "viewer".into(), username: "viewer".into(), full_name: Some("Viewer One".into()), avatar: None }
}

pub fn user(id: &str) -> UserSummary {
    UserSummary { id: id.into(), username: format!("{id}-name"), full_name: None, avatar: None }
}

pub fn comment(id: &str, content: &str) -> Comment {
    Comment {
        id: id.into(),
        content: content.into(),
        owner: user("author"),
        created_at: Some(server_time()),
        parent_comment: None,
        replies: Vec::new(),
    }
}

pub fn reply(id: &str, parent: &str, content: &str) -> Comment {
    Comment { parent_comment: Some(parent.into()), ..comment(id, content) }
}

pub fn tweet(id: &str, content: &str) -> Tweet {
    Tweet { id: id.into(), content: content.into(), owner: viewer(), created_at: Some(server_time()) }
}

pub fn channel_user(id: &str, subscribed: bool) -> ChannelUser {
    ChannelUser { user: user(id), subscribed_to_subscriber: subscribed }
}

pub fn video(id: &str, title: &str) -> VideoSummary {
    VideoSummary { id: id.into(), title: Some(title.into()), ..VideoSummary::default() }
}

pub fn playlist(id: &str, owner: &str, videos: Vec<VideoSummary>) -> Playlist {
    Playlist { id: id.into(), name: format!("{id} list"), description: String::new(), owner_id: Some(owner.into()), videos }
}

pub fn ids<T: tubesync::model::Entity>(items: &[T]) -> Vec<String> {
    items.iter().map(|item| item.id().to_string()).collect()
}

/// A context over `remote` with the viewer signed in.
pub fn signed_in(remote: Arc<ScriptedRemote>) -> AppContext {
    let session = SessionHandle::ephemeral();
    session.dispatch(SessionAction::SetUserDetails(Some(viewer()))).unwrap();
    session.dispatch(SessionAction::SetLoggedIn(true)).unwrap();
    AppContext::new(remote, session)
}

#[derive(Default)]
struct Backend {
    comments: BTreeMap<String, Vec<Comment>>,
    replies: BTreeMap<String, Vec<Comment>>,
    tweets: BTreeMap<String, Vec<Tweet>>,
    subscribers: BTreeMap<String, Vec<ChannelUser>>,
    subscribed: BTreeMap<String, Vec<ChannelUser>>,
    viewer_subscriptions: BTreeSet<String>,
    playlists: BTreeMap<String, Playlist>,
    next_ids: VecDeque<String>,
    id_counter: u64,
    failures: HashMap<&'static str, VecDeque<RemoteError>>,
    calls: Vec<String>,
    ack_only_updates: bool,
    silent_toggles: bool,
}

impl Backend {
    fn assign_id(&mut self) -> String {
        self.next_ids.pop_front().unwrap_or_else(|| {
            self.id_counter += 1;
            format!("srv-{}", self.id_counter)
        })
    }
}

/// In-memory `RemoteStore` with failure injection, a call log and gates
/// that hold a call until the test releases it.
///
/// Every call is logged as `"<operation> <args>"` when it is first polled,
/// which is the moment an HTTP store would put the request on the wire.
#[derive(Default)]
pub struct ScriptedRemote {
    backend: Mutex<Backend>,
    gates: Mutex<HashMap<&'static str, VecDeque<oneshot::Receiver<()>>>>,
}

impl ScriptedRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn backend(&self) -> MutexGuard<'_, Backend> {
        self.backend.lock().unwrap()
    }

    pub fn seed_comments(&self, video_id: &str, comments: Vec<Comment>) {
        self.backend().comments.insert(video_id.into(), comments);
    }

    pub fn seed_replies(&self, parent_id: &str, replies: Vec<Comment>) {
        self.backend().replies.insert(parent_id.into(), replies);
    }

    pub fn seed_tweets(&self, user_id: &str, tweets: Vec<Tweet>) {
        self.backend().tweets.insert(user_id.into(), tweets);
    }

    pub fn seed_subscribers(&self, channel_id: &str, rows: Vec<ChannelUser>) {
        let mut backend = self.backend();
        backend.viewer_subscriptions.extend(rows.iter().filter(|r| r.subscribed_to_subscriber).map(|r| r.user.id.clone()));
        backend.subscribers.insert(channel_id.into(), rows);
    }

    pub fn seed_subscribed(&self, channel_id: &str, rows: Vec<ChannelUser>) {
        let mut backend = self.backend();
        backend.viewer_subscriptions.extend(rows.iter().filter(|r| r.subscribed_to_subscriber).map(|r| r.user.id.clone()));
        backend.subscribed.insert(channel_id.into(), rows);
    }

    pub fn seed_playlist(&self, playlist: Playlist) {
        self.backend().playlists.insert(playlist.id.clone(), playlist);
    }

    /// Ids handed out to created entities, in order, before falling back to `srv-<n>`.
    pub fn queue_ids<I: IntoIterator<Item = &'static str>>(&self, ids: I) {
        self.backend().next_ids.extend(ids.into_iter().map(String::from));
    }

    /// The next call of `op` fails with `err`, after passing its gate.
    pub fn fail_next(&self, op: &'static str, err: RemoteError) {
        self.backend().failures.entry(op).or_default().push_back(err);
    }

    /// The next call of `op` blocks until the returned sender fires.
    pub fn hold(&self, op: &'static str) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        self.gates.lock().unwrap().entry(op).or_default().push_back(gate);
        release
    }

    /// Updates answer with a bare acknowledgement instead of the entity.
    pub fn ack_only_updates(&self) {
        self.backend().ack_only_updates = true;
    }

    /// Toggles answer without reporting the new state.
    pub fn silent_toggles(&self) {
        self.backend().silent_toggles = true;
    }

    pub fn calls(&self) -> Vec<String> {
        self.backend().calls.clone()
    }

    pub fn calls_to(&self, op: &str) -> usize {
        self.backend().calls.iter().filter(|call| call.split(' ').next() == Some(op)).count()
    }

    pub fn stored_playlist(&self, id: &str) -> Option<Playlist> {
        self.backend().playlists.get(id).cloned()
    }

    async fn enter(&self, op: &'static str, args: &[&str]) -> Result<(), RemoteError> {
        let call = std::iter::once(op).chain(args.iter().copied()).collect::<Vec<_>>().join(" ");
        self.backend().calls.push(call);
        let gate = self.gates.lock().unwrap().get_mut(op).and_then(VecDeque::pop_front);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        let failure = self.backend().failures.get_mut(op).and_then(VecDeque::pop_front);
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn require(id: &str) -> Result<(), RemoteError> {
        tubesync::remote::require_id("owner", id).map(|_| ())
    }
}

fn edit_content(comments: &mut [Comment], id: &str, content: &str) -> Option<Comment> {
    let comment = comments.iter_mut().find(|c| c.id == id)?;
    comment.content = content.to_string();
    Some(comment.clone())
}

fn remove_by_id<T: tubesync::model::Entity>(items: &mut Vec<T>, id: &str) -> Result<(), RemoteError> {
    let index = items.iter().position(|item| item.id() == id).ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
    items.remove(index);
    Ok(())
}

#[async_trait]
impl RemoteStore for ScriptedRemote {
    async fn list_comments(&self, video_id: &str, _page: Option<Page>) -> Result<Vec<Comment>, RemoteError> {
        Self::require(video_id)?;
        self.enter("list_comments", &[video_id]).await?;
        Ok(self.backend().comments.get(video_id).cloned().unwrap_or_default())
    }

    async fn add_comment(&self, video_id: &str, content: &str) -> Result<Comment, RemoteError> {
        Self::require(video_id)?;
        self.enter("add_comment", &[video_id, content]).await?;
        let mut backend = self.backend();
        let id = backend.assign_id();
        // the backend answers with an unpopulated owner reference
        let created = Comment { owner: UserSummary::from_id("viewer"), ..comment(&id, content) };
        backend.comments.entry(video_id.into()).or_default().insert(0, created.clone());
        Ok(created)
    }

    async fn update_comment(&self, id: &str, content: &str) -> Result<Option<Comment>, RemoteError> {
        Self::require(id)?;
        self.enter("update_comment", &[id, content]).await?;
        let mut backend = self.backend();
        let ack_only = backend.ack_only_updates;
        let updated = backend.comments.values_mut().find_map(|list| edit_content(list, id, content));
        let updated = updated.ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        Ok((!ack_only).then_some(updated))
    }

    async fn delete_comment(&self, id: &str) -> Result<(), RemoteError> {
        Self::require(id)?;
        self.enter("delete_comment", &[id]).await?;
        let mut backend = self.backend();
        let list = backend.comments.values_mut().find(|list| list.iter().any(|c| c.id == id));
        remove_by_id(list.ok_or_else(|| RemoteError::NotFound(id.to_string()))?, id)
    }

    async fn list_replies(&self, parent_id: &str) -> Result<Vec<Comment>, RemoteError> {
        Self::require(parent_id)?;
        self.enter("list_replies", &[parent_id]).await?;
        Ok(self.backend().replies.get(parent_id).cloned().unwrap_or_default())
    }

    async fn add_reply(&self, parent_id: &str, content: &str) -> Result<Comment, RemoteError> {
        Self::require(parent_id)?;
        self.enter("add_reply", &[parent_id, content]).await?;
        let mut backend = self.backend();
        let id = backend.assign_id();
        let created = reply(&id, parent_id, content);
        backend.replies.entry(parent_id.into()).or_default().push(created.clone());
        Ok(created)
    }

    async fn update_reply(&self, parent_id: &str, id: &str, content: &str) -> Result<Option<Comment>, RemoteError> {
        Self::require(parent_id)?;
        self.enter("update_reply", &[parent_id, id, content]).await?;
        let mut backend = self.backend();
        let ack_only = backend.ack_only_updates;
        let list = backend.replies.get_mut(parent_id).ok_or_else(|| RemoteError::NotFound(parent_id.to_string()))?;
        let updated = edit_content(list, id, content).ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        Ok((!ack_only).then_some(updated))
    }

    async fn delete_reply(&self, parent_id: &str, id: &str) -> Result<(), RemoteError> {
        Self::require(parent_id)?;
        self.enter("delete_reply", &[parent_id, id]).await?;
        let mut backend = self.backend();
        let list = backend.replies.get_mut(parent_id).ok_or_else(|| RemoteError::NotFound(parent_id.to_string()))?;
        remove_by_id(list, id)
    }

    async fn list_tweets(&self, user_id: &str, page: Page) -> Result<Vec<Tweet>, RemoteError> {
        Self::require(user_id)?;
        self.enter("list_tweets", &[user_id]).await?;
        let tweets = self.backend().tweets.get(user_id).cloned().unwrap_or_default();
        let skip = (page.page.saturating_sub(1) * page.limit) as usize;
        Ok(tweets.into_iter().skip(skip).take(page.limit as usize).collect())
    }

    async fn add_tweet(&self, content: &str) -> Result<Tweet, RemoteError> {
        self.enter("add_tweet", &[content]).await?;
        let mut backend = self.backend();
        let id = backend.assign_id();
        let created = tweet(&id, content);
        backend.tweets.entry("viewer".into()).or_default().insert(0, created.clone());
        Ok(created)
    }

    async fn update_tweet(&self, id: &str, content: &str) -> Result<Option<Tweet>, RemoteError> {
        Self::require(id)?;
        self.enter("update_tweet", &[id, content]).await?;
        let mut backend = self.backend();
        let ack_only = backend.ack_only_updates;
        let updated = backend.tweets.values_mut().flat_map(|list| list.iter_mut()).find(|t| t.id == id).map(|t| {
            t.content = content.to_string();
            t.clone()
        });
        let updated = updated.ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        Ok((!ack_only).then_some(updated))
    }

    async fn delete_tweet(&self, id: &str) -> Result<(), RemoteError> {
        Self::require(id)?;
        self.enter("delete_tweet", &[id]).await?;
        let mut backend = self.backend();
        let list = backend.tweets.values_mut().find(|list| list.iter().any(|t| t.id == id));
        remove_by_id(list.ok_or_else(|| RemoteError::NotFound(id.to_string()))?, id)
    }

    async fn list_subscribers(&self, channel_id: &str) -> Result<Vec<ChannelUser>, RemoteError> {
        Self::require(channel_id)?;
        self.enter("list_subscribers", &[channel_id]).await?;
        Ok(self.backend().subscribers.get(channel_id).cloned().unwrap_or_default())
    }

    async fn list_subscribed_channels(&self, channel_id: &str) -> Result<Vec<ChannelUser>, RemoteError> {
        Self::require(channel_id)?;
        self.enter("list_subscribed_channels", &[channel_id]).await?;
        Ok(self.backend().subscribed.get(channel_id).cloned().unwrap_or_default())
    }

    async fn toggle_subscription(&self, user_id: &str) -> Result<Option<bool>, RemoteError> {
        Self::require(user_id)?;
        self.enter("toggle_subscription", &[user_id]).await?;
        let mut guard = self.backend();
        let backend = &mut *guard;
        let subscribed = if backend.viewer_subscriptions.remove(user_id) {
            false
        } else {
            backend.viewer_subscriptions.insert(user_id.to_string());
            true
        };
        for rows in backend.subscribers.values_mut().chain(backend.subscribed.values_mut()) {
            for row in rows.iter_mut().filter(|row| row.user.id == user_id) {
                row.subscribed_to_subscriber = subscribed;
            }
        }
        Ok((!backend.silent_toggles).then_some(subscribed))
    }

    async fn list_playlists(&self, user_id: &str) -> Result<Vec<Playlist>, RemoteError> {
        Self::require(user_id)?;
        self.enter("list_playlists", &[user_id]).await?;
        Ok(self.backend().playlists.values().filter(|p| p.owner_id.as_deref() == Some(user_id)).cloned().collect())
    }

    async fn get_playlist(&self, id: &str) -> Result<Playlist, RemoteError> {
        Self::require(id)?;
        self.enter("get_playlist", &[id]).await?;
        self.backend().playlists.get(id).cloned().ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }

    async fn create_playlist(&self, draft: &PlaylistDraft) -> Result<Playlist, RemoteError> {
        self.enter("create_playlist", &[draft.name.as_str()]).await?;
        let mut backend = self.backend();
        let id = backend.assign_id();
        let created = draft.clone().into_local(id.clone());
        backend.playlists.insert(id, created.clone());
        Ok(created)
    }

    async fn update_playlist(&self, id: &str, patch: &PlaylistPatch) -> Result<Option<Playlist>, RemoteError> {
        Self::require(id)?;
        let video_ids = patch.video_ids().map(|ids| ids.join(",")).unwrap_or_default();
        self.enter("update_playlist", &[id, video_ids.as_str()]).await?;
        let mut backend = self.backend();
        let ack_only = backend.ack_only_updates;
        let stored = backend.playlists.get_mut(id).ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        if let Some(name) = &patch.name {
            stored.name = name.clone();
        }
        if let Some(description) = &patch.description {
            stored.description = description.clone();
        }
        if let Some(ids) = patch.video_ids() {
            // the backend stores and returns bare video ids
            stored.videos = ids.into_iter().map(VideoSummary::from_id).collect();
        }
        Ok((!ack_only).then(|| stored.clone()))
    }

    async fn delete_playlist(&self, id: &str) -> Result<(), RemoteError> {
        Self::require(id)?;
        self.enter("delete_playlist", &[id]).await?;
        self.backend().playlists.remove(id).map(|_| ()).ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }
}

/// A request the mock HTTP backend received.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: String,
    /// Path as sent on the wire, percent-encoding intact.
    pub path: String,
    pub query: Option<String>,
    pub body: Value,
    pub authorization: Option<String>,
    pub cookie: Option<String>,
}

#[derive(Clone)]
struct Scripted {
    status: u16,
    body: Value,
    set_cookie: Option<String>,
}

#[derive(Clone, Default)]
struct MockState {
    routes: Arc<Mutex<HashMap<String, Scripted>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// axum server on an ephemeral port answering scripted JSON per route.
pub struct MockBackend {
    pub base_url: String,
    state: MockState,
}

pub const API_PREFIX: &str = "/api/v1";

impl MockBackend {
    pub async fn start() -> Self {
        let state = MockState::default();
        let app = Router::new().fallback(answer).with_state(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app.into_make_service()).await.unwrap() });
        Self { base_url: format!("http://{addr}{API_PREFIX}"), state }
    }

    /// Scripts the answer to `method` on `path` (relative to the API prefix).
    pub fn respond(&self, method: &str, path: &str, status: u16, body: Value) {
        self.script(method, path, Scripted { status, body, set_cookie: None });
    }

    pub fn respond_with_cookie(&self, method: &str, path: &str, status: u16, body: Value, cookie: &str) {
        self.script(method, path, Scripted { status, body, set_cookie: Some(cookie.to_string()) });
    }

    fn script(&self, method: &str, path: &str, scripted: Scripted) {
        self.state.routes.lock().unwrap().insert(format!("{method} {API_PREFIX}/{path}"), scripted);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> RecordedRequest {
        self.requests().pop().expect("no request reached the mock backend")
    }
}

/// Success envelope around `data`.
pub fn ok(data: Value) -> Value {
    json!({ "statusCode": 200, "success": true, "data": data, "message": "ok" })
}

pub fn failure(message: &str) -> Value {
    json!({ "success": false, "data": null, "message": message })
}

async fn answer(State(state): State<MockState>, method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    let text_header = |name: header::HeaderName| headers.get(name).and_then(|v| v.to_str().ok()).map(String::from);
    state.requests.lock().unwrap().push(RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(String::from),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
        authorization: text_header(header::AUTHORIZATION),
        cookie: text_header(header::COOKIE),
    });
    let scripted = state.routes.lock().unwrap().get(&format!("{method} {}", uri.path())).cloned();
    let Some(scripted) = scripted else {
        return (StatusCode::NOT_FOUND, Json(failure("no such route"))).into_response();
    };
    let status = StatusCode::from_u16(scripted.status).unwrap();
    let mut response = (status, Json(scripted.body)).into_response();
    if let Some(cookie) = scripted.set_cookie {
        response.headers_mut().insert(header::SET_COOKIE, cookie.parse().unwrap());
    }
    response
}

/// Yields to the runtime until `condition` holds. Used to line up a racing
/// mutation with a held backend call.
pub async fn until(mut condition: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never held");
}
