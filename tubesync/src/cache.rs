//! Session-scoped entity cache keyed by (entity kind, owner id).
//!
//! Every operation is synchronous and total: a missing key, a missing id or a
//! kind/type mismatch is reported as a value (`None`, `false`, `0`), never as
//! an error. Entries are replaced wholesale after a full fetch and patched in
//! place for single-entity mutations. Nothing is evicted; `clear` is the only
//! way entries go away besides explicit invalidation.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use itertools::Itertools;
use log::debug;

use crate::model::{ChannelUser, Comment, Entity, EntityKind, Playlist, Tweet, VideoSummary};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub kind: EntityKind,
    pub owner: String,
}

impl CacheKey {
    pub fn new(kind: EntityKind, owner: impl Into<String>) -> Self {
        Self { kind, owner: owner.into() }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.owner)
    }
}

/// Storage for one cached sequence.
#[derive(Clone, Debug)]
pub enum Records {
    Comments(Vec<Comment>),
    Tweets(Vec<Tweet>),
    Channels(Vec<ChannelUser>),
    Playlists(Vec<Playlist>),
    Videos(Vec<VideoSummary>),
}

/// Entities that have a `Records` variant.
pub trait Cached: Entity {
    fn wrap(items: Vec<Self>) -> Records;
    fn items(records: &Records) -> Option<&Vec<Self>>;
    fn items_mut(records: &mut Records) -> Option<&mut Vec<Self>>;
}

macro_rules! impl_cached {
    ($ty:ty => $variant:ident) => {
        impl Cached for $ty {
            fn wrap(items: Vec<Self>) -> Records {
                Records::$variant(items)
            }

            fn items(records: &Records) -> Option<&Vec<Self>> {
                match records {
                    Records::$variant(items) => Some(items),
                    _ => None,
                }
            }

            fn items_mut(records: &mut Records) -> Option<&mut Vec<Self>> {
                match records {
                    Records::$variant(items) => Some(items),
                    _ => None,
                }
            }
        }
    };
}

impl_cached!(Comment => Comments);
impl_cached!(Tweet => Tweets);
impl_cached!(ChannelUser => Channels);
impl_cached!(Playlist => Playlists);
impl_cached!(VideoSummary => Videos);

#[derive(Clone, Debug)]
struct CacheEntry {
    records: Records,
    fetched_at: Instant,
}

#[derive(Debug, Default)]
pub struct EntityCache {
    entries: HashMap<CacheKey, CacheEntry>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn items<T: Cached>(&self, key: &CacheKey) -> Option<&Vec<T>> {
        self.entries.get(key).and_then(|entry| T::items(&entry.records))
    }

    fn items_mut<T: Cached>(&mut self, key: &CacheKey) -> Option<&mut Vec<T>> {
        self.entries.get_mut(key).and_then(|entry| T::items_mut(&mut entry.records))
    }

    pub fn get<T: Cached>(&self, key: &CacheKey) -> Option<Vec<T>> {
        self.items::<T>(key).cloned()
    }

    pub fn contains<T: Cached>(&self, key: &CacheKey) -> bool {
        self.items::<T>(key).is_some()
    }

    /// Position and value of one entity.
    pub fn find<T: Cached>(&self, key: &CacheKey, id: &str) -> Option<(usize, T)> {
        let items = self.items::<T>(key)?;
        items.iter().position(|item| item.id() == id).map(|index| (index, items[index].clone()))
    }

    pub fn fetched_at(&self, key: &CacheKey) -> Option<Instant> {
        self.entries.get(key).map(|entry| entry.fetched_at)
    }

    /// Wholesale replace after a full list.
    pub fn put<T: Cached>(&mut self, key: CacheKey, items: Vec<T>) {
        debug!("cache put {key}: {} records", items.len());
        self.entries.insert(key, CacheEntry { records: T::wrap(items), fetched_at: Instant::now() });
    }

    /// Head insertion. No-op (returns false) when the key was never loaded, so a
    /// lone created entity never masquerades as a full fetch.
    pub fn prepend<T: Cached>(&mut self, key: &CacheKey, item: T) -> bool {
        self.insert_at(key, 0, item)
    }

    /// Tail insertion, same rules as `prepend`.
    pub fn push<T: Cached>(&mut self, key: &CacheKey, item: T) -> bool {
        self.insert_at(key, usize::MAX, item)
    }

    /// Inserts at `index` (clamped to the length). Refuses duplicates ids.
    pub fn insert_at<T: Cached>(&mut self, key: &CacheKey, index: usize, item: T) -> bool {
        let Some(items) = self.items_mut::<T>(key) else { return false };
        if items.iter().any(|existing| existing.id() == item.id()) {
            return false;
        }
        let index = index.min(items.len());
        items.insert(index, item);
        true
    }

    /// Applies `patch` to the entity with `id`. No-op if the id is not cached.
    pub fn patch<T: Cached>(&mut self, key: &CacheKey, id: &str, patch: &T::Patch) -> bool {
        match self.items_mut::<T>(key).and_then(|items| items.iter_mut().find(|item| item.id() == id)) {
            Some(item) => {
                item.apply(patch);
                true
            }
            None => false,
        }
    }

    /// Swaps the entity with `id` for `item`, keeping its position.
    pub fn replace<T: Cached>(&mut self, key: &CacheKey, id: &str, item: T) -> bool {
        match self.items_mut::<T>(key).and_then(|items| items.iter_mut().find(|existing| existing.id() == id)) {
            Some(slot) => {
                *slot = item;
                true
            }
            None => false,
        }
    }

    pub fn remove<T: Cached>(&mut self, key: &CacheKey, id: &str) -> Option<(usize, T)> {
        let items = self.items_mut::<T>(key)?;
        let index = items.iter().position(|item| item.id() == id)?;
        Some((index, items.remove(index)))
    }

    /// Reconciles the optimistic entity `local_id` with the server's copy.
    ///
    /// The server entity takes the optimistic slot; if a refetch already
    /// brought the server id in, the optimistic copy is dropped instead. Either
    /// way exactly one entity with the server id remains.
    pub fn settle<T: Cached>(&mut self, key: &CacheKey, local_id: &str, item: T) -> bool {
        let Some(items) = self.items_mut::<T>(key) else { return false };
        let local = items.iter().position(|existing| existing.id() == local_id);
        let server = items.iter().position(|existing| existing.id() == item.id());
        match (local, server) {
            (Some(local), None) => {
                items[local] = item;
                true
            }
            (Some(local), Some(server)) if local != server => {
                items[server] = item;
                items.remove(local);
                true
            }
            (_, Some(server)) => {
                items[server] = item;
                true
            }
            (None, None) => false,
        }
    }

    /// Patches every entity of `kind` matching `predicate`, whatever owner key
    /// it is cached under. Returns how many entities were patched.
    pub fn patch_across_keys<T, P>(&mut self, kind: EntityKind, patch: &T::Patch, predicate: P) -> usize
    where
        T: Cached,
        P: Fn(&T) -> bool,
    {
        let mut patched = 0;
        for (key, entry) in self.entries.iter_mut() {
            if key.kind != kind {
                continue;
            }
            let Some(items) = T::items_mut(&mut entry.records) else { continue };
            for item in items.iter_mut().filter(|item| predicate(item)) {
                item.apply(patch);
                patched += 1;
            }
        }
        patched
    }

    /// Every cached copy of `kind` matching `predicate`, with its key.
    pub fn find_across_keys<T, P>(&self, kind: EntityKind, predicate: P) -> Vec<(CacheKey, T)>
    where
        T: Cached,
        P: Fn(&T) -> bool,
    {
        let predicate = &predicate;
        self.entries
            .iter()
            .filter(|(key, _)| key.kind == kind)
            .sorted_by(|a, b| a.0.cmp(b.0))
            .filter_map(|(key, entry)| T::items(&entry.records).map(|items| (key, items)))
            .flat_map(move |(key, items)| {
                items.iter().filter(move |item| predicate(item)).map(move |item| (key.clone(), item.clone()))
            })
            .collect()
    }

    pub fn invalidate(&mut self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn invalidate_kind(&mut self, kind: EntityKind) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.kind != kind);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Handle shared by every controller of one application session.
#[derive(Clone, Debug, Default)]
pub struct SharedCache {
    inner: Arc<Mutex<EntityCache>>,
}

impl SharedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` with exclusive access. Callers must not await inside.
    pub fn with<R>(&self, f: impl FnOnce(&mut EntityCache) -> R) -> R {
        // A panic while holding the lock cannot leave a half-applied entry:
        // every operation above mutates a single Vec slot or replaces it.
        let mut cache = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut cache)
    }

    pub fn get<T: Cached>(&self, key: &CacheKey) -> Option<Vec<T>> {
        self.with(|cache| cache.get(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChannelPatch, TweetPatch, UserSummary};

    fn tweet(id: &str, content: &str) -> Tweet {
        Tweet { id: id.into(), content: content.into(), owner: UserSummary::from_id("u1"), created_at: None }
    }

    fn channel(id: &str, subscribed: bool) -> ChannelUser {
        ChannelUser { user: UserSummary::from_id(id), subscribed_to_subscriber: subscribed }
    }

    fn ids<T: Entity>(items: &[T]) -> Vec<&str> {
        items.iter().map(|item| item.id()).collect()
    }

    fn tweets_key() -> CacheKey {
        CacheKey::new(EntityKind::Tweet, "u1")
    }

    #[test]
    fn get_absent_and_put_replaces_wholesale() {
        let mut cache = EntityCache::new();
        assert!(cache.get::<Tweet>(&tweets_key()).is_none());
        cache.put(tweets_key(), vec![tweet("t1", "a"), tweet("t2", "b")]);
        cache.put(tweets_key(), vec![tweet("t3", "c")]);
        assert_eq!(ids(&cache.get::<Tweet>(&tweets_key()).unwrap()), vec!["t3"]);
    }

    #[test]
    fn kind_type_mismatch_reads_as_absent() {
        let mut cache = EntityCache::new();
        cache.put(tweets_key(), vec![tweet("t1", "a")]);
        assert!(cache.get::<Comment>(&tweets_key()).is_none());
        assert!(!cache.patch::<Comment>(&tweets_key(), "t1", &Default::default()));
    }

    #[test]
    fn prepend_requires_loaded_key_and_rejects_duplicates() {
        let mut cache = EntityCache::new();
        assert!(!cache.prepend(&tweets_key(), tweet("t1", "a")));
        cache.put(tweets_key(), vec![tweet("t1", "a")]);
        assert!(cache.prepend(&tweets_key(), tweet("t2", "b")));
        assert!(!cache.prepend(&tweets_key(), tweet("t1", "dup")));
        assert!(cache.push(&tweets_key(), tweet("t3", "c")));
        assert_eq!(ids(&cache.get::<Tweet>(&tweets_key()).unwrap()), vec!["t2", "t1", "t3"]);
    }

    #[test]
    fn patch_missing_id_is_noop() {
        let mut cache = EntityCache::new();
        cache.put(tweets_key(), vec![tweet("t1", "a")]);
        let patch = TweetPatch { content: Some("edited".into()) };
        assert!(!cache.patch::<Tweet>(&tweets_key(), "gone", &patch));
        assert!(cache.patch::<Tweet>(&tweets_key(), "t1", &patch));
        assert_eq!(cache.get::<Tweet>(&tweets_key()).unwrap()[0].content, "edited");
    }

    #[test]
    fn remove_then_insert_at_restores_order() {
        let mut cache = EntityCache::new();
        cache.put(tweets_key(), vec![tweet("t1", "a"), tweet("t2", "b"), tweet("t3", "c")]);
        let (index, removed) = cache.remove::<Tweet>(&tweets_key(), "t2").unwrap();
        assert_eq!(index, 1);
        assert!(cache.remove::<Tweet>(&tweets_key(), "t2").is_none());
        assert!(cache.insert_at(&tweets_key(), index, removed));
        assert_eq!(ids(&cache.get::<Tweet>(&tweets_key()).unwrap()), vec!["t1", "t2", "t3"]);
    }

    #[test]
    fn settle_leaves_exactly_one_server_copy() {
        let mut cache = EntityCache::new();
        cache.put(tweets_key(), vec![tweet("local-1", "hello"), tweet("t0", "old")]);
        assert!(cache.settle(&tweets_key(), "local-1", tweet("t9", "hello")));
        assert_eq!(ids(&cache.get::<Tweet>(&tweets_key()).unwrap()), vec!["t9", "t0"]);

        // a refetch raced ahead and already holds the server id
        cache.put(tweets_key(), vec![tweet("local-2", "x"), tweet("t10", "x")]);
        assert!(cache.settle(&tweets_key(), "local-2", tweet("t10", "x")));
        assert_eq!(ids(&cache.get::<Tweet>(&tweets_key()).unwrap()), vec!["t10"]);
    }

    #[test]
    fn patch_across_keys_spans_owner_scopes_of_one_kind() {
        let mut cache = EntityCache::new();
        let subscribers = CacheKey::new(EntityKind::Subscription, "subscribers/c1");
        let subscribed = CacheKey::new(EntityKind::Subscription, "subscribed/c1");
        cache.put(subscribers.clone(), vec![channel("u1", false), channel("u2", false)]);
        cache.put(subscribed.clone(), vec![channel("u1", false)]);
        cache.put(tweets_key(), vec![tweet("u1", "same id, other kind")]);

        let patch = ChannelPatch::subscribed(true);
        let patched = cache.patch_across_keys::<ChannelUser, _>(EntityKind::Subscription, &patch, |u| u.id() == "u1");
        assert_eq!(patched, 2);
        assert!(cache.get::<ChannelUser>(&subscribers).unwrap()[0].subscribed_to_subscriber);
        assert!(!cache.get::<ChannelUser>(&subscribers).unwrap()[1].subscribed_to_subscriber);
        assert!(cache.get::<ChannelUser>(&subscribed).unwrap()[0].subscribed_to_subscriber);

        let copies = cache.find_across_keys::<ChannelUser, _>(EntityKind::Subscription, |u| u.id() == "u1");
        assert_eq!(copies.len(), 2);
        assert_eq!(copies[0].0, subscribed);
    }

    #[test]
    fn invalidation() {
        let mut cache = EntityCache::new();
        cache.put(tweets_key(), vec![tweet("t1", "a")]);
        cache.put(CacheKey::new(EntityKind::Tweet, "u2"), Vec::<Tweet>::new());
        cache.put(CacheKey::new(EntityKind::Playlist, "u1"), Vec::<Playlist>::new());
        assert!(cache.fetched_at(&tweets_key()).is_some());
        assert!(cache.invalidate(&tweets_key()));
        assert!(!cache.invalidate(&tweets_key()));
        assert_eq!(cache.invalidate_kind(EntityKind::Tweet), 1);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
