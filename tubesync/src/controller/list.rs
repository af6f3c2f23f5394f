use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};

use super::{ListStatus, ListView};
use crate::cache::{CacheKey, Cached, SharedCache};
use crate::error::{ControllerError, MutationKind, RemoteError};
use crate::model::{is_local_id, Editable};
use crate::session::{SessionAction, SessionHandle};

/// Where a created entity enters its list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    Head,
    Tail,
}

#[derive(Debug, Default)]
struct ViewState {
    status: ListStatus,
    error: Option<String>,
    alive: bool,
    in_flight: BTreeSet<(String, MutationKind)>,
    failed: BTreeMap<String, String>,
    drafts: BTreeMap<String, String>,
}

/// One list bound to one cache key.
///
/// Backend calls are passed in as futures that have not been polled yet, so
/// nothing goes on the wire before the optimistic change is in the cache,
/// and a call for an entity that turns out to be absent is simply dropped.
pub struct ListController<T: Cached> {
    key: CacheKey,
    cache: SharedCache,
    session: SessionHandle,
    state: Mutex<ViewState>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Cached> ListController<T> {
    pub fn new(key: CacheKey, cache: SharedCache, session: SessionHandle) -> Self {
        Self { key, cache, session, state: Mutex::new(ViewState::default()), _entity: PhantomData }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    fn state(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `f` to the view state unless the controller was unmounted.
    fn update_view(&self, f: impl FnOnce(&mut ViewState)) {
        let mut state = self.state();
        if state.alive {
            f(&mut state);
        }
    }

    pub fn status(&self) -> ListStatus {
        self.state().status.clone()
    }

    pub fn is_alive(&self) -> bool {
        self.state().alive
    }

    pub fn items(&self) -> Vec<T> {
        self.cache.get::<T>(&self.key).unwrap_or_default()
    }

    pub fn view(&self) -> ListView<T> {
        let items = self.items();
        let state = self.state();
        ListView {
            status: state.status.clone(),
            error: state.error.clone(),
            items,
            mutating: state.in_flight.iter().map(|(id, _)| id.clone()).collect(),
            failed: state.failed.clone(),
            editing: state.drafts.clone(),
        }
    }

    /// Shows the cached sequence when there is one; otherwise awaits `fetch`.
    pub async fn mount<F>(&self, fetch: F) -> Result<(), ControllerError>
    where
        F: Future<Output = Result<Vec<T>, RemoteError>>,
    {
        self.state().alive = true;
        if self.cache.with(|cache| cache.contains::<T>(&self.key)) {
            debug!("cache hit for {}", self.key);
            self.update_view(|state| {
                state.status = ListStatus::Loaded;
                state.error = None;
            });
            return Ok(());
        }
        debug!("cache miss for {}", self.key);
        self.load(fetch).await
    }

    /// Refetches and replaces the cache entry wholesale, mounting the
    /// controller if it was not.
    pub async fn refresh<F>(&self, fetch: F) -> Result<(), ControllerError>
    where
        F: Future<Output = Result<Vec<T>, RemoteError>>,
    {
        self.state().alive = true;
        self.load(fetch).await
    }

    async fn load<F>(&self, fetch: F) -> Result<(), ControllerError>
    where
        F: Future<Output = Result<Vec<T>, RemoteError>>,
    {
        self.update_view(|state| {
            state.status = ListStatus::Loading;
            state.error = None;
        });
        match fetch.await {
            Ok(items) => {
                debug!("loaded {} records for {}", items.len(), self.key);
                self.cache.with(|cache| cache.put(self.key.clone(), items));
                self.update_view(|state| state.status = ListStatus::Loaded);
                Ok(())
            }
            Err(err) => {
                warn!("loading {} failed: {err}", self.key);
                self.expire_if_unauthorized(&err);
                self.update_view(|state| {
                    state.status = ListStatus::Errored(err.to_string());
                    state.error = Some(err.to_string());
                });
                Err(err.into())
            }
        }
    }

    /// Marks the view dead. Responses still in flight keep reconciling the
    /// cache but no longer touch this controller's view state.
    pub fn unmount(&self) {
        let mut state = self.state();
        state.alive = false;
        state.status = ListStatus::Unloaded;
        state.error = None;
        state.failed.clear();
        state.drafts.clear();
    }

    /// Claims the `(id, kind)` affordance. Requires a loaded list.
    ///
    /// An entity whose create is unconfirmed only has a local id the backend
    /// does not know, so it cannot be updated or deleted until it settles.
    pub(crate) fn begin(&self, id: &str, kind: MutationKind) -> Result<(), ControllerError> {
        let mut state = self.state();
        if !state.status.is_loaded() {
            return Err(ControllerError::NotLoaded);
        }
        let pending_create = kind != MutationKind::Create
            && (is_local_id(id) || state.in_flight.contains(&(id.to_string(), MutationKind::Create)));
        if pending_create || !state.in_flight.insert((id.to_string(), kind)) {
            return Err(ControllerError::InFlight { id: id.to_string(), kind });
        }
        Ok(())
    }

    pub(crate) fn release(&self, id: &str, kind: MutationKind) {
        self.state().in_flight.remove(&(id.to_string(), kind));
    }

    pub(crate) fn succeed(&self, id: &str, kind: MutationKind) {
        info!("{kind} of {id} in {} confirmed", self.key);
        let mut state = self.state();
        state.in_flight.remove(&(id.to_string(), kind));
        if state.alive {
            state.failed.remove(id);
        }
    }

    /// Records a rolled-back mutation and hands back the error to surface.
    pub(crate) fn fail(&self, id: &str, kind: MutationKind, err: RemoteError) -> ControllerError {
        warn!("{kind} of {id} in {} rolled back: {err}", self.key);
        self.expire_if_unauthorized(&err);
        let mut state = self.state();
        state.in_flight.remove(&(id.to_string(), kind));
        if state.alive {
            state.error = Some(err.to_string());
            if kind != MutationKind::Create {
                state.failed.insert(id.to_string(), err.to_string());
            }
        }
        err.into()
    }

    fn expire_if_unauthorized(&self, err: &RemoteError) {
        if err.is_unauthorized() {
            if let Err(persist) = self.session.dispatch(SessionAction::Expire) {
                warn!("failed to persist expired session: {persist}");
            }
        }
    }

    /// Inserts `local` right away and settles it with the entity `call`
    /// returns, or removes it again when the call fails.
    pub async fn create<F>(&self, local: T, placement: Placement, call: F) -> Result<T, ControllerError>
    where
        F: Future<Output = Result<T, RemoteError>>,
    {
        let local_id = local.id().to_string();
        self.begin(&local_id, MutationKind::Create)?;
        let inserted = self.cache.with(|cache| match placement {
            Placement::Head => cache.prepend(&self.key, local.clone()),
            Placement::Tail => cache.push(&self.key, local.clone()),
        });
        if !inserted {
            self.release(&local_id, MutationKind::Create);
            return Err(ControllerError::NotLoaded);
        }
        match call.await {
            Ok(mut server) => {
                server.absorb_local(&local);
                debug!("settling {local_id} as {} in {}", server.id(), self.key);
                self.cache.with(|cache| cache.settle(&self.key, &local_id, server.clone()));
                self.succeed(&local_id, MutationKind::Create);
                Ok(server)
            }
            Err(err) => {
                self.cache.with(|cache| cache.remove::<T>(&self.key, &local_id));
                Err(self.fail(&local_id, MutationKind::Create, err))
            }
        }
    }

    /// Patches the entity in place, then merges what the backend returns.
    ///
    /// `Ok(None)` means the id is not in the list: nothing changed and `call`
    /// was never polled.
    pub async fn update<F>(&self, id: &str, patch: T::Patch, call: F) -> Result<Option<T>, ControllerError>
    where
        F: Future<Output = Result<Option<T>, RemoteError>>,
    {
        self.begin(id, MutationKind::Update)?;
        let Some((_, snapshot)) = self.cache.with(|cache| cache.find::<T>(&self.key, id)) else {
            debug!("update of {id} skipped, not in {}", self.key);
            self.release(id, MutationKind::Update);
            return Ok(None);
        };
        let mut optimistic = snapshot.clone();
        optimistic.apply(&patch);
        self.cache.with(|cache| cache.replace(&self.key, id, optimistic.clone()));
        match call.await {
            Ok(Some(mut server)) => {
                server.absorb_local(&optimistic);
                self.cache.with(|cache| cache.replace(&self.key, id, server.clone()));
                self.succeed(id, MutationKind::Update);
                Ok(Some(server))
            }
            Ok(None) => {
                self.succeed(id, MutationKind::Update);
                Ok(Some(optimistic))
            }
            Err(err) => {
                self.cache.with(|cache| cache.replace(&self.key, id, snapshot));
                Err(self.fail(id, MutationKind::Update, err))
            }
        }
    }

    /// Removes the entity right away and puts it back at its old position
    /// when the call fails. `Ok(false)` means the id was not in the list.
    pub async fn delete<F>(&self, id: &str, call: F) -> Result<bool, ControllerError>
    where
        F: Future<Output = Result<(), RemoteError>>,
    {
        self.begin(id, MutationKind::Delete)?;
        let Some((index, snapshot)) = self.cache.with(|cache| cache.remove::<T>(&self.key, id)) else {
            debug!("delete of {id} skipped, not in {}", self.key);
            self.release(id, MutationKind::Delete);
            return Ok(false);
        };
        match call.await {
            Ok(()) => {
                self.succeed(id, MutationKind::Delete);
                self.update_view(|state| {
                    state.drafts.remove(id);
                });
                Ok(true)
            }
            Err(err) => {
                self.cache.with(|cache| cache.insert_at(&self.key, index, snapshot));
                Err(self.fail(id, MutationKind::Delete, err))
            }
        }
    }

    pub fn draft(&self, id: &str) -> Option<String> {
        self.state().drafts.get(id).cloned()
    }

    pub fn set_draft(&self, id: &str, text: impl Into<String>) -> bool {
        let mut state = self.state();
        match state.drafts.get_mut(id) {
            Some(draft) => {
                *draft = text.into();
                true
            }
            None => false,
        }
    }

    pub fn cancel_edit(&self, id: &str) -> bool {
        self.state().drafts.remove(id).is_some()
    }
}

impl<T: Cached + Editable> ListController<T> {
    /// Opens an edit draft seeded with the entity's current content. Several
    /// entities can be in edit mode at once.
    pub fn begin_edit(&self, id: &str) -> bool {
        let Some((_, entity)) = self.cache.with(|cache| cache.find::<T>(&self.key, id)) else {
            return false;
        };
        let mut state = self.state();
        if !state.alive {
            return false;
        }
        state.drafts.entry(id.to_string()).or_insert_with(|| entity.content().to_string());
        true
    }

    /// Submits the draft of `id` through `call`. The draft is closed on
    /// success and kept open when the update fails. `Ok(None)` when there is
    /// no draft or the entity is gone.
    pub async fn save_edit<C, F>(&self, id: &str, call: C) -> Result<Option<T>, ControllerError>
    where
        C: FnOnce(String) -> F,
        F: Future<Output = Result<Option<T>, RemoteError>>,
    {
        let Some(draft) = self.draft(id) else { return Ok(None) };
        let content = super::non_empty(&draft)?;
        let saved = self.update(id, T::content_patch(content.clone()), call(content)).await?;
        self.update_view(|state| {
            state.drafts.remove(id);
        });
        Ok(saved)
    }
}
