use std::fmt;
use std::sync::Arc;

use log::debug;
use serde::Serialize;

use super::{ListController, ListView};
use crate::cache::{CacheKey, SharedCache};
use crate::context::AppContext;
use crate::error::{ControllerError, MutationKind};
use crate::model::{ChannelPatch, ChannelUser, Entity, EntityKind};
use crate::remote::RemoteStore;

/// Which side of a channel's subscription edges a list shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubscriptionContext {
    /// Users subscribed to the channel.
    Subscribers,
    /// Channels the channel owner is subscribed to.
    SubscribedTo,
}

impl SubscriptionContext {
    /// Owner scope of the cache key. Both contexts share the `subscription`
    /// kind, which is what lets a toggle reach every list holding a user.
    pub fn scope(self, channel_id: &str) -> String {
        match self {
            SubscriptionContext::Subscribers => format!("subscribers/{channel_id}"),
            SubscriptionContext::SubscribedTo => format!("subscribed/{channel_id}"),
        }
    }
}

impl fmt::Display for SubscriptionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionContext::Subscribers => write!(f, "subscribers"),
            SubscriptionContext::SubscribedTo => write!(f, "subscribed-to"),
        }
    }
}

pub struct SubscriptionList {
    remote: Arc<dyn RemoteStore>,
    cache: SharedCache,
    channel_id: String,
    context: SubscriptionContext,
    list: ListController<ChannelUser>,
}

impl SubscriptionList {
    pub fn new(ctx: &AppContext, channel_id: impl Into<String>, context: SubscriptionContext) -> Self {
        let channel_id = channel_id.into();
        let key = CacheKey::new(EntityKind::Subscription, context.scope(&channel_id));
        Self {
            remote: ctx.remote(),
            cache: ctx.cache().clone(),
            list: ListController::new(key, ctx.cache().clone(), ctx.session().clone()),
            channel_id,
            context,
        }
    }

    pub fn context(&self) -> SubscriptionContext {
        self.context
    }

    pub fn list(&self) -> &ListController<ChannelUser> {
        &self.list
    }

    pub fn view(&self) -> ListView<ChannelUser> {
        self.list.view()
    }

    pub async fn mount(&self) -> Result<(), ControllerError> {
        match self.context {
            SubscriptionContext::Subscribers => self.list.mount(self.remote.list_subscribers(&self.channel_id)).await,
            SubscriptionContext::SubscribedTo => self.list.mount(self.remote.list_subscribed_channels(&self.channel_id)).await,
        }
    }

    pub async fn refresh(&self) -> Result<(), ControllerError> {
        match self.context {
            SubscriptionContext::Subscribers => self.list.refresh(self.remote.list_subscribers(&self.channel_id)).await,
            SubscriptionContext::SubscribedTo => self.list.refresh(self.remote.list_subscribed_channels(&self.channel_id)).await,
        }
    }

    pub fn unmount(&self) {
        self.list.unmount();
    }

    /// Flips the viewer's subscription to `user_id` in this list and in every
    /// other cached subscription list that holds the same user.
    ///
    /// Returns the resulting state, or `None` when the user is not in this
    /// list (no request is made). A failure restores every copy it touched.
    pub async fn toggle(&self, user_id: &str) -> Result<Option<bool>, ControllerError> {
        self.list.begin(user_id, MutationKind::Toggle)?;
        let Some((_, current)) = self.cache.with(|cache| cache.find::<ChannelUser>(self.list.key(), user_id)) else {
            debug!("toggle of {user_id} skipped, not in {}", self.list.key());
            self.list.release(user_id, MutationKind::Toggle);
            return Ok(None);
        };
        let optimistic = !current.subscribed_to_subscriber;
        let matches_user = |user: &ChannelUser| user.id() == user_id;
        let snapshots = self.cache.with(|cache| {
            let snapshots = cache.find_across_keys::<ChannelUser, _>(EntityKind::Subscription, matches_user);
            let patch = ChannelPatch::subscribed(optimistic);
            cache.patch_across_keys::<ChannelUser, _>(EntityKind::Subscription, &patch, matches_user);
            snapshots
        });
        debug!("mirrored {user_id} -> {optimistic} into {} lists", snapshots.len());

        match self.remote.toggle_subscription(user_id).await {
            Ok(reported) => {
                let state = reported.unwrap_or(optimistic);
                if state != optimistic {
                    let patch = ChannelPatch::subscribed(state);
                    self.cache.with(|cache| cache.patch_across_keys::<ChannelUser, _>(EntityKind::Subscription, &patch, matches_user));
                }
                self.list.succeed(user_id, MutationKind::Toggle);
                Ok(Some(state))
            }
            Err(err) => {
                self.cache.with(|cache| {
                    for (key, snapshot) in snapshots {
                        cache.replace(&key, user_id, snapshot);
                    }
                });
                Err(self.list.fail(user_id, MutationKind::Toggle, err))
            }
        }
    }
}
