use serde::Serialize;

use super::{Entity, UserSummary};

/// A user row inside a subscription list ("subscribers" or "subscribed to").
///
/// `subscribed_to_subscriber` is the viewer's edge towards this user as seen
/// from one list context. It is not a property of the user, so the same id
/// can appear in several cached lists and every copy has to be kept in step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelUser {
    #[serde(flatten)]
    pub user: UserSummary,
    pub subscribed_to_subscriber: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelPatch {
    pub subscribed_to_subscriber: Option<bool>,
}

impl ChannelPatch {
    pub fn subscribed(value: bool) -> Self {
        Self { subscribed_to_subscriber: Some(value) }
    }
}

impl Entity for ChannelUser {
    type Patch = ChannelPatch;

    fn id(&self) -> &str {
        &self.user.id
    }

    fn apply(&mut self, patch: &ChannelPatch) {
        if let Some(subscribed) = patch.subscribed_to_subscriber {
            self.subscribed_to_subscriber = subscribed;
        }
    }

    fn absorb_local(&mut self, local: &Self) {
        self.user.fill_missing(&local.user);
    }
}
