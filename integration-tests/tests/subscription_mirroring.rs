use integration_tests::support::*;
use tubesync::controller::SubscriptionContext;
use tubesync::model::ChannelUser;
use tubesync::{AppContext, RemoteError};

fn flag(rows: &[ChannelUser], id: &str) -> Option<bool> {
    rows.iter().find(|row| row.user.id == id).map(|row| row.subscribed_to_subscriber)
}

fn remote() -> std::sync::Arc<ScriptedRemote> {
    let remote = ScriptedRemote::new();
    remote.seed_subscribers("ch1", vec![channel_user("u1", false), channel_user("u2", true)]);
    remote.seed_subscribed("ch1", vec![channel_user("u1", false), channel_user("u3", true)]);
    remote.seed_subscribers("ch2", vec![channel_user("u1", false)]);
    remote
}

async fn mounted(ctx: &AppContext, channel: &str, context: SubscriptionContext) -> tubesync::controller::SubscriptionList {
    let list = ctx.subscription_list(channel, context);
    list.mount().await.unwrap();
    list
}

#[tokio::test]
async fn toggle_in_subscribers_mirrors_into_subscribed_to() {
    let remote = remote();
    let ctx = signed_in(remote.clone());
    let subscribers = mounted(&ctx, "ch1", SubscriptionContext::Subscribers).await;
    let subscribed = mounted(&ctx, "ch1", SubscriptionContext::SubscribedTo).await;
    let elsewhere = mounted(&ctx, "ch2", SubscriptionContext::Subscribers).await;

    let release = remote.hold("toggle_subscription");
    let (state, ()) = tokio::join!(subscribers.toggle("u1"), async {
        until(|| remote.calls_to("toggle_subscription") == 1).await;
        assert_eq!(flag(&subscribers.view().items, "u1"), Some(true));
        assert_eq!(flag(&subscribed.view().items, "u1"), Some(true));
        assert_eq!(flag(&elsewhere.view().items, "u1"), Some(true));
        assert!(subscribers.view().is_mutating("u1"));
        release.send(()).unwrap();
    });

    assert_eq!(state.unwrap(), Some(true));
    assert_eq!(flag(&subscribed.view().items, "u1"), Some(true));
    assert_eq!(flag(&subscribed.view().items, "u3"), Some(true));
    assert_eq!(flag(&subscribers.view().items, "u2"), Some(true));
    assert_eq!(remote.calls_to("toggle_subscription"), 1);
}

#[tokio::test]
async fn toggle_in_subscribed_to_mirrors_into_subscribers() {
    let remote = remote();
    remote.seed_subscribed("ch1", vec![channel_user("u2", true)]);
    let ctx = signed_in(remote.clone());
    let subscribers = mounted(&ctx, "ch1", SubscriptionContext::Subscribers).await;
    let subscribed = mounted(&ctx, "ch1", SubscriptionContext::SubscribedTo).await;

    assert_eq!(subscribed.toggle("u2").await.unwrap(), Some(false));

    assert_eq!(flag(&subscribed.view().items, "u2"), Some(false));
    assert_eq!(flag(&subscribers.view().items, "u2"), Some(false));
}

#[tokio::test]
async fn mirroring_reaches_lists_that_are_not_mounted() {
    let remote = remote();
    let ctx = signed_in(remote.clone());
    let subscribers = mounted(&ctx, "ch1", SubscriptionContext::Subscribers).await;
    let subscribed = mounted(&ctx, "ch1", SubscriptionContext::SubscribedTo).await;
    subscribed.unmount();

    subscribers.toggle("u1").await.unwrap();

    let reopened = mounted(&ctx, "ch1", SubscriptionContext::SubscribedTo).await;
    assert_eq!(flag(&reopened.view().items, "u1"), Some(true));
    assert_eq!(remote.calls_to("list_subscribed_channels"), 1);
}

#[tokio::test]
async fn reported_server_state_wins_over_the_optimistic_flip() {
    let remote = remote();
    let ctx = signed_in(remote.clone());
    let subscribers = mounted(&ctx, "ch1", SubscriptionContext::Subscribers).await;
    let subscribed = mounted(&ctx, "ch1", SubscriptionContext::SubscribedTo).await;
    // the backend learns about a subscription to u1 the cached lists never saw
    remote.seed_subscribers("ch9", vec![channel_user("u1", true)]);

    assert_eq!(subscribers.toggle("u1").await.unwrap(), Some(false));

    assert_eq!(flag(&subscribers.view().items, "u1"), Some(false));
    assert_eq!(flag(&subscribed.view().items, "u1"), Some(false));
}

#[tokio::test]
async fn bare_acknowledgement_keeps_the_flip() {
    let remote = remote();
    remote.silent_toggles();
    let ctx = signed_in(remote.clone());
    let subscribers = mounted(&ctx, "ch1", SubscriptionContext::Subscribers).await;

    assert_eq!(subscribers.toggle("u2").await.unwrap(), Some(false));
    assert_eq!(flag(&subscribers.view().items, "u2"), Some(false));
}

#[tokio::test]
async fn failed_toggle_restores_every_copy() {
    let remote = remote();
    remote.fail_next("toggle_subscription", RemoteError::Network("timed out".into()));
    let ctx = signed_in(remote.clone());
    let subscribers = mounted(&ctx, "ch1", SubscriptionContext::Subscribers).await;
    let subscribed = mounted(&ctx, "ch1", SubscriptionContext::SubscribedTo).await;
    let elsewhere = mounted(&ctx, "ch2", SubscriptionContext::Subscribers).await;
    let before = (subscribers.view().items, subscribed.view().items, elsewhere.view().items);

    let err = subscribers.toggle("u1").await.unwrap_err();

    assert_eq!(err.remote(), Some(&RemoteError::Network("timed out".into())));
    assert_eq!((subscribers.view().items, subscribed.view().items, elsewhere.view().items), before);
    let view = subscribers.view();
    assert_eq!(view.failed.get("u1").map(String::as_str), Some("network error: timed out"));
    assert!(view.mutating.is_empty());
    // only the list the toggle came from shows the failure
    assert!(subscribed.view().failed.is_empty());
}

#[tokio::test]
async fn toggling_a_user_outside_the_list_sends_nothing() {
    let remote = remote();
    let ctx = signed_in(remote.clone());
    let subscribers = mounted(&ctx, "ch1", SubscriptionContext::Subscribers).await;

    assert_eq!(subscribers.toggle("u3").await.unwrap(), None);
    assert_eq!(remote.calls_to("toggle_subscription"), 0);
    assert!(subscribers.view().mutating.is_empty());
}
