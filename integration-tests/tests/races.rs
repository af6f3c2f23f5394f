use integration_tests::support::*;
use tubesync::model::{Comment, EntityKind};
use tubesync::{CacheKey, ControllerError, ListStatus, MutationKind, RemoteError};

fn remote() -> std::sync::Arc<ScriptedRemote> {
    let remote = ScriptedRemote::new();
    remote.seed_comments("v1", vec![comment("c1", "first"), comment("c2", "second")]);
    remote
}

fn cached_comments(ctx: &tubesync::AppContext) -> Vec<Comment> {
    ctx.cache().get(&CacheKey::new(EntityKind::Comment, "v1")).unwrap_or_default()
}

#[tokio::test]
async fn same_affordance_cannot_be_in_flight_twice() {
    let remote = remote();
    let ctx = signed_in(remote.clone());
    let thread = ctx.comment_thread("v1");
    thread.mount().await.unwrap();

    let release = remote.hold("update_comment");
    let (first, ()) = tokio::join!(thread.edit("c1", "one"), async {
        until(|| remote.calls_to("update_comment") == 1).await;
        let second = thread.edit("c1", "two").await.unwrap_err();
        assert_eq!(second, ControllerError::InFlight { id: "c1".into(), kind: MutationKind::Update });
        // a different entity is not blocked
        assert!(thread.delete("c2").await.unwrap());
        release.send(()).unwrap();
    });

    assert_eq!(first.unwrap().unwrap().content, "one");
    assert_eq!(remote.calls_to("update_comment"), 1);
    assert_eq!(ids(&thread.view().comments.items), vec!["c1"]);
    assert_eq!(thread.view().comments.items[0].content, "one");
}

#[tokio::test]
async fn an_unconfirmed_comment_cannot_be_edited_or_deleted() {
    let remote = remote();
    remote.queue_ids(["c9"]);
    let ctx = signed_in(remote.clone());
    let thread = ctx.comment_thread("v1");
    thread.mount().await.unwrap();

    let release = remote.hold("add_comment");
    let (posted, ()) = tokio::join!(thread.post("hello"), async {
        until(|| remote.calls_to("add_comment") == 1).await;
        let local = thread.view().comments.items[0].id.clone();
        let deleted = thread.delete(&local).await.unwrap_err();
        assert_eq!(deleted, ControllerError::InFlight { id: local.clone(), kind: MutationKind::Delete });
        let edited = thread.edit(&local, "changed").await.unwrap_err();
        assert_eq!(edited, ControllerError::InFlight { id: local, kind: MutationKind::Update });
        release.send(()).unwrap();
    });

    assert_eq!(posted.unwrap().id, "c9");
    assert_eq!(remote.calls_to("delete_comment"), 0);
    assert_eq!(remote.calls_to("update_comment"), 0);
    assert_eq!(ids(&cached_comments(&ctx)), vec!["c9", "c1", "c2"]);

    // once settled, the server id is the one to mutate
    assert!(thread.delete("c9").await.unwrap());
    assert_eq!(ids(&thread.view().comments.items), vec!["c1", "c2"]);
    assert!(thread.view().comments.mutating.is_empty());
}

#[tokio::test]
async fn a_late_update_never_resurrects_a_deleted_comment() {
    let remote = remote();
    let ctx = signed_in(remote.clone());
    let thread = ctx.comment_thread("v1");
    thread.mount().await.unwrap();

    let release = remote.hold("update_comment");
    let (update, ()) = tokio::join!(thread.edit("c1", "edited"), async {
        until(|| remote.calls_to("update_comment") == 1).await;
        assert!(thread.delete("c1").await.unwrap());
        release.send(()).unwrap();
    });

    assert_eq!(update.unwrap_err().remote(), Some(&RemoteError::NotFound("c1".into())));
    assert_eq!(ids(&thread.view().comments.items), vec!["c2"]);
    assert!(thread.view().comments.mutating.is_empty());
}

#[tokio::test]
async fn responses_after_unmount_still_reach_the_cache() {
    let remote = remote();
    remote.queue_ids(["c9"]);
    let ctx = signed_in(remote.clone());
    let thread = ctx.comment_thread("v1");
    thread.mount().await.unwrap();
    thread.comments().begin_edit("c2");

    let release = remote.hold("add_comment");
    let (posted, ()) = tokio::join!(thread.post("late"), async {
        until(|| remote.calls_to("add_comment") == 1).await;
        thread.unmount();
        release.send(()).unwrap();
    });

    assert_eq!(posted.unwrap().id, "c9");
    assert_eq!(ids(&cached_comments(&ctx)), vec!["c9", "c1", "c2"]);
    let view = thread.view().comments;
    assert_eq!(view.status, ListStatus::Unloaded);
    assert!(view.editing.is_empty());
    assert!(view.mutating.is_empty());
}

#[tokio::test]
async fn failures_after_unmount_roll_back_without_touching_the_view() {
    let remote = remote();
    remote.fail_next("delete_comment", RemoteError::Server { status: 500, message: "oops".into() });
    let ctx = signed_in(remote.clone());
    let thread = ctx.comment_thread("v1");
    thread.mount().await.unwrap();

    let release = remote.hold("delete_comment");
    let (deleted, ()) = tokio::join!(thread.delete("c1"), async {
        until(|| remote.calls_to("delete_comment") == 1).await;
        assert_eq!(ids(&cached_comments(&ctx)), vec!["c2"]);
        thread.unmount();
        release.send(()).unwrap();
    });

    assert!(deleted.is_err());
    assert_eq!(ids(&cached_comments(&ctx)), vec!["c1", "c2"]);
    let view = thread.view().comments;
    assert_eq!(view.error, None);
    assert!(view.failed.is_empty());

    // remounting renders the rolled-back cache without a refetch
    thread.mount().await.unwrap();
    assert_eq!(thread.view().comments.status, ListStatus::Loaded);
    assert_eq!(remote.calls_to("list_comments"), 1);
}

#[tokio::test]
async fn unauthorized_responses_expire_the_session_but_keep_the_user() {
    let remote = remote();
    remote.fail_next("list_comments", RemoteError::Unauthorized);
    let ctx = signed_in(remote.clone());
    let thread = ctx.comment_thread("v1");

    assert!(thread.mount().await.is_err());

    let session = ctx.session().current();
    assert!(!session.logged_in);
    assert_eq!(session.user, Some(viewer()));
}

#[tokio::test]
async fn logout_drops_every_cached_list() {
    let remote = remote();
    remote.seed_tweets("viewer", vec![tweet("t1", "gm")]);
    let ctx = signed_in(remote.clone());
    let thread = ctx.comment_thread("v1");
    thread.mount().await.unwrap();
    let feed = ctx.tweet_feed("viewer");
    feed.mount().await.unwrap();
    assert_eq!(ctx.cache().with(|cache| cache.len()), 2);

    ctx.logout().unwrap();

    assert!(ctx.cache().with(|cache| cache.is_empty()));
    assert_eq!(ctx.session().user(), None);
    assert!(!ctx.session().is_logged_in());
    ctx.comment_thread("v1").mount().await.unwrap();
    assert_eq!(remote.calls_to("list_comments"), 2);
}
