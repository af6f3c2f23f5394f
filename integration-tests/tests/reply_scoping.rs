use integration_tests::support::*;
use tubesync::model::{Comment, EntityKind};
use tubesync::{CacheKey, ListStatus, RemoteError};

fn remote() -> std::sync::Arc<ScriptedRemote> {
    let remote = ScriptedRemote::new();
    remote.seed_comments("v1", vec![comment("c1", "top"), comment("c2", "other top")]);
    remote.seed_replies("c1", vec![reply("r1", "c1", "hi")]);
    remote.seed_replies("c2", vec![reply("r2", "c2", "hey"), reply("r3", "c2", "yo")]);
    remote
}

#[tokio::test]
async fn loading_replies_nests_them_under_their_parent() {
    let remote = remote();
    let ctx = signed_in(remote.clone());
    let thread = ctx.comment_thread("v1");
    thread.mount().await.unwrap();
    assert!(thread.view().comments.items.iter().all(|c| c.replies.is_empty()));

    thread.load_replies("c1").await.unwrap();

    let view = thread.view();
    let c1 = &view.comments.items[0];
    assert_eq!(c1.id, "c1");
    assert_eq!(c1.replies.len(), 1);
    assert_eq!(c1.replies[0].id, "r1");
    assert_eq!(c1.replies[0].content, "hi");
    assert!(c1.replies[0].replies.is_empty());
    assert!(view.comments.items[1].replies.is_empty());
    assert_eq!(view.reply_status("c1"), ListStatus::Loaded);
    assert_eq!(view.reply_status("c2"), ListStatus::Unloaded);
}

#[tokio::test]
async fn reply_lists_of_different_parents_are_independent() {
    let remote = remote();
    remote.fail_next("list_replies", RemoteError::Server { status: 503, message: "busy".into() });
    let ctx = signed_in(remote.clone());
    let thread = ctx.comment_thread("v1");
    thread.mount().await.unwrap();

    assert!(thread.load_replies("c1").await.is_err());
    thread.load_replies("c2").await.unwrap();

    let view = thread.view();
    assert!(matches!(view.reply_status("c1"), ListStatus::Errored(_)));
    assert_eq!(view.reply_status("c2"), ListStatus::Loaded);
    assert_eq!(view.comments.status, ListStatus::Loaded);
    assert_eq!(ids(&view.replies["c2"].items), vec!["r2", "r3"]);

    thread.delete_reply("c2", "r2").await.unwrap();
    assert_eq!(ids(&thread.view().replies["c2"].items), vec!["r3"]);
    assert!(thread.view().replies["c1"].items.is_empty());
    assert!(ctx.cache().get::<Comment>(&CacheKey::new(EntityKind::Reply, "c1")).is_none());
}

#[tokio::test]
async fn replying_to_an_unloaded_parent_loads_it_first_and_appends() {
    let remote = remote();
    remote.queue_ids(["r4"]);
    let ctx = signed_in(remote.clone());
    let thread = ctx.comment_thread("v1");
    thread.mount().await.unwrap();

    let created = thread.add_reply("c2", "me too").await.unwrap();

    assert_eq!(created.id, "r4");
    assert_eq!(created.parent_comment.as_deref(), Some("c2"));
    assert_eq!(remote.calls(), vec!["list_comments v1", "list_replies c2", "add_reply c2 me too"]);
    let view = thread.view();
    assert_eq!(ids(&view.replies["c2"].items), vec!["r2", "r3", "r4"]);
    // replies never show up among the top-level comments
    assert_eq!(ids(&view.comments.items), vec!["c1", "c2"]);

    thread.add_reply("c2", "again").await.unwrap();
    assert_eq!(remote.calls_to("list_replies"), 1);
}

#[tokio::test]
async fn reply_edits_stay_within_their_parent() {
    let remote = remote();
    let ctx = signed_in(remote.clone());
    let thread = ctx.comment_thread("v1");
    thread.mount().await.unwrap();
    thread.load_replies("c1").await.unwrap();
    thread.load_replies("c2").await.unwrap();

    let edited = thread.edit_reply("c2", "r3", "yo!").await.unwrap().unwrap();
    assert_eq!(edited.content, "yo!");
    assert_eq!(remote.calls().last().map(String::as_str), Some("update_reply c2 r3 yo!"));
    // an id that belongs to another parent is absent here, so nothing is sent
    assert_eq!(thread.edit_reply("c1", "r3", "nope").await.unwrap(), None);
    assert_eq!(remote.calls_to("update_reply"), 1);

    let replies = thread.replies("c1");
    assert!(replies.begin_edit("r1"));
    replies.set_draft("r1", "hi there");
    thread.save_reply_edit("c1", "r1").await.unwrap();
    let view = thread.view();
    assert_eq!(view.comments.items[0].replies[0].content, "hi there");
    assert_eq!(view.comments.items[1].replies[1].content, "yo!");
}

#[tokio::test]
async fn deleting_a_parent_drops_its_cached_replies() {
    let remote = remote();
    let ctx = signed_in(remote.clone());
    let thread = ctx.comment_thread("v1");
    thread.mount().await.unwrap();
    thread.load_replies("c1").await.unwrap();
    thread.load_replies("c2").await.unwrap();

    assert!(thread.delete("c1").await.unwrap());

    let cache = ctx.cache();
    assert!(cache.get::<Comment>(&CacheKey::new(EntityKind::Reply, "c1")).is_none());
    assert_eq!(cache.get::<Comment>(&CacheKey::new(EntityKind::Reply, "c2")).map(|r| r.len()), Some(2));
    let view = thread.view();
    assert!(!view.replies.contains_key("c1"));
    assert_eq!(ids(&view.comments.items), vec!["c2"]);
}
