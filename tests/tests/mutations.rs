//! Per-operation coverage: the optimistic apply, the confirmed outcome, and
//! the exact shape of each rollback.

use encore_client::{
    api::{CommentId, Error, SortMethod, SubjectId},
    MutationKind, Notice, PageLoad, PostCommentArgs,
};
use tests::{new_cache, subject, user};

fn post_args(
    subject: SubjectId,
    parent_id: Option<CommentId>,
    body: &str,
) -> PostCommentArgs {
    PostCommentArgs {
        subject,
        sort: SortMethod::Newest,
        parent_id,
        body: String::from(body),
        mentions: Vec::new(),
        track_timestamp_s: None,
    }
}

#[tokio::test]
async fn posted_reply_lands_under_its_parent() {
    let owner = user();
    let s = subject();
    let cache = new_cache(owner);
    let parent = cache.backend().admin_post_root(s, owner, "root");
    cache
        .load_more_comments(s, SortMethod::Newest)
        .await
        .unwrap();

    let confirmed = cache
        .post_comment(post_args(s, Some(parent), "me too"))
        .await
        .unwrap();

    let entity = cache.comment(&parent).unwrap();
    let entity = entity.as_comment().unwrap();
    assert_eq!(entity.reply_count, 1);
    assert_eq!(entity.loaded_replies()[0].id, confirmed);
    assert_eq!(cache.comment(&confirmed).unwrap().message(), "me too");
    assert_eq!(cache.count(&s).unwrap().current, 1);
    assert!(cache.backend().test_comment_exists(confirmed));
}

#[tokio::test]
async fn rejected_reply_rolls_back_the_parent_projection() {
    let owner = user();
    let s = subject();
    let cache = new_cache(owner);
    let parent = cache.backend().admin_post_root(s, owner, "root");
    cache
        .load_more_comments(s, SortMethod::Newest)
        .await
        .unwrap();
    cache
        .backend()
        .fail_next(Error::Transport(String::from("timeout")));

    let err = cache
        .post_comment(post_args(s, Some(parent), "me too"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, MutationKind::Post);

    let entity = cache.comment(&parent).unwrap();
    let entity = entity.as_comment().unwrap();
    assert_eq!(entity.reply_count, 0);
    assert!(entity.loaded_replies().is_empty());
    assert_eq!(cache.count(&s).unwrap().current, 0);
    assert_eq!(
        cache.drain_notices(),
        vec![Notice::MutationFailed(MutationKind::Post)]
    );
}

#[tokio::test]
async fn empty_comment_body_is_rejected_and_rolled_back() {
    let owner = user();
    let s = subject();
    let cache = new_cache(owner);

    let err = cache
        .post_comment(post_args(s, None, ""))
        .await
        .unwrap_err();
    assert!(matches!(err.source, Error::Validation(_)));
    assert!(cache.comment_ids(s, SortMethod::Newest).is_empty());
}

#[tokio::test]
async fn server_assigned_root_id_replaces_the_provisional_one() {
    let owner = user();
    let s = subject();
    let cache = new_cache(owner);
    cache.backend().test_reassign_posted_ids(true);

    let confirmed = cache
        .post_comment(post_args(s, None, "hello"))
        .await
        .unwrap();

    assert_eq!(cache.comment_ids(s, SortMethod::Newest), vec![confirmed]);
    let entity = cache.comment(&confirmed).unwrap();
    assert_eq!(entity.id(), confirmed);
    assert!(cache.backend().test_comment_exists(confirmed));
    // no orphan left under the provisional identity
    assert_eq!(cache.entities.len(), 1);
}

#[tokio::test]
async fn server_assigned_reply_id_is_rewritten_in_the_parent() {
    let owner = user();
    let s = subject();
    let cache = new_cache(owner);
    let parent = cache.backend().admin_post_root(s, owner, "root");
    cache
        .load_more_comments(s, SortMethod::Newest)
        .await
        .unwrap();
    cache.backend().test_reassign_posted_ids(true);

    let confirmed = cache
        .post_comment(post_args(s, Some(parent), "me too"))
        .await
        .unwrap();

    let entity = cache.comment(&parent).unwrap();
    let replies = entity.as_comment().unwrap().loaded_replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].id, confirmed);
    assert!(cache.comment(&confirmed).is_some());
}

#[tokio::test]
async fn edit_patches_message_and_mentions_in_place() {
    let owner = user();
    let mentioned = user();
    let s = subject();
    let cache = new_cache(owner);
    let c = cache.backend().admin_post_root(s, owner, "typo");
    cache
        .load_more_comments(s, SortMethod::Newest)
        .await
        .unwrap();

    cache
        .edit_comment(c, String::from("fixed"), vec![mentioned])
        .await
        .unwrap();

    let entity = cache.comment(&c).unwrap();
    assert_eq!(entity.message(), "fixed");
    assert_eq!(entity.mentions(), [mentioned]);
    assert!(entity.is_edited());
    assert!(cache.drain_notices().is_empty());
}

#[tokio::test]
async fn failed_edit_restores_the_previous_message() {
    let owner = user();
    let s = subject();
    let cache = new_cache(owner);
    let c = cache.backend().admin_post_root(s, owner, "typo");
    cache
        .load_more_comments(s, SortMethod::Newest)
        .await
        .unwrap();
    cache
        .backend()
        .fail_next(Error::Transport(String::from("timeout")));

    let err = cache
        .edit_comment(c, String::from("fixed"), Vec::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, MutationKind::Edit);

    let entity = cache.comment(&c).unwrap();
    assert_eq!(entity.message(), "typo");
    assert!(!entity.is_edited());
    assert_eq!(
        cache.drain_notices(),
        vec![Notice::MutationFailed(MutationKind::Edit)]
    );
}

#[tokio::test]
async fn reacting_toggles_count_and_flags() {
    let owner = user();
    let s = subject();
    let cache = new_cache(owner);
    let c = cache.backend().admin_post_root(s, owner, "hello");
    cache
        .load_more_comments(s, SortMethod::Newest)
        .await
        .unwrap();

    // the owner of the subject liking their own track sets the artist flag
    cache.react_comment(c, true, true).await.unwrap();
    let entity = cache.comment(&c).unwrap();
    assert_eq!(entity.react_count(), 1);
    assert!(entity.is_current_user_reacted());
    assert!(entity.is_artist_reacted());

    cache.react_comment(c, false, true).await.unwrap();
    let entity = cache.comment(&c).unwrap();
    assert_eq!(entity.react_count(), 0);
    assert!(!entity.is_current_user_reacted());
    assert!(!entity.is_artist_reacted());
}

#[tokio::test]
async fn failed_reaction_restores_count_and_flags() {
    let owner = user();
    let s = subject();
    let cache = new_cache(owner);
    let c = cache.backend().admin_post_root(s, owner, "hello");
    cache.backend().admin_set_react_count(c, 3);
    cache
        .load_more_comments(s, SortMethod::Newest)
        .await
        .unwrap();
    cache
        .backend()
        .fail_next(Error::Transport(String::from("timeout")));

    let err = cache.react_comment(c, true, false).await.unwrap_err();
    assert_eq!(err.kind, MutationKind::React);

    let entity = cache.comment(&c).unwrap();
    assert_eq!(entity.react_count(), 3);
    assert!(!entity.is_current_user_reacted());
}

#[tokio::test]
async fn unpinning_clears_the_pinned_registry() {
    let owner = user();
    let s = subject();
    let cache = new_cache(owner);
    let c = cache.backend().admin_post_root(s, owner, "hello");
    cache
        .load_more_comments(s, SortMethod::Newest)
        .await
        .unwrap();

    cache.pin_comment(s, SortMethod::Newest, c, true).await.unwrap();
    assert_eq!(cache.pinned_comment(&s), Some(c));

    cache
        .pin_comment(s, SortMethod::Newest, c, false)
        .await
        .unwrap();
    assert_eq!(cache.pinned_comment(&s), None);
    assert!(!cache.comment(&c).unwrap().as_comment().unwrap().is_pinned);
}

#[tokio::test]
async fn failed_pin_invalidates_the_list_for_a_reload() {
    let owner = user();
    let s = subject();
    let cache = new_cache(owner);
    let a = cache.backend().admin_post_root(s, owner, "a");
    let b = cache.backend().admin_post_root(s, owner, "b");
    cache
        .load_more_comments(s, SortMethod::Newest)
        .await
        .unwrap();
    cache
        .backend()
        .fail_next(Error::Transport(String::from("timeout")));

    let err = cache
        .pin_comment(s, SortMethod::Newest, a, true)
        .await
        .unwrap_err();
    assert_eq!(err.kind, MutationKind::Pin);
    assert_eq!(cache.pinned_comment(&s), None);
    // the optimistic reorder is not invertible, so the pages were dropped
    assert!(cache.comment_ids(s, SortMethod::Newest).is_empty());

    assert_eq!(
        cache
            .load_more_comments(s, SortMethod::Newest)
            .await
            .unwrap(),
        PageLoad::Fetched(2)
    );
    assert_eq!(cache.comment_ids(s, SortMethod::Newest), vec![b, a]);
}

#[tokio::test]
async fn deleted_reply_is_filtered_from_its_parent() {
    let owner = user();
    let s = subject();
    let cache = new_cache(owner);
    let parent = cache.backend().admin_post_root(s, owner, "root");
    let r = cache.backend().admin_post_reply(parent, owner, "reply");
    cache
        .load_more_comments(s, SortMethod::Newest)
        .await
        .unwrap();
    cache.refresh_count(s).await.unwrap();

    cache.delete_comment(s, SortMethod::Newest, r).await.unwrap();

    let entity = cache.comment(&parent).unwrap();
    let entity = entity.as_comment().unwrap();
    assert_eq!(entity.reply_count, 0);
    assert!(entity.loaded_replies().is_empty());
    assert!(cache.comment(&r).is_none());
    assert_eq!(cache.count(&s).unwrap().current, 1);
    assert!(!cache.backend().test_comment_exists(r));
}

#[tokio::test]
async fn failed_reply_delete_refetches_the_parents_replies() {
    let owner = user();
    let s = subject();
    let cache = new_cache(owner);
    let parent = cache.backend().admin_post_root(s, owner, "root");
    let r = cache.backend().admin_post_reply(parent, owner, "reply");
    cache
        .load_more_comments(s, SortMethod::Newest)
        .await
        .unwrap();
    cache.refresh_count(s).await.unwrap();
    assert_eq!(cache.count(&s).unwrap().current, 2);
    cache
        .backend()
        .fail_next(Error::Transport(String::from("timeout")));

    let err = cache
        .delete_comment(s, SortMethod::Newest, r)
        .await
        .unwrap_err();
    assert_eq!(err.kind, MutationKind::Delete);
    assert_eq!(cache.count(&s).unwrap().current, 2);
    // rather than reconstruct the filtered list, the projection is reset
    let entity = cache.comment(&parent).unwrap();
    assert!(entity.as_comment().unwrap().replies.is_none());

    assert_eq!(
        cache.load_more_replies(parent).await.unwrap(),
        PageLoad::Fetched(1)
    );
    let entity = cache.comment(&parent).unwrap();
    assert_eq!(entity.as_comment().unwrap().loaded_replies()[0].id, r);
}

#[tokio::test]
async fn reported_comment_disappears_without_a_tombstone() {
    let owner = user();
    let s = subject();
    let cache = new_cache(owner);
    let bad = cache.backend().admin_post_root(s, owner, "spam");
    let good = cache.backend().admin_post_root(s, owner, "fine");
    cache
        .load_more_comments(s, SortMethod::Newest)
        .await
        .unwrap();
    cache.refresh_count(s).await.unwrap();

    cache
        .report_comment(s, SortMethod::Newest, bad)
        .await
        .unwrap();

    assert_eq!(cache.comment_ids(s, SortMethod::Newest), vec![good]);
    assert!(cache.comment(&bad).is_none());
    assert_eq!(cache.count(&s).unwrap().current, 1);
}

#[tokio::test]
async fn failed_report_restores_the_comment() {
    let owner = user();
    let s = subject();
    let cache = new_cache(owner);
    let bad = cache.backend().admin_post_root(s, owner, "spam");
    let good = cache.backend().admin_post_root(s, owner, "fine");
    cache
        .load_more_comments(s, SortMethod::Newest)
        .await
        .unwrap();
    cache.refresh_count(s).await.unwrap();
    cache
        .backend()
        .fail_next(Error::Transport(String::from("timeout")));

    let err = cache
        .report_comment(s, SortMethod::Newest, bad)
        .await
        .unwrap_err();
    assert_eq!(err.kind, MutationKind::Report);

    assert!(cache.comment(&bad).is_some());
    assert_eq!(cache.count(&s).unwrap().current, 2);
    // the list was dropped, so the reload shows both comments again
    assert!(cache.comment_ids(s, SortMethod::Newest).is_empty());
    cache
        .load_more_comments(s, SortMethod::Newest)
        .await
        .unwrap();
    assert_eq!(cache.comment_ids(s, SortMethod::Newest), vec![good, bad]);
}

#[tokio::test]
async fn subject_notification_toggle_is_remembered() {
    let owner = user();
    let s = subject();
    let cache = new_cache(owner);

    cache
        .set_subject_notification_setting(s, true)
        .await
        .unwrap();
    assert!(cache.notification_setting(s).await.unwrap());

    // the read is served from cache, so a queued failure is never consumed
    cache
        .backend()
        .fail_next(Error::Transport(String::from("unreachable")));
    assert!(cache.notification_setting(s).await.unwrap());
}

#[tokio::test]
async fn failed_subject_notification_toggle_refetches_the_truth() {
    let owner = user();
    let s = subject();
    let cache = new_cache(owner);
    cache
        .backend()
        .fail_next(Error::Transport(String::from("timeout")));

    let err = cache
        .set_subject_notification_setting(s, true)
        .await
        .unwrap_err();
    assert_eq!(err.kind, MutationKind::SubjectNotificationSetting);
    assert_eq!(
        cache.drain_notices(),
        vec![Notice::MutationFailed(
            MutationKind::SubjectNotificationSetting
        )]
    );

    // the setting was unknown before the toggle, so the next read refetches
    assert!(!cache.notification_setting(s).await.unwrap());
}

#[tokio::test]
async fn comment_notification_toggle_flips_the_entity_flag() {
    let owner = user();
    let s = subject();
    let cache = new_cache(owner);
    let c = cache.backend().admin_post_root(s, owner, "hello");
    cache
        .load_more_comments(s, SortMethod::Newest)
        .await
        .unwrap();

    cache.set_comment_notification_setting(c, true).await.unwrap();
    assert!(cache.comment(&c).unwrap().as_comment().unwrap().is_muted);

    cache
        .backend()
        .fail_next(Error::Transport(String::from("timeout")));
    let err = cache
        .set_comment_notification_setting(c, false)
        .await
        .unwrap_err();
    assert_eq!(err.kind, MutationKind::CommentNotificationSetting);
    assert!(cache.comment(&c).unwrap().as_comment().unwrap().is_muted);
}
