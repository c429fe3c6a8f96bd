//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, Utc};
use tally_core::{
  Entity, Error as CoreError, StoryId, TagId, UserId,
  comment::NewComment,
  confidence::confidence,
  hotness::hotness,
  listing::{Interval, ListingConfig, ListingKind, TopWindow, ViewerFilters},
  store::ForumStore,
  story::{NewStory, NewTag, Story},
  thread::ThreadViewer,
  user::NewUser,
  vote::{CastVote, VoteDirection, VoteReason, VoteTally, VoteTarget},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn user(s: &SqliteStore, name: &str) -> UserId {
  s.add_user(NewUser::new(name)).await.unwrap().user_id
}

async fn voters(s: &SqliteStore, n: usize) -> Vec<UserId> {
  let mut ids = Vec::with_capacity(n);
  for i in 0..n {
    ids.push(user(s, &format!("voter{i}")).await);
  }
  ids
}

async fn link(s: &SqliteStore, by: UserId) -> Story {
  s.submit_story(NewStory::link(by, "A story", "https://example.com/"))
    .await
    .unwrap()
}

async fn link_at(s: &SqliteStore, by: UserId, age: Duration) -> Story {
  s.submit_story(
    NewStory::link(by, "A story", "https://example.com/").created_at(Utc::now() - age),
  )
  .await
  .unwrap()
}

async fn vote(s: &SqliteStore, by: UserId, target: VoteTarget, d: VoteDirection) -> VoteTally {
  s.apply_vote(CastVote::new(by, target, d)).await.unwrap()
}

async fn story(s: &SqliteStore, id: StoryId) -> Story { s.get_story(id).await.unwrap().unwrap() }

async fn karma(s: &SqliteStore, id: UserId) -> i64 { s.get_user(id).await.unwrap().unwrap().karma }

async fn listed(s: &SqliteStore, kind: ListingKind, filters: ViewerFilters) -> Vec<StoryId> {
  s.list(kind, filters).await.unwrap().map(|st| st.story_id).collect()
}

fn core(err: Error) -> CoreError {
  match err {
    Error::Core(e) => e,
    other => panic!("expected a core error, got {other:?}"),
  }
}

// ─── Users and tags ──────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_user() {
  let s = store().await;
  let alice = s.add_user(NewUser::new("alice")).await.unwrap();
  assert_eq!(alice.karma, 0);
  assert!(!alice.is_moderator);

  let fetched = s.get_user(alice.user_id).await.unwrap().unwrap();
  assert_eq!(fetched, alice);
  assert!(s.get_user(UserId(99)).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_usernames_rejected() {
  let s = store().await;
  user(&s, "alice").await;
  let err = s.add_user(NewUser::new("alice")).await.unwrap_err();
  assert!(matches!(core(err), CoreError::DuplicateName(_)));
}

#[tokio::test]
async fn tags_reject_non_finite_modifiers() {
  let s = store().await;
  let err = s.add_tag(NewTag::new("bad").hotness_mod(f64::INFINITY)).await.unwrap_err();
  assert!(matches!(core(err), CoreError::InvalidHotnessMod(_)));

  let tag = s.add_tag(NewTag::new("rust").hotness_mod(0.5)).await.unwrap();
  assert_eq!(s.find_tag("rust").await.unwrap(), Some(tag));
  assert!(s.find_tag("go").await.unwrap().is_none());
}

// ─── Submissions ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn submitted_story_has_self_upvote_and_hotness() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let st = link(&s, alice).await;

  assert_eq!((st.upvotes, st.downvotes), (1, 0));
  assert!(!st.user_is_author);
  assert_eq!(st.hotness, hotness(&st, &[], &[], &[]).unwrap());
  assert!(st.hotness < 0.0);

  let v = s.vote_for(alice, VoteTarget::Story(st.story_id)).await.unwrap().unwrap();
  assert_eq!(v.direction, VoteDirection::Upvote);
  assert_eq!(karma(&s, alice).await, 0);
  assert_eq!(
    s.keystore_value(&format!("user:{alice}:stories_submitted")).await.unwrap(),
    1
  );
}

#[tokio::test]
async fn text_posts_are_authored_by_submitter() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let st = s
    .submit_story(NewStory::text(alice, "Ask: tips?", "What do you use?"))
    .await
    .unwrap();
  assert!(st.user_is_author);
  assert!(st.url.is_none());
}

#[tokio::test]
async fn inactive_and_missing_tags_rejected() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let old = s
    .add_tag(NewTag { inactive: true, ..NewTag::new("old") })
    .await
    .unwrap();

  let err = s
    .submit_story(NewStory::text(alice, "t", "d").with_tags([old.tag_id]))
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::InactiveTag(_)));

  let err = s
    .submit_story(NewStory::text(alice, "t", "d").with_tags([TagId(42)]))
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::EntityNotFound(Entity::Tag(TagId(42)))));
  assert!(s.get_story(StoryId(1)).await.unwrap().is_none());
}

#[tokio::test]
async fn story_tags_round_trip() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let rust = s.add_tag(NewTag::new("rust")).await.unwrap();
  let go = s.add_tag(NewTag::new("go")).await.unwrap();

  let st = s
    .submit_story(NewStory::text(alice, "t", "d").with_tags([rust.tag_id, rust.tag_id]))
    .await
    .unwrap();
  assert_eq!(s.story_tags(st.story_id).await.unwrap(), vec![rust.clone()]);

  s.set_story_tags(st.story_id, vec![go.tag_id, rust.tag_id]).await.unwrap();
  let names: Vec<_> =
    s.story_tags(st.story_id).await.unwrap().into_iter().map(|t| t.tag).collect();
  assert_eq!(names, ["go", "rust"]);
}

// ─── Vote engine ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn repeated_vote_is_idempotent() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let target = VoteTarget::Story(link(&s, alice).await.story_id);

  let first = vote(&s, bob, target, VoteDirection::Upvote).await;
  let second = vote(&s, bob, target, VoteDirection::Upvote).await;
  assert_eq!(first, VoteTally { upvotes: 2, downvotes: 0 });
  assert_eq!(second, first);
  assert_eq!(karma(&s, alice).await, 1);
}

#[tokio::test]
async fn retraction_restores_counters() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let st = link(&s, alice).await;
  let target = VoteTarget::Story(st.story_id);

  vote(&s, bob, target, VoteDirection::Upvote).await;
  let tally = vote(&s, bob, target, VoteDirection::NoVote).await;
  assert_eq!(tally, VoteTally { upvotes: 1, downvotes: 0 });
  assert!(s.vote_for(bob, target).await.unwrap().is_none());
  assert_eq!(story(&s, st.story_id).await.hotness, st.hotness);
  assert_eq!(karma(&s, alice).await, 0);
}

#[tokio::test]
async fn retraction_without_vote_is_noop() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let target = VoteTarget::Story(link(&s, alice).await.story_id);

  let tally = vote(&s, bob, target, VoteDirection::NoVote).await;
  assert_eq!(tally, VoteTally { upvotes: 1, downvotes: 0 });
}

#[tokio::test]
async fn switching_moves_vote_between_columns() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let target = VoteTarget::Story(link(&s, alice).await.story_id);

  vote(&s, bob, target, VoteDirection::Upvote).await;
  let tally = vote(&s, bob, target, VoteDirection::Downvote).await;
  assert_eq!(tally, VoteTally { upvotes: 1, downvotes: 1 });
  assert_eq!(karma(&s, alice).await, -1);
}

#[tokio::test]
async fn self_votes_do_not_change_karma() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let target = VoteTarget::Story(link(&s, alice).await.story_id);

  let tally = vote(&s, alice, target, VoteDirection::Downvote).await;
  assert_eq!(tally, VoteTally { upvotes: 0, downvotes: 1 });
  assert_eq!(karma(&s, alice).await, 0);
}

#[tokio::test]
async fn more_upvotes_make_story_hotter() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let st = link(&s, alice).await;

  vote(&s, bob, VoteTarget::Story(st.story_id), VoteDirection::Upvote).await;
  let after = story(&s, st.story_id).await;
  assert!(after.hotness < st.hotness);
  assert_eq!(after.hotness, hotness(&after, &[], &[], &[]).unwrap());
}

#[tokio::test]
async fn missing_entities_are_rejected() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let st = link(&s, alice).await;

  let err = s
    .apply_vote(CastVote::new(alice, VoteTarget::Story(StoryId(9)), VoteDirection::Upvote))
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::EntityNotFound(Entity::Story(StoryId(9)))));

  let err = s
    .apply_vote(CastVote::new(UserId(9), VoteTarget::Story(st.story_id), VoteDirection::Upvote))
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::EntityNotFound(Entity::User(UserId(9)))));
}

#[tokio::test]
async fn comment_must_belong_to_named_story() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let a = link(&s, alice).await;
  let b = link(&s, alice).await;
  let c = s
    .post_comment(NewComment::top_level(a.story_id, alice, "hi"))
    .await
    .unwrap();

  let wrong = VoteTarget::Comment { story_id: b.story_id, comment_id: c.comment_id };
  let err = s
    .apply_vote(CastVote::new(alice, wrong, VoteDirection::Downvote))
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::EntityNotFound(Entity::Comment(_))));
}

#[tokio::test]
async fn downvote_reasons_recorded_and_summarised() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let v = voters(&s, 3).await;
  let target = VoteTarget::Story(link(&s, alice).await.story_id);

  s.apply_vote(CastVote::new(v[0], target, VoteDirection::Downvote).because(VoteReason::Spam))
    .await
    .unwrap();
  s.apply_vote(CastVote::new(v[1], target, VoteDirection::Downvote).because(VoteReason::Spam))
    .await
    .unwrap();
  s.apply_vote(
    CastVote::new(v[2], target, VoteDirection::Downvote).because(VoteReason::OffTopic),
  )
  .await
  .unwrap();

  let stored = s.vote_for(v[0], target).await.unwrap().unwrap();
  assert_eq!(stored.reason, Some(VoteReason::Spam));

  let summary = s.vote_summary(target).await.unwrap();
  assert_eq!(summary.to_string(), "+1, -1 Off-topic, -2 Spam");
}

#[tokio::test]
async fn inapplicable_reason_changes_nothing() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let target = VoteTarget::Story(link(&s, alice).await.story_id);

  let err = s
    .apply_vote(CastVote::new(bob, target, VoteDirection::Downvote).because(VoteReason::MeToo))
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::InvalidReason { .. }));
  assert!(s.vote_for(bob, target).await.unwrap().is_none());
  assert_eq!(story(&s, target.story_id()).await.downvotes, 0);
}

#[tokio::test]
async fn comment_votes_update_confidence() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let carol = user(&s, "carol").await;
  let st = link(&s, alice).await;
  let c = s
    .post_comment(NewComment::top_level(st.story_id, bob, "first"))
    .await
    .unwrap();
  assert_eq!(c.confidence, confidence(1, 0));

  let target = VoteTarget::Comment { story_id: st.story_id, comment_id: c.comment_id };
  let tally = vote(&s, carol, target, VoteDirection::Downvote).await;
  assert_eq!(tally, VoteTally { upvotes: 1, downvotes: 1 });

  let after = s.get_comment(c.comment_id).await.unwrap().unwrap();
  assert_eq!(after.confidence, confidence(1, 1));
  assert_eq!(karma(&s, bob).await, -1);
}

#[tokio::test]
async fn failed_recompute_keeps_vote_and_stale_hotness() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let tag = s.add_tag(NewTag::new("meta")).await.unwrap();
  let st = s
    .submit_story(NewStory::link(alice, "t", "https://example.com/").with_tags([tag.tag_id]))
    .await
    .unwrap();

  s.exec_raw("UPDATE tags SET hotness_mod = NULL").await.unwrap();
  let err = s
    .apply_vote(CastVote::new(bob, VoteTarget::Story(st.story_id), VoteDirection::Upvote))
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::RecomputeFailure(_)));

  let stale = story(&s, st.story_id).await;
  assert_eq!(stale.upvotes, 2);
  assert_eq!(stale.hotness, st.hotness);

  assert_eq!(s.set_tag_hotness_mod(tag.tag_id, 0.0).await.unwrap(), 1);
  assert!(story(&s, st.story_id).await.hotness < st.hotness);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_votes_converge() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let target = VoteTarget::Story(link(&s, alice).await.story_id);
  let crowd = voters(&s, 40).await;

  let cast = |by: UserId, d: VoteDirection| {
    let s = s.clone();
    tokio::spawn(async move { s.apply_vote(CastVote::new(by, target, d)).await })
  };

  let tasks: Vec<_> = crowd.iter().map(|&v| cast(v, VoteDirection::Upvote)).collect();
  for task in tasks {
    task.await.unwrap().unwrap();
  }
  let after = story(&s, target.story_id()).await;
  assert_eq!((after.upvotes, after.downvotes), (41, 0));
  assert_eq!(karma(&s, alice).await, 40);

  // The same switch racing with itself lands once.
  let tasks: Vec<_> = (0..10).map(|_| cast(crowd[0], VoteDirection::Downvote)).collect();
  for task in tasks {
    task.await.unwrap().unwrap();
  }
  let after = story(&s, target.story_id()).await;
  assert_eq!((after.upvotes, after.downvotes), (40, 1));
  assert_eq!(karma(&s, alice).await, 38);

  s.recalculate_all_hotness().await.unwrap();
  assert_eq!(story(&s, target.story_id()).await.hotness, after.hotness);
}

// ─── Comments ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn thread_ids_allocated_per_top_level_comment() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let st = link(&s, alice).await;

  let c1 = s.post_comment(NewComment::top_level(st.story_id, bob, "one")).await.unwrap();
  let c2 = s.post_comment(NewComment::top_level(st.story_id, bob, "two")).await.unwrap();
  let r1 = s
    .post_comment(NewComment::reply(st.story_id, alice, c1.comment_id, "re: one"))
    .await
    .unwrap();
  let r2 = s
    .post_comment(NewComment::reply(st.story_id, bob, r1.comment_id, "re: re: one"))
    .await
    .unwrap();

  assert_ne!(c1.thread_id, c2.thread_id);
  assert_eq!(r1.thread_id, c1.thread_id);
  assert_eq!(r2.thread_id, c1.thread_id);
  assert_eq!(s.keystore_value("thread_id").await.unwrap(), 2);
  assert_eq!(s.keystore_value(&format!("user:{bob}:comments_posted")).await.unwrap(), 3);
  assert_eq!(story(&s, st.story_id).await.comments_count, 4);
}

#[tokio::test]
async fn reply_parent_must_be_on_same_story() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let a = link(&s, alice).await;
  let b = link(&s, alice).await;
  let c = s.post_comment(NewComment::top_level(a.story_id, alice, "x")).await.unwrap();

  let err = s
    .post_comment(NewComment::reply(b.story_id, alice, c.comment_id, "y"))
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::InvalidParent { .. }));
  assert_eq!(story(&s, b.story_id).await.comments_count, 0);
}

#[tokio::test]
async fn deletion_and_moderation_update_comment_count() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let moderator = s.add_user(NewUser::moderator("mod")).await.unwrap().user_id;
  let st = link(&s, alice).await;
  let c1 = s.post_comment(NewComment::top_level(st.story_id, bob, "one")).await.unwrap();
  let c2 = s.post_comment(NewComment::top_level(st.story_id, bob, "two")).await.unwrap();

  let deleted = s.delete_comment(c1.comment_id, bob, None).await.unwrap();
  assert!(deleted.is_deleted && !deleted.is_moderated);
  assert_eq!(story(&s, st.story_id).await.comments_count, 1);

  let moderated = s.delete_comment(c2.comment_id, moderator, Some("off-topic")).await.unwrap();
  assert!(moderated.is_moderated && !moderated.is_deleted);
  assert_eq!(story(&s, st.story_id).await.comments_count, 0);

  let restored = s.undelete_comment(c1.comment_id).await.unwrap();
  assert!(!restored.is_gone());
  assert_eq!(story(&s, st.story_id).await.comments_count, 1);
}

#[tokio::test]
async fn arranged_thread_keeps_placeholder_for_deleted_parent() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let st = link(&s, alice).await;
  let parent = s.post_comment(NewComment::top_level(st.story_id, bob, "p")).await.unwrap();
  let reply = s
    .post_comment(NewComment::reply(st.story_id, alice, parent.comment_id, "r"))
    .await
    .unwrap();
  let leaf = s.post_comment(NewComment::top_level(st.story_id, alice, "l")).await.unwrap();

  s.delete_comment(parent.comment_id, bob, None).await.unwrap();
  s.delete_comment(leaf.comment_id, alice, None).await.unwrap();

  let views = s.arrange_thread(st.story_id, ThreadViewer::anonymous()).await.unwrap();
  let ids: Vec<_> = views.iter().map(|v| v.comment.comment_id).collect();
  assert_eq!(ids, [parent.comment_id, reply.comment_id]);
  assert_eq!(views[0].indent_level, 1);
  assert!(views[0].body_suppressed);
  assert_eq!(views[1].indent_level, 2);

  let own = s.arrange_thread(st.story_id, ThreadViewer::user(alice)).await.unwrap();
  assert_eq!(own.len(), 3);
}

// ─── Listings ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn hottest_requires_minimum_score() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  link(&s, alice).await;
  let b = link(&s, alice).await;
  vote(&s, bob, VoteTarget::Story(b.story_id), VoteDirection::Upvote).await;

  let hottest = listed(&s, ListingKind::Hottest, ViewerFilters::anonymous()).await;
  assert_eq!(hottest, [b.story_id]);
}

#[tokio::test]
async fn hottest_ordered_by_hotness() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let v = voters(&s, 2).await;
  let a = link(&s, alice).await;
  let b = link(&s, alice).await;
  for &u in &v {
    vote(&s, u, VoteTarget::Story(a.story_id), VoteDirection::Upvote).await;
  }
  vote(&s, v[0], VoteTarget::Story(b.story_id), VoteDirection::Upvote).await;

  let hottest = listed(&s, ListingKind::Hottest, ViewerFilters::anonymous()).await;
  assert_eq!(hottest, [a.story_id, b.story_id]);
}

#[tokio::test]
async fn newest_ordered_by_creation_time() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let a = link_at(&s, alice, Duration::hours(3)).await;
  let b = link_at(&s, alice, Duration::hours(1)).await;
  let c = link_at(&s, alice, Duration::hours(2)).await;

  let newest = listed(&s, ListingKind::Newest, ViewerFilters::anonymous()).await;
  assert_eq!(newest, [b.story_id, c.story_id, a.story_id]);
}

#[tokio::test]
async fn newest_by_user_filters_submitter() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let a = link(&s, alice).await;
  link(&s, bob).await;
  let c = link(&s, alice).await;
  s.apply_vote(CastVote::new(alice, VoteTarget::Story(c.story_id), VoteDirection::Downvote))
    .await
    .unwrap();

  let mine = listed(&s, ListingKind::NewestByUser(alice), ViewerFilters::anonymous()).await;
  assert_eq!(mine, [c.story_id, a.story_id]);
}

#[tokio::test]
async fn recent_skips_old_and_popular_stories() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let v = voters(&s, 4).await;
  let fresh = link(&s, alice).await;
  link_at(&s, alice, Duration::days(11)).await;
  let popular = link(&s, alice).await;
  for &u in &v {
    vote(&s, u, VoteTarget::Story(popular.story_id), VoteDirection::Upvote).await;
  }

  let recent = listed(&s, ListingKind::Recent, ViewerFilters::anonymous()).await;
  assert_eq!(recent, [fresh.story_id]);
}

#[tokio::test]
async fn tagged_listing_needs_tag_and_positive_score() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let rust = s.add_tag(NewTag::new("rust")).await.unwrap().tag_id;

  let a = s
    .submit_story(NewStory::text(alice, "a", "").with_tags([rust]))
    .await
    .unwrap();
  let b = s
    .submit_story(NewStory::text(alice, "b", "").with_tags([rust]))
    .await
    .unwrap();
  vote(&s, bob, VoteTarget::Story(b.story_id), VoteDirection::Downvote).await;
  link(&s, alice).await;

  let tagged = listed(&s, ListingKind::Tagged(rust), ViewerFilters::anonymous()).await;
  assert_eq!(tagged, [a.story_id]);
}

#[tokio::test]
async fn top_limited_to_window_and_ordered_by_score() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let v = voters(&s, 2).await;
  let old = link_at(&s, alice, Duration::weeks(2)).await;
  let day = link_at(&s, alice, Duration::days(1)).await;
  let two_days = link_at(&s, alice, Duration::days(2)).await;
  vote(&s, v[0], VoteTarget::Story(old.story_id), VoteDirection::Upvote).await;
  for &u in &v {
    vote(&s, u, VoteTarget::Story(two_days.story_id), VoteDirection::Upvote).await;
  }

  let week = ListingKind::Top(TopWindow::new(1, Interval::Week));
  let top = listed(&s, week, ViewerFilters::anonymous()).await;
  assert_eq!(top, [two_days.story_id, day.story_id]);
}

#[tokio::test]
async fn hidden_stories_only_affect_their_viewer() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let a = link_at(&s, alice, Duration::hours(2)).await;
  let b = link_at(&s, alice, Duration::hours(1)).await;
  s.hide_story(bob, a.story_id).await.unwrap();

  let for_bob = listed(&s, ListingKind::Newest, ViewerFilters::user(bob)).await;
  assert_eq!(for_bob, [b.story_id]);
  let for_alice = listed(&s, ListingKind::Newest, ViewerFilters::user(alice)).await;
  assert_eq!(for_alice, [b.story_id, a.story_id]);

  let hidden = listed(&s, ListingKind::Hidden, ViewerFilters::user(bob)).await;
  assert_eq!(hidden, [a.story_id]);

  let anon = listed(&s, ListingKind::Hidden, ViewerFilters::anonymous()).await;
  assert_eq!(anon.len(), 2);

  s.unhide_story(bob, a.story_id).await.unwrap();
  let for_bob = listed(&s, ListingKind::Newest, ViewerFilters::user(bob)).await;
  assert_eq!(for_bob.len(), 2);
}

#[tokio::test]
async fn tag_filters_apply_to_signed_in_viewers() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let meta = s.add_tag(NewTag::new("meta")).await.unwrap().tag_id;
  let filtered = s
    .submit_story(NewStory::text(alice, "meta post", "").with_tags([meta]))
    .await
    .unwrap();
  let plain = link(&s, alice).await;

  s.set_tag_filters(bob, vec![meta]).await.unwrap();
  assert_eq!(s.tag_filters(bob).await.unwrap(), [meta]);

  let for_bob = listed(&s, ListingKind::NewestByUser(alice), ViewerFilters::user(bob)).await;
  assert_eq!(for_bob, [plain.story_id]);

  let anon = listed(&s, ListingKind::NewestByUser(alice), ViewerFilters::anonymous()).await;
  assert_eq!(anon, [plain.story_id, filtered.story_id]);

  let cookie = ViewerFilters::anonymous().excluding([meta]);
  let anon = listed(&s, ListingKind::NewestByUser(alice), cookie).await;
  assert_eq!(anon, [plain.story_id]);
}

#[tokio::test]
async fn expired_and_merged_stories_are_not_listed() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let a = link(&s, alice).await;
  let b = link(&s, alice).await;
  let c = link(&s, alice).await;

  s.set_story_expired(a.story_id, true).await.unwrap();
  s.merge_story(b.story_id, Some(c.story_id)).await.unwrap();

  let by_alice = listed(&s, ListingKind::NewestByUser(alice), ViewerFilters::anonymous()).await;
  assert_eq!(by_alice, [c.story_id]);
}

#[tokio::test]
async fn listings_are_paginated() {
  let s = store()
    .await
    .with_listing_config(ListingConfig { per_page: 2, ..ListingConfig::default() });
  let alice = user(&s, "alice").await;
  let mut ids = Vec::new();
  for _ in 0..5 {
    ids.push(link(&s, alice).await.story_id);
  }

  let kind = ListingKind::NewestByUser(alice);
  let page1 = s.list(kind, ViewerFilters::anonymous().page(1)).await.unwrap();
  assert_eq!(page1.len(), 2);
  assert_eq!(page1.map(|st| st.story_id).collect::<Vec<_>>(), [ids[4], ids[3]]);

  let page3 = listed(&s, kind, ViewerFilters::anonymous().page(3)).await;
  assert_eq!(page3, [ids[0]]);
}

// ─── Moderation ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn merging_pulls_comments_and_score_into_target() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let carol = user(&s, "carol").await;
  let a = link(&s, alice).await;
  let b = link(&s, bob).await;
  vote(&s, carol, VoteTarget::Story(b.story_id), VoteDirection::Upvote).await;
  s.post_comment(NewComment::top_level(b.story_id, carol, "dupe?")).await.unwrap();

  let err = s.merge_story(a.story_id, Some(a.story_id)).await.unwrap_err();
  assert!(matches!(core(err), CoreError::SelfMerge(_)));

  let merged = s.merge_story(b.story_id, Some(a.story_id)).await.unwrap();
  assert_eq!(merged.merged_story_id, Some(a.story_id));

  let target = story(&s, a.story_id).await;
  assert_eq!(target.comments_count, 1);
  assert!(target.hotness < a.hotness);
  assert_eq!(s.story_comments(a.story_id).await.unwrap().len(), 1);

  s.merge_story(b.story_id, None).await.unwrap();
  let unmerged = story(&s, a.story_id).await;
  assert_eq!(unmerged.comments_count, 0);
  assert_eq!(unmerged.hotness, a.hotness);
}

#[tokio::test]
async fn votes_on_a_merged_story_rescore_its_target() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let a = link(&s, alice).await;
  let b = link(&s, bob).await;
  let crowd = voters(&s, 6).await;
  for &v in &crowd {
    vote(&s, v, VoteTarget::Story(a.story_id), VoteDirection::Upvote).await;
  }
  s.merge_story(b.story_id, Some(a.story_id)).await.unwrap();
  let merged = story(&s, a.story_id).await.hotness;

  for &v in &crowd[..5] {
    vote(&s, v, VoteTarget::Story(b.story_id), VoteDirection::Upvote).await;
  }
  let voted = story(&s, a.story_id).await.hotness;
  assert!(voted < merged);
  s.recalculate_all_hotness().await.unwrap();
  assert_eq!(story(&s, a.story_id).await.hotness, voted);

  s.purge_votes_by_user(crowd[0]).await.unwrap();
  let purged = story(&s, a.story_id).await.hotness;
  assert!(purged > voted);
  s.recalculate_all_hotness().await.unwrap();
  assert_eq!(story(&s, a.story_id).await.hotness, purged);
}

#[tokio::test]
async fn tag_modifier_change_recomputes_tagged_stories() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let tag = s.add_tag(NewTag::new("news")).await.unwrap();
  let tagged = s
    .submit_story(NewStory::text(alice, "t", "").with_tags([tag.tag_id]))
    .await
    .unwrap();
  let other = link(&s, alice).await;

  let err = s.set_tag_hotness_mod(tag.tag_id, f64::NAN).await.unwrap_err();
  assert!(matches!(core(err), CoreError::InvalidHotnessMod(_)));

  assert_eq!(s.set_tag_hotness_mod(tag.tag_id, -1.0).await.unwrap(), 1);
  assert!(story(&s, tagged.story_id).await.hotness > tagged.hotness);
  assert_eq!(story(&s, other.story_id).await.hotness, other.hotness);
}

// ─── Maintenance ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn purge_reverses_every_vote_of_a_user() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let carol = user(&s, "carol").await;
  let a = link(&s, alice).await;
  let b = link(&s, carol).await;
  let c = s.post_comment(NewComment::top_level(a.story_id, carol, "c")).await.unwrap();
  let on_comment = VoteTarget::Comment { story_id: a.story_id, comment_id: c.comment_id };

  vote(&s, bob, VoteTarget::Story(a.story_id), VoteDirection::Upvote).await;
  vote(&s, bob, VoteTarget::Story(b.story_id), VoteDirection::Downvote).await;
  vote(&s, bob, on_comment, VoteDirection::Upvote).await;
  assert_eq!(karma(&s, alice).await, 1);
  assert_eq!(karma(&s, carol).await, 0);

  assert_eq!(s.purge_votes_by_user(bob).await.unwrap(), 3);

  let a_after = story(&s, a.story_id).await;
  let b_after = story(&s, b.story_id).await;
  let c_after = s.get_comment(c.comment_id).await.unwrap().unwrap();
  assert_eq!((a_after.upvotes, a_after.downvotes), (1, 0));
  assert_eq!((b_after.upvotes, b_after.downvotes), (1, 0));
  assert_eq!((c_after.upvotes, c_after.confidence), (1, confidence(1, 0)));
  assert_eq!(karma(&s, alice).await, 0);
  assert_eq!(karma(&s, carol).await, 0);
  assert!(s.vote_for(bob, on_comment).await.unwrap().is_none());
}

#[tokio::test]
async fn recalculate_all_restores_cached_hotness() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let a = link(&s, alice).await;
  let b = link(&s, alice).await;

  s.exec_raw("UPDATE stories SET hotness = 0").await.unwrap();
  assert_eq!(s.recalculate_all_hotness().await.unwrap(), 2);
  assert_eq!(story(&s, a.story_id).await.hotness, a.hotness);
  assert_eq!(story(&s, b.story_id).await.hotness, b.hotness);
}

#[tokio::test]
async fn recalculate_all_skips_stories_that_fail_to_recompute() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let tag = s.add_tag(NewTag::new("meta")).await.unwrap();
  let tagged = s
    .submit_story(NewStory::text(alice, "t", "").with_tags([tag.tag_id]))
    .await
    .unwrap();
  let plain = link(&s, alice).await;

  s.exec_raw("UPDATE tags SET hotness_mod = NULL; UPDATE stories SET hotness = 0")
    .await
    .unwrap();
  assert_eq!(s.recalculate_all_hotness().await.unwrap(), 1);
  assert_eq!(story(&s, tagged.story_id).await.hotness, 0.0);
  assert_eq!(story(&s, plain.story_id).await.hotness, plain.hotness);
}
