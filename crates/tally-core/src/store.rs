//! The `ForumStore` trait.
//!
//! Implemented by storage backends (e.g. `tally-store-sqlite`). Every
//! mutating method runs as one transaction: counters, vote rows, karma and
//! the derived scores they feed commit or roll back together. The one
//! exception is [`Error::RecomputeFailure`](crate::Error::RecomputeFailure),
//! which keeps the mutation and leaves the cached score stale.

use std::future::Future;

use crate::{
  CommentId, StoryId, TagId, UserId,
  comment::{Comment, NewComment},
  listing::{Listing, ListingKind, ViewerFilters},
  story::{NewStory, NewTag, Story, Tag},
  thread::{CommentView, ThreadViewer},
  user::{NewUser, User},
  vote::{CastVote, Vote, VoteSummary, VoteTally, VoteTarget},
};

/// Abstraction over a Tally forum store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait ForumStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  fn add_user(&self, input: NewUser)
  -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: UserId,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  // ── Tags ──────────────────────────────────────────────────────────────

  fn add_tag(&self, input: NewTag) -> impl Future<Output = Result<Tag, Self::Error>> + Send + '_;

  /// Look a tag up by name.
  fn find_tag<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Option<Tag>, Self::Error>> + Send + 'a;

  /// Change a tag's hotness modifier and recompute every story carrying it.
  /// Returns the number of stories recomputed.
  fn set_tag_hotness_mod(
    &self,
    tag: TagId,
    hotness_mod: f64,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Stories ───────────────────────────────────────────────────────────

  /// Insert a story with the submitter's upvote and its initial hotness.
  fn submit_story(
    &self,
    input: NewStory,
  ) -> impl Future<Output = Result<Story, Self::Error>> + Send + '_;

  fn get_story(
    &self,
    id: StoryId,
  ) -> impl Future<Output = Result<Option<Story>, Self::Error>> + Send + '_;

  fn story_tags(
    &self,
    story: StoryId,
  ) -> impl Future<Output = Result<Vec<Tag>, Self::Error>> + Send + '_;

  /// Replace the story's tags and recompute its hotness.
  fn set_story_tags(
    &self,
    story: StoryId,
    tags: Vec<TagId>,
  ) -> impl Future<Output = Result<Story, Self::Error>> + Send + '_;

  /// Merge `story` into `into`, or unmerge it with `None`.
  fn merge_story(
    &self,
    story: StoryId,
    into: Option<StoryId>,
  ) -> impl Future<Output = Result<Story, Self::Error>> + Send + '_;

  fn set_story_expired(
    &self,
    story: StoryId,
    expired: bool,
  ) -> impl Future<Output = Result<Story, Self::Error>> + Send + '_;

  // ── Comments ──────────────────────────────────────────────────────────

  /// Insert a comment with its author's upvote, then refresh the story's
  /// comment count and hotness.
  fn post_comment(
    &self,
    input: NewComment,
  ) -> impl Future<Output = Result<Comment, Self::Error>> + Send + '_;

  fn get_comment(
    &self,
    id: CommentId,
  ) -> impl Future<Output = Result<Option<Comment>, Self::Error>> + Send + '_;

  /// Mark a comment deleted. When `by` is a moderator other than the author
  /// the comment is marked moderated instead.
  fn delete_comment<'a>(
    &'a self,
    comment: CommentId,
    by: UserId,
    reason: Option<&'a str>,
  ) -> impl Future<Output = Result<Comment, Self::Error>> + Send + 'a;

  fn undelete_comment(
    &self,
    comment: CommentId,
  ) -> impl Future<Output = Result<Comment, Self::Error>> + Send + '_;

  /// The story's comments plus those of stories merged into it, oldest first.
  fn story_comments(
    &self,
    story: StoryId,
  ) -> impl Future<Output = Result<Vec<Comment>, Self::Error>> + Send + '_;

  /// Read the story's comments and arrange them for `viewer`.
  fn arrange_thread(
    &self,
    story: StoryId,
    viewer: ThreadViewer,
  ) -> impl Future<Output = Result<Vec<CommentView>, Self::Error>> + Send + '_;

  // ── Votes ─────────────────────────────────────────────────────────────

  /// Apply, switch or retract a vote and recompute the target's derived
  /// score. Returns the target's counters after the update.
  fn apply_vote(
    &self,
    vote: CastVote,
  ) -> impl Future<Output = Result<VoteTally, Self::Error>> + Send + '_;

  fn vote_for(
    &self,
    user: UserId,
    target: VoteTarget,
  ) -> impl Future<Output = Result<Option<Vote>, Self::Error>> + Send + '_;

  fn vote_summary(
    &self,
    target: VoteTarget,
  ) -> impl Future<Output = Result<VoteSummary, Self::Error>> + Send + '_;

  // ── Listings and viewer state ─────────────────────────────────────────

  fn list(
    &self,
    kind: ListingKind,
    filters: ViewerFilters,
  ) -> impl Future<Output = Result<Listing, Self::Error>> + Send + '_;

  fn hide_story(
    &self,
    user: UserId,
    story: StoryId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn unhide_story(
    &self,
    user: UserId,
    story: StoryId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Replace the user's saved tag filters.
  fn set_tag_filters(
    &self,
    user: UserId,
    tags: Vec<TagId>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn tag_filters(
    &self,
    user: UserId,
  ) -> impl Future<Output = Result<Vec<TagId>, Self::Error>> + Send + '_;

  // ── Maintenance ───────────────────────────────────────────────────────

  /// Recompute every story's hotness in one pass, newest first. Stories whose
  /// recompute fails are skipped. Returns the number of stories updated.
  fn recalculate_all_hotness(&self) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Remove every vote `user` cast, reversing counters and karma. Returns the
  /// number of votes removed.
  fn purge_votes_by_user(
    &self,
    user: UserId,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Read a keystore counter; 0 when unset.
  fn keystore_value<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + 'a;
}
