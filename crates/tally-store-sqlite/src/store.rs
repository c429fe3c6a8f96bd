//! [`SqliteStore`]: the SQLite implementation of [`ForumStore`].

use std::{path::Path, time::Duration};

use chrono::Utc;
use tally_core::{
  CommentId, StoryId, TagId, UserId,
  comment::{Comment, NewComment},
  listing::{Listing, ListingConfig, ListingKind, ViewerFilters},
  store::ForumStore,
  story::{NewStory, NewTag, Story, Tag},
  thread::{CommentView, ThreadViewer, arrange},
  user::{NewUser, User},
  vote::{CastVote, Vote, VoteSummary, VoteTally, VoteTarget},
};

use crate::{Result, ledger, schema::SCHEMA};

/// How long a writer waits on a locked database before giving up with
/// [`tally_core::Error::ConcurrentUpdateConflict`].
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Tally forum store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:    tokio_rusqlite::Connection,
  listing: ListingConfig,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, listing: ListingConfig::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store; useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, listing: ListingConfig::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Replace the listing tunables used by [`ForumStore::list`].
  pub fn with_listing_config(mut self, listing: ListingConfig) -> Self {
    self.listing = listing;
    self
  }

  pub fn listing_config(&self) -> &ListingConfig { &self.listing }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` on the connection thread and flatten its result.
  async fn run<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut rusqlite::Connection) -> Result<T> + Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }
}

#[cfg(test)]
impl SqliteStore {
  /// Run raw SQL against the store, bypassing every invariant.
  pub(crate) async fn exec_raw(&self, sql: &'static str) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── ForumStore impl ─────────────────────────────────────────────────────────

impl ForumStore for SqliteStore {
  type Error = crate::Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn add_user(&self, input: NewUser) -> Result<User> {
    self.run(move |conn| ledger::add_user(conn, input, Utc::now())).await
  }

  async fn get_user(&self, id: UserId) -> Result<Option<User>> {
    self.run(move |conn| ledger::find_user(conn, id)).await
  }

  // ── Tags ──────────────────────────────────────────────────────────────────

  async fn add_tag(&self, input: NewTag) -> Result<Tag> {
    self.run(move |conn| ledger::add_tag(conn, input)).await
  }

  async fn find_tag(&self, name: &str) -> Result<Option<Tag>> {
    let name = name.to_owned();
    self.run(move |conn| ledger::find_tag_by_name(conn, &name)).await
  }

  async fn set_tag_hotness_mod(&self, tag: TagId, hotness_mod: f64) -> Result<usize> {
    self.run(move |conn| ledger::set_tag_hotness_mod(conn, tag, hotness_mod)).await
  }

  // ── Stories ───────────────────────────────────────────────────────────────

  async fn submit_story(&self, input: NewStory) -> Result<Story> {
    self.run(move |conn| ledger::submit_story(conn, input, Utc::now())).await
  }

  async fn get_story(&self, id: StoryId) -> Result<Option<Story>> {
    self.run(move |conn| ledger::find_story(conn, id)).await
  }

  async fn story_tags(&self, story: StoryId) -> Result<Vec<Tag>> {
    self.run(move |conn| ledger::story_tags(conn, story)).await
  }

  async fn set_story_tags(&self, story: StoryId, tags: Vec<TagId>) -> Result<Story> {
    self.run(move |conn| ledger::set_story_tags(conn, story, tags)).await
  }

  async fn merge_story(&self, story: StoryId, into: Option<StoryId>) -> Result<Story> {
    self.run(move |conn| ledger::merge_story(conn, story, into)).await
  }

  async fn set_story_expired(&self, story: StoryId, expired: bool) -> Result<Story> {
    self.run(move |conn| ledger::set_story_expired(conn, story, expired)).await
  }

  // ── Comments ──────────────────────────────────────────────────────────────

  async fn post_comment(&self, input: NewComment) -> Result<Comment> {
    self.run(move |conn| ledger::post_comment(conn, input, Utc::now())).await
  }

  async fn get_comment(&self, id: CommentId) -> Result<Option<Comment>> {
    self.run(move |conn| ledger::find_comment(conn, id)).await
  }

  async fn delete_comment(
    &self,
    comment: CommentId,
    by: UserId,
    reason: Option<&str>,
  ) -> Result<Comment> {
    let reason = reason.map(str::to_owned);
    self.run(move |conn| ledger::delete_comment(conn, comment, by, reason)).await
  }

  async fn undelete_comment(&self, comment: CommentId) -> Result<Comment> {
    self.run(move |conn| ledger::undelete_comment(conn, comment)).await
  }

  async fn story_comments(&self, story: StoryId) -> Result<Vec<Comment>> {
    self.run(move |conn| ledger::story_comments(conn, story)).await
  }

  async fn arrange_thread(&self, story: StoryId, viewer: ThreadViewer) -> Result<Vec<CommentView>> {
    let comments = self.story_comments(story).await?;
    Ok(arrange(&comments, &viewer))
  }

  // ── Votes ─────────────────────────────────────────────────────────────────

  async fn apply_vote(&self, vote: CastVote) -> Result<VoteTally> {
    self.run(move |conn| ledger::apply_vote(conn, vote, Utc::now())).await
  }

  async fn vote_for(&self, user: UserId, target: VoteTarget) -> Result<Option<Vote>> {
    self.run(move |conn| ledger::find_vote(conn, user, target)).await
  }

  async fn vote_summary(&self, target: VoteTarget) -> Result<VoteSummary> {
    self.run(move |conn| ledger::vote_summary(conn, target)).await
  }

  // ── Listings and viewer state ─────────────────────────────────────────────

  async fn list(&self, kind: ListingKind, filters: ViewerFilters) -> Result<Listing> {
    let config = self.listing.clone();
    self.run(move |conn| ledger::list(conn, kind, filters, &config, Utc::now())).await
  }

  async fn hide_story(&self, user: UserId, story: StoryId) -> Result<()> {
    self.run(move |conn| ledger::set_hidden(conn, user, story, true)).await
  }

  async fn unhide_story(&self, user: UserId, story: StoryId) -> Result<()> {
    self.run(move |conn| ledger::set_hidden(conn, user, story, false)).await
  }

  async fn set_tag_filters(&self, user: UserId, tags: Vec<TagId>) -> Result<()> {
    self.run(move |conn| ledger::set_tag_filters(conn, user, tags)).await
  }

  async fn tag_filters(&self, user: UserId) -> Result<Vec<TagId>> {
    self.run(move |conn| ledger::tag_filters(conn, user)).await
  }

  // ── Maintenance ───────────────────────────────────────────────────────────

  async fn recalculate_all_hotness(&self) -> Result<usize> {
    self.run(ledger::recalculate_all_hotness).await
  }

  async fn purge_votes_by_user(&self, user: UserId) -> Result<usize> {
    self.run(move |conn| ledger::purge_votes_by_user(conn, user)).await
  }

  async fn keystore_value(&self, key: &str) -> Result<i64> {
    let key = key.to_owned();
    self.run(move |conn| ledger::keystore_value(conn, &key)).await
  }
}
