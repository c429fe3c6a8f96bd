//! Synchronous transaction bodies, run on the connection thread.
//!
//! Every mutating function opens one `BEGIN IMMEDIATE` transaction, changes
//! counters with relative `UPDATE`s and recomputes the derived scores from
//! the post-update rows before committing. A failed hotness recompute does
//! not roll back: the mutation commits, the cached value stays stale and the
//! caller gets [`tally_core::Error::RecomputeFailure`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rusqlite::{
  Connection, OptionalExtension as _, TransactionBehavior, params, params_from_iter,
};
use tally_core::{
  CommentId, Entity, Error as CoreError, StoryId, TagId, UserId,
  comment::{Comment, NewComment},
  confidence::confidence,
  hotness::{CommentVotes, hotness},
  listing::{Listing, ListingConfig, ListingKind, ListingQuery, ViewerFilters},
  story::{NewStory, NewTag, Story, Tag},
  user::{NewUser, User},
  vote::{
    CastVote, CounterDelta, Vote, VoteDirection, VoteReason, VoteSummary, VoteTally, VoteTarget,
  },
};
use tracing::{debug, info, warn};

use crate::{
  Error, Result,
  encode::{
    COMMENT_COLUMNS, RawComment, RawStory, RawTag, RawUser, STORY_COLUMNS, TAG_COLUMNS,
    USER_COLUMNS, decode_direction, decode_reason, encode_dt, encode_reason,
  },
  query,
};

fn not_found(entity: Entity) -> Error { CoreError::EntityNotFound(entity).into() }

fn begin(conn: &mut Connection) -> Result<rusqlite::Transaction<'_>> {
  Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

// ─── Stale recomputes ────────────────────────────────────────────────────────

/// Collects recompute failures that must not abort the transaction.
#[derive(Default)]
struct Stale(Option<String>);

impl Stale {
  /// Swallow a [`CoreError::RecomputeFailure`]; pass every other error on.
  fn absorb(&mut self, result: Result<()>) -> Result<()> {
    match result {
      Err(Error::Core(CoreError::RecomputeFailure(msg))) => {
        warn!(reason = %msg, "recompute failed; cached score left stale");
        self.0.get_or_insert(msg);
        Ok(())
      }
      other => other,
    }
  }

  fn finish<T>(self, value: T) -> Result<T> {
    match self.0 {
      Some(msg) => Err(CoreError::RecomputeFailure(msg).into()),
      None => Ok(value),
    }
  }
}

// ─── Reads ───────────────────────────────────────────────────────────────────

pub fn find_user(conn: &Connection, id: UserId) -> Result<Option<User>> {
  let raw = conn
    .query_row(
      &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
      params![id.0],
      RawUser::from_row,
    )
    .optional()?;
  raw.map(RawUser::into_user).transpose()
}

fn user(conn: &Connection, id: UserId) -> Result<User> {
  find_user(conn, id)?.ok_or_else(|| not_found(Entity::User(id)))
}

pub fn find_story(conn: &Connection, id: StoryId) -> Result<Option<Story>> {
  let raw = conn
    .query_row(
      &format!("SELECT {STORY_COLUMNS} FROM stories s WHERE s.story_id = ?1"),
      params![id.0],
      RawStory::from_row,
    )
    .optional()?;
  raw.map(RawStory::into_story).transpose()
}

fn story(conn: &Connection, id: StoryId) -> Result<Story> {
  find_story(conn, id)?.ok_or_else(|| not_found(Entity::Story(id)))
}

pub fn find_comment(conn: &Connection, id: CommentId) -> Result<Option<Comment>> {
  let raw = conn
    .query_row(
      &format!("SELECT {COMMENT_COLUMNS} FROM comments c WHERE c.comment_id = ?1"),
      params![id.0],
      RawComment::from_row,
    )
    .optional()?;
  raw.map(RawComment::into_comment).transpose()
}

fn comment(conn: &Connection, id: CommentId) -> Result<Comment> {
  find_comment(conn, id)?.ok_or_else(|| not_found(Entity::Comment(id)))
}

fn find_tag(conn: &Connection, id: TagId) -> Result<Option<Tag>> {
  let raw = conn
    .query_row(
      &format!("SELECT {TAG_COLUMNS} FROM tags t WHERE t.tag_id = ?1"),
      params![id.0],
      RawTag::from_row,
    )
    .optional()?;
  Ok(raw.map(RawTag::into_tag))
}

fn tag(conn: &Connection, id: TagId) -> Result<Tag> {
  find_tag(conn, id)?.ok_or_else(|| not_found(Entity::Tag(id)))
}

pub fn find_tag_by_name(conn: &Connection, name: &str) -> Result<Option<Tag>> {
  let raw = conn
    .query_row(
      &format!("SELECT {TAG_COLUMNS} FROM tags t WHERE t.tag = ?1"),
      params![name],
      RawTag::from_row,
    )
    .optional()?;
  Ok(raw.map(RawTag::into_tag))
}

pub fn story_tags(conn: &Connection, id: StoryId) -> Result<Vec<Tag>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {TAG_COLUMNS} FROM tags t
     JOIN taggings g ON g.tag_id = t.tag_id
     WHERE g.story_id = ?1
     ORDER BY t.tag"
  ))?;
  let raws = stmt
    .query_map(params![id.0], RawTag::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(raws.into_iter().map(RawTag::into_tag).collect())
}

/// Comments of the story and of every story merged into it, oldest first.
pub fn story_comments(conn: &Connection, id: StoryId) -> Result<Vec<Comment>> {
  story(conn, id)?;
  let mut stmt = conn.prepare(&format!(
    "SELECT {COMMENT_COLUMNS} FROM comments c
     WHERE c.story_id = ?1
        OR c.story_id IN (SELECT story_id FROM stories WHERE merged_story_id = ?1)
     ORDER BY c.created_at, c.comment_id"
  ))?;
  let raws = stmt
    .query_map(params![id.0], RawComment::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawComment::into_comment).collect()
}

fn merged_into(conn: &Connection, id: StoryId) -> Result<Vec<Story>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {STORY_COLUMNS} FROM stories s WHERE s.merged_story_id = ?1"
  ))?;
  let raws = stmt
    .query_map(params![id.0], RawStory::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawStory::into_story).collect()
}

pub fn keystore_value(conn: &Connection, key: &str) -> Result<i64> {
  let value = conn
    .query_row("SELECT value FROM keystore WHERE key = ?1", params![key], |r| r.get(0))
    .optional()?;
  Ok(value.unwrap_or(0))
}

pub fn tag_filters(conn: &Connection, user_id: UserId) -> Result<Vec<TagId>> {
  let mut stmt =
    conn.prepare("SELECT tag_id FROM tag_filters WHERE user_id = ?1 ORDER BY tag_id")?;
  let ids = stmt
    .query_map(params![user_id.0], |r| r.get(0))?
    .collect::<rusqlite::Result<Vec<i64>>>()?;
  Ok(ids.into_iter().map(TagId).collect())
}

// ─── Derived scores ──────────────────────────────────────────────────────────

/// Recompute and store the story's hotness from its current rows.
fn refresh_hotness(conn: &Connection, id: StoryId) -> Result<()> {
  let story = story(conn, id)?;
  let tags = story_tags(conn, id)?;

  let mut stmt =
    conn.prepare_cached("SELECT user_id, upvotes, downvotes FROM comments WHERE story_id = ?1")?;
  let comments = stmt
    .query_map(params![id.0], |r| {
      Ok(CommentVotes {
        user_id:   UserId(r.get(0)?),
        upvotes:   r.get(1)?,
        downvotes: r.get(2)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let merged = merged_into(conn, id)?;
  let value = hotness(&story, &tags, &comments, &merged)?;

  conn.execute(
    "UPDATE stories SET hotness = ?2 WHERE story_id = ?1",
    params![id.0, value],
  )?;
  debug!(story = %id, hotness = value, "recomputed hotness");
  Ok(())
}

fn refresh_confidence(conn: &Connection, id: CommentId) -> Result<()> {
  let (up, down): (u32, u32) = conn
    .query_row(
      "SELECT upvotes, downvotes FROM comments WHERE comment_id = ?1",
      params![id.0],
      |r| Ok((r.get(0)?, r.get(1)?)),
    )
    .optional()?
    .ok_or_else(|| not_found(Entity::Comment(id)))?;

  let value = confidence(up, down);
  conn.execute(
    "UPDATE comments SET confidence = ?2 WHERE comment_id = ?1",
    params![id.0, value],
  )?;
  debug!(comment = %id, confidence = value, "recomputed confidence");
  Ok(())
}

/// Count the non-gone comments of the story and of stories merged into it.
fn refresh_comments_count(conn: &Connection, id: StoryId) -> Result<()> {
  conn.execute(
    "UPDATE stories SET comments_count = (
       SELECT COUNT(*) FROM comments c
       WHERE (c.story_id = ?1
              OR c.story_id IN (SELECT story_id FROM stories WHERE merged_story_id = ?1))
         AND c.is_deleted = 0
         AND c.is_moderated = 0
     )
     WHERE story_id = ?1",
    params![id.0],
  )?;
  Ok(())
}

/// Refresh the comment count of `story` and of the story it is merged into.
fn refresh_counts(conn: &Connection, story: &Story) -> Result<()> {
  refresh_comments_count(conn, story.story_id)?;
  if let Some(target) = story.merged_story_id {
    refresh_comments_count(conn, target)?;
  }
  Ok(())
}

// ─── Keystore ────────────────────────────────────────────────────────────────

fn bump_keystore(conn: &Connection, key: &str, amount: i64) -> Result<i64> {
  Ok(conn.query_row(
    "INSERT INTO keystore (key, value) VALUES (?1, ?2)
     ON CONFLICT (key) DO UPDATE SET value = value + excluded.value
     RETURNING value",
    params![key, amount],
    |r| r.get(0),
  )?)
}

// ─── Users and tags ──────────────────────────────────────────────────────────

pub fn add_user(conn: &mut Connection, input: NewUser, now: DateTime<Utc>) -> Result<User> {
  let tx = begin(conn)?;
  let taken = tx
    .query_row(
      "SELECT 1 FROM users WHERE username = ?1",
      params![input.username],
      |_| Ok(()),
    )
    .optional()?
    .is_some();
  if taken {
    return Err(CoreError::DuplicateName(input.username).into());
  }

  tx.execute(
    "INSERT INTO users (username, is_moderator, created_at) VALUES (?1, ?2, ?3)",
    params![input.username, input.is_moderator, encode_dt(now)],
  )?;
  let created = user(&tx, UserId(tx.last_insert_rowid()))?;
  tx.commit()?;
  Ok(created)
}

pub fn add_tag(conn: &mut Connection, input: NewTag) -> Result<Tag> {
  if !input.hotness_mod.is_finite() {
    return Err(CoreError::InvalidHotnessMod(input.hotness_mod).into());
  }

  let tx = begin(conn)?;
  if find_tag_by_name(&tx, &input.tag)?.is_some() {
    return Err(CoreError::DuplicateName(input.tag).into());
  }

  tx.execute(
    "INSERT INTO tags (tag, description, hotness_mod, privileged, is_media, inactive)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    params![
      input.tag,
      input.description,
      input.hotness_mod,
      input.privileged,
      input.is_media,
      input.inactive,
    ],
  )?;
  let created = tag(&tx, TagId(tx.last_insert_rowid()))?;
  tx.commit()?;
  Ok(created)
}

pub fn set_tag_hotness_mod(conn: &mut Connection, id: TagId, hotness_mod: f64) -> Result<usize> {
  if !hotness_mod.is_finite() {
    return Err(CoreError::InvalidHotnessMod(hotness_mod).into());
  }

  let tx = begin(conn)?;
  tag(&tx, id)?;
  tx.execute(
    "UPDATE tags SET hotness_mod = ?2 WHERE tag_id = ?1",
    params![id.0, hotness_mod],
  )?;

  let stories = {
    let mut stmt = tx.prepare("SELECT story_id FROM taggings WHERE tag_id = ?1")?;
    stmt
      .query_map(params![id.0], |r| r.get(0))?
      .collect::<rusqlite::Result<Vec<i64>>>()?
  };

  let mut stale = Stale::default();
  for &story_id in &stories {
    stale.absorb(refresh_hotness(&tx, StoryId(story_id)))?;
  }
  tx.commit()?;
  debug!(tag = %id, hotness_mod, stories = stories.len(), "changed tag hotness modifier");
  stale.finish(stories.len())
}

// ─── Stories ─────────────────────────────────────────────────────────────────

/// Sort, dedup and check the tag ids; inactive tags are refused.
fn checked_tags(conn: &Connection, mut tags: Vec<TagId>) -> Result<Vec<TagId>> {
  tags.sort();
  tags.dedup();
  for &id in &tags {
    let t = tag(conn, id)?;
    if t.inactive {
      return Err(CoreError::InactiveTag(t.tag).into());
    }
  }
  Ok(tags)
}

fn write_taggings(conn: &Connection, story_id: StoryId, tags: &[TagId]) -> Result<()> {
  conn.execute("DELETE FROM taggings WHERE story_id = ?1", params![story_id.0])?;
  let mut stmt = conn.prepare_cached("INSERT INTO taggings (story_id, tag_id) VALUES (?1, ?2)")?;
  for tag in tags {
    stmt.execute(params![story_id.0, tag.0])?;
  }
  Ok(())
}

pub fn submit_story(conn: &mut Connection, input: NewStory, now: DateTime<Utc>) -> Result<Story> {
  let tx = begin(conn)?;
  user(&tx, input.user_id)?;
  let tags = checked_tags(&tx, input.tags)?;

  let created_at = input.created_at.unwrap_or(now);
  let user_is_author = input.user_is_author || input.url.is_none();

  tx.execute(
    "INSERT INTO stories (user_id, title, url, description, created_at, upvotes, user_is_author)
     VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
    params![
      input.user_id.0,
      input.title,
      input.url,
      input.description,
      encode_dt(created_at),
      user_is_author,
    ],
  )?;
  let story_id = StoryId(tx.last_insert_rowid());

  tx.execute(
    "INSERT INTO votes (user_id, story_id, comment_id, vote, reason, updated_at)
     VALUES (?1, ?2, NULL, 1, NULL, ?3)",
    params![input.user_id.0, story_id.0, encode_dt(now)],
  )?;
  write_taggings(&tx, story_id, &tags)?;
  bump_keystore(&tx, &format!("user:{}:stories_submitted", input.user_id), 1)?;

  let mut stale = Stale::default();
  stale.absorb(refresh_hotness(&tx, story_id))?;
  let created = story(&tx, story_id)?;
  tx.commit()?;
  debug!(story = %story_id, user = %input.user_id, "submitted story");
  stale.finish(created)
}

pub fn set_story_tags(conn: &mut Connection, id: StoryId, tags: Vec<TagId>) -> Result<Story> {
  let tx = begin(conn)?;
  story(&tx, id)?;
  let tags = checked_tags(&tx, tags)?;
  write_taggings(&tx, id, &tags)?;

  let mut stale = Stale::default();
  stale.absorb(refresh_hotness(&tx, id))?;
  let updated = story(&tx, id)?;
  tx.commit()?;
  stale.finish(updated)
}

pub fn merge_story(conn: &mut Connection, id: StoryId, into: Option<StoryId>) -> Result<Story> {
  if into == Some(id) {
    return Err(CoreError::SelfMerge(id).into());
  }

  let tx = begin(conn)?;
  let before = story(&tx, id)?;
  if let Some(target) = into {
    story(&tx, target)?;
  }
  tx.execute(
    "UPDATE stories SET merged_story_id = ?2 WHERE story_id = ?1",
    params![id.0, into.map(|s| s.0)],
  )?;

  let affected: BTreeSet<StoryId> =
    [before.merged_story_id, into, Some(id)].into_iter().flatten().collect();
  let mut stale = Stale::default();
  for &s in &affected {
    refresh_comments_count(&tx, s)?;
    stale.absorb(refresh_hotness(&tx, s))?;
  }
  let merged = story(&tx, id)?;
  tx.commit()?;
  debug!(story = %id, into = ?into.map(|s| s.0), "merged story");
  stale.finish(merged)
}

pub fn set_story_expired(conn: &mut Connection, id: StoryId, expired: bool) -> Result<Story> {
  let tx = begin(conn)?;
  story(&tx, id)?;
  tx.execute(
    "UPDATE stories SET is_expired = ?2 WHERE story_id = ?1",
    params![id.0, expired],
  )?;
  let updated = story(&tx, id)?;
  tx.commit()?;
  Ok(updated)
}

// ─── Comments ────────────────────────────────────────────────────────────────

pub fn post_comment(
  conn: &mut Connection,
  input: NewComment,
  now: DateTime<Utc>,
) -> Result<Comment> {
  let tx = begin(conn)?;
  user(&tx, input.user_id)?;
  let parent_story = story(&tx, input.story_id)?;

  let thread_id = match input.parent_comment_id {
    Some(parent_id) => {
      let parent = comment(&tx, parent_id)?;
      if parent.story_id != input.story_id {
        return Err(
          CoreError::InvalidParent { parent: parent_id, story: input.story_id }.into(),
        );
      }
      parent.thread_id
    }
    None => bump_keystore(&tx, "thread_id", 1)?,
  };

  tx.execute(
    "INSERT INTO comments (
       story_id, user_id, parent_comment_id, thread_id, body, created_at,
       upvotes, confidence
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
    params![
      input.story_id.0,
      input.user_id.0,
      input.parent_comment_id.map(|c| c.0),
      thread_id,
      input.body,
      encode_dt(input.created_at.unwrap_or(now)),
      confidence(1, 0),
    ],
  )?;
  let comment_id = CommentId(tx.last_insert_rowid());

  tx.execute(
    "INSERT INTO votes (user_id, story_id, comment_id, vote, reason, updated_at)
     VALUES (?1, ?2, ?3, 1, NULL, ?4)",
    params![input.user_id.0, input.story_id.0, comment_id.0, encode_dt(now)],
  )?;
  bump_keystore(&tx, &format!("user:{}:comments_posted", input.user_id), 1)?;
  refresh_counts(&tx, &parent_story)?;

  let mut stale = Stale::default();
  stale.absorb(refresh_hotness(&tx, input.story_id))?;
  let created = comment(&tx, comment_id)?;
  tx.commit()?;
  debug!(comment = %comment_id, story = %input.story_id, thread_id, "posted comment");
  stale.finish(created)
}

/// Refresh what a comment's visibility feeds: the story's comment count and
/// hotness.
fn refresh_visibility(conn: &Connection, c: &Comment, stale: &mut Stale) -> Result<()> {
  let parent_story = story(conn, c.story_id)?;
  refresh_counts(conn, &parent_story)?;
  stale.absorb(refresh_hotness(conn, c.story_id))
}

pub fn delete_comment(
  conn: &mut Connection,
  id: CommentId,
  by: UserId,
  reason: Option<String>,
) -> Result<Comment> {
  let tx = begin(conn)?;
  let c = comment(&tx, id)?;
  let actor = user(&tx, by)?;

  if actor.is_moderator && actor.user_id != c.user_id {
    tx.execute(
      "UPDATE comments SET is_moderated = 1, moderation_reason = ?2 WHERE comment_id = ?1",
      params![id.0, reason],
    )?;
  } else {
    tx.execute("UPDATE comments SET is_deleted = 1 WHERE comment_id = ?1", params![id.0])?;
  }

  let mut stale = Stale::default();
  refresh_visibility(&tx, &c, &mut stale)?;
  let updated = comment(&tx, id)?;
  tx.commit()?;
  debug!(comment = %id, by = %by, "deleted comment");
  stale.finish(updated)
}

pub fn undelete_comment(conn: &mut Connection, id: CommentId) -> Result<Comment> {
  let tx = begin(conn)?;
  let c = comment(&tx, id)?;
  tx.execute(
    "UPDATE comments
     SET is_deleted = 0, is_moderated = 0, moderation_reason = NULL
     WHERE comment_id = ?1",
    params![id.0],
  )?;

  let mut stale = Stale::default();
  refresh_visibility(&tx, &c, &mut stale)?;
  let updated = comment(&tx, id)?;
  tx.commit()?;
  stale.finish(updated)
}

// ─── Votes ───────────────────────────────────────────────────────────────────

const VOTE_KEY: &str = "user_id = ?1 AND story_id = ?2 AND comment_id IS ?3";

/// The author of the vote target, checking that it exists and that a
/// comment target belongs to the named story.
fn target_author(conn: &Connection, target: VoteTarget) -> Result<UserId> {
  let story_author = story(conn, target.story_id())?.user_id;
  match target {
    VoteTarget::Story(_) => Ok(story_author),
    VoteTarget::Comment { story_id, comment_id } => conn
      .query_row(
        "SELECT user_id FROM comments WHERE comment_id = ?1 AND story_id = ?2",
        params![comment_id.0, story_id.0],
        |r| r.get(0),
      )
      .optional()?
      .map(UserId)
      .ok_or_else(|| not_found(Entity::Comment(comment_id))),
  }
}

pub fn find_vote(conn: &Connection, user_id: UserId, target: VoteTarget) -> Result<Option<Vote>> {
  let row: Option<(i64, Option<String>)> = conn
    .query_row(
      &format!("SELECT vote, reason FROM votes WHERE {VOTE_KEY}"),
      params![user_id.0, target.story_id().0, target.comment_id().map(|c| c.0)],
      |r| Ok((r.get(0)?, r.get(1)?)),
    )
    .optional()?;

  row
    .map(|(value, reason)| -> Result<Vote> {
      Ok(Vote {
        user_id,
        target,
        direction: decode_direction(value)?,
        reason: decode_reason(target.kind(), reason.as_deref())?,
      })
    })
    .transpose()
}

/// Apply `delta` to the target's counters and, unless the voter is the
/// author, to the author's karma.
fn apply_delta(
  conn: &Connection,
  target: VoteTarget,
  author: UserId,
  voter: UserId,
  delta: CounterDelta,
) -> Result<()> {
  if delta.is_zero() {
    return Ok(());
  }

  match target {
    VoteTarget::Story(id) => conn.execute(
      "UPDATE stories SET upvotes = upvotes + ?2, downvotes = downvotes + ?3
       WHERE story_id = ?1",
      params![id.0, delta.upvotes, delta.downvotes],
    )?,
    VoteTarget::Comment { comment_id, .. } => conn.execute(
      "UPDATE comments SET upvotes = upvotes + ?2, downvotes = downvotes + ?3
       WHERE comment_id = ?1",
      params![comment_id.0, delta.upvotes, delta.downvotes],
    )?,
  };

  if author != voter && delta.score() != 0 {
    conn.execute(
      "UPDATE users SET karma = karma + ?2 WHERE user_id = ?1",
      params![author.0, delta.score()],
    )?;
  }
  Ok(())
}

fn tally_of(conn: &Connection, target: VoteTarget) -> Result<VoteTally> {
  let sql = match target {
    VoteTarget::Story(_) => "SELECT upvotes, downvotes FROM stories WHERE story_id = ?1",
    VoteTarget::Comment { .. } => "SELECT upvotes, downvotes FROM comments WHERE comment_id = ?1",
  };
  let id = match target {
    VoteTarget::Story(id) => id.0,
    VoteTarget::Comment { comment_id, .. } => comment_id.0,
  };
  Ok(conn.query_row(sql, params![id], |r| {
    Ok(VoteTally { upvotes: r.get(0)?, downvotes: r.get(1)? })
  })?)
}

/// Recompute what depends on the target's counters: the comment's
/// confidence, then the story's hotness and that of its merge target.
fn refresh_target(conn: &Connection, target: VoteTarget, stale: &mut Stale) -> Result<()> {
  if let Some(comment_id) = target.comment_id() {
    refresh_confidence(conn, comment_id)?;
  }
  refresh_score_dependents(conn, target.story_id(), stale)
}

/// Recompute the story's hotness and, if it is merged, the hotness of the
/// story it was merged into, which counts its score.
fn refresh_score_dependents(conn: &Connection, id: StoryId, stale: &mut Stale) -> Result<()> {
  stale.absorb(refresh_hotness(conn, id))?;
  if let Some(target) = story(conn, id)?.merged_story_id {
    stale.absorb(refresh_hotness(conn, target))?;
  }
  Ok(())
}

pub fn apply_vote(conn: &mut Connection, vote: CastVote, now: DateTime<Utc>) -> Result<VoteTally> {
  let reason = vote.effective_reason()?;

  let tx = begin(conn)?;
  user(&tx, vote.user_id)?;
  let author = target_author(&tx, vote.target)?;
  let old = find_vote(&tx, vote.user_id, vote.target)?.map(|v| v.direction);

  match (old, vote.direction) {
    (None, VoteDirection::NoVote) => {}
    (Some(_), VoteDirection::NoVote) => {
      tx.execute(
        &format!("DELETE FROM votes WHERE {VOTE_KEY}"),
        params![vote.user_id.0, vote.target.story_id().0, vote.target.comment_id().map(|c| c.0)],
      )?;
    }
    (Some(_), direction) => {
      tx.execute(
        &format!("UPDATE votes SET vote = ?4, reason = ?5, updated_at = ?6 WHERE {VOTE_KEY}"),
        params![
          vote.user_id.0,
          vote.target.story_id().0,
          vote.target.comment_id().map(|c| c.0),
          direction.value(),
          encode_reason(reason),
          encode_dt(now),
        ],
      )?;
    }
    (None, direction) => {
      tx.execute(
        "INSERT INTO votes (user_id, story_id, comment_id, vote, reason, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
          vote.user_id.0,
          vote.target.story_id().0,
          vote.target.comment_id().map(|c| c.0),
          direction.value(),
          encode_reason(reason),
          encode_dt(now),
        ],
      )?;
    }
  }

  let delta = CounterDelta::between(old, vote.direction);
  apply_delta(&tx, vote.target, author, vote.user_id, delta)?;
  let tally = tally_of(&tx, vote.target)?;

  let mut stale = Stale::default();
  refresh_target(&tx, vote.target, &mut stale)?;
  tx.commit()?;

  debug!(
    user = %vote.user_id,
    target = ?vote.target,
    direction = vote.direction.value(),
    upvotes = tally.upvotes,
    downvotes = tally.downvotes,
    "applied vote"
  );
  stale.finish(tally)
}

pub fn vote_summary(conn: &Connection, target: VoteTarget) -> Result<VoteSummary> {
  target_author(conn, target)?;
  let mut stmt = conn.prepare(
    "SELECT vote, reason FROM votes WHERE story_id = ?1 AND comment_id IS ?2",
  )?;
  let rows = stmt
    .query_map(
      params![target.story_id().0, target.comment_id().map(|c| c.0)],
      |r| Ok((r.get::<_, i64>(0)?, r.get::<_, Option<String>>(1)?)),
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut summary = VoteSummary::default();
  for (value, reason) in rows {
    let reason: Option<VoteReason> = decode_reason(target.kind(), reason.as_deref())?;
    summary.record(decode_direction(value)?, reason);
  }
  Ok(summary)
}

// ─── Listings and viewer state ───────────────────────────────────────────────

pub fn list(
  conn: &Connection,
  kind: ListingKind,
  mut filters: ViewerFilters,
  config: &ListingConfig,
  now: DateTime<Utc>,
) -> Result<Listing> {
  if let Some(viewer) = filters.viewer {
    filters.exclude_tags.extend(tag_filters(conn, viewer)?);
  }

  let query = ListingQuery::build(&kind, &filters, config, now);
  let (sql, values) = query::render(&query);
  let mut stmt = conn.prepare(&sql)?;
  let raws = stmt
    .query_map(params_from_iter(values), RawStory::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  let stories = raws.into_iter().map(RawStory::into_story).collect::<Result<Vec<_>>>()?;
  Ok(Listing::new(stories))
}

pub fn set_hidden(conn: &mut Connection, user_id: UserId, id: StoryId, hidden: bool) -> Result<()> {
  let tx = begin(conn)?;
  user(&tx, user_id)?;
  story(&tx, id)?;
  if hidden {
    tx.execute(
      "INSERT OR IGNORE INTO hidden_stories (user_id, story_id) VALUES (?1, ?2)",
      params![user_id.0, id.0],
    )?;
  } else {
    tx.execute(
      "DELETE FROM hidden_stories WHERE user_id = ?1 AND story_id = ?2",
      params![user_id.0, id.0],
    )?;
  }
  tx.commit()?;
  Ok(())
}

pub fn set_tag_filters(conn: &mut Connection, user_id: UserId, mut tags: Vec<TagId>) -> Result<()> {
  let tx = begin(conn)?;
  user(&tx, user_id)?;
  tags.sort();
  tags.dedup();
  for &t in &tags {
    tag(&tx, t)?;
  }

  tx.execute("DELETE FROM tag_filters WHERE user_id = ?1", params![user_id.0])?;
  {
    let mut stmt = tx.prepare("INSERT INTO tag_filters (user_id, tag_id) VALUES (?1, ?2)")?;
    for t in &tags {
      stmt.execute(params![user_id.0, t.0])?;
    }
  }
  tx.commit()?;
  Ok(())
}

// ─── Maintenance ─────────────────────────────────────────────────────────────

/// Recompute every story's hotness, newest first. Stories whose recompute
/// fails keep their cached value and are left out of the count.
pub fn recalculate_all_hotness(conn: &mut Connection) -> Result<usize> {
  let tx = begin(conn)?;
  let ids = {
    let mut stmt = tx.prepare("SELECT story_id FROM stories ORDER BY story_id DESC")?;
    stmt
      .query_map([], |r| r.get(0))?
      .collect::<rusqlite::Result<Vec<i64>>>()?
  };

  let mut updated = 0;
  let mut failed = 0;
  for id in ids {
    match refresh_hotness(&tx, StoryId(id)) {
      Ok(()) => updated += 1,
      Err(Error::Core(CoreError::RecomputeFailure(msg))) => {
        warn!(story = id, reason = %msg, "hotness recompute failed");
        failed += 1;
      }
      Err(e) => return Err(e),
    }
  }
  tx.commit()?;
  info!(updated, failed, "recalculated story hotness");
  Ok(updated)
}

/// Remove every vote cast by `user_id`, reversing counters and karma.
pub fn purge_votes_by_user(conn: &mut Connection, user_id: UserId) -> Result<usize> {
  let tx = begin(conn)?;
  user(&tx, user_id)?;

  let votes = {
    let mut stmt =
      tx.prepare("SELECT story_id, comment_id, vote FROM votes WHERE user_id = ?1")?;
    stmt
      .query_map(params![user_id.0], |r| {
        Ok((r.get::<_, i64>(0)?, r.get::<_, Option<i64>>(1)?, r.get::<_, i64>(2)?))
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?
  };

  let mut stories = BTreeSet::new();
  let mut comments = BTreeSet::new();
  for &(story_id, comment_id, value) in &votes {
    let target = match comment_id {
      Some(c) => VoteTarget::Comment { story_id: StoryId(story_id), comment_id: CommentId(c) },
      None => VoteTarget::Story(StoryId(story_id)),
    };
    let delta = CounterDelta::between(Some(decode_direction(value)?), VoteDirection::NoVote);
    let author = target_author(&tx, target)?;
    apply_delta(&tx, target, author, user_id, delta)?;

    stories.insert(StoryId(story_id));
    if let Some(c) = comment_id {
      comments.insert(CommentId(c));
    }
  }
  tx.execute("DELETE FROM votes WHERE user_id = ?1", params![user_id.0])?;

  for &c in &comments {
    refresh_confidence(&tx, c)?;
  }
  let mut stale = Stale::default();
  for &s in &stories {
    refresh_score_dependents(&tx, s, &mut stale)?;
  }
  tx.commit()?;
  info!(user = %user_id, votes = votes.len(), "purged votes");
  stale.finish(votes.len())
}

