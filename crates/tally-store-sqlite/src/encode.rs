//! Encoding and decoding helpers between Tally domain types and the values
//! stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings with
//! microseconds, so string comparison in SQL is time comparison. Ids are
//! plain integers; booleans are 0/1 integers.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use tally_core::{
  CommentId, StoryId, TagId, UserId,
  comment::Comment,
  story::{Story, Tag},
  user::User,
  vote::{VotableKind, VoteDirection, VoteReason},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Votes ───────────────────────────────────────────────────────────────────

pub fn decode_direction(v: i64) -> Result<VoteDirection> { Ok(VoteDirection::try_from(v)?) }

pub fn encode_reason(r: Option<VoteReason>) -> Option<&'static str> { r.map(VoteReason::code) }

pub fn decode_reason(kind: VotableKind, code: Option<&str>) -> Result<Option<VoteReason>> {
  Ok(code.map(|c| VoteReason::parse(kind, c)).transpose()?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str = "user_id, username, karma, is_moderator, created_at";

pub struct RawUser {
  pub user_id:      i64,
  pub username:     String,
  pub karma:        i64,
  pub is_moderator: bool,
  pub created_at:   String,
}

impl RawUser {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:      row.get(0)?,
      username:     row.get(1)?,
      karma:        row.get(2)?,
      is_moderator: row.get(3)?,
      created_at:   row.get(4)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:      UserId(self.user_id),
      username:     self.username,
      karma:        self.karma,
      is_moderator: self.is_moderator,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// Tag columns, qualified with the `t` alias.
pub const TAG_COLUMNS: &str =
  "t.tag_id, t.tag, t.description, t.hotness_mod, t.privileged, t.is_media, t.inactive";

/// Tag row. A NULL `hotness_mod` decodes to NaN so the hotness formula can
/// reject it.
pub struct RawTag {
  pub tag_id:      i64,
  pub tag:         String,
  pub description: Option<String>,
  pub hotness_mod: Option<f64>,
  pub privileged:  bool,
  pub is_media:    bool,
  pub inactive:    bool,
}

impl RawTag {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      tag_id:      row.get(0)?,
      tag:         row.get(1)?,
      description: row.get(2)?,
      hotness_mod: row.get(3)?,
      privileged:  row.get(4)?,
      is_media:    row.get(5)?,
      inactive:    row.get(6)?,
    })
  }

  pub fn into_tag(self) -> Tag {
    Tag {
      tag_id:      TagId(self.tag_id),
      tag:         self.tag,
      description: self.description,
      hotness_mod: self.hotness_mod.unwrap_or(f64::NAN),
      privileged:  self.privileged,
      is_media:    self.is_media,
      inactive:    self.inactive,
    }
  }
}

/// Story columns, qualified with the `s` alias used by every story query.
pub const STORY_COLUMNS: &str = "s.story_id, s.user_id, s.title, s.url, s.description, \
                                 s.created_at, s.upvotes, s.downvotes, s.hotness, \
                                 s.comments_count, s.is_expired, s.merged_story_id, \
                                 s.user_is_author";

pub struct RawStory {
  pub story_id:        i64,
  pub user_id:         i64,
  pub title:           String,
  pub url:             Option<String>,
  pub description:     String,
  pub created_at:      String,
  pub upvotes:         u32,
  pub downvotes:       u32,
  pub hotness:         f64,
  pub comments_count:  u32,
  pub is_expired:      bool,
  pub merged_story_id: Option<i64>,
  pub user_is_author:  bool,
}

impl RawStory {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      story_id:        row.get(0)?,
      user_id:         row.get(1)?,
      title:           row.get(2)?,
      url:             row.get(3)?,
      description:     row.get(4)?,
      created_at:      row.get(5)?,
      upvotes:         row.get(6)?,
      downvotes:       row.get(7)?,
      hotness:         row.get(8)?,
      comments_count:  row.get(9)?,
      is_expired:      row.get(10)?,
      merged_story_id: row.get(11)?,
      user_is_author:  row.get(12)?,
    })
  }

  pub fn into_story(self) -> Result<Story> {
    Ok(Story {
      story_id:        StoryId(self.story_id),
      user_id:         UserId(self.user_id),
      title:           self.title,
      url:             self.url,
      description:     self.description,
      created_at:      decode_dt(&self.created_at)?,
      upvotes:         self.upvotes,
      downvotes:       self.downvotes,
      hotness:         self.hotness,
      comments_count:  self.comments_count,
      is_expired:      self.is_expired,
      merged_story_id: self.merged_story_id.map(StoryId),
      user_is_author:  self.user_is_author,
    })
  }
}

pub const COMMENT_COLUMNS: &str = "c.comment_id, c.story_id, c.user_id, c.parent_comment_id, \
                                   c.thread_id, c.body, c.created_at, c.upvotes, c.downvotes, \
                                   c.confidence, c.is_deleted, c.is_moderated";

pub struct RawComment {
  pub comment_id:        i64,
  pub story_id:          i64,
  pub user_id:           i64,
  pub parent_comment_id: Option<i64>,
  pub thread_id:         i64,
  pub body:              String,
  pub created_at:        String,
  pub upvotes:           u32,
  pub downvotes:         u32,
  pub confidence:        f64,
  pub is_deleted:        bool,
  pub is_moderated:      bool,
}

impl RawComment {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      comment_id:        row.get(0)?,
      story_id:          row.get(1)?,
      user_id:           row.get(2)?,
      parent_comment_id: row.get(3)?,
      thread_id:         row.get(4)?,
      body:              row.get(5)?,
      created_at:        row.get(6)?,
      upvotes:           row.get(7)?,
      downvotes:         row.get(8)?,
      confidence:        row.get(9)?,
      is_deleted:        row.get(10)?,
      is_moderated:      row.get(11)?,
    })
  }

  pub fn into_comment(self) -> Result<Comment> {
    Ok(Comment {
      comment_id:        CommentId(self.comment_id),
      story_id:          StoryId(self.story_id),
      user_id:           UserId(self.user_id),
      parent_comment_id: self.parent_comment_id.map(CommentId),
      thread_id:         self.thread_id,
      body:              self.body,
      created_at:        decode_dt(&self.created_at)?,
      upvotes:           self.upvotes,
      downvotes:         self.downvotes,
      confidence:        self.confidence,
      is_deleted:        self.is_deleted,
      is_moderated:      self.is_moderated,
    })
  }
}
