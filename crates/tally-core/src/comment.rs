//! Comments and the thread structure they form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CommentId, StoryId, UserId};

/// A comment on a story.
///
/// Comments form a forest per story through `parent_comment_id`. Every node
/// of one tree carries the `thread_id` allocated for its top-level comment;
/// it is assigned at creation and never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
  pub comment_id:        CommentId,
  pub story_id:          StoryId,
  pub user_id:           UserId,
  pub parent_comment_id: Option<CommentId>,
  pub thread_id:         i64,
  pub body:              String,
  pub created_at:        DateTime<Utc>,
  pub upvotes:           u32,
  pub downvotes:         u32,
  /// Cached Wilson lower bound; see [`crate::confidence::confidence`].
  pub confidence:        f64,
  pub is_deleted:        bool,
  pub is_moderated:      bool,
}

impl Comment {
  pub fn score(&self) -> i64 { i64::from(self.upvotes) - i64::from(self.downvotes) }

  /// Deleted by its author or removed by a moderator.
  pub fn is_gone(&self) -> bool { self.is_deleted || self.is_moderated }
}

/// Input to [`crate::store::ForumStore::post_comment`].
#[derive(Debug, Clone)]
pub struct NewComment {
  pub story_id:          StoryId,
  pub user_id:           UserId,
  pub parent_comment_id: Option<CommentId>,
  pub body:              String,
  /// Posting time; defaults to now.
  pub created_at:        Option<DateTime<Utc>>,
}

impl NewComment {
  pub fn top_level(story_id: StoryId, user_id: UserId, body: impl Into<String>) -> Self {
    Self {
      story_id,
      user_id,
      parent_comment_id: None,
      body: body.into(),
      created_at: None,
    }
  }

  pub fn reply(
    story_id: StoryId,
    user_id: UserId,
    parent: CommentId,
    body: impl Into<String>,
  ) -> Self {
    Self {
      parent_comment_id: Some(parent),
      ..Self::top_level(story_id, user_id, body)
    }
  }
}
