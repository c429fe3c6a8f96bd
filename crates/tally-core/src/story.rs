//! Stories and the tags attached to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{StoryId, TagId, UserId};

// ─── Story ───────────────────────────────────────────────────────────────────

/// A submitted link or text post.
///
/// `hotness` is a cache column: it is recomputed by the store whenever one of
/// its inputs changes and must never be treated as authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
  pub story_id:        StoryId,
  pub user_id:         UserId,
  pub title:           String,
  pub url:             Option<String>,
  pub description:     String,
  pub created_at:      DateTime<Utc>,
  pub upvotes:         u32,
  pub downvotes:       u32,
  pub hotness:         f64,
  pub comments_count:  u32,
  pub is_expired:      bool,
  /// The story this one was merged into, if any. Merged stories are hidden
  /// from every listing behind their target.
  pub merged_story_id: Option<StoryId>,
  /// Set when the submitter wrote the linked content (always set for text
  /// posts).
  pub user_is_author:  bool,
}

impl Story {
  pub fn score(&self) -> i64 { i64::from(self.upvotes) - i64::from(self.downvotes) }
}

/// Input to [`crate::store::ForumStore::submit_story`].
#[derive(Debug, Clone)]
pub struct NewStory {
  pub user_id:        UserId,
  pub title:          String,
  pub url:            Option<String>,
  pub description:    String,
  pub user_is_author: bool,
  pub tags:           Vec<TagId>,
  /// Submission time; defaults to now. Set when backfilling old stories.
  pub created_at:     Option<DateTime<Utc>>,
}

impl NewStory {
  /// A link submission with no tags, description or backdating.
  pub fn link(user_id: UserId, title: impl Into<String>, url: impl Into<String>) -> Self {
    Self {
      user_id,
      title: title.into(),
      url: Some(url.into()),
      description: String::new(),
      user_is_author: false,
      tags: Vec::new(),
      created_at: None,
    }
  }

  /// A text post; the submitter is always its author.
  pub fn text(user_id: UserId, title: impl Into<String>, description: impl Into<String>) -> Self {
    Self {
      user_id,
      title: title.into(),
      url: None,
      description: description.into(),
      user_is_author: true,
      tags: Vec::new(),
      created_at: None,
    }
  }

  pub fn with_tags(mut self, tags: impl IntoIterator<Item = TagId>) -> Self {
    self.tags = tags.into_iter().collect();
    self
  }

  pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
    self.created_at = Some(at);
    self
  }
}

// ─── Tag ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
  pub tag_id:      TagId,
  pub tag:         String,
  pub description: Option<String>,
  /// Added to the hotness base of every story carrying the tag. Positive
  /// values make stories hotter, negative ones colder.
  pub hotness_mod: f64,
  pub privileged:  bool,
  pub is_media:    bool,
  pub inactive:    bool,
}

/// Input to [`crate::store::ForumStore::add_tag`].
#[derive(Debug, Clone, Default)]
pub struct NewTag {
  pub tag:         String,
  pub description: Option<String>,
  pub hotness_mod: f64,
  pub privileged:  bool,
  pub is_media:    bool,
  pub inactive:    bool,
}

impl NewTag {
  pub fn new(tag: impl Into<String>) -> Self {
    Self { tag: tag.into(), ..Self::default() }
  }

  pub fn hotness_mod(mut self, hotness_mod: f64) -> Self {
    self.hotness_mod = hotness_mod;
    self
  }
}
