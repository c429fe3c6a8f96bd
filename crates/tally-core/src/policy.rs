//! Display and voting policy derived from an entity's score and age.
//!
//! None of this gates [`crate::store::ForumStore::apply_vote`]; callers that
//! want to refuse late or piled-on downvotes check these first.

use std::ops::RangeInclusive;

use chrono::{DateTime, Duration, Utc};

use crate::{comment::Comment, story::Story, thread::ThreadViewer};

/// Below this score an entity can no longer be downvoted.
pub const MIN_DOWNVOTABLE_SCORE: i64 = -5;

pub const STORY_DOWNVOTABLE_DAYS: i64 = 14;
pub const COMMENT_DOWNVOTABLE_DAYS: i64 = 7;

/// Comment scores in this range are not shown while the comment is young.
pub const HIDDEN_SCORE_RANGE: RangeInclusive<i64> = -2..=4;
pub const SCORE_HIDDEN_HOURS: i64 = 36;

impl Story {
  pub fn is_downvotable(&self, now: DateTime<Utc>) -> bool {
    self.score() >= MIN_DOWNVOTABLE_SCORE
      && now - self.created_at <= Duration::days(STORY_DOWNVOTABLE_DAYS)
  }
}

impl Comment {
  pub fn is_downvotable(&self, now: DateTime<Utc>) -> bool {
    self.score() >= MIN_DOWNVOTABLE_SCORE
      && now - self.created_at <= Duration::days(COMMENT_DOWNVOTABLE_DAYS)
  }

  /// Whether `viewer` may see this comment's score at `now`.
  pub fn score_visible_to(&self, viewer: &ThreadViewer, now: DateTime<Utc>) -> bool {
    if viewer.is_moderator {
      return true;
    }
    let young = now - self.created_at < Duration::hours(SCORE_HIDDEN_HOURS);
    !(young && HIDDEN_SCORE_RANGE.contains(&self.score()))
  }
}
