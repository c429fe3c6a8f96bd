//! Story hotness: the decaying sort key of the front page.
//!
//! Lower values are hotter; listings sort ascending. The creation-time term
//! grows by one every [`HOTNESS_WINDOW`] seconds, so newer stories outrank
//! older ones with the same votes.

use crate::{Error, Result, UserId, comment::Comment, story::{Story, Tag}};

/// Seconds a hot story lingers: 22 hours.
pub const HOTNESS_WINDOW: f64 = 79_200.0;

/// Bump to the hotness base of stories written by their submitter.
pub const AUTHOR_BONUS: f64 = 0.25;

/// The vote counts of one comment, as seen by the hotness formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentVotes {
  pub user_id:   UserId,
  pub upvotes:   u32,
  pub downvotes: u32,
}

impl From<&Comment> for CommentVotes {
  fn from(c: &Comment) -> Self {
    Self { user_id: c.user_id, upvotes: c.upvotes, downvotes: c.downvotes }
  }
}

/// Compute the hotness of `story`.
///
/// - `tags`: the tags on the story.
/// - `comments`: the story's own comments; the submitter's are ignored.
/// - `merged`: stories merged into this one; their scores count as comment
///   activity.
///
/// Fails with [`Error::RecomputeFailure`] if a tag modifier is not finite.
pub fn hotness(
  story: &Story,
  tags: &[Tag],
  comments: &[CommentVotes],
  merged: &[Story],
) -> Result<f64> {
  if let Some(bad) = tags.iter().find(|t| !t.hotness_mod.is_finite()) {
    return Err(Error::RecomputeFailure(format!(
      "tag {:?} has a malformed hotness modifier",
      bad.tag
    )));
  }

  let base = tags.iter().map(|t| t.hotness_mod).sum::<f64>()
    + if story.user_is_author { AUTHOR_BONUS } else { 0.0 };

  let comment_sum: f64 = comments
    .iter()
    .filter(|c| c.user_id != story.user_id)
    .map(|c| {
      if base < 0.0 {
        // Stories that start out cold only count downvotes.
        f64::from(c.downvotes) * -0.5
      } else {
        f64::from(c.upvotes) + 1.0 - f64::from(c.downvotes)
      }
    })
    .sum();
  let mut comment_points = comment_sum * 0.5;

  comment_points += merged.iter().map(|s| s.score() as f64).sum::<f64>();

  // Lots of comment activity on a story few people upvoted is a bad sign.
  let upvotes = f64::from(story.upvotes);
  if comment_points > upvotes {
    comment_points = upvotes;
  }

  let score = story.score();
  let order = ((score + 1).abs() as f64 + comment_points).max(1.0).log10();
  let sign = score.signum() as f64;
  let age = story.created_at.timestamp_micros() as f64 / 1_000_000.0 / HOTNESS_WINDOW;

  let value = -round7((order * sign) + base + age);
  if !value.is_finite() {
    return Err(Error::RecomputeFailure(format!(
      "hotness of story {} is not finite",
      story.story_id
    )));
  }
  Ok(value)
}

fn round7(x: f64) -> f64 { (x * 1e7).round() / 1e7 }
