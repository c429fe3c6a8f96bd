//! Error types for `tally-core`.

use std::fmt;

use thiserror::Error;

use crate::{CommentId, StoryId, TagId, UserId, vote::VotableKind};

/// The kind and id of a record that could not be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
  Story(StoryId),
  Comment(CommentId),
  User(UserId),
  Tag(TagId),
}

impl fmt::Display for Entity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Story(id) => write!(f, "story {id}"),
      Self::Comment(id) => write!(f, "comment {id}"),
      Self::User(id) => write!(f, "user {id}"),
      Self::Tag(id) => write!(f, "tag {id}"),
    }
  }
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid vote value {0}; expected -1, 0 or 1")]
  InvalidVoteValue(i64),

  #[error("{0} not found")]
  EntityNotFound(Entity),

  /// The counters were locked by another writer. Nothing was applied; the
  /// whole operation may be retried.
  #[error("concurrent update conflict; retry the operation")]
  ConcurrentUpdateConflict,

  /// A derived score could not be computed. The triggering write is kept and
  /// the cached value is stale until the next successful recompute.
  #[error("recompute failed: {0}")]
  RecomputeFailure(String),

  #[error("invalid {kind} vote reason {code:?}")]
  InvalidReason { kind: VotableKind, code: String },

  #[error("parent comment {parent} does not belong to story {story}")]
  InvalidParent { parent: CommentId, story: StoryId },

  #[error("unknown time interval {0:?}")]
  InvalidInterval(String),

  #[error("hotness modifier must be finite, got {0}")]
  InvalidHotnessMod(f64),

  #[error("story {0} cannot be merged into itself")]
  SelfMerge(StoryId),

  #[error("tag {0:?} is inactive")]
  InactiveTag(String),

  #[error("name {0:?} is already taken")]
  DuplicateName(String),
}

impl Error {
  /// Whether the caller may retry the failed operation unchanged.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::ConcurrentUpdateConflict)
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
