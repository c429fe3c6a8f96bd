//! Integer identifiers for the persisted record kinds.
//!
//! Each id is a transparent newtype over the database row id so a story id
//! can never be passed where a comment id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! row_id {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(
      Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    )]
    #[serde(transparent)]
    pub struct $name(pub i64);

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
    }

    impl From<i64> for $name {
      fn from(id: i64) -> Self { Self(id) }
    }
  };
}

row_id!(
  /// Row id of a story.
  StoryId
);
row_id!(
  /// Row id of a comment.
  CommentId
);
row_id!(
  /// Row id of a user account.
  UserId
);
row_id!(
  /// Row id of a tag.
  TagId
);
