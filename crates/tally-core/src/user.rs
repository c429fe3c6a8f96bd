//! User accounts, as far as voting and listings need them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  pub user_id:      UserId,
  pub username:     String,
  /// Sum of the score deltas other users' votes applied to this user's
  /// stories and comments.
  pub karma:        i64,
  pub is_moderator: bool,
  pub created_at:   DateTime<Utc>,
}

/// Input to [`crate::store::ForumStore::add_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
  pub username:     String,
  pub is_moderator: bool,
}

impl NewUser {
  pub fn new(username: impl Into<String>) -> Self {
    Self { username: username.into(), is_moderator: false }
  }

  pub fn moderator(username: impl Into<String>) -> Self {
    Self { username: username.into(), is_moderator: true }
  }
}
