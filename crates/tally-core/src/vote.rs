//! Votes, the tri-state vote direction and the counter arithmetic the vote
//! engine applies to the score ledger.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{CommentId, Error, Result, StoryId, UserId};

// ─── Direction ───────────────────────────────────────────────────────────────

/// What a user wants their vote on an entity to be.
///
/// `NoVote` retracts: the stored vote row is deleted and its contribution
/// removed. A user who never voted and one who retracted are indistinguishable
/// afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum VoteDirection {
  Upvote,
  Downvote,
  NoVote,
}

impl VoteDirection {
  /// `(upvotes, downvotes)` this direction adds to the ledger.
  pub fn contribution(self) -> (i64, i64) {
    match self {
      Self::Upvote => (1, 0),
      Self::Downvote => (0, 1),
      Self::NoVote => (0, 0),
    }
  }

  pub fn value(self) -> i64 {
    match self {
      Self::Upvote => 1,
      Self::Downvote => -1,
      Self::NoVote => 0,
    }
  }
}

impl TryFrom<i64> for VoteDirection {
  type Error = Error;

  fn try_from(value: i64) -> Result<Self> {
    match value {
      1 => Ok(Self::Upvote),
      -1 => Ok(Self::Downvote),
      0 => Ok(Self::NoVote),
      other => Err(Error::InvalidVoteValue(other)),
    }
  }
}

impl From<VoteDirection> for i64 {
  fn from(d: VoteDirection) -> Self { d.value() }
}

// ─── Counter delta ───────────────────────────────────────────────────────────

/// The change a vote transition applies to an entity's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterDelta {
  pub upvotes:   i64,
  pub downvotes: i64,
}

impl CounterDelta {
  /// Remove the contribution of `old` (if any) and apply `new`.
  pub fn between(old: Option<VoteDirection>, new: VoteDirection) -> Self {
    let (old_up, old_down) = old.map(VoteDirection::contribution).unwrap_or((0, 0));
    let (new_up, new_down) = new.contribution();
    Self { upvotes: new_up - old_up, downvotes: new_down - old_down }
  }

  pub fn is_zero(&self) -> bool { self.upvotes == 0 && self.downvotes == 0 }

  /// Change in `upvotes - downvotes`; also the author's karma change.
  pub fn score(&self) -> i64 { self.upvotes - self.downvotes }

  pub fn reversed(self) -> Self {
    Self { upvotes: -self.upvotes, downvotes: -self.downvotes }
  }
}

// ─── Targets ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VotableKind {
  Story,
  Comment,
}

impl fmt::Display for VotableKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Story => "story",
      Self::Comment => "comment",
    })
  }
}

/// The entity a vote is cast on. Comment votes also name the story so the
/// vote key is `(user, story, comment)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VoteTarget {
  Story(StoryId),
  Comment { story_id: StoryId, comment_id: CommentId },
}

impl VoteTarget {
  pub fn kind(&self) -> VotableKind {
    match self {
      Self::Story(_) => VotableKind::Story,
      Self::Comment { .. } => VotableKind::Comment,
    }
  }

  pub fn story_id(&self) -> StoryId {
    match *self {
      Self::Story(id) => id,
      Self::Comment { story_id, .. } => story_id,
    }
  }

  pub fn comment_id(&self) -> Option<CommentId> {
    match *self {
      Self::Story(_) => None,
      Self::Comment { comment_id, .. } => Some(comment_id),
    }
  }
}

// ─── Reasons ─────────────────────────────────────────────────────────────────

/// Why a user downvoted. Codes are single letters; `T` means "poorly tagged"
/// on stories and "troll" on comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteReason {
  OffTopic,
  Spam,
  // Stories
  AlreadyPosted,
  PoorlyTagged,
  PoorlyTitled,
  // Comments
  Incorrect,
  MeToo,
  Troll,
}

impl VoteReason {
  pub fn code(self) -> &'static str {
    match self {
      Self::OffTopic => "O",
      Self::Spam => "S",
      Self::AlreadyPosted => "A",
      Self::PoorlyTagged => "T",
      Self::PoorlyTitled => "L",
      Self::Incorrect => "I",
      Self::MeToo => "M",
      Self::Troll => "T",
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      Self::OffTopic => "Off-topic",
      Self::Spam => "Spam",
      Self::AlreadyPosted => "Already Posted",
      Self::PoorlyTagged => "Poorly Tagged",
      Self::PoorlyTitled => "Poorly Titled",
      Self::Incorrect => "Incorrect",
      Self::MeToo => "Me-too",
      Self::Troll => "Troll",
    }
  }

  pub fn applies_to(self, kind: VotableKind) -> bool {
    match self {
      Self::OffTopic | Self::Spam => true,
      Self::AlreadyPosted | Self::PoorlyTagged | Self::PoorlyTitled => {
        kind == VotableKind::Story
      }
      Self::Incorrect | Self::MeToo | Self::Troll => kind == VotableKind::Comment,
    }
  }

  /// Decode a stored or submitted reason code for the given target kind.
  pub fn parse(kind: VotableKind, code: &str) -> Result<Self> {
    let reason = match (kind, code) {
      (_, "O") => Self::OffTopic,
      (_, "S") => Self::Spam,
      (VotableKind::Story, "A") => Self::AlreadyPosted,
      (VotableKind::Story, "T") => Self::PoorlyTagged,
      (VotableKind::Story, "L") => Self::PoorlyTitled,
      (VotableKind::Comment, "I") => Self::Incorrect,
      (VotableKind::Comment, "M") => Self::MeToo,
      (VotableKind::Comment, "T") => Self::Troll,
      _ => return Err(Error::InvalidReason { kind, code: code.to_owned() }),
    };
    Ok(reason)
  }
}

// ─── Votes ───────────────────────────────────────────────────────────────────

/// A stored vote row. Retracted votes are deleted, so `direction` is never
/// [`VoteDirection::NoVote`] here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
  pub user_id:   UserId,
  pub target:    VoteTarget,
  pub direction: VoteDirection,
  pub reason:    Option<VoteReason>,
}

/// Input to [`crate::store::ForumStore::apply_vote`].
#[derive(Debug, Clone)]
pub struct CastVote {
  pub user_id:   UserId,
  pub target:    VoteTarget,
  pub direction: VoteDirection,
  /// Only recorded on downvotes; must apply to the target kind.
  pub reason:    Option<VoteReason>,
}

impl CastVote {
  pub fn new(user_id: UserId, target: VoteTarget, direction: VoteDirection) -> Self {
    Self { user_id, target, direction, reason: None }
  }

  pub fn because(mut self, reason: VoteReason) -> Self {
    self.reason = Some(reason);
    self
  }

  /// The reason to store: dropped unless this is a downvote, rejected when it
  /// does not apply to the target kind.
  pub fn effective_reason(&self) -> Result<Option<VoteReason>> {
    let kind = self.target.kind();
    match self.reason {
      Some(reason) if !reason.applies_to(kind) => Err(Error::InvalidReason {
        kind,
        code: reason.code().to_owned(),
      }),
      Some(reason) if self.direction == VoteDirection::Downvote => Ok(Some(reason)),
      _ => Ok(None),
    }
  }
}

/// Counters of a votable entity after a vote was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
  pub upvotes:   u32,
  pub downvotes: u32,
}

impl VoteTally {
  pub fn score(&self) -> i64 { i64::from(self.upvotes) - i64::from(self.downvotes) }
}

// ─── Summary ─────────────────────────────────────────────────────────────────

/// Aggregate of the votes on one entity, grouped by downvote reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSummary {
  pub upvotes:               u32,
  /// Downvotes recorded without a reason.
  pub unexplained_downvotes: u32,
  /// Sorted by reason code.
  pub reasons:               Vec<(VoteReason, u32)>,
}

impl VoteSummary {
  pub fn record(&mut self, direction: VoteDirection, reason: Option<VoteReason>) {
    match (direction, reason) {
      (VoteDirection::Upvote, _) => self.upvotes += 1,
      (VoteDirection::Downvote, None) => self.unexplained_downvotes += 1,
      (VoteDirection::Downvote, Some(reason)) => {
        match self.reasons.iter_mut().find(|(r, _)| *r == reason) {
          Some((_, count)) => *count += 1,
          None => {
            self.reasons.push((reason, 1));
            self.reasons.sort_by_key(|(r, _)| (r.code(), *r));
          }
        }
      }
      (VoteDirection::NoVote, _) => {}
    }
  }
}

impl fmt::Display for VoteSummary {
  /// Renders e.g. `+3, -1 Off-topic, -2 Spam`.
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut parts = Vec::new();
    if self.upvotes > 0 {
      parts.push(format!("+{}", self.upvotes));
    }
    if self.unexplained_downvotes > 0 {
      parts.push(format!("-{}", self.unexplained_downvotes));
    }
    for (reason, count) in &self.reasons {
      parts.push(format!("-{count} {}", reason.label()));
    }
    f.write_str(&parts.join(", "))
  }
}
