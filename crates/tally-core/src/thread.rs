//! Arrange a story's flat comment list into display order.
//!
//! Comments are walked depth-first from the top-level ones. Within a level,
//! higher confidence comes first; ties go to the older comment.

use std::{cmp::Ordering, collections::HashMap};

use serde::Serialize;

use crate::{CommentId, UserId, comment::Comment};

/// Who is looking at the thread. Decides whether gone comments stay visible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadViewer {
  pub user_id:      Option<UserId>,
  pub is_moderator: bool,
}

impl ThreadViewer {
  pub fn anonymous() -> Self { Self::default() }

  pub fn user(user_id: UserId) -> Self { Self { user_id: Some(user_id), is_moderator: false } }

  pub fn moderator(user_id: UserId) -> Self {
    Self { user_id: Some(user_id), is_moderator: true }
  }

  /// Moderators and the comment's author still see a gone comment that has
  /// no replies left.
  fn keeps_gone_leaf(&self, c: &Comment) -> bool {
    self.is_moderator || self.user_id == Some(c.user_id)
  }
}

/// A comment placed in the arranged thread.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentView {
  pub comment:         Comment,
  /// 1 for top-level comments, +1 per reply level.
  pub indent_level:    u32,
  /// Set on gone comments kept as placeholders; the body must not be shown.
  pub body_suppressed: bool,
}

/// Arrange `comments` for `viewer`.
///
/// Gone comments with no retained replies are dropped (unless the viewer
/// keeps them, see [`ThreadViewer`]); gone comments with replies stay as
/// suppressed placeholders. Comments whose parent is not in `comments` are
/// unreachable and left out.
pub fn arrange(comments: &[Comment], viewer: &ThreadViewer) -> Vec<CommentView> {
  let mut children: HashMap<Option<CommentId>, Vec<&Comment>> = HashMap::new();
  for c in comments {
    children.entry(c.parent_comment_id).or_default().push(c);
  }
  for siblings in children.values_mut() {
    siblings.sort_by(|a, b| sibling_order(a, b));
  }

  let mut out = Vec::with_capacity(comments.len());
  emit(&children, viewer, &mut out);
  out
}

fn sibling_order(a: &Comment, b: &Comment) -> Ordering {
  b.confidence
    .total_cmp(&a.confidence)
    .then_with(|| a.created_at.cmp(&b.created_at))
    .then_with(|| a.comment_id.cmp(&b.comment_id))
}

enum Step<'a> {
  Enter(&'a Comment, u32),
  /// All of the comment's replies have been emitted; `at` is its position.
  Leave(&'a Comment, usize),
}

/// Depth-first walk with an explicit stack, so reply depth is not bounded by
/// the call stack.
fn emit(
  children: &HashMap<Option<CommentId>, Vec<&Comment>>,
  viewer: &ThreadViewer,
  out: &mut Vec<CommentView>,
) {
  let mut stack: Vec<Step<'_>> = Vec::new();
  if let Some(roots) = children.get(&None) {
    stack.extend(roots.iter().rev().map(|&c| Step::Enter(c, 1)));
  }

  while let Some(step) = stack.pop() {
    match step {
      Step::Enter(c, indent_level) => {
        stack.push(Step::Leave(c, out.len()));
        out.push(CommentView {
          comment: c.clone(),
          indent_level,
          body_suppressed: c.is_gone() && !viewer.is_moderator,
        });
        if let Some(replies) = children.get(&Some(c.comment_id)) {
          stack.extend(replies.iter().rev().map(|&r| Step::Enter(r, indent_level + 1)));
        }
      }
      Step::Leave(c, at) => {
        let kept_replies = out.len() > at + 1;
        if c.is_gone() && !kept_replies && !viewer.keeps_gone_leaf(c) {
          out.truncate(at);
        }
      }
    }
  }
}
