//! Rendering of [`ListingQuery`] into one SQL statement.

use rusqlite::types::Value;
use tally_core::listing::{ListingQuery, Predicate, SortOrder};

use crate::encode::{STORY_COLUMNS, encode_dt};

/// Render `query` as a `SELECT` over `stories s` plus its positional
/// parameters, in order.
pub fn render(query: &ListingQuery) -> (String, Vec<Value>) {
  let mut conds: Vec<String> = Vec::with_capacity(query.predicates.len());
  let mut params: Vec<Value> = Vec::new();

  for p in &query.predicates {
    let cond = match p {
      Predicate::NotExpired => "s.is_expired = 0".to_owned(),
      Predicate::Unmerged => "s.merged_story_id IS NULL".to_owned(),
      Predicate::ScoreAtLeast(n) => {
        params.push(Value::Integer(*n));
        "(s.upvotes - s.downvotes) >= ?".to_owned()
      }
      Predicate::ScoreAtMost(n) => {
        params.push(Value::Integer(*n));
        "(s.upvotes - s.downvotes) <= ?".to_owned()
      }
      Predicate::CreatedSince(at) => {
        params.push(Value::Text(encode_dt(*at)));
        "s.created_at >= ?".to_owned()
      }
      Predicate::ByUser(user) => {
        params.push(Value::Integer(user.0));
        "s.user_id = ?".to_owned()
      }
      Predicate::TaggedWith(tag) => {
        params.push(Value::Integer(tag.0));
        "EXISTS (SELECT 1 FROM taggings t WHERE t.story_id = s.story_id AND t.tag_id = ?)"
          .to_owned()
      }
      Predicate::WithoutTags(tags) => {
        if tags.is_empty() {
          continue;
        }
        params.extend(tags.iter().map(|t| Value::Integer(t.0)));
        let marks = vec!["?"; tags.len()].join(", ");
        format!(
          "NOT EXISTS (SELECT 1 FROM taggings t WHERE t.story_id = s.story_id \
           AND t.tag_id IN ({marks}))"
        )
      }
      Predicate::HiddenBy(user) => {
        params.push(Value::Integer(user.0));
        "EXISTS (SELECT 1 FROM hidden_stories h WHERE h.story_id = s.story_id AND h.user_id = ?)"
          .to_owned()
      }
      Predicate::NotHiddenBy(user) => {
        params.push(Value::Integer(user.0));
        "NOT EXISTS (SELECT 1 FROM hidden_stories h \
         WHERE h.story_id = s.story_id AND h.user_id = ?)"
          .to_owned()
      }
    };
    conds.push(cond);
  }

  let where_clause = if conds.is_empty() {
    String::new()
  } else {
    format!(" WHERE {}", conds.join(" AND "))
  };

  let order = match query.order {
    SortOrder::HotnessAsc => "s.hotness ASC, s.story_id DESC",
    SortOrder::CreatedDesc => "s.created_at DESC, s.story_id DESC",
    SortOrder::IdDesc => "s.story_id DESC",
    SortOrder::ScoreDesc => "(s.upvotes - s.downvotes) DESC, s.story_id DESC",
  };

  params.push(Value::Integer(i64::try_from(query.limit).unwrap_or(i64::MAX)));
  params.push(Value::Integer(i64::try_from(query.offset).unwrap_or(i64::MAX)));

  let sql = format!(
    "SELECT {STORY_COLUMNS} FROM stories s{where_clause} ORDER BY {order} LIMIT ? OFFSET ?"
  );
  (sql, params)
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};
  use tally_core::{TagId, UserId};

  use super::*;

  fn query(predicates: Vec<Predicate>, order: SortOrder) -> ListingQuery {
    ListingQuery { predicates, order, limit: 25, offset: 50 }
  }

  #[test]
  fn base_listing() {
    let (sql, params) = render(&query(ListingQuery::base(), SortOrder::HotnessAsc));
    assert!(sql.ends_with(
      "FROM stories s WHERE s.is_expired = 0 AND s.merged_story_id IS NULL \
       ORDER BY s.hotness ASC, s.story_id DESC LIMIT ? OFFSET ?"
    ));
    assert_eq!(params, vec![Value::Integer(25), Value::Integer(50)]);
  }

  #[test]
  fn parameters_follow_predicate_order() {
    let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let (sql, params) = render(&query(
      vec![
        Predicate::ScoreAtLeast(2),
        Predicate::CreatedSince(since),
        Predicate::NotHiddenBy(UserId(7)),
        Predicate::WithoutTags(vec![TagId(1), TagId(3)]),
      ],
      SortOrder::ScoreDesc,
    ));
    assert_eq!(sql.matches('?').count(), params.len());
    assert!(sql.contains("t.tag_id IN (?, ?)"));
    assert_eq!(
      params,
      vec![
        Value::Integer(2),
        Value::Text("2024-01-01T00:00:00.000000Z".into()),
        Value::Integer(7),
        Value::Integer(1),
        Value::Integer(3),
        Value::Integer(25),
        Value::Integer(50),
      ]
    );
  }

  #[test]
  fn empty_tag_exclusion_is_skipped() {
    let (sql, params) = render(&query(vec![Predicate::WithoutTags(vec![])], SortOrder::IdDesc));
    assert!(!sql.contains("WHERE"));
    assert_eq!(params.len(), 2);
  }

  #[test]
  fn hidden_by_selects_hidden_rows() {
    let (sql, _) = render(&query(vec![Predicate::HiddenBy(UserId(1))], SortOrder::HotnessAsc));
    assert!(sql.contains("WHERE EXISTS (SELECT 1 FROM hidden_stories h"));
  }
}
