//! Story listings as explicit filter sets.
//!
//! A [`ListingKind`] plus the viewer's filters is turned into a
//! [`ListingQuery`]: a list of [`Predicate`]s and a [`SortOrder`]. Building
//! the query is pure so the exact filter set of every listing can be checked
//! without a database; store backends render it into a single query.

use std::str::FromStr;

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, TagId, UserId, story::Story};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Tunables for the listing pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
  pub per_page:             usize,
  /// Stories below this score never reach the front page.
  pub hottest_min_score:    i64,
  /// How far back the recent page looks.
  pub recent_window_days:   i64,
  /// Stories scoring above this are considered already on the front page
  /// and are left off the recent page.
  pub recent_score_ceiling: i64,
}

impl Default for ListingConfig {
  fn default() -> Self {
    Self {
      per_page:             25,
      hottest_min_score:    2,
      recent_window_days:   10,
      recent_score_ceiling: 4,
    }
  }
}

// ─── Top window ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
  Hour,
  Day,
  Week,
  Month,
  Year,
}

impl FromStr for Interval {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.to_ascii_lowercase().trim_end_matches('s') {
      "h" | "hour" => Ok(Self::Hour),
      "d" | "day" => Ok(Self::Day),
      "w" | "week" => Ok(Self::Week),
      "m" | "month" => Ok(Self::Month),
      "y" | "year" => Ok(Self::Year),
      _ => Err(Error::InvalidInterval(s.to_owned())),
    }
  }
}

/// The period covered by the top page, e.g. 7 days or 2 months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopWindow {
  pub duration: u32,
  pub interval: Interval,
}

impl TopWindow {
  pub fn new(duration: u32, interval: Interval) -> Self { Self { duration, interval } }

  /// Start of the window ending at `now`. Months and years are calendar
  /// months and years.
  pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
    let n = self.duration;
    let start = match self.interval {
      Interval::Hour => now.checked_sub_signed(Duration::hours(n.into())),
      Interval::Day => now.checked_sub_signed(Duration::days(n.into())),
      Interval::Week => now.checked_sub_signed(Duration::weeks(n.into())),
      Interval::Month => now.checked_sub_months(Months::new(n)),
      Interval::Year => n
        .checked_mul(12)
        .and_then(|months| now.checked_sub_months(Months::new(months))),
    };
    start.unwrap_or(DateTime::<Utc>::MIN_UTC)
  }
}

impl FromStr for TopWindow {
  type Err = Error;

  /// Parses the short form used in URLs: `1w`, `3m`, `12h`.
  fn from_str(s: &str) -> Result<Self> {
    let split = s
      .find(|c: char| !c.is_ascii_digit())
      .ok_or_else(|| Error::InvalidInterval(s.to_owned()))?;
    let (digits, unit) = s.split_at(split);
    let duration = digits
      .parse()
      .map_err(|_| Error::InvalidInterval(s.to_owned()))?;
    Ok(Self { duration, interval: unit.parse()? })
  }
}

// ─── Kinds and filters ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "arg", rename_all = "snake_case")]
pub enum ListingKind {
  Hottest,
  Newest,
  NewestByUser(UserId),
  Recent,
  Tagged(TagId),
  Top(TopWindow),
  /// The viewer's hidden stories.
  Hidden,
}

/// Per-request narrowing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewerFilters {
  /// The signed-in viewer, if any.
  pub viewer:       Option<UserId>,
  /// Tags to leave out. For signed-in viewers the store adds their saved
  /// tag filters; anonymous viewers only have what the caller passes here.
  pub exclude_tags: Vec<TagId>,
  /// 1-based page number; 0 is treated as 1.
  pub page:         usize,
}

impl ViewerFilters {
  pub fn anonymous() -> Self { Self::default() }

  pub fn user(user_id: UserId) -> Self { Self { viewer: Some(user_id), ..Self::default() } }

  pub fn excluding(mut self, tags: impl IntoIterator<Item = TagId>) -> Self {
    self.exclude_tags.extend(tags);
    self
  }

  pub fn page(mut self, page: usize) -> Self {
    self.page = page;
    self
  }
}

// ─── Query ───────────────────────────────────────────────────────────────────

/// One condition a listed story must satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
  NotExpired,
  Unmerged,
  ScoreAtLeast(i64),
  ScoreAtMost(i64),
  CreatedSince(DateTime<Utc>),
  ByUser(UserId),
  TaggedWith(TagId),
  WithoutTags(Vec<TagId>),
  HiddenBy(UserId),
  NotHiddenBy(UserId),
}

/// Sort order of a listing. Ties always fall back to story id descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
  HotnessAsc,
  CreatedDesc,
  IdDesc,
  ScoreDesc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
  pub predicates: Vec<Predicate>,
  pub order:      SortOrder,
  pub limit:      usize,
  pub offset:     usize,
}

impl ListingQuery {
  /// The base filter every listing starts from: no expired stories and no
  /// stories merged into another.
  pub fn base() -> Vec<Predicate> { vec![Predicate::NotExpired, Predicate::Unmerged] }

  pub fn build(
    kind: &ListingKind,
    filters: &ViewerFilters,
    config: &ListingConfig,
    now: DateTime<Utc>,
  ) -> Self {
    let mut predicates = Self::base();

    let order = match *kind {
      ListingKind::Hottest => {
        predicates.push(Predicate::ScoreAtLeast(config.hottest_min_score));
        SortOrder::HotnessAsc
      }
      ListingKind::Newest => SortOrder::CreatedDesc,
      ListingKind::NewestByUser(user_id) => {
        predicates.push(Predicate::ByUser(user_id));
        SortOrder::IdDesc
      }
      ListingKind::Recent => {
        predicates.push(Predicate::CreatedSince(
          now - Duration::days(config.recent_window_days),
        ));
        predicates.push(Predicate::ScoreAtMost(config.recent_score_ceiling));
        SortOrder::CreatedDesc
      }
      ListingKind::Tagged(tag_id) => {
        predicates.push(Predicate::TaggedWith(tag_id));
        predicates.push(Predicate::ScoreAtLeast(1));
        SortOrder::CreatedDesc
      }
      ListingKind::Top(window) => {
        predicates.push(Predicate::CreatedSince(window.since(now)));
        SortOrder::ScoreDesc
      }
      ListingKind::Hidden => {
        if let Some(viewer) = filters.viewer {
          predicates.push(Predicate::HiddenBy(viewer));
        }
        SortOrder::HotnessAsc
      }
    };

    match filters.viewer {
      Some(viewer) if *kind != ListingKind::Hidden => {
        predicates.push(Predicate::NotHiddenBy(viewer));
      }
      _ => {}
    }

    if !filters.exclude_tags.is_empty() {
      let mut tags = filters.exclude_tags.clone();
      tags.sort();
      tags.dedup();
      predicates.push(Predicate::WithoutTags(tags));
    }

    let page = filters.page.max(1);
    Self {
      predicates,
      order,
      limit: config.per_page,
      offset: (page - 1) * config.per_page,
    }
  }
}

// ─── Result ──────────────────────────────────────────────────────────────────

/// The stories of one listing request, in order.
///
/// Produced once per call and consumed once; it cannot be cloned or
/// restarted. Ask the store again for a fresh evaluation.
#[derive(Debug)]
pub struct Listing {
  stories: std::vec::IntoIter<Story>,
}

impl Listing {
  pub fn new(stories: Vec<Story>) -> Self { Self { stories: stories.into_iter() } }
}

impl Iterator for Listing {
  type Item = Story;

  fn next(&mut self) -> Option<Story> { self.stories.next() }

  fn size_hint(&self) -> (usize, Option<usize>) { self.stories.size_hint() }
}

impl ExactSizeIterator for Listing {}
