//! Core types, scoring functions and the store trait for Tally.
//!
//! This crate is free of database and runtime dependencies. The scoring
//! functions ([`confidence`], [`hotness`]), the [`thread`] arranger and the
//! [`listing`] query builder are pure; the store backends call them after
//! mutating the counters they read.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod comment;
pub mod confidence;
pub mod error;
pub mod hotness;
pub mod id;
pub mod listing;
pub mod policy;
pub mod store;
pub mod story;
pub mod thread;
pub mod user;
pub mod vote;

pub use error::{Entity, Error, Result};
pub use id::{CommentId, StoryId, TagId, UserId};
