//! SQL schema for the Tally SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    username     TEXT    NOT NULL UNIQUE,
    karma        INTEGER NOT NULL DEFAULT 0,
    is_moderator INTEGER NOT NULL DEFAULT 0,
    created_at   TEXT    NOT NULL
);

-- hotness_mod is nullable; a NULL modifier makes hotness recomputes fail
-- until it is fixed.
CREATE TABLE IF NOT EXISTS tags (
    tag_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    tag         TEXT    NOT NULL UNIQUE,
    description TEXT,
    hotness_mod REAL             DEFAULT 0,
    privileged  INTEGER NOT NULL DEFAULT 0,
    is_media    INTEGER NOT NULL DEFAULT 0,
    inactive    INTEGER NOT NULL DEFAULT 0
);

-- created_at is fixed-width RFC 3339 so string order is time order.
CREATE TABLE IF NOT EXISTS stories (
    story_id        INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id         INTEGER NOT NULL REFERENCES users(user_id),
    title           TEXT    NOT NULL,
    url             TEXT,
    description     TEXT    NOT NULL DEFAULT '',
    created_at      TEXT    NOT NULL,
    upvotes         INTEGER NOT NULL DEFAULT 0 CHECK (upvotes >= 0),
    downvotes       INTEGER NOT NULL DEFAULT 0 CHECK (downvotes >= 0),
    hotness         REAL    NOT NULL DEFAULT 0,
    comments_count  INTEGER NOT NULL DEFAULT 0,
    is_expired      INTEGER NOT NULL DEFAULT 0,
    merged_story_id INTEGER REFERENCES stories(story_id),
    user_is_author  INTEGER NOT NULL DEFAULT 0,
    CHECK (merged_story_id IS NULL OR merged_story_id != story_id)
);

CREATE TABLE IF NOT EXISTS taggings (
    story_id INTEGER NOT NULL REFERENCES stories(story_id),
    tag_id   INTEGER NOT NULL REFERENCES tags(tag_id),
    PRIMARY KEY (story_id, tag_id)
);

CREATE TABLE IF NOT EXISTS comments (
    comment_id        INTEGER PRIMARY KEY AUTOINCREMENT,
    story_id          INTEGER NOT NULL REFERENCES stories(story_id),
    user_id           INTEGER NOT NULL REFERENCES users(user_id),
    parent_comment_id INTEGER REFERENCES comments(comment_id),
    thread_id         INTEGER NOT NULL,
    body              TEXT    NOT NULL,
    created_at        TEXT    NOT NULL,
    upvotes           INTEGER NOT NULL DEFAULT 0 CHECK (upvotes >= 0),
    downvotes         INTEGER NOT NULL DEFAULT 0 CHECK (downvotes >= 0),
    confidence        REAL    NOT NULL DEFAULT 0,
    is_deleted        INTEGER NOT NULL DEFAULT 0,
    is_moderated      INTEGER NOT NULL DEFAULT 0,
    moderation_reason TEXT
);

-- One row per (user, story, comment); story votes have a NULL comment_id,
-- which a plain UNIQUE constraint would not deduplicate.
CREATE TABLE IF NOT EXISTS votes (
    vote_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id    INTEGER NOT NULL REFERENCES users(user_id),
    story_id   INTEGER NOT NULL REFERENCES stories(story_id),
    comment_id INTEGER REFERENCES comments(comment_id),
    vote       INTEGER NOT NULL CHECK (vote IN (-1, 1)),
    reason     TEXT,
    updated_at TEXT    NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS votes_story_key
    ON votes(user_id, story_id) WHERE comment_id IS NULL;
CREATE UNIQUE INDEX IF NOT EXISTS votes_comment_key
    ON votes(user_id, comment_id) WHERE comment_id IS NOT NULL;

CREATE TABLE IF NOT EXISTS hidden_stories (
    user_id  INTEGER NOT NULL REFERENCES users(user_id),
    story_id INTEGER NOT NULL REFERENCES stories(story_id),
    PRIMARY KEY (user_id, story_id)
);

CREATE TABLE IF NOT EXISTS tag_filters (
    user_id INTEGER NOT NULL REFERENCES users(user_id),
    tag_id  INTEGER NOT NULL REFERENCES tags(tag_id),
    PRIMARY KEY (user_id, tag_id)
);

CREATE TABLE IF NOT EXISTS keystore (
    key   TEXT    PRIMARY KEY,
    value INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS stories_hotness_idx ON stories(hotness);
CREATE INDEX IF NOT EXISTS stories_created_idx ON stories(created_at);
CREATE INDEX IF NOT EXISTS stories_user_idx    ON stories(user_id);
CREATE INDEX IF NOT EXISTS stories_merged_idx  ON stories(merged_story_id);
CREATE INDEX IF NOT EXISTS comments_story_idx  ON comments(story_id);
CREATE INDEX IF NOT EXISTS votes_user_idx      ON votes(user_id);
CREATE INDEX IF NOT EXISTS taggings_tag_idx    ON taggings(tag_id);

PRAGMA user_version = 1;
";
