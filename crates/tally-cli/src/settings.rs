//! Runtime settings: an optional TOML file layered with `TALLY_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;
use tally_core::listing::ListingConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  /// SQLite database file; a leading `~/` is expanded.
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  #[serde(default)]
  pub listing:    ListingConfig,
}

fn default_store_path() -> PathBuf { PathBuf::from("tally.db") }

impl Settings {
  /// Read `path` (if it exists), then apply the environment. Nested keys use
  /// a double underscore, e.g. `TALLY_LISTING__PER_PAGE=10`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let raw = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(environment())
      .build()
      .context("failed to read config file")?;
    Self::from_config(raw)
  }

  fn from_config(raw: config::Config) -> anyhow::Result<Self> {
    let mut settings: Self = raw
      .try_deserialize()
      .context("failed to deserialise settings")?;
    settings.store_path = expand_tilde(&settings.store_path);
    Ok(settings)
  }
}

fn environment() -> config::Environment {
  config::Environment::with_prefix("TALLY")
    .prefix_separator("_")
    .separator("__")
    .try_parsing(true)
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
