use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tally_core::listing::TopWindow;
use tally_store_sqlite::SqliteStore;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

mod commands;
mod settings;

use settings::Settings;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
  /// Path to the config file.
  #[arg(short, long, default_value = "tally.toml")]
  config:  PathBuf,
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Manage users.
  #[command(subcommand)]
  User(UserCommand),
  /// Manage tags.
  #[command(subcommand)]
  Tag(TagCommand),
  /// Submit stories.
  #[command(subcommand)]
  Story(StoryCommand),
  /// Post comments.
  #[command(subcommand)]
  Comment(CommentCommand),
  /// Cast, switch or retract a vote: 1, -1 or 0.
  Vote {
    #[arg(long)]
    user:    i64,
    #[arg(long)]
    story:   i64,
    /// Vote on this comment of the story rather than the story itself.
    #[arg(long)]
    comment: Option<i64>,
    /// Downvote reason code.
    #[arg(long)]
    reason:  Option<String>,
    #[arg(allow_negative_numbers = true)]
    value:   i64,
  },
  /// Print a story listing.
  List {
    #[arg(value_enum)]
    kind:    ListArg,
    /// Signed-in viewer; applies their hidden stories and tag filters.
    #[arg(long)]
    viewer:  Option<i64>,
    /// Submitter for `by-user`.
    #[arg(long)]
    by:      Option<i64>,
    /// Tag name for `tagged`.
    #[arg(long)]
    tag:     Option<String>,
    /// Window for `top`, e.g. `1w` or `3months`.
    #[arg(long, default_value = "1w")]
    window:  TopWindow,
    /// Tag name to leave out; repeat for several.
    #[arg(long = "exclude")]
    exclude: Vec<String>,
    #[arg(long, default_value_t = 1)]
    page:    usize,
  },
  /// Print a story's arranged comment thread.
  Thread {
    story:  i64,
    #[arg(long)]
    viewer: Option<i64>,
  },
  /// Recompute hotness for every story.
  Recalculate,
  /// Retract every vote a user has cast.
  PurgeVotes { user: i64 },
}

#[derive(Subcommand)]
enum UserCommand {
  Add {
    username:  String,
    #[arg(long)]
    moderator: bool,
  },
}

#[derive(Subcommand)]
enum StoryCommand {
  /// Submit a story.
  Submit {
    #[arg(long)]
    user:   i64,
    #[arg(long)]
    title:  String,
    /// Link target; omit for a text story.
    #[arg(long)]
    url:    Option<String>,
    #[arg(long, default_value = "")]
    text:   String,
    /// The submitter wrote the linked work.
    #[arg(long)]
    author: bool,
    /// Tag name; repeat for several.
    #[arg(long = "tag")]
    tags:   Vec<String>,
  },
}

#[derive(Subcommand)]
enum CommentCommand {
  /// Post a comment on a story.
  Post {
    #[arg(long)]
    user:   i64,
    #[arg(long)]
    story:  i64,
    /// Reply to this comment instead of posting at the top level.
    #[arg(long)]
    parent: Option<i64>,
    body:   String,
  },
}

#[derive(Subcommand)]
enum TagCommand {
  Add {
    name:        String,
    #[arg(long)]
    description: Option<String>,
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    hotness_mod: f64,
    #[arg(long)]
    privileged:  bool,
    #[arg(long)]
    media:       bool,
    #[arg(long)]
    inactive:    bool,
  },
  /// Change a tag's hotness modifier and rescore its stories.
  SetMod {
    name:        String,
    #[arg(allow_negative_numbers = true)]
    hotness_mod: f64,
  },
}

#[derive(Clone, Copy, ValueEnum)]
enum ListArg {
  Hottest,
  Newest,
  ByUser,
  Recent,
  Tagged,
  Top,
  Hidden,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli.config)?;

  let store = SqliteStore::open(&settings.store_path)
    .await
    .with_context(|| format!("failed to open store at {}", settings.store_path.display()))?
    .with_listing_config(settings.listing.clone());

  commands::run(&store, cli.command).await
}
