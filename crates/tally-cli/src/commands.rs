//! Dispatch of parsed subcommands onto any [`ForumStore`].

use anyhow::{Context as _, anyhow};
use serde::Serialize;
use tally_core::{
  CommentId, StoryId, TagId, UserId,
  comment::NewComment,
  listing::{ListingKind, ViewerFilters},
  store::ForumStore,
  story::{NewStory, NewTag, Story},
  thread::ThreadViewer,
  user::NewUser,
  vote::{CastVote, VoteDirection, VoteReason, VoteTarget},
};
use tracing::info;

use crate::{Command, CommentCommand, ListArg, StoryCommand, TagCommand, UserCommand};

pub async fn run<S: ForumStore>(store: &S, command: Command) -> anyhow::Result<()> {
  match command {
    Command::User(UserCommand::Add { username, moderator }) => {
      let input = if moderator { NewUser::moderator(username) } else { NewUser::new(username) };
      let user = store.add_user(input).await?;
      info!(user_id = user.user_id.0, "added user {}", user.username);
      emit(&user)
    }

    Command::Tag(TagCommand::Add {
      name,
      description,
      hotness_mod,
      privileged,
      media,
      inactive,
    }) => {
      let input = NewTag {
        description,
        privileged,
        is_media: media,
        inactive,
        ..NewTag::new(name).hotness_mod(hotness_mod)
      };
      emit(&store.add_tag(input).await?)
    }

    Command::Tag(TagCommand::SetMod { name, hotness_mod }) => {
      let tag = tag_id(store, &name).await?;
      let rescored = store.set_tag_hotness_mod(tag, hotness_mod).await?;
      info!(tag = %name, rescored, "changed hotness modifier");
      emit(&serde_json::json!({ "tag": name, "hotness_mod": hotness_mod, "rescored": rescored }))
    }

    Command::Story(StoryCommand::Submit { user, title, url, text, author, tags }) => {
      let user = UserId(user);
      let input = match url {
        Some(url) => NewStory { description: text, ..NewStory::link(user, title, url) },
        None => NewStory::text(user, title, text),
      };
      let input = NewStory {
        user_is_author: author,
        ..input.with_tags(tag_ids(store, &tags).await?)
      };
      let story = store.submit_story(input).await?;
      info!(story_id = story.story_id.0, "submitted story");
      emit(&story)
    }

    Command::Comment(CommentCommand::Post { user, story, parent, body }) => {
      let (story, user) = (StoryId(story), UserId(user));
      let input = match parent {
        Some(parent) => NewComment::reply(story, user, CommentId(parent), body),
        None => NewComment::top_level(story, user, body),
      };
      emit(&store.post_comment(input).await?)
    }

    Command::Vote { user, story, comment, reason, value } => {
      let story = StoryId(story);
      let target = match comment {
        Some(comment) => VoteTarget::Comment { story_id: story, comment_id: CommentId(comment) },
        None => VoteTarget::Story(story),
      };
      let mut vote = CastVote::new(UserId(user), target, VoteDirection::try_from(value)?);
      if let Some(code) = reason {
        vote = vote.because(VoteReason::parse(target.kind(), &code)?);
      }
      emit(&store.apply_vote(vote).await?)
    }

    Command::List { kind, viewer, by, tag, window, exclude, page } => {
      let kind = match kind {
        ListArg::Hottest => ListingKind::Hottest,
        ListArg::Newest => ListingKind::Newest,
        ListArg::ByUser => {
          ListingKind::NewestByUser(UserId(by.context("`by-user` needs --by <user id>")?))
        }
        ListArg::Recent => ListingKind::Recent,
        ListArg::Tagged => {
          let name = tag.context("`tagged` needs --tag <name>")?;
          ListingKind::Tagged(tag_id(store, &name).await?)
        }
        ListArg::Top => ListingKind::Top(window),
        ListArg::Hidden => ListingKind::Hidden,
      };
      let filters = match viewer {
        Some(viewer) => ViewerFilters::user(UserId(viewer)),
        None if kind == ListingKind::Hidden => {
          return Err(anyhow!("`hidden` needs --viewer <user id>"));
        }
        None => ViewerFilters::anonymous(),
      };
      let filters = filters.excluding(tag_ids(store, &exclude).await?).page(page);
      let stories: Vec<Story> = store.list(kind, filters).await?.collect();
      emit(&stories)
    }

    Command::Thread { story, viewer } => {
      let viewer = match viewer {
        Some(id) => {
          let user = store
            .get_user(UserId(id))
            .await?
            .with_context(|| format!("no user with id {id}"))?;
          ThreadViewer { user_id: Some(user.user_id), is_moderator: user.is_moderator }
        }
        None => ThreadViewer::anonymous(),
      };
      emit(&store.arrange_thread(StoryId(story), viewer).await?)
    }

    Command::Recalculate => {
      let updated = store.recalculate_all_hotness().await?;
      emit(&serde_json::json!({ "updated": updated }))
    }

    Command::PurgeVotes { user } => {
      let purged = store.purge_votes_by_user(UserId(user)).await?;
      info!(user_id = user, purged, "purged votes");
      emit(&serde_json::json!({ "purged": purged }))
    }
  }
}

async fn tag_id<S: ForumStore>(store: &S, name: &str) -> anyhow::Result<TagId> {
  let tag = store.find_tag(name).await?.with_context(|| format!("no tag named {name:?}"))?;
  Ok(tag.tag_id)
}

async fn tag_ids<S: ForumStore>(store: &S, names: &[String]) -> anyhow::Result<Vec<TagId>> {
  let mut ids = Vec::with_capacity(names.len());
  for name in names {
    ids.push(tag_id(store, name).await?);
  }
  Ok(ids)
}

fn emit<T: Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
