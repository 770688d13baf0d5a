//! Discord gateway loop, slash-command registration, and interaction
//! dispatch, including the registry of live pagers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use color_eyre::{eyre::eyre, Result};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use twilight_gateway::{Event, EventTypeFlags, Intents, Shard, ShardId, StreamExt as _};
use twilight_http::Client as HttpClient;
use twilight_model::application::command::CommandType;
use twilight_model::application::interaction::application_command::{
  CommandData, CommandDataOption, CommandOptionValue,
};
use twilight_model::application::interaction::{Interaction, InteractionData};
use twilight_model::channel::message::component::{ActionRow, Button, ButtonStyle, Component};
use twilight_model::channel::message::{Embed, MessageFlags};
use twilight_model::http::interaction::{InteractionResponse, InteractionResponseType};
use twilight_model::id::marker::{ApplicationMarker, GuildMarker, MessageMarker};
use twilight_model::id::Id;
use twilight_util::builder::command::{
  CommandBuilder, IntegerBuilder, StringBuilder, SubCommandBuilder,
};
use twilight_util::builder::InteractionResponseDataBuilder;

use super::commands::{CommandHandler, CommandReply};
use super::format;
use crate::config::Config;
use crate::error::{FetchError, PagerError};
use crate::pager::Pager;
use crate::tba::TbaClient;

const PREV_BUTTON: &str = "page:prev";
const NEXT_BUTTON: &str = "page:next";

#[derive(Debug, Clone, Copy)]
enum PageTurn {
  Prev,
  Next,
}

struct PagerSession {
  pager: Pager<Embed>,
  touched: Instant,
}

/// Live pagers keyed by the message they control.
///
/// The single map lock also serializes transitions: two button presses for
/// the same message cannot interleave their read-modify-write of the cursor.
/// Sessions idle past the timeout are pruned on the next access; a button
/// press addressed to a pruned session is answered as a silent no-op.
struct PagerSessions {
  idle_timeout: Duration,
  inner: Mutex<HashMap<Id<MessageMarker>, PagerSession>>,
}

impl PagerSessions {
  fn new(idle_timeout: Duration) -> Self {
    Self {
      idle_timeout,
      inner: Mutex::new(HashMap::new()),
    }
  }

  async fn insert(&self, message_id: Id<MessageMarker>, pager: Pager<Embed>) {
    let mut map = self.inner.lock().await;
    map.retain(|_, s| s.touched.elapsed() < self.idle_timeout);
    map.insert(
      message_id,
      PagerSession {
        pager,
        touched: Instant::now(),
      },
    );
  }

  /// Apply a page turn to the pager for `message_id`, if it is still live.
  async fn turn(
    &self,
    message_id: Id<MessageMarker>,
    direction: PageTurn,
  ) -> Option<Result<Embed, PagerError>> {
    let mut map = self.inner.lock().await;
    map.retain(|_, s| s.touched.elapsed() < self.idle_timeout);

    let session = map.get_mut(&message_id)?;
    session.touched = Instant::now();
    let result = match direction {
      PageTurn::Next => session.pager.advance(),
      PageTurn::Prev => session.pager.retreat(),
    };
    debug!(
      %message_id,
      page = session.pager.page(),
      of = session.pager.page_count(),
      "page turn"
    );
    Some(result)
  }
}

struct BotState {
  http: Arc<HttpClient>,
  application_id: Id<ApplicationMarker>,
  handler: CommandHandler,
  sessions: PagerSessions,
}

/// Connect to Discord and serve interactions until the gateway closes or the
/// process is interrupted.
pub async fn run(config: &Config, tba: TbaClient, token: String) -> Result<()> {
  let http = Arc::new(HttpClient::new(token.clone()));
  let application_id = http.current_user_application().await?.model().await?.id;

  let guild_id: Id<GuildMarker> =
    Id::new_checked(config.guild_id).ok_or_else(|| eyre!("guild_id must be nonzero"))?;
  register_guild_commands(&http, application_id, guild_id).await?;
  info!(%guild_id, "registered /frc commands");

  let handler = CommandHandler::new(tba, config.team_number, config.matches_per_page);
  let state = Arc::new(BotState {
    http,
    application_id,
    handler,
    sessions: PagerSessions::new(Duration::from_secs(config.session_timeout_secs)),
  });

  let mut shard = Shard::new(ShardId::ONE, token, Intents::GUILDS);

  loop {
    tokio::select! {
      _ = tokio::signal::ctrl_c() => {
        info!("interrupt received; shutting down");
        return Ok(());
      }
      item = shard.next_event(EventTypeFlags::all()) => {
        let Some(item) = item else { return Ok(()) };
        match item {
          Ok(Event::Ready(ready)) => {
            info!(user = %ready.user.name, "connected to Discord");
          }
          Ok(Event::InteractionCreate(event)) => {
            let state = Arc::clone(&state);
            tokio::spawn(async move {
              if let Err(e) = state.handle_interaction(event.0).await {
                error!(error = %e, "interaction handling failed");
              }
            });
          }
          Ok(event) => {
            debug!(kind = ?event.kind(), "unhandled gateway event");
          }
          Err(err) => {
            error!(error = %err, "gateway error");
          }
        }
      }
    }
  }
}

async fn register_guild_commands(
  http: &Arc<HttpClient>,
  application_id: Id<ApplicationMarker>,
  guild_id: Id<GuildMarker>,
) -> Result<()> {
  let team_option =
    || IntegerBuilder::new("team", "Team number (defaults to the home team)").min_value(1);
  let event_option =
    || StringBuilder::new("event", "TBA event key, e.g. 2023casj").required(true);
  let district_option =
    || StringBuilder::new("district", "TBA district key, e.g. 2023fim").required(true);

  let frc = CommandBuilder::new(
    "frc",
    "FRC stats from The Blue Alliance",
    CommandType::ChatInput,
  )
  .option(
    SubCommandBuilder::new("events", "Events a team is playing this season")
      .option(team_option()),
  )
  .option(SubCommandBuilder::new("schedule", "Upcoming matches for a team").option(team_option()))
  .option(SubCommandBuilder::new("history", "Past matches for a team").option(team_option()))
  .option(
    SubCommandBuilder::new("matches", "A team's matches at an event")
      .option(event_option())
      .option(team_option()),
  )
  .option(
    SubCommandBuilder::new("status", "A team's standing at each of its events")
      .option(team_option()),
  )
  .option(SubCommandBuilder::new("bracket", "Playoff bracket for an event").option(event_option()))
  .option(
    SubCommandBuilder::new("predictions", "Predicted final rankings for an event")
      .option(event_option()),
  )
  .option(
    SubCommandBuilder::new("rankings", "Current rankings for an event").option(event_option()),
  )
  .option(
    SubCommandBuilder::new("oprs", "Offensive power ratings for an event").option(event_option()),
  )
  .option(
    SubCommandBuilder::new("district", "District championship points rankings")
      .option(district_option()),
  )
  .build();

  http
    .interaction(application_id)
    .set_guild_commands(guild_id, &[frc])
    .await?;

  Ok(())
}

impl BotState {
  async fn handle_interaction(&self, interaction: Interaction) -> Result<()> {
    match &interaction.data {
      Some(InteractionData::ApplicationCommand(data)) => {
        self.handle_command(&interaction, data).await
      }
      Some(InteractionData::MessageComponent(data)) => {
        self
          .handle_page_turn(&interaction, data.custom_id.as_str())
          .await
      }
      _ => Ok(()),
    }
  }

  async fn handle_command(&self, interaction: &Interaction, data: &CommandData) -> Result<()> {
    let Some((sub, args)) = subcommand(data) else {
      debug!(command = %data.name, "no subcommand in interaction");
      return Ok(());
    };

    let reply = match sub {
      "events" => self.handler.events(team_option(args)).await,
      "schedule" => self.handler.schedule(team_option(args)).await,
      "history" => self.handler.history(team_option(args)).await,
      "status" => self.handler.status(team_option(args)).await,
      "district" => {
        let Some(district_key) = district_option(args) else {
          return self
            .respond_ephemeral(interaction, "A district key is required.")
            .await;
        };
        self.handler.district(&district_key).await
      }
      "matches" | "bracket" | "predictions" | "rankings" | "oprs" => {
        let Some(event_key) = event_option(args) else {
          return self
            .respond_ephemeral(interaction, "An event key is required.")
            .await;
        };
        match sub {
          "matches" => self.handler.matches(&event_key, team_option(args)).await,
          "bracket" => self.handler.bracket(&event_key).await,
          "predictions" => self.handler.predictions(&event_key).await,
          "rankings" => self.handler.rankings(&event_key).await,
          _ => self.handler.oprs(&event_key).await,
        }
      }
      other => {
        warn!(subcommand = other, "unrecognized subcommand");
        return self
          .respond_ephemeral(interaction, "Unrecognized command.")
          .await;
      }
    };

    match reply {
      Ok(reply) => self.send_reply(interaction, reply).await,
      Err(err) => {
        warn!(subcommand = sub, error = %err, "command failed");
        let embed = match err.downcast_ref::<FetchError>() {
          Some(FetchError::NotFound) => format::notice(
            "No Results",
            "Nothing found; check your parameters?",
          ),
          _ => format::notice("Command Error", "An error occurred. Try again later."),
        };
        self.respond_with_embed(interaction, embed).await
      }
    }
  }

  async fn send_reply(&self, interaction: &Interaction, reply: CommandReply) -> Result<()> {
    let has_pager = reply.pager.is_some();
    let mut data = InteractionResponseDataBuilder::new().embeds([reply.embed]);
    if has_pager {
      data = data.components([pager_buttons()]);
    }

    let client = self.http.interaction(self.application_id);
    client
      .create_response(
        interaction.id,
        &interaction.token,
        &InteractionResponse {
          kind: InteractionResponseType::ChannelMessageWithSource,
          data: Some(data.build()),
        },
      )
      .await?;

    if let Some(pager) = reply.pager {
      // The session is keyed by the message the response just created.
      let message = client.response(&interaction.token).await?.model().await?;
      self.sessions.insert(message.id, pager).await;
    }

    Ok(())
  }

  async fn handle_page_turn(&self, interaction: &Interaction, custom_id: &str) -> Result<()> {
    let direction = match custom_id {
      PREV_BUTTON => PageTurn::Prev,
      NEXT_BUTTON => PageTurn::Next,
      _ => return Ok(()),
    };
    let Some(message) = &interaction.message else {
      return Ok(());
    };

    let client = self.http.interaction(self.application_id);
    match self.sessions.turn(message.id, direction).await {
      Some(Ok(embed)) => {
        client
          .create_response(
            interaction.id,
            &interaction.token,
            &InteractionResponse {
              kind: InteractionResponseType::UpdateMessage,
              data: Some(InteractionResponseDataBuilder::new().embeds([embed]).build()),
            },
          )
          .await?;
      }
      Some(Err(err)) => {
        // The cursor did not move; tell the presser and leave the message.
        warn!(message_id = %message.id, error = %err, "page render failed");
        self
          .respond_ephemeral(interaction, "Could not render that page. Try again.")
          .await?;
      }
      None => {
        // Pager already disposed; acknowledge without changing anything.
        debug!(message_id = %message.id, "page turn for expired session");
        client
          .create_response(
            interaction.id,
            &interaction.token,
            &InteractionResponse {
              kind: InteractionResponseType::DeferredUpdateMessage,
              data: None,
            },
          )
          .await?;
      }
    }

    Ok(())
  }

  async fn respond_ephemeral(&self, interaction: &Interaction, text: &str) -> Result<()> {
    let data = InteractionResponseDataBuilder::new()
      .content(text.to_string())
      .flags(MessageFlags::EPHEMERAL)
      .build();

    self
      .http
      .interaction(self.application_id)
      .create_response(
        interaction.id,
        &interaction.token,
        &InteractionResponse {
          kind: InteractionResponseType::ChannelMessageWithSource,
          data: Some(data),
        },
      )
      .await?;

    Ok(())
  }

  async fn respond_with_embed(&self, interaction: &Interaction, embed: Embed) -> Result<()> {
    let data = InteractionResponseDataBuilder::new().embeds([embed]);

    self
      .http
      .interaction(self.application_id)
      .create_response(
        interaction.id,
        &interaction.token,
        &InteractionResponse {
          kind: InteractionResponseType::ChannelMessageWithSource,
          data: Some(data.build()),
        },
      )
      .await?;

    Ok(())
  }
}

fn pager_buttons() -> Component {
  let button = |custom_id: &str, label: &str| {
    Component::Button(Button {
      custom_id: Some(custom_id.to_string()),
      disabled: false,
      emoji: None,
      label: Some(label.to_string()),
      style: ButtonStyle::Secondary,
      url: None,
      sku_id: None,
    })
  };

  Component::ActionRow(ActionRow {
    components: vec![
      button(PREV_BUTTON, "\u{25C0}"),
      button(NEXT_BUTTON, "\u{25B6}"),
    ],
  })
}

fn subcommand(data: &CommandData) -> Option<(&str, &[CommandDataOption])> {
  data.options.first().and_then(|opt| match &opt.value {
    CommandOptionValue::SubCommand(options) => Some((opt.name.as_str(), options.as_slice())),
    _ => None,
  })
}

fn team_option(options: &[CommandDataOption]) -> Option<u32> {
  options.iter().find_map(|o| match (o.name.as_str(), &o.value) {
    ("team", CommandOptionValue::Integer(n)) => u32::try_from(*n).ok(),
    _ => None,
  })
}

fn event_option(options: &[CommandDataOption]) -> Option<String> {
  options.iter().find_map(|o| match (o.name.as_str(), &o.value) {
    ("event", CommandOptionValue::String(s)) => Some(s.clone()),
    _ => None,
  })
}

fn district_option(options: &[CommandDataOption]) -> Option<String> {
  options.iter().find_map(|o| match (o.name.as_str(), &o.value) {
    ("district", CommandOptionValue::String(s)) => Some(s.clone()),
    _ => None,
  })
}
