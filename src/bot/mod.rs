use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::bail;
use futures_util::StreamExt;
use rand::{thread_rng, Rng};
use tokio::task::JoinSet;
use twilight_cache_inmemory::InMemoryCache;
use twilight_gateway::error::ReceiveMessageError;
use twilight_gateway::stream::{create_recommended, ShardEventStream};
use twilight_gateway::{Config, ConfigBuilder, Event, Intents, Shard};
use twilight_http::Client;
use twilight_model::application::interaction::{Interaction, InteractionData, InteractionType};
use twilight_model::channel::message::embed::EmbedAuthor;
use twilight_model::channel::message::MessageFlags;
use twilight_model::gateway::payload::incoming::{InteractionCreate, MemberAdd, ReactionAdd, Ready};
use twilight_model::gateway::payload::outgoing::update_presence::UpdatePresencePayload;
use twilight_model::gateway::presence::{ActivityType, MinimalActivity, Status};
use twilight_model::http::interaction::{InteractionResponse, InteractionResponseType};
use twilight_util::builder::embed::EmbedBuilder;
use twilight_util::builder::InteractionResponseDataBuilder;
use warden_localizer::localize;
use warden_logger::{error, info, warn};

use self::cid::CId;
use self::client::{Api, ApiRef};
use self::interaction::Ctx;
use crate::state::State;
use crate::util::extension::{EmbedAuthorExtension, InteractionExtension, ReactionTypeExtension};
use crate::util::traits::PreferLocale;
use crate::util::{Result, FAILURE};

/// Provides the component and modal custom identifier codec.
pub mod cid;
/// Provides the shared API handles.
pub mod client;
/// Provides interaction contexts and response helpers.
pub mod interaction;
/// Provides the repeating route sweep.
pub mod sweep;

/// The total number of possible error titles.
pub const ERROR_TITLES: usize = 10;
/// The bot's gateway intents.
pub const INTENTS: Intents = Intents::DIRECT_MESSAGES
    .union(Intents::GUILDS)
    .union(Intents::GUILD_MEMBERS)
    .union(Intents::GUILD_MESSAGES)
    .union(Intents::GUILD_MESSAGE_REACTIONS);

/// Whether the route sweep has been started.
static SWEEPING: AtomicBool = AtomicBool::new(false);

/// Implements a bot client.
#[derive(Debug)]
pub struct BotClient {
    /// The bot client's shared APIs and state.
    api: Api,
    /// The bot client's gateway shards.
    shards: Box<[Shard]>,
}

impl BotClient {
    /// Returns a new [`BotClient`].
    ///
    /// # Errors
    ///
    /// This function will return an error if the client could not create gateway shards.
    pub async fn new(state: Arc<State>) -> Result<Self> {
        let token = crate::util::env::token()?;
        let http = Arc::new(Client::new(token.to_string()));
        let cache = Arc::new(InMemoryCache::new());
        let shards = Self::shards(&http, token.into_string()).await?;

        Ok(Self { api: Api { http, cache, state }, shards })
    }

    /// Returns the bot's gateway configuration.
    ///
    /// # Errors
    ///
    /// This function will return an error if the bot's presence is invalid.
    fn config(token: String) -> Result<Config> {
        let status = if cfg!(debug_assertions) { Status::Idle } else { Status::Online };
        let name = if cfg!(debug_assertions) { "for API events" } else { "over the city" }.to_string();
        let activity = MinimalActivity { kind: ActivityType::Watching, name, url: None }.into();
        let presence = UpdatePresencePayload::new(vec![activity], false, None, status)?;

        Ok(ConfigBuilder::new(token, INTENTS).presence(presence).build())
    }

    /// Creates the bot's gateway shards.
    ///
    /// # Errors
    ///
    /// This function will return an error if the shards could not be created.
    async fn shards(http: &Client, token: String) -> Result<Box<[Shard]>> {
        let config = Self::config(token)?;

        Ok(create_recommended(http, config, |_, b| b.build()).await?.collect())
    }

    /// Starts the bot process.
    ///
    /// # Errors
    ///
    /// This function will return an error if execution fails.
    pub async fn start(mut self) -> Result {
        let mut stream = ShardEventStream::new(self.shards.iter_mut());
        let mut tasks = JoinSet::new();

        while let Some((_, event)) = stream.next().await {
            if Self::on_event(&self.api, &mut tasks, event).is_err() {
                break;
            }
        }

        drop(stream);

        while tasks.join_next().await.is_some() {}

        Ok(())
    }

    /// Spawns a task that handles an incoming event.
    ///
    /// # Errors
    ///
    /// This function will return an error if the event was a fatal error.
    fn on_event(api: &Api, tasks: &mut JoinSet<Result>, event: Result<Event, ReceiveMessageError>) -> Result {
        let event = match event {
            Ok(event) => event,
            Err(fatal) if fatal.is_fatal() => {
                error!("fatal error receiving event: {fatal}")?;
                return Err(fatal.into());
            }
            Err(error) => return Ok(warn!("error receiving event: {error}")?),
        };

        api.cache.update(&event);
        tasks.spawn(self::handle_event(api.clone(), event));

        Ok(())
    }
}

/// Handles an incoming event in a new task.
///
/// # Errors
///
/// This function will return an error if the logger could not be reached.
async fn handle_event(api: Api, event: Event) -> Result {
    let result = match event {
        Event::Ready(event) => self::handle_ready(&api, *event).await,
        Event::InteractionCreate(event) => self::handle_interaction(api.by_ref(), *event).await,
        Event::ReactionAdd(event) => self::handle_reaction(api.by_ref(), *event).await,
        Event::MemberAdd(event) => self::handle_member_add(api.by_ref(), *event).await,
        _ => Ok(()),
    };

    match result {
        Ok(()) => Ok(()),
        Err(error) => Ok(warn!("error handling event: {error}")?),
    }
}

/// Handles a ready event.
///
/// Registers the bot's commands, starts the route sweep once, and re-renders every stored message.
///
/// # Errors
///
/// This function will return an error if the client's command list could not be updated.
async fn handle_ready(api: &Api, event: Ready) -> Result {
    info!("connected to the discord api as {}", event.user.name)?;

    let application_id = crate::util::env::client_id().unwrap_or(event.application.id);
    let client = api.http.interaction(application_id);
    let registry = crate::cmd::registry();

    if let Ok(id) = crate::util::env::testing_guild_id() {
        let list = client.set_guild_commands(id, &registry.build_all(Some(id))).await?;
        let count = list.model().await?.len();

        info!("patched {count} guild commands")?;
    }

    if cfg!(not(debug_assertions)) {
        let list = client.set_global_commands(&registry.build_all(None)).await?;
        let count = list.model().await?.len();

        info!("patched {count} global commands")?;
    }

    if !SWEEPING.swap(true, Ordering::SeqCst) {
        tokio::spawn(self::sweep::run(api.clone()));
    }

    for guild_id in api.state.guild_ids().await {
        if let Err(error) = crate::cmd::roles::refresh_selection(api.by_ref(), guild_id).await {
            warn!("unable to refresh role selection in {guild_id} - {error}")?;
        }
        if let Err(error) = crate::cmd::control::refresh_menu(api.by_ref(), guild_id).await {
            warn!("unable to refresh route control in {guild_id} - {error}")?;
        }
    }

    Ok(())
}

/// Handles a reaction on the role selection message.
///
/// # Errors
///
/// This function will return an error if the reaction could not be processed.
async fn handle_reaction(api: ApiRef<'_>, event: ReactionAdd) -> Result {
    let Some(guild_id) = event.guild_id else {
        return Ok(());
    };

    if event.member.as_ref().is_some_and(|m| m.user.bot) {
        return Ok(());
    }

    let config = api.state.config(guild_id).await;

    if config.role_selection_message_id != Some(event.message_id) {
        return Ok(());
    }

    let Some(role_id) = config.role_for_emoji(&event.emoji.key()) else {
        return Ok(());
    };

    let outcome = crate::cmd::roles::assign(api, guild_id, event.user_id, role_id, None).await?;

    if outcome.retracts_reaction() {
        let emoji = event.emoji.request();

        api.http.delete_reaction(event.channel_id, event.message_id, &emoji, event.user_id).await?;
    }

    Ok(())
}

/// Handles a member joining a guild, restoring their previous role.
///
/// # Errors
///
/// This function will return an error if the member could not be processed.
async fn handle_member_add(api: ApiRef<'_>, event: MemberAdd) -> Result {
    if event.member.user.bot {
        return Ok(());
    }

    crate::cmd::roles::restore(api, event.guild_id, &event.member.user).await
}

/// Handles an interaction event.
///
/// # Errors
///
/// This function will return an error if the event could not be handled.
async fn handle_interaction(api: ApiRef<'_>, event: InteractionCreate) -> Result {
    info!("received interaction: {}", event.label())?;

    let result = match event.kind {
        InteractionType::ApplicationCommand => self::handle_command(api, &event).await,
        InteractionType::MessageComponent => self::handle_component(api, &event).await,
        InteractionType::ModalSubmit => self::handle_modal(api, &event).await,
        _ => Ok(()),
    };

    if let Err(ref error) = result {
        warn!("interaction failed: {} - {error}", event.label())?;
        self::handle_error(api, &event.0, error).await?;
    } else {
        info!("interaction succeeded: {}", event.label())?;
    }

    result
}

/// Handles a command interaction event.
///
/// Commands are rejected unless the member is an administrator or holds a command role.
///
/// # Errors
///
/// This function will return an error if the event could not be handled.
async fn handle_command(api: ApiRef<'_>, event: &Interaction) -> Result {
    let Some(InteractionData::ApplicationCommand(ref data)) = event.data else {
        bail!("missing command data");
    };
    let Some(handler) = crate::cmd::registry().get(&data.name).and_then(|e| e.command()) else {
        bail!("missing command handler for '{}'", data.name);
    };

    let ctx = Ctx::new(api, event, &(**data));

    if !crate::cmd::is_authorized(api, event).await {
        return ctx.failure(event.preferred_locale(), "forbidden", true).await;
    }

    handler.execute(ctx).await
}

/// Handles a component interaction event.
///
/// # Errors
///
/// This function will return an error if the event could not be handled.
async fn handle_component(api: ApiRef<'_>, event: &Interaction) -> Result {
    let Some(InteractionData::MessageComponent(ref data)) = event.data else {
        bail!("missing component data");
    };

    let cid = data.custom_id.parse::<CId>()?;
    let Some(handler) = crate::cmd::registry().get(cid.name()).and_then(|e| e.component()) else {
        bail!("missing component handler for '{}'", cid.name());
    };

    handler.execute(Ctx::new(api, event, data), cid).await
}

/// Handles a modal interaction event.
///
/// # Errors
///
/// This function will return an error if the event could not be handled.
async fn handle_modal(api: ApiRef<'_>, event: &Interaction) -> Result {
    let Some(InteractionData::ModalSubmit(ref data)) = event.data else {
        bail!("missing modal data");
    };

    let cid = data.custom_id.parse::<CId>()?;
    let Some(handler) = crate::cmd::registry().get(cid.name()).and_then(|e| e.modal()) else {
        bail!("missing modal handler for '{}'", cid.name());
    };

    handler.execute(Ctx::new(api, event, data), cid).await
}

/// Called to notify an executing user and the bot developer(s) when an error occurs.
///
/// # Errors
///
/// This function will return an error if the logger could not print properly.
async fn handle_error(api: ApiRef<'_>, event: &Interaction, error: &anyhow::Error) -> Result {
    if let Err(error) = self::error_notify_user(api, event, error).await {
        error!("unable to notify executing user: {error}")?;
    }
    if let Err(error) = self::error_notify_devs(api, event, error).await {
        warn!("unable to notify bot developers: {error}")?;
    }

    Ok(())
}

/// Notifies an executing user that an error has occurred.
///
/// # Errors
///
/// This function will return an error if the user could not be notified.
async fn error_notify_user(api: ApiRef<'_>, event: &Interaction, error: &anyhow::Error) -> Result {
    let index = thread_rng().gen_range(0 .. ERROR_TITLES);
    let title = localize!(try in event.preferred_locale(), "text.error.title_{index}");
    let embed = EmbedBuilder::new().color(FAILURE).description(format!("> {error}")).title(title);

    let client = api.http.interaction(event.application_id);
    let data = InteractionResponseDataBuilder::new().flags(MessageFlags::EPHEMERAL).build();
    let kind = InteractionResponseType::DeferredChannelMessageWithSource;
    let response = InteractionResponse { kind, data: Some(data) };

    // the handler may have responded already.
    client.create_response(event.id, &event.token, &response).await.ok();
    client.create_followup(&event.token).embeds(&[embed.build()])?.flags(MessageFlags::EPHEMERAL).await?;

    Ok(())
}

/// Notifies the bot developer(s) that an error has occurred.
///
/// # Errors
///
/// This function will return an error if the developers could not be notified.
async fn error_notify_devs(api: ApiRef<'_>, event: &Interaction, error: &anyhow::Error) -> Result {
    let channel_id = crate::util::env::error_channel_id()?;
    let index = thread_rng().gen_range(0 .. ERROR_TITLES);
    let title = localize!("text.error.title_{index}");
    let mut embed = EmbedBuilder::new()
        .color(FAILURE)
        .description(format!("**ID:** `{}`\n\n```\n{error}\n```", event.label()))
        .title(title);

    if let Some(user) = event.author() {
        embed = embed.author(EmbedAuthor::parse(user)?);
    }

    api.http
        .create_message(channel_id)
        .embeds(&[embed.build()])?
        .flags(MessageFlags::SUPPRESS_NOTIFICATIONS)
        .await?;

    Ok(())
}
