use anyhow::bail;
use time::OffsetDateTime;
use twilight_model::channel::message::component::ButtonStyle;
use twilight_model::channel::message::embed::EmbedAuthor;
use twilight_model::channel::message::{Component, Embed, ReactionType};
use twilight_model::guild::{Permissions, Role};
use twilight_model::id::marker::{GuildMarker, RoleMarker, UserMarker};
use twilight_model::id::Id;
use twilight_model::user::User;
use twilight_util::builder::embed::{EmbedBuilder, EmbedFooterBuilder};
use warden_localizer::{localize, Locale};
use warden_logger::{error, info, warn};

use crate::bot::cid::CId;
use crate::bot::client::ApiRef;
use crate::bot::interaction::{CommandCtx, ComponentCtx};
use crate::cmd::{CommandOptionResolver, OnCommand, OnComponent};
use crate::state::{GuildConfig, UserRole};
use crate::util::builder::ButtonBuilder;
use crate::util::extension::{EmbedAuthorExtension, ReactionTypeExtension};
use crate::util::traits::PreferLocale;
use crate::util::{Result, BRANDING, FAILURE, SUCCESS};

/// The largest number of role buttons placed on the selection message.
const MAX_ROLE_BUTTONS: usize = 24;

/// Posts the role selection message.
pub mod role_setup {
    crate::register_command! {
        ChatInput("role-setup") {
            let handlers = {
                command = super::setup;
                component = super::select;
            };
        }
    }
}

/// Lists every bound role.
pub mod list_roles {
    crate::register_command! {
        ChatInput("list-roles") {
            let handlers = {
                command = super::list;
            };
        }
    }
}

/// Clears a member's role assignment.
pub mod remove_user {
    crate::register_command! {
        ChatInput("remove-user") {
            let options = [
                User("user") {
                    let required = true;
                },
            ];
            let handlers = {
                command = super::remove;
            };
        }
    }
}

/// The result of a role selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The role was granted and recorded.
    Granted,
    /// The member already holds a role.
    Taken,
    /// The bot may not manage the role.
    Forbidden,
    /// The role no longer exists.
    Missing,
}

impl Outcome {
    /// Returns whether the reaction that requested the role should be taken back.
    #[must_use]
    pub const fn retracts_reaction(self) -> bool {
        !matches!(self, Self::Granted)
    }
}

/// Returns whether a member with the given permissions and highest role position may grant a role
/// at the target position.
#[must_use]
pub fn can_manage(permissions: Permissions, highest: i64, target: i64) -> bool {
    let allowed = permissions.intersects(Permissions::MANAGE_ROLES | Permissions::ADMINISTRATOR);

    allowed && highest > target
}

/// Grants a bound role to the member, keeping at most one assignment per member.
///
/// The assignment is reserved before any request is made and released again if granting fails,
/// so concurrent selections cannot both succeed.
///
/// # Errors
///
/// This function will return an error if the guild or member could not be fetched or the role
/// could not be granted.
pub async fn assign(
    api: ApiRef<'_>,
    guild_id: Id<GuildMarker>,
    user_id: Id<UserMarker>,
    role_id: Id<RoleMarker>,
    employer: Option<(Id<UserMarker>, String)>,
) -> Result<Outcome> {
    let roles = api.http.roles(guild_id).await?.model().await?;

    if !roles.iter().any(|r| r.id == role_id) {
        return Ok(Outcome::Missing);
    }

    let mut assignment = UserRole::new(user_id, role_id, OffsetDateTime::now_utc());

    if let Some((employer_id, password)) = employer {
        assignment = assignment.with_employer(employer_id, password);
    }

    let (reserved, config) = api.state.update(guild_id, |c| (c.try_assign(assignment), c.clone())).await;
    let locale = crate::util::guild_locale(api, guild_id);

    if !reserved {
        let held = config.assignment(user_id).map_or_else(String::new, |a| format!("<@&{}>", a.role_id));
        let fields = [("user", format!("<@{user_id}>")), ("requested", format!("<@&{role_id}>")), ("held", held)];
        let embed = crate::util::log_embed(locale, "role_taken", FAILURE, fields);

        if let Err(error) = crate::util::post_log(api, config.role_error_log_channel_id, embed).await {
            warn!("unable to log taken role of {user_id} - {error}")?;
        }

        return Ok(Outcome::Taken);
    }

    let result = self::grant(api, guild_id, user_id, role_id, &roles, &config).await;
    let granted = matches!(result, Ok(Outcome::Granted));

    api.state.update(guild_id, |c| self::settle(c, user_id, granted)).await;

    result
}

/// Releases the member's reserved assignment unless the role was granted.
fn settle(config: &mut GuildConfig, user_id: Id<UserMarker>, granted: bool) -> Option<UserRole> {
    if granted { None } else { config.remove_assignment(user_id) }
}

/// Returns the role a returning member held before leaving.
fn restored_role(config: &GuildConfig, user_id: Id<UserMarker>) -> Option<Id<RoleMarker>> {
    config.assignment(user_id).map(|a| a.role_id)
}

/// Checks the bot's standing, swaps the member's bound roles, and logs the grant.
///
/// # Errors
///
/// This function will return an error if a request fails.
async fn grant(
    api: ApiRef<'_>,
    guild_id: Id<GuildMarker>,
    user_id: Id<UserMarker>,
    role_id: Id<RoleMarker>,
    roles: &[Role],
    config: &GuildConfig,
) -> Result<Outcome> {
    let locale = crate::util::guild_locale(api, guild_id);
    let bot_id = crate::util::current_user_id(api).await?;
    let bot = api.http.guild_member(guild_id, bot_id).await?.model().await?;

    let held = roles.iter().filter(|r| bot.roles.contains(&r.id));
    let everyone = roles.iter().filter(|r| r.id.cast::<GuildMarker>() == guild_id);
    let permissions = held.clone().chain(everyone).fold(Permissions::empty(), |p, r| p | r.permissions);
    let highest = held.map(|r| r.position).max().unwrap_or_default();
    let target = roles.iter().find(|r| r.id == role_id).map_or(i64::MAX, |r| r.position);

    if !self::can_manage(permissions, highest, target) {
        error!("unable to manage role {role_id} in {guild_id}")?;

        let fields = [("user", format!("<@{user_id}>")), ("requested", format!("<@&{role_id}>"))];
        let embed = crate::util::log_embed(locale, "role_forbidden", FAILURE, fields);

        if let Err(error) = crate::util::post_log(api, config.role_error_log_channel_id, embed).await {
            warn!("unable to log forbidden role {role_id} - {error}")?;
        }

        return Ok(Outcome::Forbidden);
    }

    let member = api.http.guild_member(guild_id, user_id).await?.model().await?;

    for other in member.roles.iter().filter(|id| **id != role_id && config.is_bound(**id)) {
        if let Err(error) = api.http.remove_guild_member_role(guild_id, user_id, *other).await {
            warn!("unable to remove role {other} from {user_id} - {error}")?;
        }
    }

    api.http.add_guild_member_role(guild_id, user_id, role_id).await?;

    let fields = [("user", format!("<@{user_id}>")), ("role", format!("<@&{role_id}>"))];
    let embed = crate::util::log_embed(locale, "role_granted", SUCCESS, fields);

    if let Err(error) = crate::util::post_log(api, config.role_assignment_log_channel_id, embed).await {
        warn!("unable to log granted role {role_id} of {user_id} - {error}")?;
    }

    Ok(Outcome::Granted)
}

/// Restores a returning member's recorded role and logs their return.
///
/// # Errors
///
/// This function will return an error if the logger could not be reached.
pub async fn restore(api: ApiRef<'_>, guild_id: Id<GuildMarker>, user: &User) -> Result {
    let config = api.state.config(guild_id).await;
    let previous = self::restored_role(&config, user.id);

    if let Some(role_id) = previous {
        if let Err(error) = api.http.add_guild_member_role(guild_id, user.id, role_id).await {
            warn!("unable to restore role {role_id} of {} in {guild_id} - {error}", user.id)?;
        }
    }

    let locale = crate::util::guild_locale(api, guild_id);
    let role = match previous {
        Some(role_id) => format!("<@&{role_id}>"),
        None => localize!(try in locale, "text.log.field.none").into_string(),
    };
    let fields = [("user", format!("<@{}>", user.id)), ("previous", role)];
    let mut embed = crate::util::log_embed(locale, "rejoin", SUCCESS, fields);

    embed.author = EmbedAuthor::parse(user).ok();

    if let Err(error) = crate::util::post_log(api, config.rejoin_log_channel_id, embed).await {
        warn!("unable to log rejoin of {} - {error}", user.id)?;
    }

    Ok(())
}

/// Drops bindings to deleted roles and re-renders the stored role selection message.
///
/// # Errors
///
/// This function will return an error if the guild's roles could not be fetched or the message
/// could not be updated.
pub async fn refresh_selection(api: ApiRef<'_>, guild_id: Id<GuildMarker>) -> Result {
    let roles = api.http.roles(guild_id).await?.model().await?;
    let (dropped, config) = api
        .state
        .update(guild_id, |c| (c.retain_roles(|id| roles.iter().any(|r| r.id == id)), c.clone()))
        .await;

    if dropped > 0 {
        info!("dropped {dropped} bindings to deleted roles in {guild_id}")?;
    }

    let (Some(channel_id), Some(message_id)) = (config.role_selection_channel_id, config.role_selection_message_id)
    else {
        return Ok(());
    };

    let locale = crate::util::guild_locale(api, guild_id);
    let (embed, components) = self::selection_message(locale, &config, &roles)?;

    api.http.update_message(channel_id, message_id).embeds(Some(&[embed]))?.components(Some(&components))?.await?;

    Ok(())
}

/// Returns the bindings whose role still exists, paired with the role.
fn bound_roles<'r>(config: &'r GuildConfig, roles: &'r [Role]) -> Vec<(&'r str, &'r Role)> {
    let bound = config.reaction_roles.iter().filter_map(|(emoji, id)| {
        let role = roles.iter().find(|r| r.id == *id)?;

        Some((emoji.as_str(), role))
    });

    bound.collect()
}

/// Builds the role selection embed and its buttons.
///
/// # Errors
///
/// This function will return an error if a button identifier is too long.
fn selection_message(locale: Locale, config: &GuildConfig, roles: &[Role]) -> Result<(Embed, Vec<Component>)> {
    let bound = self::bound_roles(config, roles);
    let list = bound.iter().map(|(emoji, role)| format!("{emoji} → <@&{}>", role.id)).collect::<Vec<_>>();

    let title = localize!(try in locale, "text.role_setup.title");
    let header = localize!(try in locale, "text.role_setup.description");
    let footer = localize!(try in locale, "text.role_setup.footer");
    let worker = localize!(try in locale, "text.role_setup.worker");
    let embed = EmbedBuilder::new()
        .color(BRANDING)
        .title(title)
        .description(format!("{header}\n\n{}", list.join("\n")))
        .footer(EmbedFooterBuilder::new(footer));

    let buttons = bound.iter().map(|(emoji, role)| (*emoji, role.name.as_str(), role.id));
    let components = self::selection_buttons(buttons, &worker)?;

    Ok((embed.build(), components))
}

/// Builds one button per bound role followed by the worker application button.
///
/// # Errors
///
/// This function will return an error if a button identifier is too long.
fn selection_buttons<'b>(
    bound: impl IntoIterator<Item = (&'b str, &'b str, Id<RoleMarker>)>,
    worker_label: &str,
) -> Result<Vec<Component>> {
    let mut buttons = Vec::new();

    for (emoji, name, role_id) in bound.into_iter().take(MAX_ROLE_BUTTONS) {
        let custom_id = CId::new(role_setup::entry().name, "select").with(role_id).validate()?;
        let mut button = ButtonBuilder::new(ButtonStyle::Secondary)
            .custom_id(custom_id)
            .label(name.chars().take(80).collect::<String>());

        if let Ok(emoji) = ReactionType::parse(emoji) {
            button = button.emoji(emoji);
        }

        buttons.push(button);
    }

    let custom_id = CId::new(super::worker::remove_worker::entry().name, "apply").validate()?;

    buttons.push(
        ButtonBuilder::new(ButtonStyle::Primary)
            .custom_id(custom_id)
            .label(worker_label)
            .emoji(ReactionType::Unicode { name: "👷".to_string() }),
    );

    Ok(crate::util::button_rows(buttons))
}

async fn setup<'api: 'evt, 'evt>(cmd: &(dyn OnCommand + Send + Sync), mut ctx: CommandCtx<'api, 'evt>) -> Result {
    ctx.defer(true).await?;

    let Some(guild_id) = ctx.data.guild_id else {
        bail!("command must be used within a guild");
    };
    let Some(channel_id) = ctx.event.channel.as_ref().map(|c| c.id) else {
        bail!("command must be used in a channel");
    };

    let locale = ctx.event.preferred_locale();
    let roles = ctx.api.http.roles(guild_id).await?.model().await?;
    let config = ctx
        .api
        .state
        .update(guild_id, |c| {
            c.retain_roles(|id| roles.iter().any(|r| r.id == id));
            c.clone()
        })
        .await;

    if config.reaction_roles.is_empty() {
        return ctx.failure(locale, format!("{}.empty", cmd.entry().name), true).await;
    }

    let guild_locale = crate::util::guild_locale(ctx.api, guild_id);
    let (embed, components) = self::selection_message(guild_locale, &config, &roles)?;
    let message =
        ctx.api.http.create_message(channel_id).embeds(&[embed])?.components(&components)?.await?.model().await?;

    ctx.api
        .state
        .update(guild_id, |c| {
            c.role_selection_channel_id = Some(channel_id);
            c.role_selection_message_id = Some(message.id);
        })
        .await;

    for emoji in config.reaction_roles.keys().filter_map(|key| ReactionType::parse(key).ok()) {
        if let Err(error) = ctx.api.http.create_reaction(channel_id, message.id, &emoji.request()).await {
            warn!("unable to add reaction {} to {} - {error}", emoji.key(), message.id)?;
        }
    }

    ctx.success(locale, format!("{}.posted", cmd.entry().name), false).await
}

async fn select<'api: 'evt, 'evt>(
    cpn: &(dyn OnComponent + Send + Sync),
    mut ctx: ComponentCtx<'api, 'evt>,
    id: CId,
) -> Result {
    if id.kind() != "select" {
        bail!("unknown component '{id}'");
    }

    ctx.defer(true).await?;

    let Some(guild_id) = ctx.event.guild_id else {
        bail!("component must be used within a guild");
    };
    let Some(user_id) = ctx.event.author_id() else {
        bail!("component must be used by a user");
    };

    let role_id = id.id::<RoleMarker>(0)?;
    let locale = ctx.event.preferred_locale();
    let name = cpn.entry().name;

    if !ctx.api.state.config(guild_id).await.is_bound(role_id) {
        return ctx.failure(locale, format!("{name}.unbound"), false).await;
    }

    match self::assign(ctx.api, guild_id, user_id, role_id, None).await? {
        Outcome::Granted => ctx.success(locale, format!("{name}.granted"), false).await,
        Outcome::Taken => ctx.failure(locale, format!("{name}.taken"), true).await,
        Outcome::Forbidden => ctx.failure(locale, format!("{name}.forbidden"), true).await,
        Outcome::Missing => ctx.failure(locale, format!("{name}.unbound"), false).await,
    }
}

async fn list<'api: 'evt, 'evt>(cmd: &(dyn OnCommand + Send + Sync), ctx: CommandCtx<'api, 'evt>) -> Result {
    let Some(guild_id) = ctx.data.guild_id else {
        bail!("command must be used within a guild");
    };

    let locale = ctx.event.preferred_locale();
    let config = ctx.api.state.config(guild_id).await;

    if config.reaction_roles.is_empty() {
        return ctx.notify(locale, format!("{}.empty", cmd.entry().name), false).await;
    }

    let lines = config.reaction_roles.iter().map(|(emoji, id)| format!("{emoji} → <@&{id}>"));
    let title = localize!(try in locale, "text.list_roles.title");
    let embed = EmbedBuilder::new().color(BRANDING).title(title).description(lines.collect::<Vec<_>>().join("\n"));

    ctx.reply(embed.build()).await
}

async fn remove<'api: 'evt, 'evt>(cmd: &(dyn OnCommand + Send + Sync), mut ctx: CommandCtx<'api, 'evt>) -> Result {
    let Some(guild_id) = ctx.data.guild_id else {
        bail!("command must be used within a guild");
    };

    let resolver = CommandOptionResolver::new(ctx.data);
    let user_id = *resolver.get_user_id("user")?;
    let locale = ctx.event.preferred_locale();

    let Some(assignment) = ctx.api.state.update(guild_id, |c| c.remove_assignment(user_id)).await else {
        return ctx.failure(locale, format!("{}.missing", cmd.entry().name), false).await;
    };

    ctx.defer(true).await?;

    if let Err(error) = ctx.api.http.remove_guild_member_role(guild_id, user_id, assignment.role_id).await {
        warn!("unable to revoke role {} from {user_id} - {error}", assignment.role_id)?;
    }

    if assignment.employer_id.is_some() {
        if let Err(error) = super::worker::render_passwords(ctx.api, guild_id).await {
            warn!("unable to render worker passwords in {guild_id} - {error}")?;
        }
    }

    ctx.success(locale, format!("{}.removed", cmd.entry().name), false).await
}

#[cfg(test)]
mod tests {
    use twilight_model::channel::message::component::Button;

    use super::*;

    fn buttons(components: Vec<Component>) -> Vec<Button> {
        let buttons = components.into_iter().flat_map(|c| match c {
            Component::ActionRow(row) => row.components,
            _ => vec![],
        });

        buttons
            .filter_map(|c| match c {
                Component::Button(button) => Some(button),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn managing_needs_permission_and_rank() {
        assert!(can_manage(Permissions::MANAGE_ROLES, 5, 4));
        assert!(can_manage(Permissions::ADMINISTRATOR, 5, 4));
        assert!(!can_manage(Permissions::MANAGE_ROLES, 4, 4));
        assert!(!can_manage(Permissions::SEND_MESSAGES, 9, 1));
    }

    #[test]
    fn every_binding_gets_a_button_before_the_worker_button() {
        let bound = [("🏠", "Smiths", Id::new(11)), ("<:fox:42>", "Foxes", Id::new(12))];
        let buttons = self::buttons(selection_buttons(bound, "Worker").unwrap());

        assert_eq!(buttons.len(), 3);
        assert_eq!(buttons[0].custom_id.as_deref(), Some("role-setup$select$11"));
        assert_eq!(buttons[0].label.as_deref(), Some("Smiths"));
        assert_eq!(buttons[1].emoji, Some(ReactionType::Custom { animated: false, id: Id::new(42), name: Some("fox".into()) }));
        assert_eq!(buttons[2].custom_id.as_deref(), Some("remove-worker$apply"));
    }

    #[test]
    fn only_granted_selections_keep_their_reaction() {
        assert!(!Outcome::Granted.retracts_reaction());
        assert!(Outcome::Taken.retracts_reaction());
        assert!(Outcome::Forbidden.retracts_reaction());
        assert!(Outcome::Missing.retracts_reaction());
    }

    #[test]
    fn failed_grants_release_the_reservation() {
        let now = OffsetDateTime::UNIX_EPOCH;
        let mut config = GuildConfig::new(Id::new(1));

        assert!(config.try_assign(UserRole::new(Id::new(5), Id::new(11), now)));
        assert!(settle(&mut config, Id::new(5), true).is_none());
        assert!(config.assignment(Id::new(5)).is_some());

        assert!(settle(&mut config, Id::new(5), false).is_some());
        assert!(config.assignment(Id::new(5)).is_none());
        assert!(config.try_assign(UserRole::new(Id::new(5), Id::new(12), now)));
    }

    #[test]
    fn returning_members_get_their_previous_role() {
        let mut config = GuildConfig::new(Id::new(1));

        config.try_assign(UserRole::new(Id::new(5), Id::new(11), OffsetDateTime::UNIX_EPOCH));

        assert_eq!(restored_role(&config, Id::new(5)), Some(Id::new(11)));
        assert_eq!(restored_role(&config, Id::new(6)), None);
    }

    #[test]
    fn buttons_stop_at_five_rows() {
        let bound = (1 ..= 30).map(|i| ("🏠", "Family", Id::new(i))).collect::<Vec<_>>();
        let components = selection_buttons(bound, "Worker").unwrap();

        assert_eq!(components.len(), 5);
        assert_eq!(self::buttons(components).len(), MAX_ROLE_BUTTONS + 1);
    }
}
