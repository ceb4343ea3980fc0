use anyhow::bail;
use time::OffsetDateTime;
use twilight_model::channel::message::component::{ButtonStyle, TextInputStyle};
use twilight_model::channel::message::{Component, Embed, ReactionType};
use twilight_model::guild::{Member, Role};
use twilight_model::id::marker::{GuildMarker, RoleMarker, UserMarker};
use twilight_model::id::Id;
use twilight_util::builder::embed::EmbedBuilder;
use warden_localizer::{localize, Locale};
use warden_logger::info;

use crate::bot::cid::CId;
use crate::bot::client::ApiRef;
use crate::bot::interaction::{CommandCtx, ComponentCtx, ModalCtx};
use crate::cmd::{CommandOptionResolver, ModalFieldResolver, OnCommand, OnComponent, OnModal};
use crate::state::{GuildConfig, WatchSession};
use crate::util::builder::{ActionRowBuilder, ButtonBuilder, TextInputBuilder};
use crate::util::extension::UserExtension;
use crate::util::traits::PreferLocale;
use crate::util::{Modal, Result, BRANDING, FAILURE, SUCCESS};

/// The largest number of family buttons, leaving room for the general and watch buttons.
pub const MAX_FAMILY_BUTTONS: usize = 19;

/// Posts the route control menu.
pub mod set_route_control_channel {
    crate::register_command! {
        ChatInput("set-route-control-channel") {
            let options = [
                Channel("channel") {
                    let required = true;
                    let channels = GuildText;
                },
            ];
            let handlers = {
                command = super::setup;
                component = super::component;
                modal = super::modal;
            };
        }
    }
}

/// Sets the channel that receives route inspections and watch notices.
pub mod set_route_log_channel {
    crate::register_command! {
        ChatInput("set-route-log-channel") {
            let options = [
                Channel("channel") {
                    let required = true;
                    let channels = GuildText;
                },
            ];
            let handlers = {
                command = super::set_log_channel;
            };
        }
    }
}

/// Returns the families in menu order, paired with their role names.
fn families<'r>(config: &GuildConfig, roles: &'r [Role]) -> Vec<(Id<RoleMarker>, &'r str)> {
    let families = config.family_channels.keys().filter_map(|id| {
        let role = roles.iter().find(|r| r.id == *id)?;

        Some((role.id, role.name.as_str()))
    });

    families.collect()
}

/// Builds the route control embed, its inspection buttons and its watch row.
///
/// # Errors
///
/// This function will return an error if a button identifier is too long.
fn menu_message<'f>(
    locale: Locale,
    families: impl IntoIterator<Item = (Id<RoleMarker>, &'f str)>,
    watching: bool,
) -> Result<(Embed, Vec<Component>)> {
    let name = set_route_control_channel::entry().name;
    let mut buttons = Vec::new();

    for (role_id, family) in families.into_iter().take(MAX_FAMILY_BUTTONS) {
        let custom_id = CId::new(name, "inspect").with(role_id).validate()?;

        buttons.push(
            ButtonBuilder::new(ButtonStyle::Secondary)
                .custom_id(custom_id)
                .label(family.chars().take(80).collect::<String>()),
        );
    }

    let general = localize!(try in locale, "text.control.general");

    buttons.push(
        ButtonBuilder::new(ButtonStyle::Primary)
            .custom_id(CId::new(name, "inspect").validate()?)
            .label(general.into_string())
            .emoji(ReactionType::Unicode { name: "🔍".to_string() }),
    );

    let start = localize!(try in locale, "text.control.watch_start");
    let stop = localize!(try in locale, "text.control.watch_stop");
    let watch_row = ActionRowBuilder::new([
        ButtonBuilder::new(ButtonStyle::Success)
            .custom_id(CId::new(name, "watch-start").validate()?)
            .label(start.into_string())
            .disabled(watching),
        ButtonBuilder::new(ButtonStyle::Danger)
            .custom_id(CId::new(name, "watch-stop").validate()?)
            .label(stop.into_string())
            .disabled(!watching),
    ]);

    let mut components = crate::util::button_rows(buttons);

    components.push(watch_row.into());

    let title = localize!(try in locale, "text.control.title");
    let description = localize!(try in locale, "text.control.description");
    let embed = EmbedBuilder::new().color(BRANDING).title(title).description(description);

    Ok((embed.build(), components))
}

/// Re-renders the stored route control menu, if one was posted.
///
/// # Errors
///
/// This function will return an error if the guild's roles could not be fetched or the message
/// could not be updated.
pub async fn refresh_menu(api: ApiRef<'_>, guild_id: Id<GuildMarker>) -> Result {
    let config = api.state.config(guild_id).await;
    let (Some(channel_id), Some(message_id)) = (config.route_control_channel_id, config.route_control_message_id)
    else {
        return Ok(());
    };

    let roles = api.http.roles(guild_id).await?.model().await?;
    let watching = api.state.is_watching(guild_id).await;
    let locale = crate::util::guild_locale(api, guild_id);
    let (embed, components) = self::menu_message(locale, self::families(&config, &roles), watching)?;

    api.http.update_message(channel_id, message_id).embeds(Some(&[embed]))?.components(Some(&components))?.await?;

    Ok(())
}

/// Formats the details of an inspection.
fn inspection_details(
    locale: Locale,
    partners: &[String],
    unknown: &[String],
    control_points: &str,
    notes: Option<&str>,
) -> String {
    let mut lines = Vec::with_capacity(4);

    if !partners.is_empty() {
        let label = localize!(try in locale, "text.control.details.partners");

        lines.push(format!("{label}: {}", partners.join(", ")));
    }
    if !unknown.is_empty() {
        let label = localize!(try in locale, "text.control.details.unknown");

        lines.push(format!("{label}: {}", unknown.join(", ")));
    }

    let label = localize!(try in locale, "text.control.details.control_points");

    lines.push(format!("{label}: {control_points}"));

    if let Some(notes) = notes {
        let label = localize!(try in locale, "text.control.details.notes");

        lines.push(format!("{label}: {notes}"));
    }

    lines.join("\n")
}

/// Builds the inspection log, with the details as its description.
fn inspection_embed(locale: Locale, family: String, controller_id: Id<UserMarker>, details: &str) -> Embed {
    let fields = [("family", family), ("controller", format!("<@{controller_id}>"))];

    crate::util::with_details(crate::util::log_embed(locale, "inspection", BRANDING, fields), details)
}

/// Builds the watch start log, listing the partners as its description.
fn watch_embed(locale: Locale, controller_id: Id<UserMarker>, partners: &[String]) -> Embed {
    let label = localize!(try in locale, "text.log.field.partners");
    let fields = [("controller", format!("<@{controller_id}>"))];
    let embed = crate::util::log_embed(locale, "watch_started", SUCCESS, fields);

    crate::util::with_details(embed, &format!("{label}: {}", partners.join(", ")))
}

/// Resolves a comma-separated list of partners against the guild's members.
///
/// # Errors
///
/// This function will return an error if the members could not be fetched.
async fn resolve_partners(
    api: ApiRef<'_>,
    guild_id: Id<GuildMarker>,
    input: &str,
) -> Result<(Vec<String>, Vec<String>)> {
    let members = api.http.guild_members(guild_id).limit(super::worker::MEMBER_LIMIT)?.await?.model().await?;
    let (found, unknown) = crate::util::matching::find_all::<Member>(&members, input);

    Ok((found.into_iter().map(UserExtension::mention).collect(), unknown))
}

async fn setup<'api: 'evt, 'evt>(cmd: &(dyn OnCommand + Send + Sync), mut ctx: CommandCtx<'api, 'evt>) -> Result {
    let Some(guild_id) = ctx.data.guild_id else {
        bail!("command must be used within a guild");
    };

    let channel_id = *CommandOptionResolver::new(ctx.data).get_channel_id("channel")?;

    ctx.defer(true).await?;

    let config = ctx.api.state.config(guild_id).await;
    let roles = ctx.api.http.roles(guild_id).await?.model().await?;
    let watching = ctx.api.state.is_watching(guild_id).await;
    let guild_locale = crate::util::guild_locale(ctx.api, guild_id);
    let (embed, components) = self::menu_message(guild_locale, self::families(&config, &roles), watching)?;

    let message =
        ctx.api.http.create_message(channel_id).embeds(&[embed])?.components(&components)?.await?.model().await?;

    ctx.api
        .state
        .update(guild_id, |c| {
            c.route_control_channel_id = Some(channel_id);
            c.route_control_message_id = Some(message.id);
        })
        .await;

    info!("posted route control menu in {channel_id}")?;

    ctx.success(ctx.event.preferred_locale(), format!("{}.posted", cmd.entry().name), false).await
}

async fn set_log_channel<'api: 'evt, 'evt>(
    cmd: &(dyn OnCommand + Send + Sync),
    ctx: CommandCtx<'api, 'evt>,
) -> Result {
    super::set_channel(cmd, ctx, |config, id| config.route_control_log_channel_id = Some(id)).await
}

async fn component<'api: 'evt, 'evt>(
    cpn: &(dyn OnComponent + Send + Sync),
    mut ctx: ComponentCtx<'api, 'evt>,
    id: CId,
) -> Result {
    let Some(guild_id) = ctx.event.guild_id else {
        bail!("component must be used within a guild");
    };

    let name = cpn.entry().name;
    let locale = ctx.event.preferred_locale();

    match id.kind() {
        "inspect" => {
            let mut custom_id = CId::new(name, "inspect");

            if let Some(role_id) = id.data(0) {
                custom_id = custom_id.with(role_id);
            }

            let title = localize!(try in locale, "text.control.inspect.title");
            let partners = localize!(try in locale, "text.control.inspect.partners");
            let points = localize!(try in locale, "text.control.inspect.control_points");
            let notes = localize!(try in locale, "text.control.inspect.notes");
            let hint = localize!(try in locale, "text.control.partners_hint");
            let inputs = [
                TextInputBuilder::new("partners", partners, TextInputStyle::Short)
                    .required(true)
                    .max_length(200)
                    .placeholder(hint.into_string()),
                TextInputBuilder::new("control_points", points, TextInputStyle::Short).required(true).max_length(200),
                TextInputBuilder::new("notes", notes, TextInputStyle::Paragraph).required(false).max_length(1000),
            ];

            ctx.modal(Modal::new(title, custom_id.validate()?, inputs)).await
        }
        "watch-start" => {
            let title = localize!(try in locale, "text.control.watch.title");
            let partners = localize!(try in locale, "text.control.watch.partners");
            let hint = localize!(try in locale, "text.control.partners_hint");
            let input = TextInputBuilder::new("partners", partners, TextInputStyle::Short)
                .required(true)
                .max_length(200)
                .placeholder(hint.into_string());

            ctx.modal(Modal::new(title, CId::new(name, "watch").validate()?, [input])).await
        }
        "watch-stop" => {
            ctx.defer(true).await?;

            let session = ctx.api.state.stop_watch(guild_id).await;

            self::refresh_menu(ctx.api, guild_id).await?;

            if let Some(session) = session {
                let minutes = session.elapsed_minutes(OffsetDateTime::now_utc());
                let guild_locale = crate::util::guild_locale(ctx.api, guild_id);
                let unit = localize!(try in guild_locale, "text.control.minutes");
                let fields = [
                    ("controller", format!("<@{}>", session.controller)),
                    ("duration", format!("{minutes} {unit}")),
                ];
                let embed = crate::util::log_embed(guild_locale, "watch_stopped", FAILURE, fields);
                let config = ctx.api.state.config(guild_id).await;

                crate::util::post_log(ctx.api, config.route_control_log_channel_id, embed).await?;

                info!("stopped route watch in {guild_id} after {minutes} minutes")?;
            }

            ctx.success(locale, format!("{name}.watch_stopped"), false).await
        }
        _ => bail!("unknown component '{id}'"),
    }
}

async fn modal<'api: 'evt, 'evt>(md: &(dyn OnModal + Send + Sync), ctx: ModalCtx<'api, 'evt>, id: CId) -> Result {
    match id.kind() {
        "inspect" => self::submit_inspection(md, ctx, id).await,
        "watch" => self::submit_watch(md, ctx).await,
        _ => bail!("unknown modal '{id}'"),
    }
}

async fn submit_inspection<'api: 'evt, 'evt>(
    md: &(dyn OnModal + Send + Sync),
    mut ctx: ModalCtx<'api, 'evt>,
    id: CId,
) -> Result {
    let Some(guild_id) = ctx.event.guild_id else {
        bail!("modal must be used within a guild");
    };
    let Some(controller_id) = ctx.event.author_id() else {
        bail!("modal must be used by a user");
    };

    let fields = ModalFieldResolver::new(ctx.data);
    let partners = fields.get_required("partners")?;
    let control_points = fields.get_required("control_points")?;
    let notes = fields.get("notes");

    ctx.defer(true).await?;

    let guild_locale = crate::util::guild_locale(ctx.api, guild_id);
    let family = match id.data(0) {
        Some(_) => {
            let role_id = id.id::<RoleMarker>(0)?;
            let roles = ctx.api.http.roles(guild_id).await?.model().await?;

            roles.into_iter().find(|r| r.id == role_id).map_or_else(|| format!("<@&{role_id}>"), |r| r.name)
        }
        None => localize!(try in guild_locale, "text.control.system").into_string(),
    };

    let (found, unknown) = self::resolve_partners(ctx.api, guild_id, partners).await?;
    let details = self::inspection_details(guild_locale, &found, &unknown, control_points, notes);
    let embed = self::inspection_embed(guild_locale, family, controller_id, &details);
    let config = ctx.api.state.config(guild_id).await;

    crate::util::post_log(ctx.api, config.route_control_log_channel_id, embed).await?;

    ctx.success(ctx.event.preferred_locale(), format!("{}.logged", md.entry().name), false).await
}

async fn submit_watch<'api: 'evt, 'evt>(md: &(dyn OnModal + Send + Sync), mut ctx: ModalCtx<'api, 'evt>) -> Result {
    let Some(guild_id) = ctx.event.guild_id else {
        bail!("modal must be used within a guild");
    };
    let Some(controller_id) = ctx.event.author_id() else {
        bail!("modal must be used by a user");
    };

    let partners = ModalFieldResolver::new(ctx.data).get_required("partners")?;

    ctx.defer(true).await?;

    let (found, unknown) = self::resolve_partners(ctx.api, guild_id, partners).await?;
    let names = found.into_iter().chain(unknown).collect::<Vec<_>>();
    let session = WatchSession::new(OffsetDateTime::now_utc(), names.clone(), controller_id);

    ctx.api.state.start_watch(guild_id, session).await;

    self::refresh_menu(ctx.api, guild_id).await?;

    let guild_locale = crate::util::guild_locale(ctx.api, guild_id);
    let embed = self::watch_embed(guild_locale, controller_id, &names);
    let config = ctx.api.state.config(guild_id).await;

    crate::util::post_log(ctx.api, config.route_control_log_channel_id, embed).await?;

    info!("started route watch in {guild_id}")?;

    ctx.success(ctx.event.preferred_locale(), format!("{}.watch_started", md.entry().name), false).await
}

#[cfg(test)]
mod tests {
    use twilight_model::channel::message::component::Button;

    use super::*;

    fn buttons(row: &Component) -> Vec<&Button> {
        let Component::ActionRow(row) = row else { panic!("expected an action row") };

        row.components
            .iter()
            .filter_map(|c| match c {
                Component::Button(button) => Some(button),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn watch_row_follows_the_session() {
        let (_, idle) = menu_message(Locale::EnglishUS, [(Id::new(4), "Smiths")], false).unwrap();
        let (_, active) = menu_message(Locale::EnglishUS, [(Id::new(4), "Smiths")], true).unwrap();

        let idle = buttons(idle.last().unwrap());
        let active = buttons(active.last().unwrap());

        assert_eq!((idle[0].disabled, idle[1].disabled), (false, true));
        assert_eq!((active[0].disabled, active[1].disabled), (true, false));
    }

    #[test]
    fn families_come_before_the_general_inspection() {
        let families = [(Id::new(4), "Smiths"), (Id::new(5), "Millers")];
        let (_, components) = menu_message(Locale::EnglishUS, families, false).unwrap();
        let first = buttons(&components[0]);
        let ids = first.iter().map(|b| b.custom_id.as_deref().unwrap_or_default()).collect::<Vec<_>>();

        assert_eq!(components.len(), 2);
        assert_eq!(ids, vec![
            "set-route-control-channel$inspect$4",
            "set-route-control-channel$inspect$5",
            "set-route-control-channel$inspect",
        ]);
    }

    #[test]
    fn menus_never_exceed_five_rows() {
        let names = (1 ..= 40).map(|i| (Id::new(i), "Family")).collect::<Vec<_>>();
        let (_, components) = menu_message(Locale::EnglishUS, names, false).unwrap();

        assert_eq!(components.len(), 5);
        assert_eq!(buttons(&components[3]).len(), 5);
    }

    #[test]
    fn details_skip_what_was_not_given() {
        let partners = vec!["<@1>".to_string()];
        let details = inspection_details(Locale::EnglishUS, &partners, &[], "North gate", None);

        assert_eq!(details.lines().count(), 2);
        assert!(details.ends_with(": North gate"));

        let unknown = vec!["Ghost".to_string()];
        let details = inspection_details(Locale::EnglishUS, &partners, &unknown, "North gate", Some("quiet"));

        assert_eq!(details.lines().count(), 4);
        assert!(details.contains(": Ghost"));
    }

    #[test]
    fn longest_inspections_are_still_accepted() {
        let partners = (0 .. 100).map(|i| format!("<@{}>", u64::MAX - i)).collect::<Vec<_>>();
        let unknown = vec!["n".repeat(200)];
        let points = "p".repeat(200);
        let notes = "w".repeat(1000);
        let details = inspection_details(Locale::EnglishUS, &partners, &unknown, &points, Some(&notes));
        let embed = inspection_embed(Locale::EnglishUS, "f".repeat(100), Id::new(u64::MAX), &details);

        assert!(twilight_validate::embed::embed(&embed).is_ok());
        assert!(embed.description.is_some_and(|d| d.ends_with(&notes)));
    }

    #[test]
    fn longest_watches_are_still_accepted() {
        let partners = (0 .. 100).map(|i| format!("<@{}>", u64::MAX - i)).collect::<Vec<_>>();
        let embed = watch_embed(Locale::EnglishUS, Id::new(u64::MAX), &partners);

        assert!(twilight_validate::embed::embed(&embed).is_ok());
        assert!(embed.description.is_some_and(|d| d.contains(&partners[99])));
    }
}
