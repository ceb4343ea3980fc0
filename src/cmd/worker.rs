use anyhow::bail;
use time::OffsetDateTime;
use twilight_model::application::interaction::Interaction;
use twilight_model::channel::message::component::{ButtonStyle, TextInputStyle};
use twilight_model::channel::message::embed::EmbedAuthor;
use twilight_model::channel::message::{Component, Embed};
use twilight_model::id::marker::{GuildMarker, RoleMarker, UserMarker};
use twilight_model::id::Id;
use twilight_util::builder::embed::{EmbedBuilder, EmbedFieldBuilder};
use twilight_validate::embed::{FIELD_COUNT, FIELD_VALUE_LENGTH};
use warden_localizer::{localize, Locale};
use warden_logger::{info, warn};

use crate::bot::cid::CId;
use crate::bot::client::ApiRef;
use crate::bot::interaction::{CommandCtx, ComponentCtx, ModalCtx};
use crate::cmd::roles::Outcome;
use crate::cmd::{CommandOptionResolver, ModalFieldResolver, OnCommand, OnComponent, OnModal};
use crate::state::{GuildConfig, UserRole, WorkerApplication};
use crate::util::builder::{ButtonBuilder, TextInputBuilder};
use crate::util::extension::{EmbedAuthorExtension, UserExtension};
use crate::util::matching::Searchable;
use crate::util::traits::PreferLocale;
use crate::util::{Modal, Result, BRANDING, FAILURE, SUCCESS};

/// The name of the role granted to workers.
pub const WORKER_ROLE: &str = "Arbeiter";
/// The color of the role granted to workers.
pub const WORKER_COLOR: u32 = 0x00FF_A500;
/// The largest number of members searched when resolving an employer.
pub const MEMBER_LIMIT: u16 = 1000;
/// The most characters placed on one page of the password listing.
const PAGE_LEN: usize = 5000;

/// Sets the channel that receives worker applications and notices.
pub mod set_worker_info_channel {
    crate::register_command! {
        ChatInput("set-worker-info-channel") {
            let options = [
                Channel("channel") {
                    let required = true;
                    let channels = GuildText;
                },
            ];
            let handlers = {
                command = super::set_info_channel;
            };
        }
    }
}

/// Sets the channel listing every worker's password.
pub mod set_worker_password_channel {
    crate::register_command! {
        ChatInput("set-worker-password-channel") {
            let options = [
                Channel("channel") {
                    let required = true;
                    let channels = GuildText;
                },
            ];
            let handlers = {
                command = super::set_password_channel;
            };
        }
    }
}

/// Removes a worker, and handles the worker application workflow.
pub mod remove_worker {
    crate::register_command! {
        ChatInput("remove-worker") {
            let options = [
                User("user") {
                    let required = true;
                },
            ];
            let handlers = {
                command = super::remove;
                component = super::component;
                modal = super::modal;
            };
        }
    }
}

/// Splits the worker listing into field values that each fit within one embed field.
fn password_fields<'w>(workers: impl IntoIterator<Item = (String, &'w str)>) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();

    for (name, password) in workers {
        let line = crate::util::clamp(&format!("{name}: `{password}`"), FIELD_VALUE_LENGTH);

        if !field.is_empty() && field.chars().count() + line.chars().count() + 1 > FIELD_VALUE_LENGTH {
            fields.push(std::mem::take(&mut field));
        }
        if !field.is_empty() {
            field.push('\n');
        }

        field.push_str(&line);
    }

    if !field.is_empty() {
        fields.push(field);
    }

    fields
}

/// Builds one embed per page of the worker listing.
fn password_embeds(locale: Locale, fields: Vec<String>) -> Vec<Embed> {
    let title = localize!(try in locale, "text.worker.passwords.title");
    let name = localize!(try in locale, "text.worker.passwords.field");

    if fields.is_empty() {
        let empty = localize!(try in locale, "text.worker.passwords.empty");
        let embed = EmbedBuilder::new().color(BRANDING).title(&*title).field(EmbedFieldBuilder::new(&*name, &*empty));

        return vec![embed.build()];
    }

    let mut pages = vec![];
    let mut page = EmbedBuilder::new().color(BRANDING).title(&*title);
    let (mut count, mut length) = (0, 0);

    for value in fields {
        let value_len = value.chars().count();

        if count == FIELD_COUNT || (count > 0 && length + value_len > PAGE_LEN) {
            pages.push(page.build());
            page = EmbedBuilder::new().color(BRANDING).title(&*title);
            (count, length) = (0, 0);
        }

        page = page.field(EmbedFieldBuilder::new(&*name, value));
        count += 1;
        length += value_len;
    }

    pages.push(page.build());
    pages
}

/// The reason a worker application is refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Refusal {
    /// The applicant already holds a role.
    AlreadyAssigned,
    /// No member answers to the employer's name.
    UnknownEmployer,
}

impl Refusal {
    /// Returns the failure key of this refusal.
    const fn key(self) -> &'static str {
        match self {
            Self::AlreadyAssigned => "already_assigned",
            Self::UnknownEmployer => "unknown_employer",
        }
    }
}

/// Finds the employer a worker applies to.
///
/// # Errors
///
/// This function will return an error if the worker already holds a role or nobody answers to the
/// employer's name.
fn employer_for<'m, T: Searchable>(
    config: &GuildConfig,
    candidates: &'m [T],
    worker_id: Id<UserMarker>,
    employer_name: &str,
) -> Result<&'m T, Refusal> {
    if config.assignment(worker_id).is_some() {
        return Err(Refusal::AlreadyAssigned);
    }

    crate::util::matching::find(candidates, employer_name).ok_or(Refusal::UnknownEmployer)
}

/// Builds the accept and reject buttons of an application.
///
/// # Errors
///
/// This function will return an error if an identifier is too long.
fn decision_buttons(
    locale: Locale,
    worker_id: Id<UserMarker>,
    employer_id: Id<UserMarker>,
) -> Result<Vec<Component>> {
    let name = remove_worker::entry().name;
    let accept = CId::new(name, "accept").with(worker_id).with(employer_id).validate()?;
    let reject = CId::new(name, "reject").with(worker_id).with(employer_id).validate()?;

    Ok(crate::util::button_rows([
        ButtonBuilder::new(ButtonStyle::Success)
            .custom_id(accept)
            .label(localize!(try in locale, "text.worker.accept").into_string()),
        ButtonBuilder::new(ButtonStyle::Danger)
            .custom_id(reject)
            .label(localize!(try in locale, "text.worker.reject").into_string()),
    ]))
}

/// Returns whether the interacting member may decide on an application for the given employer.
async fn may_decide(api: ApiRef<'_>, event: &Interaction, employer_id: Id<UserMarker>) -> bool {
    event.author_id() == Some(employer_id) || super::is_authorized(api, event).await
}

/// Returns the guild's worker role, creating it if it does not exist.
///
/// # Errors
///
/// This function will return an error if the roles could not be fetched or created.
async fn worker_role(api: ApiRef<'_>, guild_id: Id<GuildMarker>) -> Result<Id<RoleMarker>> {
    let roles = api.http.roles(guild_id).await?.model().await?;

    if let Some(role) = roles.iter().find(|r| r.name == WORKER_ROLE) {
        return Ok(role.id);
    }

    let role = api.http.create_role(guild_id).name(WORKER_ROLE).color(WORKER_COLOR).await?.model().await?;

    info!("created worker role {} in {guild_id}", role.id)?;

    Ok(role.id)
}

/// Sends the embed to the user's direct messages.
///
/// # Errors
///
/// This function will return an error if the message could not be sent.
async fn direct_message(api: ApiRef<'_>, user_id: Id<UserMarker>, embed: Embed) -> Result {
    let channel = api.http.create_private_channel(user_id).await?.model().await?;

    api.http.create_message(channel.id).embeds(&[embed])?.await?;

    Ok(())
}

/// Replaces the worker password channel contents with every worker's password.
///
/// # Errors
///
/// This function will return an error if the members could not be fetched or the channel could not
/// be re-rendered.
pub async fn render_passwords(api: ApiRef<'_>, guild_id: Id<GuildMarker>) -> Result {
    let config = api.state.config(guild_id).await;
    let Some(channel_id) = config.worker_password_channel_id else {
        return Ok(());
    };

    let members = api.http.guild_members(guild_id).limit(MEMBER_LIMIT)?.await?.model().await?;
    let workers = config.workers().map(|worker| {
        let member = members.iter().find(|m| m.user.id == worker.user_id);
        let name = member.map_or_else(|| format!("<@{}>", worker.user_id), UserExtension::display);

        (name, worker.password.as_deref().unwrap_or_default())
    });

    let locale = crate::util::guild_locale(api, guild_id);
    let embeds = self::password_embeds(locale, self::password_fields(workers));

    crate::util::repost(api, channel_id, &embeds).await
}

/// Revokes a worker's role and assignment, returning the removed assignment.
///
/// # Errors
///
/// This function will return an error if the logger could not be reached.
async fn revoke(api: ApiRef<'_>, guild_id: Id<GuildMarker>, worker_id: Id<UserMarker>) -> Result<Option<UserRole>> {
    let (removed, config) = api
        .state
        .update(guild_id, |c| {
            let is_worker = c.assignment(worker_id).is_some_and(|a| a.employer_id.is_some());

            (if is_worker { c.remove_assignment(worker_id) } else { None }, c.clone())
        })
        .await;

    let Some(assignment) = removed else {
        return Ok(None);
    };

    if let Err(error) = api.http.remove_guild_member_role(guild_id, worker_id, assignment.role_id).await {
        warn!("unable to revoke worker role of {worker_id} - {error}")?;
    }

    let locale = crate::util::guild_locale(api, guild_id);
    let employer = assignment.employer_id.map_or_else(String::new, |id| format!("<@{id}>"));
    let fields = [("worker", format!("<@{worker_id}>")), ("employer", employer)];
    let embed = crate::util::log_embed(locale, "worker_removed", FAILURE, fields);

    if let Err(error) = crate::util::post_log(api, config.worker_info_channel_id, embed).await {
        warn!("unable to log removal of worker {worker_id} - {error}")?;
    }

    if let Err(error) = self::render_passwords(api, guild_id).await {
        warn!("unable to render worker passwords in {guild_id} - {error}")?;
    }

    Ok(Some(assignment))
}

async fn set_info_channel<'api: 'evt, 'evt>(
    cmd: &(dyn OnCommand + Send + Sync),
    ctx: CommandCtx<'api, 'evt>,
) -> Result {
    super::set_channel(cmd, ctx, |config, id| config.worker_info_channel_id = Some(id)).await
}

async fn set_password_channel<'api: 'evt, 'evt>(
    cmd: &(dyn OnCommand + Send + Sync),
    mut ctx: CommandCtx<'api, 'evt>,
) -> Result {
    let Some(guild_id) = ctx.data.guild_id else {
        bail!("command must be used within a guild");
    };

    let channel_id = *CommandOptionResolver::new(ctx.data).get_channel_id("channel")?;

    ctx.defer(true).await?;
    ctx.api.state.update(guild_id, |c| c.worker_password_channel_id = Some(channel_id)).await;

    self::render_passwords(ctx.api, guild_id).await?;

    ctx.success(ctx.event.preferred_locale(), format!("{}.set", cmd.entry().name), false).await
}

async fn remove<'api: 'evt, 'evt>(cmd: &(dyn OnCommand + Send + Sync), mut ctx: CommandCtx<'api, 'evt>) -> Result {
    let Some(guild_id) = ctx.data.guild_id else {
        bail!("command must be used within a guild");
    };

    let worker_id = *CommandOptionResolver::new(ctx.data).get_user_id("user")?;
    let locale = ctx.event.preferred_locale();

    ctx.defer(true).await?;

    if self::revoke(ctx.api, guild_id, worker_id).await?.is_some() {
        ctx.success(locale, format!("{}.removed", cmd.entry().name), false).await
    } else {
        ctx.failure(locale, format!("{}.not_worker", cmd.entry().name), false).await
    }
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
        "apply" => {
            let title = localize!(try in locale, "text.worker.apply.title");
            let label = localize!(try in locale, "text.worker.apply.employer");
            let hint = localize!(try in locale, "text.worker.apply.employer_hint");
            let input = TextInputBuilder::new("employer", label, TextInputStyle::Short)
                .required(true)
                .max_length(100)
                .placeholder(hint.into_string());

            ctx.modal(Modal::new(title, CId::new(name, "apply").validate()?, [input])).await
        }
        "accept" => {
            let (worker_id, employer_id) = (id.id::<UserMarker>(0)?, id.id::<UserMarker>(1)?);

            if !self::may_decide(ctx.api, ctx.event, employer_id).await {
                return ctx.failure(locale, format!("{name}.not_employer"), false).await;
            }

            let config = ctx.api.state.config(guild_id).await;

            let mut pending = config.pending_worker_applications.iter();

            if !pending.any(|a| a.worker_id == worker_id && a.employer_id == employer_id) {
                return ctx.failure(locale, format!("{name}.no_application"), false).await;
            }

            let title = localize!(try in locale, "text.worker.password.title");
            let label = localize!(try in locale, "text.worker.password.password");
            let input = TextInputBuilder::new("password", label, TextInputStyle::Short).required(true).max_length(100);
            let custom_id = CId::new(name, "password").with(worker_id).with(employer_id).validate()?;

            ctx.modal(Modal::new(title, custom_id, [input])).await
        }
        "reject" => {
            let (worker_id, employer_id) = (id.id::<UserMarker>(0)?, id.id::<UserMarker>(1)?);

            if !self::may_decide(ctx.api, ctx.event, employer_id).await {
                return ctx.failure(locale, format!("{name}.not_employer"), false).await;
            }

            ctx.defer(true).await?;

            if ctx.api.state.update(guild_id, |c| c.take_pending(worker_id, employer_id)).await.is_none() {
                return ctx.failure(locale, format!("{name}.no_application"), false).await;
            }

            let worker_locale = crate::util::guild_locale(ctx.api, guild_id);
            let fields = [("employer", format!("<@{employer_id}>"))];
            let embed = crate::util::log_embed(worker_locale, "worker_rejected", FAILURE, fields);

            if let Err(error) = self::direct_message(ctx.api, worker_id, embed).await {
                warn!("unable to notify rejected worker {worker_id} - {error}")?;
            }

            ctx.success(locale, format!("{name}.rejected"), false).await
        }
        "remove" => {
            let worker_id = id.id::<UserMarker>(0)?;
            let config = ctx.api.state.config(guild_id).await;
            let employer_id = config.assignment(worker_id).and_then(|a| a.employer_id);

            let allowed = match employer_id {
                Some(employer_id) => self::may_decide(ctx.api, ctx.event, employer_id).await,
                None => super::is_authorized(ctx.api, ctx.event).await,
            };

            if !allowed {
                return ctx.failure(locale, "forbidden", true).await;
            }

            ctx.defer(true).await?;

            if self::revoke(ctx.api, guild_id, worker_id).await?.is_some() {
                ctx.success(locale, format!("{name}.removed"), false).await
            } else {
                ctx.failure(locale, format!("{name}.not_worker"), false).await
            }
        }
        _ => bail!("unknown component '{id}'"),
    }
}

async fn modal<'api: 'evt, 'evt>(md: &(dyn OnModal + Send + Sync), ctx: ModalCtx<'api, 'evt>, id: CId) -> Result {
    match id.kind() {
        "apply" => self::submit_application(md, ctx).await,
        "password" => self::submit_password(md, ctx, id).await,
        _ => bail!("unknown modal '{id}'"),
    }
}

async fn submit_application<'api: 'evt, 'evt>(
    md: &(dyn OnModal + Send + Sync),
    mut ctx: ModalCtx<'api, 'evt>,
) -> Result {
    let Some(guild_id) = ctx.event.guild_id else {
        bail!("modal must be used within a guild");
    };
    let Some(worker) = ctx.event.author() else {
        bail!("modal must be used by a user");
    };

    let name = md.entry().name;
    let locale = ctx.event.preferred_locale();
    let employer_name = ModalFieldResolver::new(ctx.data).get_required("employer")?;

    ctx.defer(true).await?;

    let config = ctx.api.state.config(guild_id).await;
    let members = ctx.api.http.guild_members(guild_id).limit(MEMBER_LIMIT)?.await?.model().await?;
    let employer = match self::employer_for(&config, &members, worker.id, employer_name) {
        Ok(employer) => employer,
        Err(refusal) => {
            let has_description = refusal == Refusal::UnknownEmployer;

            return ctx.failure(locale, format!("{name}.{}", refusal.key()), has_description).await;
        }
    };

    let employer_id = employer.user.id;
    let role_id = self::worker_role(ctx.api, guild_id).await?;
    let applied_at = OffsetDateTime::now_utc();
    let application = WorkerApplication { worker_id: worker.id, employer_id, role_id, applied_at };

    ctx.api.state.update(guild_id, |c| c.add_pending(application)).await;

    let guild_locale = crate::util::guild_locale(ctx.api, guild_id);
    let fields = [("worker", format!("<@{}>", worker.id)), ("employer", format!("<@{employer_id}>"))];
    let mut embed = crate::util::log_embed(guild_locale, "worker_application", BRANDING, fields);

    embed.author = EmbedAuthor::parse(worker).ok();

    let components = self::decision_buttons(guild_locale, worker.id, employer_id)?;
    let channel_id = match config.worker_info_channel_id {
        Some(channel_id) => channel_id,
        None => ctx.api.http.create_private_channel(employer_id).await?.model().await?.id,
    };

    ctx.api
        .http
        .create_message(channel_id)
        .content(&format!("<@{employer_id}>"))?
        .embeds(&[embed])?
        .components(&components)?
        .await?;

    ctx.success(locale, format!("{name}.applied"), false).await
}

async fn submit_password<'api: 'evt, 'evt>(
    md: &(dyn OnModal + Send + Sync),
    mut ctx: ModalCtx<'api, 'evt>,
    id: CId,
) -> Result {
    let Some(guild_id) = ctx.event.guild_id else {
        bail!("modal must be used within a guild");
    };

    let name = md.entry().name;
    let locale = ctx.event.preferred_locale();
    let (worker_id, employer_id) = (id.id::<UserMarker>(0)?, id.id::<UserMarker>(1)?);
    let password = ModalFieldResolver::new(ctx.data).get_required("password")?;

    ctx.defer(true).await?;

    if !self::may_decide(ctx.api, ctx.event, employer_id).await {
        return ctx.failure(locale, format!("{name}.not_employer"), false).await;
    }

    let config = ctx.api.state.config(guild_id).await;
    let mut pending = config.pending_worker_applications.iter();
    let Some(application) = pending.find(|a| a.worker_id == worker_id && a.employer_id == employer_id) else {
        return ctx.failure(locale, format!("{name}.no_application"), false).await;
    };

    let employer = Some((employer_id, password.to_string()));

    match super::roles::assign(ctx.api, guild_id, worker_id, application.role_id, employer).await? {
        Outcome::Granted => {}
        Outcome::Taken => return ctx.failure(locale, format!("{name}.already_assigned"), false).await,
        Outcome::Forbidden => return ctx.failure(locale, "role-setup.forbidden", true).await,
        Outcome::Missing => return ctx.failure(locale, format!("{name}.missing_role"), false).await,
    }

    ctx.api.state.update(guild_id, |c| c.take_pending(worker_id, employer_id)).await;

    let guild_locale = crate::util::guild_locale(ctx.api, guild_id);
    let fields = [("employer", format!("<@{employer_id}>")), ("password", format!("`{password}`"))];
    let embed = crate::util::log_embed(guild_locale, "worker_accepted", SUCCESS, fields);

    if let Err(error) = self::direct_message(ctx.api, worker_id, embed).await {
        warn!("unable to send worker {worker_id} their password - {error}")?;
    }

    if let Some(channel_id) = config.worker_info_channel_id {
        let fields = [("worker", format!("<@{worker_id}>")), ("employer", format!("<@{employer_id}>"))];
        let embed = crate::util::log_embed(guild_locale, "worker_hired", SUCCESS, fields);
        let remove = CId::new(name, "remove").with(worker_id).validate()?;
        let label = localize!(try in guild_locale, "text.worker.remove");
        let components = crate::util::button_rows([ButtonBuilder::new(ButtonStyle::Danger)
            .custom_id(remove)
            .label(label.into_string())]);

        let result = match ctx.api.http.create_message(channel_id).embeds(&[embed]) {
            Ok(request) => match request.components(&components) {
                Ok(request) => request.await.map(drop).map_err(anyhow::Error::from),
                Err(error) => Err(error.into()),
            },
            Err(error) => Err(error.into()),
        };

        if let Err(error) = result {
            warn!("unable to post worker notice in {channel_id} - {error}")?;
        }
    }

    if let Err(error) = self::render_passwords(ctx.api, guild_id).await {
        warn!("unable to render worker passwords in {guild_id} - {error}")?;
    }

    ctx.success(locale, format!("{name}.accepted"), false).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passwords_are_listed_per_worker() {
        let fields = password_fields([("Anna".to_string(), "alpha"), ("Bob".to_string(), "beta")]);

        assert_eq!(fields, vec!["Anna: `alpha`\nBob: `beta`"]);
        assert!(password_fields(Vec::<(String, &str)>::new()).is_empty());
    }

    #[test]
    fn empty_listings_say_so() {
        let embeds = password_embeds(Locale::EnglishUS, vec![]);

        assert_eq!(embeds.len(), 1);
        assert_eq!(embeds[0].fields[0].value, "text.worker.passwords.empty");
    }

    #[test]
    fn the_newest_of_many_workers_is_listed() {
        let mut workers = (0 .. 1000).map(|i| (format!("Worker {i:04}"), "p".repeat(100))).collect::<Vec<_>>();

        workers.push(("Newest".to_string(), "fresh".to_string()));

        let fields = password_fields(workers.iter().map(|(n, p)| (n.clone(), p.as_str())));
        let embeds = password_embeds(Locale::EnglishUS, fields);
        let values = embeds.iter().flat_map(|e| &e.fields).map(|f| f.value.as_str()).collect::<Vec<_>>();

        assert!(embeds.len() > 1);
        assert!(values.iter().any(|v| v.starts_with("Worker 0000:")));
        assert!(values.last().is_some_and(|v| v.ends_with("Newest: `fresh`")));
        assert_eq!(values.iter().map(|v| v.lines().count()).sum::<usize>(), 1001);

        for embed in &embeds {
            assert!(twilight_validate::embed::embed(embed).is_ok());
        }
    }

    struct Candidate(&'static str);

    impl Searchable for Candidate {
        fn names(&self) -> Vec<&str> {
            vec![self.0]
        }
    }

    #[test]
    fn applications_need_a_known_employer() {
        let config = GuildConfig::new(Id::new(1));
        let candidates = [Candidate("Anna"), Candidate("Bob")];

        assert_eq!(employer_for(&config, &candidates, Id::new(5), "bob").map(|c| c.0), Ok("Bob"));
        assert_eq!(employer_for(&config, &candidates, Id::new(5), "Carl").map(|c| c.0), Err(Refusal::UnknownEmployer));
        assert!(config.pending_worker_applications.is_empty());
    }

    #[test]
    fn assigned_members_cannot_apply() {
        let mut config = GuildConfig::new(Id::new(1));
        let candidates = [Candidate("Anna")];

        config.try_assign(UserRole::new(Id::new(5), Id::new(11), OffsetDateTime::UNIX_EPOCH));

        assert_eq!(employer_for(&config, &candidates, Id::new(5), "Anna").map(|c| c.0), Err(Refusal::AlreadyAssigned));
        assert_eq!(Refusal::AlreadyAssigned.key(), "already_assigned");
    }

    #[test]
    fn decisions_carry_both_members() {
        let rows = decision_buttons(Locale::EnglishUS, Id::new(7), Id::new(8)).unwrap();
        let Component::ActionRow(row) = &rows[0] else { panic!("expected an action row") };
        let ids = row
            .components
            .iter()
            .filter_map(|c| match c {
                Component::Button(button) => button.custom_id.clone(),
                _ => None,
            })
            .collect::<Vec<_>>();

        assert_eq!(ids, vec!["remove-worker$accept$7;8", "remove-worker$reject$7;8"]);
    }
}
