use anyhow::bail;
use rand::{thread_rng, Rng};
use twilight_model::channel::message::ReactionType;
use twilight_model::channel::permission_overwrite::{PermissionOverwrite, PermissionOverwriteType};
use twilight_model::channel::ChannelType;
use twilight_model::guild::Permissions;
use twilight_model::http::permission_overwrite::{
    PermissionOverwrite as PermissionUpdate,
    PermissionOverwriteType as PermissionUpdateType,
};
use twilight_model::id::marker::{ChannelMarker, GuildMarker, RoleMarker};
use twilight_model::id::Id;
use twilight_util::builder::embed::EmbedBuilder;
use warden_localizer::{localize, Locale};
use warden_logger::{info, warn};

use crate::bot::client::ApiRef;
use crate::bot::interaction::CommandCtx;
use crate::cmd::{CommandOptionResolver, OnCommand};
use crate::state::FamilyChannels;
use crate::util::extension::ReactionTypeExtension;
use crate::util::traits::PreferLocale;
use crate::util::{Result, BRANDING};

/// The name of a family's route time channel.
pub const TIME_CHANNEL: &str = "⏰ route-zeit";
/// The name of a family's communication channel.
pub const COMM_CHANNEL: &str = "💬 kommunikation";
/// The name of a family's route password channel.
pub const PASSWORD_CHANNEL: &str = "🔑 passwort";

/// Creates a family.
pub mod add_family {
    crate::register_command! {
        ChatInput("add-family") {
            let options = [
                String("emoji") {
                    let required = true;
                    let maximum = 64;
                },
                String("name") {
                    let required = true;
                    let minimum = 1;
                    let maximum = 90;
                },
            ];
            let handlers = {
                command = super::add;
            };
        }
    }
}

/// Deletes a family.
pub mod remove_family {
    crate::register_command! {
        ChatInput("remove-family") {
            let options = [
                Role("role") {
                    let required = true;
                },
            ];
            let handlers = {
                command = super::remove;
            };
        }
    }
}

/// Returns the permission update that lets the role view an existing channel.
#[must_use]
pub fn view_overwrite(role_id: Id<RoleMarker>) -> PermissionUpdate {
    PermissionUpdate {
        allow: Some(Permissions::VIEW_CHANNEL),
        deny: None,
        id: role_id.cast(),
        kind: PermissionUpdateType::Role,
    }
}

/// Returns the overwrites that hide a new channel from everyone but the family.
fn family_overwrites(guild_id: Id<GuildMarker>, role_id: Id<RoleMarker>) -> [PermissionOverwrite; 2] {
    let everyone = PermissionOverwrite {
        allow: Permissions::empty(),
        deny: Permissions::VIEW_CHANNEL,
        id: guild_id.cast(),
        kind: PermissionOverwriteType::Role,
    };
    let family = PermissionOverwrite {
        allow: Permissions::VIEW_CHANNEL,
        deny: Permissions::empty(),
        id: role_id.cast(),
        kind: PermissionOverwriteType::Role,
    };

    [everyone, family]
}

/// Returns the name of a family's category.
fn category_name(name: &str) -> String {
    format!("🏠 {name}")
}

/// Creates a channel within the guild, hidden from everyone but the family.
///
/// # Errors
///
/// This function will return an error if the channel could not be created.
async fn create_channel(
    api: ApiRef<'_>,
    guild_id: Id<GuildMarker>,
    overwrites: &[PermissionOverwrite],
    name: &str,
    parent_id: Option<Id<ChannelMarker>>,
) -> Result<Id<ChannelMarker>> {
    let mut request = api.http.create_guild_channel(guild_id, name)?.permission_overwrites(overwrites);

    request = match parent_id {
        Some(parent_id) => request.kind(ChannelType::GuildText).parent_id(parent_id),
        None => request.kind(ChannelType::GuildCategory),
    };

    Ok(request.await?.model().await?.id)
}

/// Posts the welcome message of each family channel.
async fn welcome(api: ApiRef<'_>, locale: Locale, name: &str, channels: &FamilyChannels) {
    let kinds = [
        ("time", channels.time_channel_id),
        ("comm", channels.comm_channel_id),
        ("password", channels.password_channel_id),
    ];

    for (kind, channel_id) in kinds {
        let title = localize!(try in locale, "text.family.{kind}.title");
        let description = localize!(try in locale, "text.family.{kind}.description");
        let embed = EmbedBuilder::new().color(BRANDING).title(format!("{title} {name}")).description(description);
        let result = match api.http.create_message(channel_id).embeds(&[embed.build()]) {
            Ok(request) => request.await.map(drop).map_err(anyhow::Error::from),
            Err(error) => Err(error.into()),
        };

        if let Err(error) = result {
            warn!("unable to welcome family in {channel_id} - {error}").ok();
        }
    }
}

/// Re-renders the role selection message and the route control menu after a family change.
///
/// # Errors
///
/// This function will return an error if the logger could not be reached.
pub async fn refresh(api: ApiRef<'_>, guild_id: Id<GuildMarker>) -> Result {
    if let Err(error) = super::roles::refresh_selection(api, guild_id).await {
        warn!("unable to refresh role selection in {guild_id} - {error}")?;
    }
    if let Err(error) = super::control::refresh_menu(api, guild_id).await {
        warn!("unable to refresh route control in {guild_id} - {error}")?;
    }

    Ok(())
}

/// The guild resources created for a family that has not been recorded yet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Created {
    /// The family's role.
    role_id: Option<Id<RoleMarker>>,
    /// The family's channels, in creation order.
    channel_ids: Vec<Id<ChannelMarker>>,
}

impl Created {
    /// Returns the channels in deletion order, so a category outlives its children.
    fn deletion_order(&self) -> impl Iterator<Item = Id<ChannelMarker>> + '_ {
        self.channel_ids.iter().rev().copied()
    }

    /// Creates the next family channel and remembers it.
    ///
    /// # Errors
    ///
    /// This function will return an error if the channel could not be created.
    async fn channel(
        &mut self,
        api: ApiRef<'_>,
        guild_id: Id<GuildMarker>,
        overwrites: &[PermissionOverwrite],
        name: &str,
        parent_id: Option<Id<ChannelMarker>>,
    ) -> Result<Id<ChannelMarker>> {
        let channel_id = self::create_channel(api, guild_id, overwrites, name, parent_id).await?;

        self.channel_ids.push(channel_id);

        Ok(channel_id)
    }

    /// Deletes everything that was created. Failures are logged.
    ///
    /// # Errors
    ///
    /// This function will return an error if the logger could not be reached.
    async fn undo(&self, api: ApiRef<'_>, guild_id: Id<GuildMarker>) -> Result {
        for channel_id in self.deletion_order() {
            if let Err(error) = api.http.delete_channel(channel_id).await {
                warn!("unable to delete unused family channel {channel_id} - {error}")?;
            }
        }

        if let Some(role_id) = self.role_id {
            if let Err(error) = api.http.delete_role(guild_id, role_id).await {
                warn!("unable to delete unused family role {role_id} - {error}")?;
            }
        }

        Ok(())
    }
}

/// Creates the family's role, category and channels.
///
/// # Errors
///
/// This function will return an error if a resource could not be created. Whatever was created
/// before the failure is left in `created`.
async fn build(
    api: ApiRef<'_>,
    guild_id: Id<GuildMarker>,
    name: &str,
    created: &mut Created,
) -> Result<(Id<RoleMarker>, FamilyChannels)> {
    let color = thread_rng().gen_range(0 ..= 0x00FF_FFFF);
    let role = api.http.create_role(guild_id).name(name).color(color).await?.model().await?;

    created.role_id = Some(role.id);

    let overwrites = self::family_overwrites(guild_id, role.id);
    let category_id = created.channel(api, guild_id, &overwrites, &self::category_name(name), None).await?;
    let parent = Some(category_id);

    let channels = FamilyChannels {
        category_id,
        time_channel_id: created.channel(api, guild_id, &overwrites, TIME_CHANNEL, parent).await?,
        comm_channel_id: created.channel(api, guild_id, &overwrites, COMM_CHANNEL, parent).await?,
        password_channel_id: created.channel(api, guild_id, &overwrites, PASSWORD_CHANNEL, parent).await?,
        route_times: vec![],
    };

    Ok((role.id, channels))
}

async fn add<'api: 'evt, 'evt>(cmd: &(dyn OnCommand + Send + Sync), mut ctx: CommandCtx<'api, 'evt>) -> Result {
    let Some(guild_id) = ctx.data.guild_id else {
        bail!("command must be used within a guild");
    };

    let resolver = CommandOptionResolver::new(ctx.data);
    let name = resolver.get_str("name")?.trim();
    let locale = ctx.event.preferred_locale();

    let Ok(emoji) = ReactionType::parse(resolver.get_str("emoji")?) else {
        return ctx.failure(locale, format!("{}.invalid_emoji", cmd.entry().name), true).await;
    };

    let key = emoji.key();

    if name.is_empty() {
        return ctx.failure(locale, format!("{}.invalid_name", cmd.entry().name), false).await;
    }
    if ctx.api.state.config(guild_id).await.role_for_emoji(&key).is_some() {
        return ctx.failure(locale, format!("{}.emoji_taken", cmd.entry().name), false).await;
    }

    ctx.defer(true).await?;

    let mut created = Created::default();
    let (role_id, channels) = match self::build(ctx.api, guild_id, name, &mut created).await {
        Ok(built) => built,
        Err(error) => {
            created.undo(ctx.api, guild_id).await?;

            return Err(error);
        }
    };

    let (added, config) = ctx
        .api
        .state
        .update(guild_id, |c| (c.add_family(key, role_id, channels.clone()), c.clone()))
        .await;

    if !added {
        created.undo(ctx.api, guild_id).await?;

        return ctx.failure(locale, format!("{}.emoji_taken", cmd.entry().name), false).await;
    }

    info!("created family '{name}' ({role_id}) in {guild_id}")?;

    let guild_locale = crate::util::guild_locale(ctx.api, guild_id);

    self::welcome(ctx.api, guild_locale, name, &channels).await;

    let overwrite = self::view_overwrite(role_id);

    for channel_id in &config.info_channels {
        if let Err(error) = ctx.api.http.update_channel_permission(*channel_id, &overwrite).await {
            warn!("unable to open info channel {channel_id} to {role_id} - {error}")?;
        }
    }

    self::refresh(ctx.api, guild_id).await?;

    ctx.success(locale, format!("{}.created", cmd.entry().name), false).await
}

async fn remove<'api: 'evt, 'evt>(cmd: &(dyn OnCommand + Send + Sync), mut ctx: CommandCtx<'api, 'evt>) -> Result {
    let Some(guild_id) = ctx.data.guild_id else {
        bail!("command must be used within a guild");
    };

    let role_id = *CommandOptionResolver::new(ctx.data).get_role_id("role")?;
    let locale = ctx.event.preferred_locale();

    let Some(family) = ctx.api.state.config(guild_id).await.family_channels.remove(&role_id) else {
        return ctx.failure(locale, format!("{}.unknown", cmd.entry().name), false).await;
    };

    ctx.defer(true).await?;

    for channel_id in family.channel_ids() {
        if let Err(error) = ctx.api.http.delete_channel(channel_id).await {
            warn!("unable to delete family channel {channel_id} - {error}")?;
        }
    }

    if let Err(error) = ctx.api.http.delete_role(guild_id, role_id).await {
        warn!("unable to delete family role {role_id} - {error}")?;
    }

    ctx.api.state.update(guild_id, |c| c.remove_family(role_id)).await;

    info!("removed family {role_id} in {guild_id}")?;

    self::refresh(ctx.api, guild_id).await?;

    ctx.success(locale, format!("{}.removed", cmd.entry().name), false).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_channels_are_hidden_from_everyone_else() {
        let [everyone, family] = family_overwrites(Id::new(1), Id::new(2));

        assert_eq!(everyone.id, Id::new(1));
        assert_eq!(everyone.deny, Permissions::VIEW_CHANNEL);
        assert_eq!(everyone.allow, Permissions::empty());
        assert_eq!(family.id, Id::new(2));
        assert_eq!(family.allow, Permissions::VIEW_CHANNEL);
        assert_eq!(family.kind, PermissionOverwriteType::Role);
    }

    #[test]
    fn info_channels_open_to_the_family() {
        let overwrite = view_overwrite(Id::new(2));

        assert_eq!(overwrite.allow, Some(Permissions::VIEW_CHANNEL));
        assert_eq!(overwrite.deny, None);
        assert_eq!(overwrite.kind, PermissionUpdateType::Role);
    }

    #[test]
    fn unused_channels_are_deleted_before_their_category() {
        let created = Created { role_id: Some(Id::new(9)), channel_ids: vec![Id::new(1), Id::new(2), Id::new(3)] };

        assert_eq!(created.deletion_order().collect::<Vec<_>>(), vec![Id::new(3), Id::new(2), Id::new(1)]);
        assert_eq!(Created::default().deletion_order().count(), 0);
    }

    #[test]
    fn categories_carry_the_family_name() {
        assert_eq!(category_name("Smiths"), "🏠 Smiths");
    }
}
