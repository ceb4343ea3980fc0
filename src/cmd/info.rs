use std::collections::BTreeSet;

use anyhow::bail;
use twilight_model::id::marker::RoleMarker;
use twilight_model::id::Id;
use twilight_util::builder::embed::EmbedBuilder;
use warden_localizer::localize;
use warden_logger::warn;

use crate::bot::interaction::CommandCtx;
use crate::cmd::{CommandOptionResolver, OnCommand};
use crate::state::GuildConfig;
use crate::util::traits::PreferLocale;
use crate::util::{Result, BRANDING};

/// Opens a channel to every family.
pub mod add_info_channel {
    crate::register_command! {
        ChatInput("add-info-channel") {
            let options = [
                Channel("channel") {
                    let required = true;
                    let channels = GuildText | GuildCategory;
                },
            ];
            let handlers = {
                command = super::add;
            };
        }
    }
}

/// Closes an info channel to every family.
pub mod remove_info_channel {
    crate::register_command! {
        ChatInput("remove-info-channel") {
            let options = [
                Channel("channel") {
                    let required = true;
                    let channels = GuildText | GuildCategory;
                },
            ];
            let handlers = {
                command = super::remove;
            };
        }
    }
}

/// Lists every info channel.
pub mod list_info_channels {
    crate::register_command! {
        ChatInput("list-info-channels") {
            let handlers = {
                command = super::list;
            };
        }
    }
}

/// Returns every role bound to an emoji, without duplicates.
fn bound_roles(config: &GuildConfig) -> BTreeSet<Id<RoleMarker>> {
    config.reaction_roles.values().copied().collect()
}

async fn add<'api: 'evt, 'evt>(cmd: &(dyn OnCommand + Send + Sync), mut ctx: CommandCtx<'api, 'evt>) -> Result {
    let Some(guild_id) = ctx.data.guild_id else {
        bail!("command must be used within a guild");
    };

    let channel_id = *CommandOptionResolver::new(ctx.data).get_channel_id("channel")?;
    let locale = ctx.event.preferred_locale();
    let (added, config) = ctx.api.state.update(guild_id, |c| (c.add_info_channel(channel_id), c.clone())).await;

    if !added {
        return ctx.failure(locale, format!("{}.duplicate", cmd.entry().name), false).await;
    }

    ctx.defer(true).await?;

    for role_id in self::bound_roles(&config) {
        let overwrite = super::family::view_overwrite(role_id);

        if let Err(error) = ctx.api.http.update_channel_permission(channel_id, &overwrite).await {
            warn!("unable to open info channel {channel_id} to {role_id} - {error}")?;
        }
    }

    ctx.success(locale, format!("{}.added", cmd.entry().name), false).await
}

async fn remove<'api: 'evt, 'evt>(cmd: &(dyn OnCommand + Send + Sync), mut ctx: CommandCtx<'api, 'evt>) -> Result {
    let Some(guild_id) = ctx.data.guild_id else {
        bail!("command must be used within a guild");
    };

    let channel_id = *CommandOptionResolver::new(ctx.data).get_channel_id("channel")?;
    let locale = ctx.event.preferred_locale();
    let (removed, config) =
        ctx.api.state.update(guild_id, |c| (c.remove_info_channel(channel_id), c.clone())).await;

    if !removed {
        return ctx.failure(locale, format!("{}.missing", cmd.entry().name), false).await;
    }

    ctx.defer(true).await?;

    for role_id in self::bound_roles(&config) {
        if let Err(error) = ctx.api.http.delete_channel_permission(channel_id).role(role_id).await {
            warn!("unable to close info channel {channel_id} to {role_id} - {error}")?;
        }
    }

    ctx.success(locale, format!("{}.removed", cmd.entry().name), false).await
}

async fn list<'api: 'evt, 'evt>(cmd: &(dyn OnCommand + Send + Sync), ctx: CommandCtx<'api, 'evt>) -> Result {
    let Some(guild_id) = ctx.data.guild_id else {
        bail!("command must be used within a guild");
    };

    let locale = ctx.event.preferred_locale();
    let channels = ctx.api.state.config(guild_id).await.info_channels;

    if channels.is_empty() {
        return ctx.notify(locale, format!("{}.empty", cmd.entry().name), false).await;
    }

    let title = localize!(try in locale, "text.list_info_channels.title");
    let lines = channels.iter().map(|id| format!("- <#{id}>")).collect::<Vec<_>>();
    let embed = EmbedBuilder::new().color(BRANDING).title(title).description(lines.join("\n"));

    ctx.reply(embed.build()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_roles_are_opened_once() {
        let mut config = GuildConfig::new(Id::new(1));

        config.bind("🏠", Id::new(7));
        config.bind("🚗", Id::new(7));
        config.bind("🍀", Id::new(3));

        assert_eq!(bound_roles(&config).into_iter().collect::<Vec<_>>(), vec![Id::new(3), Id::new(7)]);
    }
}
