use anyhow::bail;
use twilight_util::builder::embed::EmbedBuilder;
use warden_localizer::localize;

use crate::bot::interaction::CommandCtx;
use crate::cmd::{CommandOptionResolver, OnCommand};
use crate::util::traits::PreferLocale;
use crate::util::{Result, BRANDING};

/// Allows a role to use the bot's commands.
pub mod add_command_role {
    crate::register_command! {
        ChatInput("add-command-role") {
            let options = [
                Role("role") {
                    let required = true;
                },
            ];
            let handlers = {
                command = super::add;
            };
        }
    }
}

/// Revokes a role's access to the bot's commands.
pub mod remove_command_role {
    crate::register_command! {
        ChatInput("remove-command-role") {
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

/// Lists the roles that may use the bot's commands.
pub mod list_command_roles {
    crate::register_command! {
        ChatInput("list-command-roles") {
            let handlers = {
                command = super::list;
            };
        }
    }
}

async fn add<'api: 'evt, 'evt>(cmd: &(dyn OnCommand + Send + Sync), ctx: CommandCtx<'api, 'evt>) -> Result {
    let Some(guild_id) = ctx.data.guild_id else {
        bail!("command must be used within a guild");
    };

    let role_id = *CommandOptionResolver::new(ctx.data).get_role_id("role")?;
    let locale = ctx.event.preferred_locale();

    if ctx.api.state.update(guild_id, |c| c.add_command_role(role_id)).await {
        ctx.success(locale, format!("{}.added", cmd.entry().name), false).await
    } else {
        ctx.failure(locale, format!("{}.duplicate", cmd.entry().name), false).await
    }
}

async fn remove<'api: 'evt, 'evt>(cmd: &(dyn OnCommand + Send + Sync), ctx: CommandCtx<'api, 'evt>) -> Result {
    let Some(guild_id) = ctx.data.guild_id else {
        bail!("command must be used within a guild");
    };

    let role_id = *CommandOptionResolver::new(ctx.data).get_role_id("role")?;
    let locale = ctx.event.preferred_locale();

    if ctx.api.state.update(guild_id, |c| c.remove_command_role(role_id)).await {
        ctx.success(locale, format!("{}.removed", cmd.entry().name), false).await
    } else {
        ctx.failure(locale, format!("{}.missing", cmd.entry().name), false).await
    }
}

async fn list<'api: 'evt, 'evt>(cmd: &(dyn OnCommand + Send + Sync), ctx: CommandCtx<'api, 'evt>) -> Result {
    let Some(guild_id) = ctx.data.guild_id else {
        bail!("command must be used within a guild");
    };

    let locale = ctx.event.preferred_locale();
    let roles = ctx.api.state.config(guild_id).await.command_roles;

    if roles.is_empty() {
        return ctx.notify(locale, format!("{}.empty", cmd.entry().name), false).await;
    }

    let title = localize!(try in locale, "text.list_command_roles.title");
    let lines = roles.iter().map(|id| format!("- <@&{id}>")).collect::<Vec<_>>();
    let embed = EmbedBuilder::new().color(BRANDING).title(title).description(lines.join("\n"));

    ctx.reply(embed.build()).await
}
