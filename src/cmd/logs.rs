use crate::bot::interaction::CommandCtx;
use crate::cmd::OnCommand;
use crate::util::Result;

/// Sets the channel that receives rejoin logs.
pub mod set_rejoin_log {
    crate::register_command! {
        ChatInput("set-rejoin-log") {
            let options = [
                Channel("channel") {
                    let required = true;
                    let channels = GuildText;
                },
            ];
            let handlers = {
                command = super::set_rejoin;
            };
        }
    }
}

/// Sets the channel that receives role assignment logs.
pub mod set_role_log {
    crate::register_command! {
        ChatInput("set-role-log") {
            let options = [
                Channel("channel") {
                    let required = true;
                    let channels = GuildText;
                },
            ];
            let handlers = {
                command = super::set_role;
            };
        }
    }
}

/// Sets the channel that receives rejected role assignments.
pub mod set_role_error_log {
    crate::register_command! {
        ChatInput("set-role-error-log") {
            let options = [
                Channel("channel") {
                    let required = true;
                    let channels = GuildText;
                },
            ];
            let handlers = {
                command = super::set_role_error;
            };
        }
    }
}

async fn set_rejoin<'api: 'evt, 'evt>(cmd: &(dyn OnCommand + Send + Sync), ctx: CommandCtx<'api, 'evt>) -> Result {
    super::set_channel(cmd, ctx, |config, id| config.rejoin_log_channel_id = Some(id)).await
}

async fn set_role<'api: 'evt, 'evt>(cmd: &(dyn OnCommand + Send + Sync), ctx: CommandCtx<'api, 'evt>) -> Result {
    super::set_channel(cmd, ctx, |config, id| config.role_assignment_log_channel_id = Some(id)).await
}

async fn set_role_error<'api: 'evt, 'evt>(
    cmd: &(dyn OnCommand + Send + Sync),
    ctx: CommandCtx<'api, 'evt>,
) -> Result {
    super::set_channel(cmd, ctx, |config, id| config.role_error_log_channel_id = Some(id)).await
}
