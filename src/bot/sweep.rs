use time::OffsetDateTime;
use twilight_model::id::marker::GuildMarker;
use twilight_model::id::Id;
use warden_logger::{info, warn};

use crate::bot::client::{Api, ApiRef};
use crate::util::{arguments, Result};

/// Sweeps every guild's route windows on a fixed interval, starting immediately.
pub async fn run(api: Api) {
    let mut interval = tokio::time::interval(arguments().sweep_interval());

    loop {
        interval.tick().await;

        self::sweep(api.by_ref()).await;
    }
}

/// Drops every ended route window and re-renders the affected channels.
pub async fn sweep(api: ApiRef<'_>) {
    let now = OffsetDateTime::now_utc();

    for guild_id in api.state.guild_ids().await {
        if let Err(error) = self::sweep_guild(api, guild_id, now).await {
            warn!("skipped route sweep in {guild_id} - {error}").ok();
        }
    }

    info!("finished route sweep").ok();
}

/// Sweeps a single guild.
///
/// # Errors
///
/// This function will return an error if the guild's roles could not be fetched.
async fn sweep_guild(api: ApiRef<'_>, guild_id: Id<GuildMarker>, now: OffsetDateTime) -> Result {
    let pruned = api.state.update(guild_id, |config| config.prune_routes(now)).await;
    let config = api.state.config(guild_id).await;

    if config.family_channels.values().all(|f| f.route_times.is_empty()) && pruned.is_empty() {
        return Ok(());
    }

    let roles = api.http.roles(guild_id).await?.model().await?;
    let locale = crate::util::guild_locale(api, guild_id);

    for (role_id, family) in &config.family_channels {
        let was_pruned = pruned.contains(role_id);

        if family.route_times.is_empty() && !was_pruned {
            continue;
        }

        let name = roles.iter().find(|r| r.id == *role_id).map_or("?", |r| r.name.as_str());

        if let Err(error) = crate::cmd::route::render_times(api, locale, name, family, now).await {
            warn!("unable to render route times in {} - {error}", family.time_channel_id)?;
        }
        if was_pruned {
            if let Err(error) = crate::cmd::route::render_passwords(api, locale, name, family).await {
                warn!("unable to render route passwords in {} - {error}", family.password_channel_id)?;
            }
        }
    }

    Ok(())
}
