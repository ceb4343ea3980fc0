use anyhow::bail;
use time::OffsetDateTime;
use twilight_model::channel::message::Embed;
use twilight_model::id::marker::RoleMarker;
use twilight_model::id::Id;
use twilight_util::builder::embed::{EmbedBuilder, EmbedFieldBuilder};
use warden_localizer::{localize, Locale};

use crate::bot::client::ApiRef;
use crate::bot::interaction::CommandCtx;
use crate::cmd::{CommandOptionResolver, OnCommand};
use crate::state::{FamilyChannels, RouteTimeEntry};
use crate::util::traits::PreferLocale;
use crate::util::{Result, BRANDING};

/// The largest number of fields an embed may hold.
const MAX_FIELDS: usize = 25;

/// Opens a route window for a family.
pub mod set_route_time {
    crate::register_command! {
        ChatInput("set-route-time") {
            let options = [
                Role("role") {
                    let required = true;
                },
                Integer("days") {
                    let required = true;
                    let minimum = 1;
                    let maximum = 365;
                },
                String("password") {
                    let required = false;
                    let maximum = 100;
                },
            ];
            let handlers = {
                command = super::add_time;
            };
        }
    }
}

/// Opens another route window for a family.
pub mod add_route_time {
    crate::register_command! {
        ChatInput("add-route-time") {
            let options = [
                Role("role") {
                    let required = true;
                },
                Integer("days") {
                    let required = true;
                    let minimum = 1;
                    let maximum = 365;
                },
                String("password") {
                    let required = false;
                    let maximum = 100;
                },
            ];
            let handlers = {
                command = super::add_time;
            };
        }
    }
}

/// Issues a route password to a family until the next sweep.
pub mod set_route_password {
    crate::register_command! {
        ChatInput("set-route-password") {
            let options = [
                Role("role") {
                    let required = true;
                },
                String("password") {
                    let required = true;
                    let minimum = 1;
                    let maximum = 100;
                },
            ];
            let handlers = {
                command = super::add_password;
            };
        }
    }
}

/// Issues another route password to a family until the next sweep.
pub mod add_route_password {
    crate::register_command! {
        ChatInput("add-route-password") {
            let options = [
                Role("role") {
                    let required = true;
                },
                String("password") {
                    let required = true;
                    let minimum = 1;
                    let maximum = 100;
                },
            ];
            let handlers = {
                command = super::add_password;
            };
        }
    }
}

/// Returns the number of days of a route window, if it is within bounds.
fn window_days(days: i64) -> Option<u16> {
    u16::try_from(days).ok().filter(|days| (1 ..= 365).contains(days))
}

/// Builds the route time embed, with one field per window that has not ended.
#[must_use]
pub fn time_embed(locale: Locale, name: &str, family: &FamilyChannels, now: OffsetDateTime) -> Embed {
    let title = localize!(try in locale, "text.route.times.title");
    let route = localize!(try in locale, "text.route.route");
    let start = localize!(try in locale, "text.route.start");
    let end = localize!(try in locale, "text.route.end");
    let remaining = localize!(try in locale, "text.route.remaining");
    let mut embed = EmbedBuilder::new().color(BRANDING).title(format!("⏰ {title} {name}"));

    let mut routes = family.active_routes(now).take(MAX_FIELDS).peekable();

    if routes.peek().is_none() {
        embed = embed.description(localize!(try in locale, "text.route.times.empty"));
    }

    for (index, entry) in routes.enumerate() {
        let value = format!(
            "{start}: <t:{}:f>\n{end}: <t:{}:f>\n{remaining}: {}",
            entry.start_time.unix_timestamp(),
            entry.end_time.unix_timestamp(),
            entry.days_remaining(now),
        );

        embed = embed.field(EmbedFieldBuilder::new(format!("{route} {}", index + 1), value).inline());
    }

    embed.build()
}

/// Builds the route password embed, with one field per recorded window.
#[must_use]
pub fn password_embed(locale: Locale, name: &str, family: &FamilyChannels) -> Embed {
    let title = localize!(try in locale, "text.route.passwords.title");
    let route = localize!(try in locale, "text.route.route");
    let none = localize!(try in locale, "text.route.no_password");
    let mut embed = EmbedBuilder::new().color(BRANDING).title(format!("🔑 {title} {name}"));

    if family.route_times.is_empty() {
        embed = embed.description(localize!(try in locale, "text.route.passwords.empty"));
    }

    for (index, entry) in family.route_times.iter().take(MAX_FIELDS).enumerate() {
        let value = entry.password.as_deref().map_or_else(|| none.to_string(), |p| format!("`{p}`"));

        embed = embed.field(EmbedFieldBuilder::new(format!("{route} {}", index + 1), value).inline());
    }

    embed.build()
}

/// Replaces the family's route time channel contents with a fresh listing.
///
/// # Errors
///
/// This function will return an error if the channel could not be re-rendered.
pub async fn render_times(
    api: ApiRef<'_>,
    locale: Locale,
    name: &str,
    family: &FamilyChannels,
    now: OffsetDateTime,
) -> Result {
    let embed = self::time_embed(locale, name, family, now);

    crate::util::repost(api, family.time_channel_id, &[embed]).await
}

/// Replaces the family's route password channel contents with a fresh listing.
///
/// # Errors
///
/// This function will return an error if the channel could not be re-rendered.
pub async fn render_passwords(api: ApiRef<'_>, locale: Locale, name: &str, family: &FamilyChannels) -> Result {
    let embed = self::password_embed(locale, name, family);

    crate::util::repost(api, family.password_channel_id, &[embed]).await
}

/// Appends the entry to the family and re-renders its channels.
///
/// # Errors
///
/// This function will return an error if the interaction could not be responded to or a channel
/// could not be re-rendered.
async fn push<'api: 'evt, 'evt>(
    cmd: &(dyn OnCommand + Send + Sync),
    mut ctx: CommandCtx<'api, 'evt>,
    role_id: Id<RoleMarker>,
    entry: RouteTimeEntry,
) -> Result {
    let Some(guild_id) = ctx.data.guild_id else {
        bail!("command must be used within a guild");
    };

    let data = ctx.data;
    let locale = ctx.event.preferred_locale();
    let now = entry.added_at;
    let renders_times = !entry.is_expired(now);
    let family = ctx
        .api
        .state
        .update(guild_id, |c| {
            if c.push_route(role_id, entry) { c.family_channels.get(&role_id).cloned() } else { None }
        })
        .await;

    let Some(family) = family else {
        return ctx.failure(locale, format!("{}.unknown", cmd.entry().name), false).await;
    };

    ctx.defer(true).await?;

    let resolved = data.resolved.as_ref().and_then(|r| r.roles.get(&role_id));
    let name = resolved.map_or("?", |role| role.name.as_str());
    let guild_locale = crate::util::guild_locale(ctx.api, guild_id);

    if renders_times {
        self::render_times(ctx.api, guild_locale, name, &family, now).await?;
    }

    self::render_passwords(ctx.api, guild_locale, name, &family).await?;

    ctx.success(locale, format!("{}.added", cmd.entry().name), false).await
}

async fn add_time<'api: 'evt, 'evt>(cmd: &(dyn OnCommand + Send + Sync), ctx: CommandCtx<'api, 'evt>) -> Result {
    let Some(user_id) = ctx.event.author_id() else {
        bail!("command must be used by a user");
    };

    let resolver = CommandOptionResolver::new(ctx.data);
    let role_id = *resolver.get_role_id("role")?;
    let password = resolver.get_str("password").ok().map(str::trim).filter(|p| !p.is_empty());

    let Some(days) = self::window_days(*resolver.get_i64("days")?) else {
        let locale = ctx.event.preferred_locale();

        return ctx.failure(locale, format!("{}.invalid_days", cmd.entry().name), false).await;
    };

    let entry = RouteTimeEntry::lasting(OffsetDateTime::now_utc(), days, user_id, password.map(String::from));

    self::push(cmd, ctx, role_id, entry).await
}

async fn add_password<'api: 'evt, 'evt>(
    cmd: &(dyn OnCommand + Send + Sync),
    ctx: CommandCtx<'api, 'evt>,
) -> Result {
    let Some(user_id) = ctx.event.author_id() else {
        bail!("command must be used by a user");
    };

    let resolver = CommandOptionResolver::new(ctx.data);
    let role_id = *resolver.get_role_id("role")?;
    let password = resolver.get_str("password")?.trim();

    if password.is_empty() {
        let locale = ctx.event.preferred_locale();

        return ctx.failure(locale, format!("{}.invalid_password", cmd.entry().name), false).await;
    }

    let entry = RouteTimeEntry::instant(OffsetDateTime::now_utc(), user_id, password.to_string());

    self::push(cmd, ctx, role_id, entry).await
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use time::Duration;

    use super::*;

    fn family(routes: Vec<RouteTimeEntry>) -> FamilyChannels {
        FamilyChannels {
            category_id: Id::new(1),
            time_channel_id: Id::new(2),
            comm_channel_id: Id::new(3),
            password_channel_id: Id::new(4),
            route_times: routes,
        }
    }

    #[test]
    fn days_stay_within_a_year() {
        assert_eq!(window_days(1), Some(1));
        assert_eq!(window_days(365), Some(365));
        assert_eq!(window_days(0), None);
        assert_eq!(window_days(366), None);
        assert_eq!(window_days(-3), None);
    }

    #[test]
    fn ended_windows_are_not_shown() {
        let now = datetime!(2024-03-01 12:00 UTC);
        let old = RouteTimeEntry::lasting(now - Duration::days(5), 2, Id::new(9), None);
        let open = RouteTimeEntry::lasting(now - Duration::hours(1), 3, Id::new(9), Some("pw".into()));
        let embed = time_embed(Locale::EnglishUS, "Smiths", &family(vec![old, open]), now);

        assert_eq!(embed.fields.len(), 1);
        assert!(embed.fields[0].value.ends_with(": 3"));
        assert!(embed.title.is_some_and(|t| t.ends_with("Smiths")));
    }

    #[test]
    fn passwords_include_instant_entries() {
        let now = datetime!(2024-03-01 12:00 UTC);
        let open = RouteTimeEntry::lasting(now, 3, Id::new(9), None);
        let instant = RouteTimeEntry::instant(now, Id::new(9), "swordfish".to_string());
        let embed = password_embed(Locale::EnglishUS, "Smiths", &family(vec![open, instant]));

        assert_eq!(embed.fields.len(), 2);
        assert_eq!(embed.fields[1].value, "`swordfish`");
        assert!(embed.description.is_none());
    }

    #[test]
    fn empty_families_say_so() {
        let now = datetime!(2024-03-01 12:00 UTC);
        let embed = time_embed(Locale::EnglishUS, "Smiths", &family(vec![]), now);

        assert!(embed.fields.is_empty());
        assert!(embed.description.is_some());
    }
}
