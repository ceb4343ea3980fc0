use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use twilight_model::channel::message::component::{Button, TextInput};
use twilight_model::channel::message::{Component, Embed};
use twilight_model::id::marker::{ChannelMarker, GuildMarker, UserMarker};
use twilight_model::id::Id;
use twilight_util::builder::embed::{EmbedBuilder, EmbedFieldBuilder};
use twilight_validate::embed::{DESCRIPTION_LENGTH, FIELD_VALUE_LENGTH};
use warden_localizer::{localize, localizer, Locale};
use warden_logger::warn;

use self::builder::ActionRowBuilder;
use self::traits::PreferLocale;
use crate::bot::client::ApiRef;

/// Provides model builders.
pub mod builder;
/// Provides getters for environment variables.
pub mod env;
/// Provides type extension traits.
pub mod extension;
/// Provides member name matching.
pub mod matching;
/// Provides common trait definitions.
pub mod traits;

crate::global! {{
    /// Returns the bot's command-line arguments.
    [ARGUMENTS] fn arguments() -> Arguments { Arguments::parse }
}}

/// Discord content delivery network endpoint base URL.
pub const CDN_URL: &str = "https://cdn.discordapp.com";

/// The bot's branding color.
pub const BRANDING: u32 = 0x24_9F_DE;
/// The bot's success color.
pub const SUCCESS: u32 = 0x59_C1_35;
/// The bot's failure color.
pub const FAILURE: u32 = 0xB4_20_2A;

/// The least number of recent messages removed before a channel is re-rendered.
pub const REPOST_DEPTH: u16 = 10;
/// The most messages that can be fetched at once.
const MESSAGE_FETCH_LIMIT: u16 = 100;

/// Wraps an [`anyhow::Result<T, E>`], providing a defaulted `T` generic type.
pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;

/// The bot's command-line arguments.
#[non_exhaustive]
#[derive(Clone, Debug, Default, PartialEq, Eq, Parser)]
#[command(author, about, version)]
pub struct Arguments {
    /// Disables logger printing.
    #[arg(short = 'q', long = "quiet")]
    pub log_no_print: bool,
    /// Disables log file writing.
    #[arg(short = 'e', long = "ephemeral")]
    pub log_no_write: bool,

    /// The bot's preferred locale.
    #[arg(short = 'l', long = "preferred-locale")]
    pub lang_prefer_locale: Option<Locale>,

    /// The directory to store log files within.
    #[arg(long = "log-directory")]
    pub log_write_dir: Option<PathBuf>,
    /// The directory that contains the bot's localization files.
    #[arg(short = 'L', long = "lang-directory")]
    pub lang_file_dir: Option<PathBuf>,
    /// The state file. Overridden by the `DB_PATH` environment variable.
    #[arg(short = 'd', long = "database")]
    pub database: Option<PathBuf>,
    /// The number of seconds between route sweeps.
    #[arg(long = "sweep-interval", default_value_t = 3600)]
    pub sweep_interval: u64,
}

impl Arguments {
    /// Returns the preferred locale, defaulting to English.
    #[must_use]
    pub fn preferred_locale(&self) -> Locale {
        self.lang_prefer_locale.unwrap_or_default()
    }

    /// Returns the log file directory.
    #[must_use]
    pub fn log_directory(&self) -> &Path {
        self.log_write_dir.as_deref().unwrap_or_else(|| Path::new("log"))
    }

    /// Returns the localization file directory.
    #[must_use]
    pub fn lang_directory(&self) -> &Path {
        self.lang_file_dir.as_deref().unwrap_or_else(|| Path::new("lang"))
    }

    /// Returns the delay between route sweeps, never shorter than a minute.
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval.max(60))
    }
}

/// A modal.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Modal {
    /// The modal's title.
    pub title: String,
    /// The modal's custom identifier.
    pub custom_id: String,
    /// The modal's components.
    pub components: Vec<Component>,
}

impl Modal {
    /// Creates a new modal with one row per text input.
    pub fn new(
        title: impl Into<String>,
        custom_id: impl Into<String>,
        inputs: impl IntoIterator<Item = impl Into<TextInput>>,
    ) -> Self {
        Self { title: title.into(), custom_id: custom_id.into(), components: self::text_input_rows(inputs) }
    }
}

/// Automatically sorts buttons into action rows.
pub fn button_rows(buttons: impl IntoIterator<Item = impl Into<Button>>) -> Vec<Component> {
    let mut components = Vec::with_capacity(5);
    let mut action_row = Vec::with_capacity(5);

    for button in buttons {
        if action_row.len() == 5 {
            components.push(ActionRowBuilder::new(std::mem::take(&mut action_row)).into());
        }

        action_row.push(Component::Button(button.into()));
    }

    if !action_row.is_empty() {
        components.push(ActionRowBuilder::new(action_row).into());
    }

    components
}

/// Automatically sorts text inputs into action rows.
#[inline]
pub fn text_input_rows(inputs: impl IntoIterator<Item = impl Into<TextInput>>) -> Vec<Component> {
    inputs.into_iter().map(Into::into).map(|i| Component::from(ActionRowBuilder::new([i]))).collect()
}

/// Returns the guild's preferred locale from the cache, or the bot's default.
#[must_use]
pub fn guild_locale(api: ApiRef<'_>, guild_id: Id<GuildMarker>) -> Locale {
    api.cache.guild(guild_id).map_or_else(|| *localizer().preferred_locale(), |g| PreferLocale::preferred_locale(&*g))
}

/// Returns the bot's own user identifier, preferring the cache.
///
/// # Errors
///
/// This function will return an error if the current user could not be fetched.
pub async fn current_user_id(api: ApiRef<'_>) -> Result<Id<UserMarker>> {
    if let Some(user) = api.cache.current_user() {
        return Ok(user.id);
    }

    Ok(api.http.current_user().await?.model().await?.id)
}

/// Cuts the text down to at most `limit` characters, marking the cut with an ellipsis.
#[must_use]
pub fn clamp(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }

    let mut clamped = text.chars().take(limit.saturating_sub(1)).collect::<String>();

    clamped.push('…');
    clamped
}

/// Builds a log embed titled by `text.log.{key}`, with one inline field per named value.
///
/// Field names are localized from `text.log.field.{name}`. Values are clamped to the field limit,
/// so free text belongs in [`with_details`].
pub fn log_embed<'f>(
    locale: Locale,
    key: &str,
    color: u32,
    fields: impl IntoIterator<Item = (&'f str, String)>,
) -> Embed {
    let title = localize!(try in locale, "text.log.{key}");
    let mut embed = EmbedBuilder::new().color(color).title(title);

    for (name, value) in fields {
        let name = localize!(try in locale, "text.log.field.{name}");

        embed = embed.field(EmbedFieldBuilder::new(name, self::clamp(&value, FIELD_VALUE_LENGTH)).inline());
    }

    embed.build()
}

/// Places the given text in the embed's description.
#[must_use]
pub fn with_details(mut embed: Embed, details: &str) -> Embed {
    embed.description = Some(self::clamp(details, DESCRIPTION_LENGTH));
    embed
}

/// Removes the channel's most recent messages, then posts each embed as its own message.
///
/// # Errors
///
/// This function will return an error if the channel could not be read or written.
pub async fn repost(api: ApiRef<'_>, channel_id: Id<ChannelMarker>, embeds: &[Embed]) -> Result {
    let pages = u16::try_from(embeds.len()).unwrap_or(u16::MAX);
    let depth = REPOST_DEPTH.max(pages).min(MESSAGE_FETCH_LIMIT);
    let messages = api.http.channel_messages(channel_id).limit(depth)?.await?.model().await?;

    for message in messages {
        if let Err(error) = api.http.delete_message(channel_id, message.id).await {
            warn!("unable to delete message {} in {channel_id} - {error}", message.id)?;
        }
    }

    for embed in embeds {
        api.http.create_message(channel_id).embeds(std::slice::from_ref(embed))?.await?;
    }

    Ok(())
}

/// Posts the embed to an optional log channel.
///
/// # Errors
///
/// This function will return an error if the embed is invalid or could not be sent.
pub async fn post_log(api: ApiRef<'_>, channel_id: Option<Id<ChannelMarker>>, embed: Embed) -> Result {
    let Some(channel_id) = channel_id else { return Ok(()) };

    api.http.create_message(channel_id).embeds(&[embed])?.await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use twilight_model::channel::message::component::ButtonStyle;

    use super::*;
    use crate::util::builder::{ButtonBuilder, TextInputBuilder};

    fn rows(count: usize) -> Vec<Component> {
        let buttons = (0 .. count).map(|i| ButtonBuilder::new(ButtonStyle::Primary).custom_id(format!("b{i}")));

        self::button_rows(buttons)
    }

    fn row_lengths(rows: &[Component]) -> Vec<usize> {
        rows.iter()
            .map(|c| match c {
                Component::ActionRow(row) => row.components.len(),
                _ => 0,
            })
            .collect()
    }

    #[test]
    fn buttons_fill_rows_of_five() {
        assert_eq!(row_lengths(&rows(0)), Vec::<usize>::new());
        assert_eq!(row_lengths(&rows(5)), vec![5]);
        assert_eq!(row_lengths(&rows(7)), vec![5, 2]);
        assert_eq!(row_lengths(&rows(11)), vec![5, 5, 1]);
    }

    #[test]
    fn every_button_is_kept_in_order() {
        let ids = rows(6)
            .into_iter()
            .flat_map(|c| match c {
                Component::ActionRow(row) => row.components,
                _ => vec![],
            })
            .filter_map(|c| match c {
                Component::Button(button) => button.custom_id,
                _ => None,
            })
            .collect::<Vec<_>>();

        assert_eq!(ids, ["b0", "b1", "b2", "b3", "b4", "b5"]);
    }

    #[test]
    fn modal_puts_inputs_on_separate_rows() {
        use twilight_model::channel::message::component::TextInputStyle;

        let inputs = ["a", "b", "c"].map(|id| TextInputBuilder::new(id, id, TextInputStyle::Short));
        let modal = Modal::new("Title", "id", inputs);

        assert_eq!(row_lengths(&modal.components), vec![1, 1, 1]);
    }

    #[test]
    fn clamping_counts_characters() {
        assert_eq!(clamp("short", 10), "short");
        assert_eq!(clamp("ääääää", 4), "äää…");
        assert_eq!(clamp("abcdef", 4).chars().count(), 4);
    }

    #[test]
    fn oversized_log_values_still_validate() {
        let long = "x".repeat(3000);
        let embed = log_embed(Locale::EnglishUS, "inspection", BRANDING, [("user", long.clone())]);
        let embed = with_details(embed, &long.repeat(2));

        assert!(twilight_validate::embed::embed(&embed).is_ok());
        assert_eq!(embed.fields[0].value.chars().count(), FIELD_VALUE_LENGTH);
        assert_eq!(embed.description.map(|d| d.chars().count()), Some(DESCRIPTION_LENGTH));
    }

    #[test]
    fn sweep_interval_has_a_floor() {
        let arguments = Arguments { sweep_interval: 5, ..Arguments::default() };

        assert_eq!(arguments.sweep_interval(), Duration::from_secs(60));
    }
}
