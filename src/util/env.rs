use std::path::PathBuf;

use anyhow::anyhow;
use twilight_model::id::marker::{ApplicationMarker, ChannelMarker, GuildMarker};
use twilight_model::id::Id;

use super::Result;

/// The state file used when no other location is configured.
pub const DEFAULT_DATABASE: &str = "database.json";

/// Returns the bot's client token.
///
/// This can be configured using the `CLIENT_TOKEN` environment variable, or its `TOKEN` alias.
///
/// # Errors
///
/// This function will return an error if neither variable was set.
pub fn token() -> Result<Box<str>> {
    let token = std::env::var("CLIENT_TOKEN").or_else(|_| std::env::var("TOKEN"))?;

    Ok(token.into_boxed_str())
}

/// Returns the bot's application identifier.
///
/// This can be configured using the `CLIENT_ID` environment variable.
///
/// # Errors
///
/// This function will return an error if the variable was not set or is equal to zero.
#[inline]
pub fn client_id() -> Result<Id<ApplicationMarker>> {
    self::generic_id("CLIENT_ID")
}

/// Returns the bot's testing guild identifier.
///
/// This can be configured using the `TESTING_GUILD_ID` environment variable.
///
/// # Errors
///
/// This function will return an error if the variable was not set or is equal to zero.
#[inline]
pub fn testing_guild_id() -> Result<Id<GuildMarker>> {
    self::generic_id("TESTING_GUILD_ID")
}

/// Returns the bot's error channel identifier.
///
/// This can be configured using the `ERROR_CHANNEL_ID` environment variable.
///
/// # Errors
///
/// This function will return an error if the variable was not set or is equal to zero.
#[inline]
pub fn error_channel_id() -> Result<Id<ChannelMarker>> {
    self::generic_id("ERROR_CHANNEL_ID")
}

/// Returns the state file's location.
///
/// The `DB_PATH` environment variable takes priority over the `--database` argument.
#[must_use]
pub fn database_path() -> PathBuf {
    std::env::var_os("DB_PATH")
        .map(PathBuf::from)
        .or_else(|| super::arguments().database.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE))
}

/// Returns a generic identifier from the environment.
///
/// # Errors
///
/// This function will return an error if the variable was not set or is equal to zero.
fn generic_id<T>(key: &str) -> Result<Id<T>> {
    let var = std::env::var(key)?.parse()?;

    Id::new_checked(var).ok_or_else(|| anyhow!("expected a non-zero identifier for '{key}'"))
}
