//! A role-play community management bot for Discord.
#![deny(clippy::expect_used, clippy::panic, clippy::unwrap_used)]
#![warn(clippy::nursery, clippy::pedantic, clippy::todo, missing_docs)]
#![allow(clippy::module_name_repetitions)]

use std::sync::Arc;

use warden_logger::{info, Config};

use crate::bot::BotClient;
use crate::state::State;
use crate::util::{arguments, Result};

/// Provides the bot client and its event handlers.
pub mod bot;
/// Provides the bot's slash commands and their component handlers.
pub mod cmd;
/// Provides helper macros.
#[macro_use]
pub mod macros;
/// Provides the bot's persisted and transient state.
pub mod state;
/// Provides utility types, constants, and functions.
pub mod util;

#[tokio::main]
async fn main() -> Result {
    #[cfg(feature = "dotenv")]
    dotenvy::dotenv().ok();

    let arguments = arguments();
    let config = Config {
        print: !arguments.log_no_print,
        write: !arguments.log_no_write,
        ..Config::default()
    };
    let _log_thread = warden_logger::install(config, arguments.log_directory())?;

    warden_localizer::install(arguments.preferred_locale(), arguments.lang_directory());

    let path = crate::util::env::database_path();

    info!("loading state from '{}'", path.display())?;

    let state = Arc::new(State::load(path));

    BotClient::new(state).await?.start().await
}
