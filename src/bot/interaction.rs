use std::fmt::Display;

use anyhow::bail;
use twilight_http::client::InteractionClient;
use twilight_model::application::interaction::application_command::CommandData;
use twilight_model::application::interaction::message_component::MessageComponentInteractionData;
use twilight_model::application::interaction::modal::ModalInteractionData;
use twilight_model::application::interaction::Interaction;
use twilight_model::channel::message::{Embed, MessageFlags};
use twilight_model::http::interaction::{InteractionResponse, InteractionResponseData, InteractionResponseType};
use twilight_util::builder::embed::EmbedBuilder;
use twilight_util::builder::InteractionResponseDataBuilder;
use warden_localizer::{localize, Locale};

use crate::bot::client::ApiRef;
use crate::util::{Modal, Result, BRANDING, FAILURE, SUCCESS};

/// A command interaction event context.
pub type CommandCtx<'api, 'evt> = Ctx<'api, 'evt, &'evt CommandData>;

/// A component interaction event context.
pub type ComponentCtx<'api, 'evt> = Ctx<'api, 'evt, &'evt MessageComponentInteractionData>;

/// A modal interaction event context.
pub type ModalCtx<'api, 'evt> = Ctx<'api, 'evt, &'evt ModalInteractionData>;

/// An interaction event context.
#[derive(Clone, Copy, Debug)]
pub struct Ctx<'api: 'evt, 'evt, T: Send> {
    /// The HTTP and cache APIs.
    pub api: ApiRef<'api>,
    /// The referenced interaction event.
    pub event: &'evt Interaction,
    /// The data of this interaction context.
    pub data: T,
    /// Whether the event has been deferred.
    defer_state: Option<bool>,
}

impl<'api: 'evt, 'evt, T: Send> Ctx<'api, 'evt, T> {
    /// Creates a new interaction event [`Ctx<T>`].
    pub const fn new(api: ApiRef<'api>, event: &'evt Interaction, data: T) -> Self {
        Self { api, event, data, defer_state: None }
    }

    /// Returns the interaction client of this interaction event [`Ctx<T>`].
    pub fn client(&self) -> InteractionClient<'api> {
        self.api.http.interaction(self.event.application_id)
    }

    /// Sends the initial response to the interaction.
    ///
    /// # Errors
    ///
    /// This function will return an error if the response could not be sent.
    async fn respond(&self, kind: InteractionResponseType, data: InteractionResponseData) -> Result {
        let response = InteractionResponse { kind, data: Some(data) };

        self.client().create_response(self.event.id, &self.event.token, &response).await?;

        Ok(())
    }

    /// Defers the interaction.
    ///
    /// # Errors
    ///
    /// This function will return an error if responding failed.
    pub async fn defer(&mut self, ephemeral: bool) -> Result {
        if self.defer_state.is_some() {
            return Ok(());
        }

        let data = InteractionResponseDataBuilder::new().flags(self::flags(ephemeral)).build();

        self.respond(InteractionResponseType::DeferredChannelMessageWithSource, data).await?;
        self.defer_state = Some(ephemeral);

        Ok(())
    }

    /// Responds to the interaction with a modal.
    ///
    /// # Errors
    ///
    /// This function will return an error if the interaction was deferred or could not be
    /// responded to.
    pub async fn modal(self, modal: Modal) -> Result {
        if self.defer_state.is_some() {
            bail!("a deferred interaction cannot open a modal");
        }

        let data = InteractionResponseDataBuilder::new()
            .components(modal.components)
            .custom_id(modal.custom_id)
            .title(modal.title)
            .build();

        self.respond(InteractionResponseType::Modal, data).await
    }

    /// Responds to the interaction with the given embed, privately unless deferred publicly.
    ///
    /// # Errors
    ///
    /// This function will return an error if the interaction could not be responded to.
    pub async fn reply(self, embed: Embed) -> Result {
        let Some(ephemeral) = self.defer_state else {
            let data = InteractionResponseDataBuilder::new().embeds([embed]).flags(MessageFlags::EPHEMERAL).build();

            return self.respond(InteractionResponseType::ChannelMessageWithSource, data).await;
        };

        let embeds = [embed];

        self.client().create_followup(&self.event.token).embeds(&embeds)?.flags(self::flags(ephemeral)).await?;

        Ok(())
    }

    /// Responds to the interaction with a localized message.
    ///
    /// # Errors
    ///
    /// This function will return an error if the interaction could not be responded to.
    async fn complete(
        self,
        locale: Locale,
        group: &str,
        key: impl Display + Send,
        color: u32,
        has_desc: bool,
    ) -> Result {
        let title = localize!(try in locale, "{group}.{key}.title");
        let mut embed = EmbedBuilder::new().color(color).title(title);

        if has_desc {
            embed = embed.description(localize!(try in locale, "{group}.{key}.description"));
        }

        self.reply(embed.build()).await
    }

    /// Responds to the interaction with a success message.
    ///
    /// # Errors
    ///
    /// This function will return an error if the interaction could not be responded to.
    #[inline]
    pub async fn success(self, locale: Locale, key: impl Display + Send, has_desc: bool) -> Result {
        self.complete(locale, "success", key, SUCCESS, has_desc).await
    }

    /// Responds to the interaction with a notification message.
    ///
    /// # Errors
    ///
    /// This function will return an error if the interaction could not be responded to.
    #[inline]
    pub async fn notify(self, locale: Locale, key: impl Display + Send, has_desc: bool) -> Result {
        self.complete(locale, "notify", key, BRANDING, has_desc).await
    }

    /// Responds to the interaction with a failure message.
    ///
    /// # Errors
    ///
    /// This function will return an error if the interaction could not be responded to.
    #[inline]
    pub async fn failure(self, locale: Locale, key: impl Display + Send, has_desc: bool) -> Result {
        self.complete(locale, "failure", key, FAILURE, has_desc).await
    }
}

/// Returns the flags of a private or public response.
#[must_use]
pub const fn flags(ephemeral: bool) -> MessageFlags {
    if ephemeral { MessageFlags::EPHEMERAL } else { MessageFlags::empty() }
}
