use anyhow::{anyhow, bail};
use twilight_http::request::channel::reaction::RequestReactionType;
use twilight_model::application::interaction::Interaction;
use twilight_model::channel::message::embed::EmbedAuthor;
use twilight_model::channel::message::ReactionType;
use twilight_model::guild::Member;
use twilight_model::id::Id;
use twilight_model::user::User;
use twilight_util::builder::embed::EmbedAuthorBuilder;

use crate::util::traits::IntoImageSource;
use crate::util::Result;

/// Provides type extensions for [`EmbedAuthor`]s.
pub trait EmbedAuthorExtension<T>: Sized {
    /// Creates a new embed author from the given value.
    ///
    /// # Errors
    ///
    /// This function will return an error if the author could not be created.
    fn parse(value: T) -> Result<Self>;
}

impl EmbedAuthorExtension<&User> for EmbedAuthor {
    fn parse(value: &User) -> Result<Self> {
        let builder = EmbedAuthorBuilder::new(value.display());

        Ok(match value.into_image_source() {
            Ok(icon) => builder.icon_url(icon),
            Err(_) => builder,
        }
        .build())
    }
}

/// Provides type extensions for [`Interaction`]s.
pub trait InteractionExtension {
    /// Returns a short label identifying the interaction within logs.
    fn label(&self) -> String;
}

impl InteractionExtension for Interaction {
    fn label(&self) -> String {
        self.author_id().map_or_else(
            || format!("<{:?} #{}>", self.kind, self.id),
            |id| format!("<{:?} #{} @{id}>", self.kind, self.id),
        )
    }
}

/// Provides type extensions for [`ReactionType`]s.
pub trait ReactionTypeExtension: Sized {
    /// Parses a unicode emoji or a `<:name:id>` / `<a:name:id>` custom emoji.
    ///
    /// # Errors
    ///
    /// This function will return an error if the value is not a recognizable emoji.
    fn parse(value: &str) -> Result<Self>;

    /// Returns the key that binds this emoji to a role.
    ///
    /// Custom emoji are keyed as `<:name:id>`, unicode emoji by themselves.
    fn key(&self) -> String;

    /// Returns this emoji in the form used by reaction requests.
    fn request(&self) -> RequestReactionType<'_>;
}

impl ReactionTypeExtension for ReactionType {
    fn parse(value: &str) -> Result<Self> {
        let value = value.trim();

        if value.is_empty() {
            bail!("expected a non-empty emoji");
        }
        if !value.starts_with('<') {
            if emojis::get(value).is_none() {
                bail!("invalid unicode emoji '{value}'");
            }

            return Ok(Self::Unicode { name: value.to_string() });
        }

        let Some(inner) = value.strip_prefix('<').and_then(|v| v.strip_suffix('>')) else {
            bail!("invalid emoji formatting");
        };
        let mut split = inner.split(':');

        let (Some(kind), Some(name), Some(id), None) = (split.next(), split.next(), split.next(), split.next())
        else {
            bail!("invalid emoji formatting");
        };

        if !matches!(kind, "" | "a") || name.is_empty() {
            bail!("invalid emoji formatting");
        }

        let id = Id::new_checked(id.parse()?).ok_or_else(|| anyhow!("expected a non-zero identifier"))?;

        Ok(Self::Custom { animated: kind == "a", id, name: Some(name.to_string()) })
    }

    fn key(&self) -> String {
        match self {
            Self::Custom { id, name, .. } => format!("<:{}:{id}>", name.as_deref().unwrap_or_default()),
            Self::Unicode { name } => name.clone(),
        }
    }

    fn request(&self) -> RequestReactionType<'_> {
        match self {
            Self::Custom { id, name, .. } => RequestReactionType::Custom { id: *id, name: name.as_deref() },
            Self::Unicode { name } => RequestReactionType::Unicode { name: name.as_str() },
        }
    }
}

/// Provides type extensions for users.
pub trait UserExtension {
    /// Returns the displayed name of this user.
    fn display(&self) -> String;

    /// Returns the mention of this user.
    fn mention(&self) -> String;
}

impl UserExtension for Member {
    #[inline]
    fn display(&self) -> String {
        self.nick.as_deref().map_or_else(|| self.user.display(), Into::into)
    }

    #[inline]
    fn mention(&self) -> String {
        self.user.mention()
    }
}

impl UserExtension for User {
    #[inline]
    fn display(&self) -> String {
        self.global_name.as_deref().unwrap_or(&self.name).to_string()
    }

    #[inline]
    fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unicode_and_custom_emoji() {
        let house = ReactionType::parse("🏠").unwrap();

        assert_eq!(house, ReactionType::Unicode { name: "🏠".to_string() });
        assert_eq!(house.key(), "🏠");
        assert!(ReactionType::parse("🇩🇪").is_ok());

        let custom = ReactionType::parse("<a:party:123>").unwrap();

        assert_eq!(custom, ReactionType::Custom { animated: true, id: Id::new(123), name: Some("party".to_string()) });
        assert_eq!(custom.key(), "<:party:123>");
        assert_eq!(ReactionType::parse("<:party:123>").unwrap().key(), "<:party:123>");
    }

    #[test]
    fn rejects_malformed_emoji() {
        for value in ["", "   ", "abc", "é", "ß", "🏠 🏠", "<:party>", "<:party:0>", "<:party:abc>", "<b:party:1>", "<:party:1"] {
            assert!(ReactionType::parse(value).is_err(), "accepted '{value}'");
        }
    }
}
