use anyhow::bail;
use twilight_cache_inmemory::model::CachedGuild;
use twilight_model::application::interaction::Interaction;
use twilight_model::user::User;
use twilight_util::builder::embed::ImageSource;
use warden_localizer::{localizer, Locale};

use crate::util::CDN_URL;

/// Provides a method that returns the implementing type's associated image.
pub trait IntoImageSource {
    /// Returns the image source associated with this value.
    ///
    /// # Errors
    ///
    /// This function will return an error if the image could not be created.
    fn into_image_source(self) -> anyhow::Result<ImageSource>;
}

impl IntoImageSource for &User {
    fn into_image_source(self) -> anyhow::Result<ImageSource> {
        let Some(hash) = self.avatar else {
            bail!("the user's avatar is not set");
        };

        let ext = if hash.is_animated() { "gif" } else { "png" };
        let url = format!("{CDN_URL}/avatars/{}/{hash}.{ext}", self.id);

        Ok(ImageSource::url(url)?)
    }
}

/// Specifies that the implementing type prefers a given locale.
pub trait PreferLocale {
    /// The preferred locale of this type.
    fn preferred_locale(&self) -> Locale;
}

impl<T: PreferLocale> PreferLocale for &T {
    #[inline]
    fn preferred_locale(&self) -> Locale {
        <T as PreferLocale>::preferred_locale(self)
    }
}

impl<T: PreferLocale> PreferLocale for Option<T> {
    #[inline]
    fn preferred_locale(&self) -> Locale {
        self.as_ref().map_or_else(|| *localizer().preferred_locale(), PreferLocale::preferred_locale)
    }
}

impl PreferLocale for CachedGuild {
    fn preferred_locale(&self) -> Locale {
        Locale::get(CachedGuild::preferred_locale(self)).unwrap_or_else(|| *localizer().preferred_locale())
    }
}

impl PreferLocale for Interaction {
    fn preferred_locale(&self) -> Locale {
        self.locale
            .as_deref()
            .and_then(Locale::get)
            .or_else(|| self.guild_locale.as_deref().and_then(Locale::get))
            .unwrap_or_else(|| *localizer().preferred_locale())
    }
}

impl PreferLocale for User {
    fn preferred_locale(&self) -> Locale {
        self.locale.as_deref().and_then(Locale::get).unwrap_or_else(|| *localizer().preferred_locale())
    }
}
