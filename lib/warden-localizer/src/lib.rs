//! Implements a content localizer for the Warden Discord bot.
#![deny(clippy::expect_used, unsafe_code, clippy::unwrap_used)]
#![warn(clippy::nursery, clippy::todo, clippy::pedantic, missing_docs)]
#![allow(clippy::module_name_repetitions)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{OnceLock, PoisonError, RwLock, RwLockReadGuard};

use warden_logger::{info, warn};

pub use crate::locale::*;

mod locale;

/// The global localizer.
static LOCALIZER: OnceLock<RwLock<Localizer>> = OnceLock::new();

/// Returns the global localizer lock, creating an empty localizer if none is installed.
fn lock() -> &'static RwLock<Localizer> {
    LOCALIZER.get_or_init(RwLock::default)
}

/// Returns a reference to the global localizer.
///
/// Before [`install`] is called, the localizer is empty and returns every key as-is.
pub fn localizer() -> RwLockReadGuard<'static, Localizer> {
    lock().read().unwrap_or_else(PoisonError::into_inner)
}

/// Loads every localization file from the given directory and installs them globally, replacing
/// any previously installed content.
pub fn install(prefer: Locale, dir: impl AsRef<Path>) {
    let localizer = Localizer::new(prefer, dir);
    let locales = localizer.content.keys().map(|l| l.key()).collect::<Vec<_>>().join(", ");

    info!("loaded localizations: [{locales}]").ok();

    *lock().write().unwrap_or_else(PoisonError::into_inner) = localizer;
}

/// Provides an interface for content localization.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Localizer {
    /// The localizer's preferred locale.
    prefer: Locale,
    /// The localizer's internal locale-content map.
    content: HashMap<Locale, HashMap<Box<str>, Box<str>>>,
}

impl Localizer {
    /// Creates a new [`Localizer`], loading `<key>.json` files from the given directory.
    ///
    /// Missing files are skipped and unreadable files are logged.
    #[must_use]
    pub fn new(prefer: Locale, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let content = Locale::LIST.iter().filter_map(|locale| {
            let path = dir.join(locale.key()).with_extension("json");
            let bytes = std::fs::read(path).ok()?;

            match serde_json::from_slice(&bytes) {
                Ok(value) => Some((*locale, value)),
                Err(error) => {
                    warn!("failed to load localization map '{}' - {error}", locale.key()).ok();
                    None
                }
            }
        });

        Self { prefer, content: content.collect() }
    }

    /// Returns the preferred locale of this [`Localizer`].
    #[must_use]
    pub const fn preferred_locale(&self) -> &Locale {
        &self.prefer
    }

    /// Returns the text assigned to the provided key in the preferred locale.
    ///
    /// If the locale is missing or the key is unassigned, the key is returned.
    pub fn localize_preferred(&self, key: impl AsRef<str>) -> Box<str> {
        self.localize(self.prefer, key)
    }

    /// Returns the text assigned to the provided key in the given locale.
    ///
    /// If the locale is missing or the key is unassigned, the key is returned.
    pub fn localize(&self, locale: Locale, key: impl AsRef<str>) -> Box<str> {
        let key = key.as_ref();
        let text = self.content.get(&locale).and_then(|map| map.get(key));

        text.map_or_else(|| key.into(), Clone::clone)
    }

    /// Returns the text assigned to the provided key in the given locale, falling back to the
    /// preferred locale when the given locale lacks the key.
    ///
    /// If neither locale has the key, the key is returned.
    pub fn maybe_localize(&self, locale: Locale, key: impl AsRef<str>) -> Box<str> {
        let key = key.as_ref();
        let text = [locale, self.prefer]
            .iter()
            .find_map(|locale| self.content.get(locale).and_then(|map| map.get(key)));

        text.map_or_else(|| key.into(), Clone::clone)
    }

    /// Returns every loaded translation of the given key, keyed by Discord locale.
    pub fn localizations(&self, key: impl AsRef<str>) -> HashMap<String, String> {
        let key = key.as_ref();
        let map = self.content.iter().filter_map(|(locale, map)| {
            let text = map.get(key)?.to_string();

            Some((locale.key().to_string(), text))
        });

        map.collect()
    }
}

/// Fetches the given key's assigned text from the global [`Localizer`].
///
/// # Examples
///
/// ```
/// use warden_localizer::{localize, Locale};
///
/// // Returns the text in the preferred locale.
/// localize!("command.list-roles.name");
/// // Returns the text in German.
/// localize!(in Locale::German, "command.list-roles.name");
/// // Returns the text in German, or in the preferred locale if German lacks it.
/// localize!(try in Locale::German, "command.list-roles.name");
///
/// // Returns a map of the text in all containing locales.
/// localize!(in *, "command.list-roles.name");
/// ```
#[macro_export]
macro_rules! localize {
    ($(try)? in *, $($args:tt)+) => {
        $crate::localizer().localizations(format!($($args)+))
    };
    (try in $locale:expr, $($args:tt)+) => {
        $crate::localizer().maybe_localize($locale, format!($($args)+))
    };
    (in $locale:expr, $($args:tt)+) => {
        $crate::localizer().localize($locale, format!($($args)+))
    };
    ($($args:tt)+) => {
        $crate::localizer().localize_preferred(format!($($args)+))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn localizer_in(dir: &Path) -> Localizer {
        std::fs::write(dir.join("en-US.json"), r#"{ "greeting": "Hello", "only.english": "English" }"#)
            .unwrap();
        std::fs::write(dir.join("de.json"), r#"{ "greeting": "Hallo" }"#).unwrap();

        Localizer::new(Locale::EnglishUS, dir)
    }

    #[test]
    fn localizes_by_locale() {
        let dir = tempfile::tempdir().unwrap();
        let localizer = localizer_in(dir.path());

        assert_eq!(&*localizer.localize(Locale::German, "greeting"), "Hallo");
        assert_eq!(&*localizer.localize_preferred("greeting"), "Hello");
    }

    #[test]
    fn missing_keys_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let localizer = localizer_in(dir.path());

        assert_eq!(&*localizer.localize(Locale::German, "only.english"), "only.english");
        assert_eq!(&*localizer.maybe_localize(Locale::German, "only.english"), "English");
        assert_eq!(&*localizer.maybe_localize(Locale::German, "nowhere"), "nowhere");
    }

    #[test]
    fn collects_all_translations() {
        let dir = tempfile::tempdir().unwrap();
        let localizer = localizer_in(dir.path());
        let map = localizer.localizations("greeting");

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("de").map(String::as_str), Some("Hallo"));
        assert_eq!(map.get("en-US").map(String::as_str), Some("Hello"));
    }

    #[test]
    fn broken_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();

        std::fs::write(dir.path().join("de.json"), "[1, 2").unwrap();

        let localizer = Localizer::new(Locale::German, dir.path());

        assert_eq!(&*localizer.localize_preferred("greeting"), "greeting");
        assert!(localizer.localizations("greeting").is_empty());
    }
}
