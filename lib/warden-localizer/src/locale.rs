/// Defines locales.
///
/// # Examples
///
/// ```ignore
/// locales! {
///     /// English, US
///     "en-US" as EnglishUS,
/// }
/// ```
macro_rules! locales {
    {$(
        #[doc = $translation:literal]
        $(#[$attribute:meta])*
        $key:literal as $name:ident
    ),* $(,)?} => {
        /// The bot's supported locales.
        #[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, serde::Serialize, serde::Deserialize, clap::ValueEnum)]
        pub enum Locale {$(
            $(#[$attribute])*
            #[doc = $translation]
            #[serde(rename = $key)]
            #[value(name = $key)]
            $name,
        )*}

        impl Locale {
            /// A list of every locale.
            pub const LIST: &'static [Self] = &[$(Self::$name),*];

            /// Returns the locale's Discord key, which is also its localization file's name.
            #[must_use]
            pub const fn key(self) -> &'static str {
                match self {$( Self::$name => $key, )*}
            }

            /// Returns the locale associated with the given Discord key.
            pub fn get(key: impl AsRef<str>) -> Option<Self> {
                match key.as_ref() {
                    $( $key => Some(Self::$name), )*
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for Locale {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let translated = match self { $( Self::$name => $translation, )* };

                write!(f, "{translated}")
            }
        }
    };
}

locales! {
    /// Deutsch
    "de" as German,
    /// English, US
    #[default]
    "en-US" as EnglishUS,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip() {
        for locale in Locale::LIST {
            assert_eq!(Locale::get(locale.key()), Some(*locale));
        }

        assert_eq!(Locale::get("fr"), None);
    }

    #[test]
    fn default_is_english() {
        assert_eq!(Locale::default(), Locale::EnglishUS);
        assert_eq!(Locale::German.to_string(), "Deutsch");
    }
}
