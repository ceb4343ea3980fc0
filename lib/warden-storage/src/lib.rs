//! Provides a file-backed data storage interface for the Warden Discord bot.
#![deny(clippy::expect_used, unsafe_code, clippy::unwrap_used)]
#![warn(clippy::nursery, clippy::todo, clippy::pedantic, missing_docs)]
#![allow(clippy::module_name_repetitions)]

use std::fmt::{Debug, Display};
use std::marker::PhantomData;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[cfg(feature = "json")] pub use crate::formats::*;
#[cfg(feature = "json")] mod formats;

/// A possible storage error.
#[derive(Debug, thiserror::Error)]
pub enum Error<F: Format> {
    /// An IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A [`Format`] encoding error.
    #[error("{0}")]
    Encoding(F::EncodingError),
    /// A [`Format`] decoding error.
    #[error("{0}")]
    Decoding(F::DecodingError),
}

/// A data format that values are encoded into before being written to disk.
pub trait Format: Debug {
    /// The type returned in the event of an error during encoding.
    type EncodingError: Debug + Display;
    /// The type returned in the event of an error during decoding.
    type DecodingError: Debug + Display;

    /// Returns the file extension for this [`Format`].
    fn extension(&self) -> String;

    /// Encodes a given value of type `T` into a byte array.
    ///
    /// # Errors
    ///
    /// This function will return an error if the value could not be encoded.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, Self::EncodingError>;

    /// Decodes a given byte slice into a value of type `T`.
    ///
    /// # Errors
    ///
    /// This function will return an error if the bytes could not be decoded.
    fn decode<T: for<'de> Deserialize<'de>>(&self, bytes: &[u8]) -> Result<T, Self::DecodingError>;
}

/// Points to a single file holding a value of type `T` encoded with the format `F`.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Key<T, F>
where
    T: Serialize + for<'de> Deserialize<'de>,
    F: Format,
{
    /// The value's file path.
    path: Box<Path>,
    /// The value's format.
    format: F,
    /// Type marker.
    _marker: PhantomData<fn() -> T>,
}

impl<T, F> Key<T, F>
where
    T: Serialize + for<'de> Deserialize<'de>,
    F: Format,
{
    /// Creates a new [`Key<T, F>`].
    pub fn new(path: impl AsRef<Path>, format: F) -> Self {
        Self { path: Box::from(path.as_ref()), format, _marker: PhantomData }
    }

    /// Creates a new [`Key<T, F>`] with a defaulted format.
    pub fn new_default(path: impl AsRef<Path>) -> Self
    where
        F: Default,
    {
        Self::new(path, F::default())
    }

    /// Returns the file path of this [`Key<T, F>`].
    pub const fn path(&self) -> &Path {
        &self.path
    }

    /// Returns whether this [`Key<T, F>`]'s file exists.
    ///
    /// # Errors
    ///
    /// This function will return an error if the path could not be verified.
    pub fn exists(&self) -> Result<bool, Error<F>> {
        self.path.try_exists().map_err(Into::into)
    }

    /// Reads and decodes this [`Key<T, F>`]'s file.
    ///
    /// # Errors
    ///
    /// This function will return an error if the file could not be read or decoded.
    pub fn read(&self) -> Result<Value<T, F>, Error<F>> {
        let bytes = std::fs::read(&(*self.path))?;
        let value = self.format.decode(&bytes).map_err(Error::Decoding)?;

        Ok(Value { key: self, value })
    }

    /// Reads this [`Key<T, F>`]'s file, falling back to the value returned by `f` on failure.
    pub fn read_or_else(&self, f: impl FnOnce(Error<F>) -> T) -> Value<T, F> {
        self.read().unwrap_or_else(|error| Value { key: self, value: f(error) })
    }

    /// Reads this [`Key<T, F>`]'s file, falling back to the default value on failure.
    pub fn read_or_default(&self) -> Value<T, F>
    where
        T: Default,
    {
        self.read_or_else(|_| T::default())
    }

    /// Encodes the given value and overwrites this [`Key<T, F>`]'s file, creating any missing
    /// parent directories.
    ///
    /// # Errors
    ///
    /// This function will return an error if the value could not be encoded or written.
    pub fn write(&self, value: &T) -> Result<(), Error<F>> {
        let bytes = self.format.encode(value).map_err(Error::Encoding)?;

        if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        std::fs::write(&(*self.path), bytes)?;

        Ok(())
    }

    /// Removes this [`Key<T, F>`]'s file.
    ///
    /// # Errors
    ///
    /// This function will return an error if the file could not be removed.
    pub fn remove(&self) -> Result<(), Error<F>> {
        std::fs::remove_file(&(*self.path)).map_err(Into::into)
    }
}

/// A value read from, and writable back to, its [`Key<T, F>`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Value<'key, T, F>
where
    T: Serialize + for<'de> Deserialize<'de>,
    F: Format,
{
    /// The value's associated key.
    key: &'key Key<T, F>,
    /// The stored value.
    value: T,
}

impl<'key, T, F> Value<'key, T, F>
where
    T: Serialize + for<'de> Deserialize<'de>,
    F: Format,
{
    /// Returns the associated key.
    pub const fn key(&self) -> &Key<T, F> {
        self.key
    }

    /// Returns a reference to the inner value.
    pub const fn get(&self) -> &T {
        &self.value
    }

    /// Returns a mutable reference to the inner value.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.value
    }

    /// Returns the inner value.
    pub fn get_owned(self) -> T {
        self.value
    }

    /// Writes the inner value back to its key.
    ///
    /// # Errors
    ///
    /// This function will return an error if the value could not be encoded or written.
    pub fn write(&self) -> Result<(), Error<F>> {
        self.key.write(&self.value)
    }
}

/// A type with a canonical storage location.
pub trait Stored: Serialize + for<'de> Deserialize<'de> {
    /// The arguments needed to build the location.
    type Arguments;
    /// The format the type is stored in.
    type Format: Format;

    /// Returns the [`Key<T, F>`] for the given arguments.
    fn stored(arguments: Self::Arguments) -> Key<Self, Self::Format>;
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    struct Counters {
        counts: BTreeMap<String, u32>,
    }

    impl Stored for Counters {
        type Arguments = std::path::PathBuf;
        type Format = Json;

        fn stored(path: Self::Arguments) -> Key<Self, Self::Format> {
            Key::new_default(path)
        }
    }

    #[test]
    fn write_then_read_nested_path() {
        let dir = tempfile::tempdir().unwrap();
        let key = Counters::stored(dir.path().join("nested/deeper/counters.json"));
        let mut value = key.read_or_default();

        value.get_mut().counts.insert("roles".to_string(), 3);
        value.write().unwrap();

        assert!(key.exists().unwrap());
        assert_eq!(key.read().unwrap().get().counts.get("roles"), Some(&3));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let key = Key::<Counters, Json>::new_default(dir.path().join("absent.json"));

        assert!(matches!(key.read(), Err(Error::Io(_))));
        assert_eq!(key.read_or_default().get_owned(), Counters::default());
    }

    #[test]
    fn garbage_is_a_decoding_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");

        std::fs::write(&path, b"{ not json").unwrap();

        let key = Key::<Counters, Json>::new_default(&path);
        let mut seen = None;
        let value = key.read_or_else(|error| {
            seen = Some(matches!(error, Error::Decoding(_)));
            Counters::default()
        });

        assert_eq!(seen, Some(true));
        assert!(value.get().counts.is_empty());
    }

    #[test]
    fn json_output_is_pretty() {
        let bytes = Json.encode(&Counters::default()).unwrap();

        assert_eq!(String::from_utf8(bytes).unwrap(), "{\n  \"counts\": {}\n}");
        assert_eq!(Json.extension(), "json");
    }

    #[test]
    fn remove_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let key = Key::<Counters, Json>::new_default(dir.path().join("gone.json"));

        key.write(&Counters::default()).unwrap();
        key.remove().unwrap();

        assert!(!key.exists().unwrap());
    }
}
