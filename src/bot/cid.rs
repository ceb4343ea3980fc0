use std::fmt::{Display, Formatter};
use std::str::FromStr;

use anyhow::{anyhow, bail};
use twilight_model::id::Id;

use crate::util::Result;

/// A component or modal custom identifier carrying its handler's name and a list of values.
///
/// Identifiers are written as `name$kind` or `name$kind$data;data`.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct CId {
    /// The name of the handler and its component.
    name: (Box<str>, Box<str>),
    /// The internal stringified data.
    data: Vec<Box<str>>,
}

impl CId {
    /// The maximum length of an identifier in bytes.
    pub const MAX_LEN: usize = 100;
    /// The character used to separate each part of the identifier.
    pub const PART_SEP: char = '$';
    /// The character used to separate data values within the identifier.
    pub const DATA_SEP: char = ';';

    /// Creates a new [`CId`].
    pub fn new(handler: impl AsRef<str>, component: impl AsRef<str>) -> Self {
        Self { name: (handler.as_ref().into(), component.as_ref().into()), data: vec![] }
    }

    /// Returns a reference to the event handler name of this [`CId`].
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &str {
        &self.name.0
    }

    /// Returns a reference to the component kind of this [`CId`].
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> &str {
        &self.name.1
    }

    /// Returns the data at the given index.
    #[inline]
    #[must_use]
    pub fn data(&self, index: usize) -> Option<&str> {
        self.data.get(index).map(|b| &(**b))
    }

    /// Returns the identifier stored at the given index.
    ///
    /// # Errors
    ///
    /// This function will return an error if the data is missing or is not a valid identifier.
    pub fn id<T>(&self, index: usize) -> Result<Id<T>> {
        let Some(data) = self.data(index) else {
            bail!("missing identifier at index {index} of '{}'", self);
        };

        Id::new_checked(data.parse()?).ok_or_else(|| anyhow!("expected a non-zero identifier"))
    }

    /// Inserts the given data into the identifier.
    #[must_use]
    pub fn with(mut self, data: impl ToString) -> Self {
        self.data.push(data.to_string().into_boxed_str());

        self
    }

    /// Validates the length of this [`CId`].
    ///
    /// # Errors
    ///
    /// This function will return an error if the identifier is too long.
    pub fn validate(self) -> Result<Self> {
        let length = self.to_string().len();

        if length > Self::MAX_LEN {
            bail!("maximum identifier length exceeded ({length}/{} bytes)", Self::MAX_LEN);
        }

        Ok(self)
    }
}

impl TryFrom<&str> for CId {
    type Error = <Self as FromStr>::Err;

    #[inline]
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value)
    }
}

impl FromStr for CId {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = value.splitn(3, Self::PART_SEP);

        let Some(name) = parts.next().filter(|s| !s.is_empty()) else {
            bail!("missing event handler name");
        };
        let Some(kind) = parts.next().filter(|s| !s.is_empty()) else {
            bail!("missing component kind");
        };

        let mut cid = Self::new(name, kind);

        if let Some(data) = parts.next() {
            cid.data = data.split(Self::DATA_SEP).map(Into::into).collect();
        }

        Ok(cid)
    }
}

impl From<CId> for String {
    #[inline]
    fn from(value: CId) -> Self {
        value.to_string()
    }
}

impl Display for CId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let Self { name: (name, kind), data } = self;

        write!(f, "{name}{}{kind}", Self::PART_SEP)?;

        if data.is_empty() {
            Ok(())
        } else {
            write!(f, "{}{}", Self::PART_SEP, data.join(&Self::DATA_SEP.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use twilight_model::id::marker::UserMarker;

    use super::*;

    #[test]
    fn writes_name_kind_and_data() {
        assert_eq!(CId::new("remove-worker", "apply").to_string(), "remove-worker$apply");
        assert_eq!(CId::new("remove-worker", "accept").with(7).with(8).to_string(), "remove-worker$accept$7;8");
    }

    #[test]
    fn parses_what_it_writes() {
        let cid = "remove-worker$accept$7;8".parse::<CId>().unwrap();

        assert_eq!(cid.name(), "remove-worker");
        assert_eq!(cid.kind(), "accept");
        assert_eq!(cid.id::<UserMarker>(1).unwrap(), Id::new(8));
        assert!(cid.id::<UserMarker>(2).is_err());
        assert_eq!(cid, CId::new("remove-worker", "accept").with(7).with(8));
    }

    #[test]
    fn rejects_incomplete_identifiers() {
        assert!("".parse::<CId>().is_err());
        assert!("role-setup".parse::<CId>().is_err());
        assert!("role-setup$".parse::<CId>().is_err());
        assert!("$select".parse::<CId>().is_err());
    }

    #[test]
    fn zero_and_garbage_are_not_identifiers() {
        let cid = CId::new("role-setup", "select").with(0).with("abc");

        assert!(cid.id::<UserMarker>(0).is_err());
        assert!(cid.id::<UserMarker>(1).is_err());
    }

    #[test]
    fn length_is_capped() {
        assert!(CId::new("a", "b").with("x".repeat(96)).validate().is_ok());
        assert!(CId::new("a", "b").with("x".repeat(97)).validate().is_err());
    }
}
