use std::{
    fmt,
    hash::{Hash, Hasher},
    ops::Deref,
    str::FromStr,
};

use non_empty_string::NonEmptyString;

/// The title of a movie or series.
///
/// Titles are compared byte-for-byte: no trimming or case folding is applied,
/// so `"Dune"` and `"dune "` are different titles.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Title(NonEmptyString);

impl Title {
    /// Creates a new `Title` from a string.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTitleError`] if the string is empty.
    pub fn new(s: String) -> Result<Self, InvalidTitleError> {
        NonEmptyString::new(s).map(Self).map_err(|_| InvalidTitleError)
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Hash for Title {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl TryFrom<String> for Title {
    type Error = InvalidTitleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Title {
    type Error = InvalidTitleError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value.to_string())
    }
}

impl FromStr for Title {
    type Err = InvalidTitleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl AsRef<str> for Title {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl Deref for Title {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0.as_str()
    }
}

impl fmt::Display for Title {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Error returned for an empty title.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("title must not be empty")]
pub struct InvalidTitleError;
