use std::{fmt, fs, path::Path};
#[cfg(feature = "environment")]
use std::path::PathBuf;

#[cfg(feature = "environment")]
use tracing::{instrument, Level};

use crate::error::Error;

/// A key for the Eternal Return [open API][], sent as the `x-api-key` header.
///
/// The key is redacted from `Debug` output.
///
/// [open API]: https://developer.eternalreturn.io/
#[derive(PartialEq, Eq, Clone)]
pub struct ApiKey(String);

impl ApiKey {
    /// The environment variable checked first by [`ApiKey::from_env`].
    pub const VARIABLE: &'static str = "BSER_API_KEY";

    /// The environment variable naming the synced folder which holds the
    /// [credential file][ApiKey::FILE].
    pub const FOLDER_VARIABLE: &'static str = "OneDriveConsumer";

    /// The path of the credential file, relative to
    /// [`$OneDriveConsumer`][ApiKey::FOLDER_VARIABLE].
    pub const FILE: [&'static str; 2] = ["Authentication", "eternal-return-open-api.txt"];

    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Read an API key from the file at `path`, ignoring surrounding
    /// whitespace.
    ///
    /// Returns [`Error::Unavailable`] if the file is blank.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, Error> {
        let contents = fs::read_to_string(path).map_err(Error::Credentials)?;

        match contents.trim() {
            "" => Err(Error::Unavailable),
            key => Ok(Self::new(key)),
        }
    }

    /// Find the API key for the current process.
    ///
    /// Uses [`$BSER_API_KEY`][ApiKey::VARIABLE] if it is set and non-empty;
    /// otherwise reads the [credential file][ApiKey::path] under
    /// `$OneDriveConsumer`. If neither is available, returns
    /// [`Error::Unavailable`].
    #[cfg(feature = "environment")]
    #[cfg_attr(docsrs, doc(cfg(feature = "environment")))]
    #[instrument(level = Level::DEBUG, err(level = Level::WARN))]
    pub fn from_env() -> Result<Self, Error> {
        match std::env::var(Self::VARIABLE) {
            Ok(key) if !key.trim().is_empty() => return Ok(Self::new(key.trim())),
            _ => {}
        }

        let path = Self::path().ok_or(Error::Unavailable)?;
        Self::read(path)
    }

    /// The location of the credential file, if `$OneDriveConsumer` is set.
    #[cfg(feature = "environment")]
    #[cfg_attr(docsrs, doc(cfg(feature = "environment")))]
    pub fn path() -> Option<PathBuf> {
        let folder = std::env::var_os(Self::FOLDER_VARIABLE)?;
        if folder.is_empty() {
            return None;
        }

        Some(Self::FILE.iter().fold(PathBuf::from(folder), |p, c| p.join(c)))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApiKey").field(&"<redacted>").finish()
    }
}

impl From<String> for ApiKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ApiKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
