use std::io;

use crate::dispatch::DispatchError;

/// An error in a [`Dispatcher`][crate::dispatch::Dispatcher] or API
/// [`Client`][crate::api::Client] operation.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[cfg(feature = "api")]
    #[cfg_attr(docsrs, doc(cfg(feature = "api")))]
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("API origin must be a base URL, like https://open-api.bser.io")]
    InvalidOrigin,
    #[error("failed to read API key")]
    Credentials(#[source] io::Error),
    #[error("no Eternal Return API key configured")]
    Unavailable,
    #[error("rate limit must allow at least one request per window of up to 365 days")]
    InvalidRateLimit,
    #[error("request dispatcher shut down before the request completed")]
    Closed,
}

impl From<DispatchError<Error>> for Error {
    fn from(value: DispatchError<Error>) -> Self {
        match value {
            DispatchError::Handler(err) => err,
            DispatchError::Dropped => Self::Closed,
        }
    }
}
