//! A client for the Eternal Return open API which respects its rate limit.
//!
//! The [`dispatch`] module holds the request [`Dispatcher`][dispatch::Dispatcher]:
//! a queue which starts requests no faster than a per-minute [quota][dispatch::Quota],
//! and lets urgent requests skip ahead of normal ones. The [`api`] module's
//! [`Client`][api::Client] sends every open API call through one.

#[cfg(feature = "api")]
#[cfg_attr(docsrs, doc(cfg(feature = "api")))]
pub mod api;
mod credentials;
pub mod dispatch;
mod error;

pub use credentials::ApiKey;
pub use error::Error;
