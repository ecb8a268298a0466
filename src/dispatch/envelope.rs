use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::ready;
use tokio::sync::oneshot;

/// Which lane of the [`Dispatcher`][super::Dispatcher] queue a request waits
/// in.
///
/// Urgent requests are always dispatched ahead of normal ones.
#[derive(PartialEq, Eq, Hash, Copy, Clone, Default, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Priority {
    Urgent,
    #[default]
    Normal,
}

impl Priority {
    #[inline]
    pub const fn is_urgent(self) -> bool {
        matches!(self, Self::Urgent)
    }
}

impl From<bool> for Priority {
    /// Convert an `urgent` flag to a [`Priority`].
    fn from(urgent: bool) -> Self {
        if urgent {
            Self::Urgent
        } else {
            Self::Normal
        }
    }
}

/// A queued request, paired with the channel its outcome is sent on.
#[derive(Debug)]
pub(crate) struct Envelope<Req, Res, E> {
    pub payload: Req,
    pub priority: Priority,
    pub sink: oneshot::Sender<Result<Res, E>>,
}

impl<Req, Res, E> Envelope<Req, Res, E> {
    pub fn new(payload: Req, priority: Priority) -> (Self, Pending<Res, E>) {
        let (sink, receiver) = oneshot::channel();

        (
            Self {
                payload,
                priority,
                sink,
            },
            Pending { receiver },
        )
    }
}

/// The eventual outcome of a request [enqueued][super::Dispatcher::enqueue] on
/// a [`Dispatcher`][super::Dispatcher].
///
/// Resolves once the request's handler completes, with the handler's own
/// result or error.
#[derive(Debug)]
#[must_use = "the request is dispatched either way, but its outcome is lost if not awaited"]
pub struct Pending<Res, E> {
    receiver: oneshot::Receiver<Result<Res, E>>,
}

impl<Res, E> Future for Pending<Res, E> {
    type Output = Result<Res, DispatchError<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let outcome = ready!(Pin::new(&mut self.receiver).poll(cx));

        Poll::Ready(match outcome {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(err)) => Err(DispatchError::Handler(err)),
            Err(_) => Err(DispatchError::Dropped),
        })
    }
}

/// A request which did not produce a response.
#[derive(thiserror::Error, Debug)]
pub enum DispatchError<E> {
    /// The request handler failed; its error is passed through unchanged.
    #[error(transparent)]
    Handler(E),
    /// The request was discarded before its handler completed, e.g. because
    /// the handler panicked or the runtime shut down.
    #[error("request dropped before its handler completed")]
    Dropped,
}

impl<E> DispatchError<E> {
    /// The handler's error, if the handler ran and failed.
    pub fn into_handler_error(self) -> Option<E> {
        match self {
            Self::Handler(err) => Some(err),
            Self::Dropped => None,
        }
    }
}
