use std::num::NonZeroU32;
use std::sync::Arc;

use tokio::{
    select, spawn,
    sync::mpsc,
    task::JoinHandle,
    time::{sleep_until, Duration, Instant},
};
use tracing::{debug, trace};

use super::envelope::{Envelope, Pending, Priority};
use super::handler::Handler;
use super::ledger::RateLedger;
use super::queue::PriorityQueue;
use crate::Error;

/// Sends requests to a [`Handler`] no faster than a [`Quota`] allows.
///
/// Requests wait in two FIFO lanes; [urgent][Priority::Urgent] requests are
/// always dispatched before [normal][Priority::Normal] ones. Once dispatched, a
/// request's handler runs as its own task: the quota limits how often handler
/// calls _start_, not how many are in flight.
///
/// A `Dispatcher` spawns a worker task when created, and so must be created
/// within a Tokio runtime. Dropping the `Dispatcher` stops it from accepting
/// new requests; those already enqueued are still dispatched.
///
/// ```
/// use bser::dispatch::{Dispatcher, Priority};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dispatcher = Dispatcher::new(
///     |name: &'static str| async move { Ok::<_, std::io::Error>(name.len()) },
///     2,
/// )?;
///
/// let later = dispatcher.send("eventually");
/// let first = dispatcher.send_urgent("first");
///
/// assert_eq!(first.await?, 5);
/// assert_eq!(later.await?, 10);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Dispatcher<Req, Res, E> {
    inbox: mpsc::UnboundedSender<Envelope<Req, Res, E>>,
    task: JoinHandle<()>,
}

impl<Req, Res, E> Dispatcher<Req, Res, E>
where
    Req: Send + 'static,
    Res: Send + 'static,
    E: Send + 'static,
{
    /// Create a [`Dispatcher`] which starts at most `rpm_limit` requests per
    /// minute.
    ///
    /// Returns [`Error::InvalidRateLimit`] if `rpm_limit` is zero.
    pub fn new<H>(handler: H, rpm_limit: u32) -> Result<Self, Error>
    where
        H: Handler<Req, Response = Res, Error = E>,
    {
        Ok(Self::with_quota(handler, Quota::per_minute(rpm_limit)?))
    }

    /// Create a [`Dispatcher`] which enforces the given [`Quota`].
    pub fn with_quota<H>(handler: H, quota: Quota) -> Self
    where
        H: Handler<Req, Response = Res, Error = E>,
    {
        let (inbox, receiver) = mpsc::unbounded_channel();

        let task = {
            let worker = Worker::new(receiver, Arc::new(handler), quota);
            spawn(async move { worker.run().await })
        };

        Self { inbox, task }
    }

    /// Add a request to the tail of the `priority` queue.
    ///
    /// Returns immediately; the returned [`Pending`] future resolves with the
    /// handler's outcome once the request has been dispatched and handled.
    pub fn enqueue(&self, request: Req, priority: Priority) -> Pending<Res, E> {
        let (envelope, pending) = Envelope::new(request, priority);

        // on failure the sink is dropped and `pending` resolves to `Dropped`
        let _ = self.inbox.send(envelope);

        pending
    }

    /// [Enqueue][Dispatcher::enqueue] a request at [normal][Priority::Normal]
    /// priority.
    #[inline]
    pub fn send(&self, request: Req) -> Pending<Res, E> {
        self.enqueue(request, Priority::Normal)
    }

    /// [Enqueue][Dispatcher::enqueue] a request at [urgent][Priority::Urgent]
    /// priority.
    #[inline]
    pub fn send_urgent(&self, request: Req) -> Pending<Res, E> {
        self.enqueue(request, Priority::Urgent)
    }

    /// Stop accepting requests, and wait until every request already enqueued
    /// has been dispatched.
    ///
    /// Handlers still running when `close` returns are not awaited; their
    /// [`Pending`] futures resolve as usual.
    pub async fn close(self) -> Result<(), Error> {
        let Dispatcher { inbox, task } = self;
        drop(inbox);

        task.await.map_err(|_| Error::Closed)
    }
}

/// How many requests a [`Dispatcher`] may start over a sliding time window.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct Quota {
    pub(crate) limit: NonZeroU32,
    pub(crate) window: Duration,
}

impl Quota {
    /// The default sliding window: one minute.
    pub const MINUTE: Duration = Duration::from_secs(60);

    /// The longest sliding window a [`Quota`] may have: 365 days.
    pub const MAX_WINDOW: Duration = Duration::from_secs(365 * 24 * 60 * 60);

    /// Allow `limit` requests per `window`.
    ///
    /// Returns [`Error::InvalidRateLimit`] if either is zero, or if `window`
    /// is longer than [`Quota::MAX_WINDOW`].
    pub fn new(limit: u32, window: Duration) -> Result<Self, Error> {
        let limit = NonZeroU32::new(limit).ok_or(Error::InvalidRateLimit)?;
        if window.is_zero() || window > Self::MAX_WINDOW {
            return Err(Error::InvalidRateLimit);
        }

        Ok(Self { limit, window })
    }

    /// Allow `limit` requests per [minute][Quota::MINUTE].
    pub fn per_minute(limit: u32) -> Result<Self, Error> {
        Self::new(limit, Self::MINUTE)
    }

    #[inline]
    pub const fn limit(&self) -> u32 {
        self.limit.get()
    }

    #[inline]
    pub const fn window(&self) -> Duration {
        self.window
    }
}

/// Owns a [`Dispatcher`]'s queue and rate ledger; all of their mutations
/// happen on this task.
struct Worker<Req, H: Handler<Req>> {
    inbox: mpsc::UnboundedReceiver<Envelope<Req, H::Response, H::Error>>,
    open: bool,
    queue: PriorityQueue<Envelope<Req, H::Response, H::Error>>,
    ledger: RateLedger,
    handler: Arc<H>,
}

impl<Req, H> Worker<Req, H>
where
    Req: Send + 'static,
    H: Handler<Req>,
{
    fn new(
        inbox: mpsc::UnboundedReceiver<Envelope<Req, H::Response, H::Error>>,
        handler: Arc<H>,
        quota: Quota,
    ) -> Self {
        Self {
            inbox,
            open: true,
            queue: PriorityQueue::new(),
            ledger: RateLedger::new(quota),
            handler,
        }
    }

    async fn run(mut self) {
        loop {
            self.collect();

            if self.queue.is_empty() {
                if !self.open {
                    break;
                }

                // idle until the next request arrives
                let received = self.inbox.recv().await;
                self.accept(received);
                continue;
            }

            let now = Instant::now();

            if let Some(available) = self.ledger.available_at(now) {
                trace!(
                    queued = self.queue.len(),
                    delay = ?(available - now),
                    "rate limit reached"
                );

                if self.open {
                    select! {
                        _ = sleep_until(available) => {}
                        received = self.inbox.recv() => self.accept(received),
                    }
                } else {
                    sleep_until(available).await;
                }
                continue;
            }

            if let Some(envelope) = self.queue.pop() {
                self.ledger.record(now);
                self.dispatch(envelope);
            }
        }

        debug!("dispatcher closed");
    }

    /// Move every request waiting in the inbox onto the queue.
    fn collect(&mut self) {
        while self.open {
            match self.inbox.try_recv() {
                Ok(envelope) => self.queue.push_envelope(envelope),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => self.open = false,
            }
        }
    }

    fn accept(&mut self, received: Option<Envelope<Req, H::Response, H::Error>>) {
        match received {
            Some(envelope) => self.queue.push_envelope(envelope),
            None => self.open = false,
        }
    }

    fn dispatch(&self, envelope: Envelope<Req, H::Response, H::Error>) {
        let Envelope {
            payload,
            priority,
            sink,
        } = envelope;

        trace!(urgent = priority.is_urgent(), "dispatching request");

        let handler = self.handler.clone();
        spawn(async move {
            let outcome = handler.call(payload).await;
            // the caller may have stopped waiting for the outcome
            let _ = sink.send(outcome);
        });
    }
}

impl<Req, Res, E> PriorityQueue<Envelope<Req, Res, E>> {
    #[inline]
    fn push_envelope(&mut self, envelope: Envelope<Req, Res, E>) {
        let priority = envelope.priority;
        self.push(envelope, priority);
    }
}
