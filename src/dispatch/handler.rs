use std::future::Future;

/// Performs the actual work for one request taken off a
/// [`Dispatcher`][super::Dispatcher] queue.
///
/// Each call must settle exactly once, with either a response or an error.
/// Any closure taking a request and returning a [`Future`] of a [`Result`]
/// implements `Handler`:
///
/// ```
/// use bser::dispatch::{Dispatcher, Priority};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dispatcher = Dispatcher::new(
///     |n: u32| async move { Ok::<_, std::convert::Infallible>(n * 2) },
///     60,
/// )?;
///
/// assert_eq!(dispatcher.enqueue(21, Priority::Normal).await?, 42);
/// # Ok(())
/// # }
/// ```
pub trait Handler<Req>: Send + Sync + 'static {
    type Response: Send + 'static;
    type Error: Send + 'static;
    type Future: Future<Output = Result<Self::Response, Self::Error>> + Send + 'static;

    fn call(&self, request: Req) -> Self::Future;
}

impl<Req, F, Fut, Res, E> Handler<Req> for F
where
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Res, E>> + Send + 'static,
    Res: Send + 'static,
    E: Send + 'static,
{
    type Response = Res;
    type Error = E;
    type Future = Fut;

    #[inline]
    fn call(&self, request: Req) -> Self::Future {
        self(request)
    }
}
