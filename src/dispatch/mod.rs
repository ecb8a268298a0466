//! Send requests at a limited rate, letting urgent requests skip the line.

mod dispatcher;
mod envelope;
mod handler;
mod ledger;
mod queue;

pub use self::{
    dispatcher::{Dispatcher, Quota},
    envelope::{DispatchError, Pending, Priority},
    handler::Handler,
    ledger::RateLedger,
    queue::PriorityQueue,
};
