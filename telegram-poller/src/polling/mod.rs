//! Long-polling loop for `getUpdates`
//!
//! The loop issues one request at a time, delivers each batch to the update
//! handler in order, acknowledges it by advancing the offset and waits a fixed
//! interval before the next request. Errors are logged and retried on the next
//! cycle; only cancellation ends the loop.

pub mod scheduler;

pub use scheduler::{
    advance_offset, CancelHandle, CycleOutcome, HandlerError, HandlerResult, PollState,
    PollStats, PollingLoop,
};
