//! # telegram-poller
//!
//! A long-polling update fetcher for the Telegram Bot API.
//!
//! [`PollingLoop`] repeatedly calls `getUpdates`, hands every new update to a
//! callback in server order and advances its offset once the batch has been
//! delivered. Network errors, bad status codes and `ok: false` answers are
//! logged and retried after the configured interval; the loop only stops when
//! it is cancelled.
//!
//! ```no_run
//! use telegram_poller::{PollingLoop, PollingOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let polling = PollingLoop::create("123456:ABC-DEF", PollingOptions::default(), |update| {
//!         println!("update {}", update.update_id);
//!         Ok(())
//!     })?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     polling.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
mod error;
pub mod logging;
pub mod polling;
pub mod source;
pub mod update;

pub use config::PollingOptions;
pub use error::*;
pub use polling::{
    advance_offset, CancelHandle, CycleOutcome, HandlerError, HandlerResult, PollState,
    PollStats, PollingLoop,
};
pub use source::{HttpUpdateSource, UpdateSource, UpdatesRequest};
pub use update::{ApiResponse, Update};
