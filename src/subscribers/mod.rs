//! # Event subscribers.
//!
//! - [`Subscribe`] extension point for lifecycle observers
//! - [`SubscriberSet`] non-blocking fan-out with per-subscriber queues
//! - [`LogWriter`] built-in subscriber that forwards events to `tracing`
//!
//! ```text
//! Bus ──► listener ──► SubscriberSet::emit(&Event)
//!                          ├──► [queue] ──► LogWriter::on_event()
//!                          └──► [queue] ──► Custom::on_event()
//! ```

mod log;
mod subscribe;
mod subscriber_set;

pub use log::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
