//! Alert dispatch: channel eligibility, concurrent fan-out to
//! email/Slack/webhook senders, and per-channel outcome tracking.

pub mod channels;
pub mod dispatcher;
pub mod error;

pub use channels::{EmailProviderConfig, HttpSenders, SenderPool};
pub use dispatcher::Dispatcher;
pub use error::DispatchError;
