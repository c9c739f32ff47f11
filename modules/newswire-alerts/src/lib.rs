pub mod channels;
pub mod dispatcher;
pub mod priority;
pub mod quality;

pub use channels::email::EmailChannel;
pub use channels::slack::SlackChannel;
pub use channels::webhook::WebhookChannel;
pub use channels::AlertChannel;
pub use dispatcher::{AlertDispatcher, DispatchOutcome, DispatcherConfig, FilterReason};
