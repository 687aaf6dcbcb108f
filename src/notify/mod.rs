mod dispatcher;
mod transport;

#[cfg(test)]
pub use dispatcher::recording::RecordingTransport;
pub use dispatcher::{Ack, Dispatcher, NotificationOutcome, Recipient};
pub use transport::{DeliveryError, Mail, MailTransport, NotificationTransport};
