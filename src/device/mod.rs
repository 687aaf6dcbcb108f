mod client;
mod cookies;
mod http;
mod operation;
mod session;

pub use client::{DeviceClientError, new_client};
pub use http::HttpConnector;
pub use operation::Operation;
pub use session::{AuthError, CallError, Connector, DeviceSession};
