use crate::app_config::DeviceApi;
use reqwest::header::HeaderValue;
use reqwest::{Client, header};
use thiserror::Error;

/// Builds the HTTP client shared by all sessions. It keeps no cookie store, so sessions share no state.
pub fn new_client(api: &DeviceApi) -> Result<Client, DeviceClientError> {
    let mut headers = header::HeaderMap::new();
    let user_agent = HeaderValue::from_str(&format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")))?;
    headers.insert(header::USER_AGENT, user_agent);

    let client = Client::builder()
        .danger_accept_invalid_certs(api.accept_invalid_certs())
        .timeout(api.request_timeout())
        .default_headers(headers)
        .build()?;
    Ok(client)
}

#[derive(Error, Debug)]
pub enum DeviceClientError {
    #[error("request error: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("device client set an invalid header value: {0}")]
    InvalidHeaderValue(#[from] header::InvalidHeaderValue),
}
