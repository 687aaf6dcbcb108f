use crate::app_config::DeviceApi;
use crate::device::cookies::{CookieJar, parse_csrf_token};
use crate::device::{AuthError, CallError, Connector, DeviceSession, Operation};
use crate::domain::{DeviceEndpoint, DeviceId};
use async_trait::async_trait;
use reqwest::header::COOKIE;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: Client,
    api: Arc<DeviceApi>,
}

impl HttpConnector {
    pub fn new(client: Client, api: Arc<DeviceApi>) -> Self {
        HttpConnector { client, api }
    }
}

#[async_trait]
impl Connector for HttpConnector {
    #[instrument(skip_all, fields(device_id = %endpoint.id()))]
    async fn open(&self, endpoint: &DeviceEndpoint) -> Result<Box<dyn DeviceSession>, AuthError> {
        let mut session = HttpSession {
            client: self.client.clone(),
            api: self.api.clone(),
            endpoint: endpoint.clone(),
            cookies: CookieJar::default(),
            csrf_token: None,
        };
        session.login().await?;

        Ok(Box::new(session))
    }
}

#[derive(Debug)]
pub struct HttpSession {
    client: Client,
    api: Arc<DeviceApi>,
    endpoint: DeviceEndpoint,
    cookies: CookieJar,
    csrf_token: Option<String>,
}

impl HttpSession {
    async fn login(&mut self) -> Result<(), AuthError> {
        debug!("🔑 Logging in...");
        let credentials = self.endpoint.credentials();
        let response = self
            .client
            .post(self.endpoint.resource_url(self.api.login_path()))
            .form(&[("username", credentials.username()), ("secretkey", credentials.password().expose_secret())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            debug!(status_code = %status, "🔑 Logging in... rejected");
            return Err(AuthError::Rejected(status));
        }

        self.absorb_cookies(&response);
        if self.csrf_token.is_none() {
            // Authenticated cookies may already be set, so the half-open session is released
            warn!("⚠️ Login answered without an anti-forgery token, logging out");
            if let Err(e) = self.logout().await {
                warn!("⚠️ Logging out after an incomplete login... failed, {}", e);
            }
            return Err(AuthError::MissingToken(self.api.csrf_cookie().to_string()));
        }

        debug!("🔑 Logging in... OK");
        Ok(())
    }

    async fn logout(&mut self) -> Result<(), CallError> {
        let request = self.client.get(self.endpoint.resource_url(self.api.logout_path()));
        let request = self.with_cookies(request);
        self.cookies.clear();
        self.csrf_token = None;

        request.send().await?.error_for_status()?;
        Ok(())
    }

    fn absorb_cookies(&mut self, response: &Response) {
        self.cookies.absorb(response.headers());
        self.csrf_token = self.cookies.get(self.api.csrf_cookie()).and_then(parse_csrf_token);
    }

    fn with_cookies(&self, request: RequestBuilder) -> RequestBuilder {
        match self.cookies.header_value() {
            Some(cookies) => request.header(COOKIE, cookies),
            None => request,
        }
    }

    fn authenticated(&self, request: RequestBuilder) -> Result<RequestBuilder, CallError> {
        let token = self.csrf_token.as_deref().ok_or(CallError::SessionExpired)?;
        Ok(self.with_cookies(request).header(self.api.csrf_header(), token))
    }

    async fn send(&mut self, request: RequestBuilder) -> Result<Response, CallError> {
        let response = request.send().await?;
        self.absorb_cookies(&response);

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(CallError::SessionExpired);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CallError::Status { status, body });
        }

        Ok(response)
    }
}

#[async_trait]
impl DeviceSession for HttpSession {
    fn device(&self) -> &DeviceId {
        self.endpoint.id()
    }

    #[instrument(skip_all, fields(device_id = %self.endpoint.id(), operation = %operation))]
    async fn call(&mut self, operation: &Operation) -> Result<Value, CallError> {
        let request = self.client.request(operation.method(), self.endpoint.resource_url(operation.path()));
        let mut request = self.authenticated(request)?;
        if let Some(body) = operation.body() {
            request = request.json(body);
        }

        let text = self.send(request).await?.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| CallError::InvalidBody(e.to_string()))
    }

    #[instrument(skip_all, fields(device_id = %self.endpoint.id()))]
    async fn fetch_backup(&mut self) -> Result<String, CallError> {
        let request = self.client.get(self.endpoint.resource_url(self.api.backup_path()));
        let request = self.authenticated(request)?;

        let text = self.send(request).await?.text().await?;
        Ok(text)
    }

    #[instrument(skip_all, fields(device_id = %self.endpoint.id()))]
    async fn reauthenticate(&mut self) -> Result<(), AuthError> {
        self.cookies.clear();
        self.csrf_token = None;
        self.login().await
    }

    #[instrument(skip_all, fields(device_id = %self.endpoint.id()))]
    async fn close(&mut self) -> Result<(), CallError> {
        if self.csrf_token.is_none() && self.cookies.is_empty() {
            return Ok(());
        }

        self.logout().await
    }
}
