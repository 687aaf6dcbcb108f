use reqwest::Url;
use secrecy::SecretString;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        DeviceId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug)]
pub struct Credentials {
    username: String,
    password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<SecretString>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }
}

/// One managed appliance. Immutable for the duration of a run.
#[derive(Debug, Clone)]
pub struct DeviceEndpoint {
    id: DeviceId,
    url: Url,
    credentials: Arc<Credentials>,
}

impl DeviceEndpoint {
    pub fn new(id: DeviceId, url: Url, credentials: Arc<Credentials>) -> Self {
        DeviceEndpoint { id, url, credentials }
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Joins `path` onto the base URL, keeping any path prefix the base URL carries.
    pub fn resource_url(&self, path: &str) -> String {
        format!("{}/{}", self.url.as_str().trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn endpoint(url: &str) -> DeviceEndpoint {
        DeviceEndpoint::new(DeviceId::new("fw-1"), Url::parse(url).unwrap(), Arc::new(Credentials::new("admin", "secret")))
    }

    #[rstest]
    #[case("https://fw1", "/logincheck", "https://fw1/logincheck")]
    #[case("https://fw1/", "api/v2/cmdb/system/status", "https://fw1/api/v2/cmdb/system/status")]
    #[case("https://proxy/fw1", "/logout", "https://proxy/fw1/logout")]
    fn resource_url_joins_base_and_path(#[case] base: &str, #[case] path: &str, #[case] expected: &str) {
        assert_eq!(endpoint(base).resource_url(path), expected);
    }

    #[test]
    fn debug_output_hides_the_password() {
        let output = format!("{:?}", endpoint("https://fw1"));

        assert!(output.contains("admin"));
        assert!(!output.contains("secret"));
    }
}
