use reqwest::header::{HeaderMap, SET_COOKIE};

/// Cookies received from one device during one session.
#[derive(Debug, Default, Clone)]
pub struct CookieJar {
    cookies: Vec<(String, String)>,
}

impl CookieJar {
    pub fn absorb(&mut self, headers: &HeaderMap) {
        for value in headers.get_all(SET_COOKIE) {
            if let Some((name, value)) = value.to_str().ok().and_then(parse_set_cookie) {
                self.insert(name, value);
            }
        }
    }

    /// An empty value removes the cookie, which is how devices expire them on logout.
    pub fn insert(&mut self, name: &str, value: &str) {
        self.cookies.retain(|(existing, _)| existing != name);
        if !value.is_empty() && value != "\"\"" {
            self.cookies.push((name.to_string(), value.to_string()));
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.iter().find(|(existing, _)| existing == name).map(|(_, value)| value.as_str())
    }

    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }

        Some(self.cookies.iter().map(|(name, value)| format!("{}={}", name, value)).collect::<Vec<_>>().join("; "))
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn clear(&mut self) {
        self.cookies.clear();
    }
}

fn parse_set_cookie(header: &str) -> Option<(&str, &str)> {
    let pair = header.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    Some((name, value.trim()))
}

/// Extracts the anti-forgery token from its cookie value. Devices deliver it either bare or as a quoted string.
pub fn parse_csrf_token(cookie_value: &str) -> Option<String> {
    let value = cookie_value.trim();
    let token = value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(value);

    if token.is_empty() || token.contains('"') {
        return None;
    }

    Some(token.to_string())
}
