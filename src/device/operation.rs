use reqwest::Method;
use serde_json::Value;
use std::fmt;

/// An authenticated call against the device API.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Get { path: String },
    Create { path: String, body: Value },
    Update { path: String, body: Value },
    Delete { path: String },
}

impl Operation {
    pub fn get(path: impl Into<String>) -> Self {
        Operation::Get { path: path.into() }
    }

    pub fn path(&self) -> &str {
        match self {
            Operation::Get { path } | Operation::Create { path, .. } | Operation::Update { path, .. } | Operation::Delete { path } => path,
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Operation::Get { .. } => Method::GET,
            Operation::Create { .. } => Method::POST,
            Operation::Update { .. } => Method::PUT,
            Operation::Delete { .. } => Method::DELETE,
        }
    }

    pub fn body(&self) -> Option<&Value> {
        match self {
            Operation::Create { body, .. } | Operation::Update { body, .. } => Some(body),
            Operation::Get { .. } | Operation::Delete { .. } => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method(), self.path())
    }
}
