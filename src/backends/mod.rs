//! Backend protocol adapters and the transport contract they share.

pub mod http;
pub mod media;
pub mod navidrome;
pub mod subsonic;

use serde_json::Value;

use crate::error::BackendError;
use crate::model::ServerType;

/// Server descriptor every backend call is made against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerContext {
    pub id: String,
    pub name: String,
    /// Base URL without trailing slash.
    pub url: String,
    pub username: String,
    pub server_type: ServerType,
    /// Subsonic query credential fragment, e.g. `u=alice&s=abc&t=...`.
    pub credential: String,
    /// Navidrome native API bearer token.
    pub navidrome_token: Option<String>,
}

impl ServerContext {
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        server_type: ServerType,
        credential: impl Into<String>,
    ) -> Self {
        let url: String = url.into();
        Self {
            id: id.into(),
            name: String::new(),
            url: url.trim().trim_end_matches('/').to_string(),
            username: String::new(),
            server_type,
            credential: credential.into(),
            navidrome_token: None,
        }
    }
}

/// Which API surface a request targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Subsonic REST method name, e.g. `getSong`.
    Subsonic(&'static str),
    /// Navidrome native API path below `/api/`, e.g. `song/42`.
    Navidrome(String),
}

/// Abstract request handed to the transport; the transport owns URL building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendRequest {
    /// Logical operation name, used for logging and error context.
    pub operation: &'static str,
    pub endpoint: Endpoint,
    /// Query parameters; keys may repeat.
    pub params: Vec<(String, String)>,
    /// Send `params` as a form-encoded POST body instead of the query string.
    pub form: bool,
}

impl BackendRequest {
    pub fn subsonic(operation: &'static str, method: &'static str) -> Self {
        Self {
            operation,
            endpoint: Endpoint::Subsonic(method),
            params: Vec::new(),
            form: false,
        }
    }

    pub fn navidrome(operation: &'static str, path: impl Into<String>) -> Self {
        Self {
            operation,
            endpoint: Endpoint::Navidrome(path.into()),
            params: Vec::new(),
            form: false,
        }
    }

    pub fn form_encoded(mut self) -> Self {
        self.form = true;
        self
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    pub fn params<I, V>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        for value in values {
            self.params.push((key.to_string(), value.to_string()));
        }
        self
    }
}

/// Send a query, get the raw JSON body back.
///
/// Implementations map non-2xx responses, protocol failures and I/O errors to
/// [`BackendError`] and do not retry.
pub trait Transport: Send + Sync {
    fn invoke(&self, server: &ServerContext, request: &BackendRequest)
        -> Result<Value, BackendError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use serde_json::Value;

    use super::{BackendRequest, Endpoint, ServerContext, Transport};
    use crate::error::BackendError;

    /// In-memory transport answering from canned payloads.
    ///
    /// Routes are the Subsonic method name or the Navidrome path; a route
    /// suffixed with `:<id>` only answers requests whose `id` parameter matches.
    #[derive(Default)]
    pub struct FakeTransport {
        responses: Mutex<HashMap<String, Result<Value, BackendError>>>,
        requests: Mutex<Vec<BackendRequest>>,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(&self, route: &str, payload: Value) -> &Self {
            self.responses
                .lock()
                .unwrap()
                .insert(route.to_string(), Ok(payload));
            self
        }

        pub fn fail(&self, route: &str, error: BackendError) -> &Self {
            self.responses
                .lock()
                .unwrap()
                .insert(route.to_string(), Err(error));
            self
        }

        pub fn requests(&self) -> Vec<BackendRequest> {
            self.requests.lock().unwrap().clone()
        }

        fn route(request: &BackendRequest) -> String {
            match &request.endpoint {
                Endpoint::Subsonic(method) => method.to_string(),
                Endpoint::Navidrome(path) => path.clone(),
            }
        }
    }

    impl Transport for FakeTransport {
        fn invoke(
            &self,
            _server: &ServerContext,
            request: &BackendRequest,
        ) -> Result<Value, BackendError> {
            self.requests.lock().unwrap().push(request.clone());
            let route = Self::route(request);
            let id = request
                .params
                .iter()
                .find(|(key, _)| key == "id")
                .map(|(_, value)| value.clone());
            let responses = self.responses.lock().unwrap();
            id.and_then(|id| responses.get(&format!("{route}:{id}")))
                .or_else(|| responses.get(&route))
                .cloned()
                .unwrap_or_else(|| Err(BackendError::http(404, format!("no route for {route}"))))
        }
    }

    /// Wraps a payload in an ok Subsonic envelope.
    pub fn subsonic_ok(key: &str, payload: Value) -> Value {
        let mut body = serde_json::Map::new();
        body.insert("status".to_string(), Value::from("ok"));
        body.insert("version".to_string(), Value::from("1.16.1"));
        if !key.is_empty() {
            body.insert(key.to_string(), payload);
        }
        serde_json::json!({ "subsonic-response": body })
    }
}
