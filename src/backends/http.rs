//! Blocking HTTP transport backed by `ureq`.

use std::time::Duration;

use log::debug;
use serde_json::Value;

use crate::backends::{BackendRequest, Endpoint, ServerContext, Transport};
use crate::error::BackendError;

const API_VERSION: &str = "1.16.1";
const CLIENT_ID: &str = "sonance";

/// Transport used against real servers.
pub struct UreqTransport {
    http_client: ureq::Agent,
}

impl UreqTransport {
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        let http_client = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .timeout_read(read_timeout)
            .timeout_write(read_timeout)
            .build();
        Self { http_client }
    }

    fn encode_params(params: &[(String, String)]) -> Vec<String> {
        params
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect()
    }

    fn subsonic_url(server: &ServerContext, method: &str, params: &[(String, String)]) -> String {
        let mut query_parts = vec![
            server.credential.clone(),
            format!("v={API_VERSION}"),
            format!("c={CLIENT_ID}"),
            "f=json".to_string(),
        ];
        query_parts.extend(Self::encode_params(params));
        format!("{}/rest/{}.view?{}", server.url, method, query_parts.join("&"))
    }

    fn navidrome_url(server: &ServerContext, path: &str, params: &[(String, String)]) -> String {
        let path = path.trim_start_matches('/');
        if params.is_empty() {
            format!("{}/api/{}", server.url, path)
        } else {
            format!(
                "{}/api/{}?{}",
                server.url,
                path,
                Self::encode_params(params).join("&")
            )
        }
    }

    fn check_subsonic_status(parsed: &Value) -> Result<(), BackendError> {
        let Some(body) = parsed.get("subsonic-response") else {
            return Ok(());
        };
        let status = body.get("status").and_then(Value::as_str).unwrap_or_default();
        if status == "ok" {
            return Ok(());
        }
        let error = body.get("error");
        let code = error
            .and_then(|value| value.get("code"))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let message = error
            .and_then(|value| value.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("server returned an error");
        Err(BackendError::protocol(code, message))
    }
}

impl Transport for UreqTransport {
    fn invoke(&self, server: &ServerContext, request: &BackendRequest) -> Result<Value, BackendError> {
        let operation = request.operation;
        let query_params: &[(String, String)] = if request.form { &[] } else { &request.params };
        let method = if request.form { "POST" } else { "GET" };
        let call = match &request.endpoint {
            Endpoint::Subsonic(rest_method) => self
                .http_client
                .request(method, &Self::subsonic_url(server, rest_method, query_params)),
            Endpoint::Navidrome(path) => {
                let call = self
                    .http_client
                    .request(method, &Self::navidrome_url(server, path, query_params));
                match server.navidrome_token.as_deref() {
                    Some(token) => call.set("x-nd-authorization", &format!("Bearer {token}")),
                    None => call,
                }
            }
        };
        debug!("UreqTransport: {} {} -> {}", method, operation, server.url);

        let sent = if request.form {
            let form: Vec<(&str, &str)> = request
                .params
                .iter()
                .map(|(key, value)| (key.as_str(), value.as_str()))
                .collect();
            call.send_form(&form)
        } else {
            call.call()
        };
        let response = sent.map_err(|err| match err {
            ureq::Error::Status(status, response) => {
                let body = response.into_string().unwrap_or_default();
                let message = if body.trim().is_empty() {
                    format!("{operation} failed")
                } else {
                    body
                };
                BackendError::http(status, message)
            }
            ureq::Error::Transport(transport) => {
                BackendError::transport(format!("{operation} request failed: {transport}"))
            }
        })?;
        let parsed: Value = response.into_json().map_err(|err| {
            BackendError::transport(format!("{operation} response parse failed: {err}"))
        })?;

        if matches!(request.endpoint, Endpoint::Subsonic(_)) {
            Self::check_subsonic_status(&parsed)?;
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::UreqTransport;
    use crate::backends::ServerContext;
    use crate::model::ServerType;
    use serde_json::json;

    fn server() -> ServerContext {
        ServerContext::new("s", "https://m.example/", ServerType::Navidrome, "u=a&s=b&t=c")
    }

    #[test]
    fn test_subsonic_url_appends_credential_and_encoded_params() {
        let url = UreqTransport::subsonic_url(
            &server(),
            "search3",
            &[("query".to_string(), "a b&c".to_string())],
        );
        assert_eq!(
            url,
            "https://m.example/rest/search3.view?u=a&s=b&t=c&v=1.16.1&c=sonance&f=json&query=a%20b%26c"
        );
    }

    #[test]
    fn test_navidrome_url_uses_native_api_prefix() {
        assert_eq!(
            UreqTransport::navidrome_url(&server(), "/song/42", &[]),
            "https://m.example/api/song/42"
        );
        assert_eq!(
            UreqTransport::navidrome_url(
                &server(),
                "song",
                &[("album_id".to_string(), "al-1".to_string())]
            ),
            "https://m.example/api/song?album_id=al-1"
        );
    }

    #[test]
    fn test_failed_subsonic_status_becomes_protocol_error() {
        let error = UreqTransport::check_subsonic_status(&json!({
            "subsonic-response": {
                "status": "failed",
                "error": { "code": 40, "message": "Wrong username or password" }
            }
        }))
        .unwrap_err();
        assert_eq!(error.code, Some(40));
        assert_eq!(error.message, "Wrong username or password");
        assert!(UreqTransport::check_subsonic_status(&json!({
            "subsonic-response": { "status": "ok" }
        }))
        .is_ok());
    }
}
