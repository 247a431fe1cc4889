// src/llm/mod.rs

use crate::context::{AgentConfig, DEFAULT_CHAT_ENDPOINT, Provider};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

/// Marker a service uses to flag its own fault in an error message.
pub const SERVER_ERROR_MARKER: &str = "server error";

const ACTION_CLOSE_TAG: &str = "</Action>";

/// Whether a failed completion call is safe to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Service-side or operational fault.
    Transient,
    /// Request or validation fault.
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ClientError {
    pub kind: FaultKind,
    pub message: String,
}

impl ClientError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Transient,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Fatal,
            message: message.into(),
        }
    }

    /// Classifies a bare error message: transient only when it carries the
    /// service's "server error" marker.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.contains(SERVER_ERROR_MARKER) {
            Self::transient(message)
        } else {
            Self::fatal(message)
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == FaultKind::Transient
    }
}

/// Token accounting reported by the service, when it reports any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub usage: Usage,
}

/// The remote completion service, as seen by the orchestrator.
pub trait CompletionClient {
    fn send(&self, system_message: &str, user_prompt: &str) -> Result<Completion, ClientError>;
}

impl<C: CompletionClient + ?Sized> CompletionClient for Box<C> {
    fn send(&self, system_message: &str, user_prompt: &str) -> Result<Completion, ClientError> {
        (**self).send(system_message, user_prompt)
    }
}

/// Trims the completion and restores the `</Action>` tag the service drops
/// when it is configured as a stop sequence.
pub fn restore_action_close(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.contains(ACTION_CLOSE_TAG) {
        trimmed.to_string()
    } else {
        format!("{trimmed}{ACTION_CLOSE_TAG}")
    }
}

fn build_http_client(config: &AgentConfig) -> Result<Client, ClientError> {
    Client::builder()
        .timeout(config.request_timeout)
        .build()
        .map_err(|e| ClientError::fatal(format!("Failed to build HTTP client: {e}")))
}

fn classify_transport(err: reqwest::Error) -> ClientError {
    if err.is_timeout() || err.is_connect() {
        ClientError::transient(format!("Request failed: {err}"))
    } else {
        ClientError::fatal(format!("Request failed: {err}"))
    }
}

/// Maps a non-success HTTP response to a classified error. The body's
/// `error.message` is preferred over the bare status line.
fn classify_status(status: StatusCode, body: &str) -> ClientError {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("HTTP {status}"));

    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        ClientError::transient(format!("{SERVER_ERROR_MARKER} ({status}): {detail}"))
    } else {
        ClientError::from_message(detail)
    }
}

fn read_json(response: Response) -> Result<Value, ClientError> {
    let status = response.status();
    let body = response.text().map_err(classify_transport)?;
    if !status.is_success() {
        return Err(classify_status(status, &body));
    }
    serde_json::from_str(&body)
        .map_err(|e| ClientError::fatal(format!("Failed to parse JSON: {e}")))
}

/// Posts `{systemMessage, userPrompt}` to a webhook that answers `{text}`.
pub struct WebhookClient {
    endpoint: String,
    http: Client,
}

impl WebhookClient {
    pub fn new(config: &AgentConfig) -> Result<Self, ClientError> {
        Ok(Self {
            endpoint: config.endpoint.clone(),
            http: build_http_client(config)?,
        })
    }
}

impl CompletionClient for WebhookClient {
    fn send(&self, system_message: &str, user_prompt: &str) -> Result<Completion, ClientError> {
        let payload = json!({
            "systemMessage": system_message,
            "userPrompt": user_prompt,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .map_err(classify_transport)?;
        let json = read_json(response)?;

        let text = json
            .get("text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ClientError::fatal("Completion response missing 'text' field"))?;

        Ok(Completion {
            text: restore_action_close(text),
            usage: Usage::default(),
        })
    }
}

/// OpenAI-compatible chat-completions client.
pub struct ChatCompletionClient {
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    http: Client,
}

impl ChatCompletionClient {
    pub fn new(config: &AgentConfig) -> Result<Self, ClientError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ClientError::fatal("No API key configured"))?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            http: build_http_client(config)?,
        })
    }

    fn payload(&self, system_message: &str, user_prompt: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_message },
                { "role": "user", "content": user_prompt },
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "stop": [ACTION_CLOSE_TAG],
        })
    }
}

impl CompletionClient for ChatCompletionClient {
    fn send(&self, system_message: &str, user_prompt: &str) -> Result<Completion, ClientError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.payload(system_message, user_prompt))
            .send()
            .map_err(classify_transport)?;
        let json = read_json(response)?;

        let text = json
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ClientError::fatal("Completion response missing message content"))?;
        let usage = json
            .get("usage")
            .cloned()
            .and_then(|u| serde_json::from_value::<Usage>(u).ok())
            .unwrap_or_default();

        Ok(Completion {
            text: restore_action_close(text),
            usage,
        })
    }
}

/// Builds the client matching `config.provider`. A webhook provider must be
/// given its own endpoint.
pub fn build_client(config: &AgentConfig) -> Result<Box<dyn CompletionClient>, ClientError> {
    if config.provider == Provider::Webhook && config.endpoint == DEFAULT_CHAT_ENDPOINT {
        return Err(ClientError::fatal(
            "Webhook provider requires an endpoint (set AGENT_ENDPOINT)",
        ));
    }
    Ok(match config.provider {
        Provider::Webhook => Box::new(WebhookClient::new(config)?),
        Provider::ChatCompletions => Box::new(ChatCompletionClient::new(config)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionRegistry;
    use crate::protocol::parse_response;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    /// Serves one connection on a local port. `reply` of `None` reads the
    /// request and then holds the connection open without answering.
    fn serve_once(reply: Option<String>) -> (String, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/next-action", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            read_request(&mut stream);
            match reply {
                Some(response) => {
                    let _ = stream.write_all(response.as_bytes());
                }
                None => thread::sleep(Duration::from_millis(1500)),
            }
        });
        (url, handle)
    }

    /// Drains headers and a `Content-Length` body so closing the socket
    /// does not reset the connection under the client.
    fn read_request(stream: &mut std::net::TcpStream) {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let Ok(n) = stream.read(&mut buf) else { return };
            if n == 0 {
                return;
            }
            data.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&data);
            if let Some(end) = text.find("\r\n\r\n") {
                let content_length = text[..end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if data.len() >= end + 4 + content_length {
                    return;
                }
            }
        }
    }

    fn http_response(status_line: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn webhook(url: &str, timeout: Duration) -> WebhookClient {
        let config = AgentConfig::new()
            .with_webhook(url)
            .with_request_timeout(timeout);
        WebhookClient::new(&config).unwrap()
    }

    #[test]
    fn elapsed_deadline_is_transient() {
        let (url, handle) = serve_once(None);
        let err = webhook(&url, Duration::from_millis(200))
            .send("sys", "user")
            .unwrap_err();
        assert_eq!(err.kind, FaultKind::Transient, "{err}");
        handle.join().unwrap();
    }

    #[test]
    fn server_fault_status_is_transient() {
        let (url, handle) = serve_once(Some(http_response("500 Internal Server Error", "")));
        let err = webhook(&url, Duration::from_secs(5))
            .send("sys", "user")
            .unwrap_err();
        assert!(err.is_transient(), "{err}");
        assert!(err.message.contains("500"));
        handle.join().unwrap();
    }

    #[test]
    fn client_fault_status_is_fatal() {
        let body = r#"{"error": {"message": "prompt too long"}}"#;
        let (url, handle) = serve_once(Some(http_response("400 Bad Request", body)));
        let err = webhook(&url, Duration::from_secs(5))
            .send("sys", "user")
            .unwrap_err();
        assert_eq!(err, ClientError::fatal("prompt too long"));
        handle.join().unwrap();
    }

    #[test]
    fn webhook_reply_restores_close_tag_and_parses() {
        let body = r#"{"text":"<Thought>a</Thought><Action>click(3)"}"#;
        let (url, handle) = serve_once(Some(http_response("200 OK", body)));
        let completion = webhook(&url, Duration::from_secs(5))
            .send("sys", "user")
            .unwrap();
        assert_eq!(completion.text, "<Thought>a</Thought><Action>click(3)</Action>");

        let parsed = parse_response(&completion.text, &ActionRegistry::default()).unwrap();
        assert_eq!(parsed.parsed_action.name, "click");
        handle.join().unwrap();
    }

    #[test]
    fn webhook_reply_without_text_is_fatal() {
        let (url, handle) = serve_once(Some(http_response("200 OK", r#"{"answer":"x"}"#)));
        let err = webhook(&url, Duration::from_secs(5))
            .send("sys", "user")
            .unwrap_err();
        assert_eq!(err.kind, FaultKind::Fatal);
        handle.join().unwrap();
    }

    #[test]
    fn webhook_provider_needs_its_own_endpoint() {
        let mut config = AgentConfig::new();
        config.provider = Provider::Webhook;
        let err = build_client(&config).err().unwrap();
        assert_eq!(err.kind, FaultKind::Fatal);
        assert!(err.to_string().contains("AGENT_ENDPOINT"));

        assert!(build_client(&config.with_endpoint("http://127.0.0.1:9/hook")).is_ok());
    }

    #[test]
    fn server_error_marker_is_transient() {
        assert!(ClientError::from_message("The server error occurred, retry").is_transient());
        assert_eq!(
            ClientError::from_message("Invalid API key").kind,
            FaultKind::Fatal
        );
    }

    #[test]
    fn status_classification() {
        let body = r#"{"error": {"message": "That model is currently overloaded"}}"#;
        let err = classify_status(StatusCode::SERVICE_UNAVAILABLE, body);
        assert!(err.is_transient());
        assert!(err.message.contains("overloaded"));

        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").is_transient());

        let err = classify_status(StatusCode::BAD_REQUEST, r#"{"error": {"message": "bad prompt"}}"#);
        assert_eq!(err, ClientError::fatal("bad prompt"));

        let err = classify_status(
            StatusCode::BAD_REQUEST,
            r#"{"error": {"message": "The server error was logged"}}"#,
        );
        assert!(err.is_transient());

        let err = classify_status(StatusCode::UNAUTHORIZED, "not json");
        assert_eq!(err.kind, FaultKind::Fatal);
        assert!(err.message.contains("401"));
    }

    #[test]
    fn close_tag_is_restored_once() {
        assert_eq!(
            restore_action_close("  <Thought>t</Thought>\n<Action>click(1)\n"),
            "<Thought>t</Thought>\n<Action>click(1)</Action>"
        );
        assert_eq!(
            restore_action_close("<Action>finish()</Action>"),
            "<Action>finish()</Action>"
        );
    }

    #[test]
    fn chat_payload_uses_stop_sequence() {
        let config = AgentConfig::default().with_api_key("sk-test").with_model("m1");
        let client = ChatCompletionClient::new(&config).unwrap();
        let payload = client.payload("sys", "user");
        assert_eq!(payload["model"], "m1");
        assert_eq!(payload["messages"][0]["role"], "system");
        assert_eq!(payload["messages"][1]["content"], "user");
        assert_eq!(payload["stop"][0], "</Action>");
        assert_eq!(payload["max_tokens"], 500);
    }

    #[test]
    fn chat_client_requires_key() {
        let err = ChatCompletionClient::new(&AgentConfig::default()).err().unwrap();
        assert_eq!(err.kind, FaultKind::Fatal);
    }
}
