use futures::future::BoxFuture;
use reqwest::Client;
use snafu::{ResultExt, ensure};

use super::endpoint::{
    BuildHttpClientSnafu, ChatRequest, ChatResponse, ChatbotEndpoint, DecodeResponseSnafu,
    EndpointConfig, EndpointResult, MissingApiKeySnafu, MissingChatbotIdSnafu, StatusSnafu,
    TransportSnafu,
};

pub const CHATBASE_ENDPOINT_ID: &str = "chatbase";
pub const DEFAULT_CHATBASE_ENDPOINT: &str = "https://www.chatbase.co/api/v1/chat";

/// Chatbase-compatible HTTP adapter.
///
/// No retry and no timeout beyond reqwest's defaults; one call per request.
pub struct ChatbaseEndpoint {
    config: EndpointConfig,
    client: Client,
}

impl ChatbaseEndpoint {
    pub fn new(mut config: EndpointConfig) -> EndpointResult<Self> {
        if config.endpoint.is_empty() {
            config.endpoint = DEFAULT_CHATBASE_ENDPOINT.to_string();
        }

        ensure!(
            !config.api_key.is_empty(),
            MissingApiKeySnafu {
                stage: "chatbase-endpoint-new",
                endpoint: config.endpoint.clone(),
            }
        );
        ensure!(
            !config.chatbot_id.is_empty(),
            MissingChatbotIdSnafu {
                stage: "chatbase-endpoint-new",
                endpoint: config.endpoint.clone(),
            }
        );

        let client = Client::builder().build().context(BuildHttpClientSnafu {
            stage: "build-client",
        })?;

        Ok(Self { config, client })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    async fn post_chat(&self, request: ChatRequest) -> EndpointResult<String> {
        let response = self
            .client
            .post(self.config.endpoint.as_str())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .context(TransportSnafu {
                stage: "send-chat-request",
            })?;

        let status = response.status();
        let payload = response.text().await.context(TransportSnafu {
            stage: "read-chat-response",
        })?;

        if !status.is_success() {
            tracing::warn!(
                status = status.as_u16(),
                conversation_id = %request.conversation_id,
                body = %payload,
                "chatbot endpoint rejected request"
            );
            return StatusSnafu {
                stage: "chat-http-status",
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown Status"),
                body: payload,
            }
            .fail();
        }

        let parsed = serde_json::from_str::<ChatResponse>(&payload).context(DecodeResponseSnafu {
            stage: "decode-chat-response",
        })?;
        Ok(parsed.text)
    }
}

impl ChatbotEndpoint for ChatbaseEndpoint {
    fn id(&self) -> &str {
        CHATBASE_ENDPOINT_ID
    }

    fn chatbot_id(&self) -> &str {
        &self.config.chatbot_id
    }

    fn complete<'a>(&'a self, request: ChatRequest) -> BoxFuture<'a, EndpointResult<String>> {
        Box::pin(self.post_chat(request))
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;

    use super::*;
    use crate::endpoint::{EndpointError, WireMessage, WireRole};

    /// Accepts one connection, captures the raw request and answers with a canned response.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local addr");
        let (request_tx, request_rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket
                .write_all(response.as_bytes())
                .await
                .expect("write response");
            let _ = socket.shutdown().await;
            let _ = request_tx.send(request);
        });

        (format!("http://{address}/api/v1/chat"), request_rx)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buffer = Vec::new();
        let mut chunk = [0_u8; 4096];

        loop {
            let read = socket.read(&mut chunk).await.expect("read request");
            if read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);

            let Some(header_end) = buffer.windows(4).position(|window| window == b"\r\n\r\n")
            else {
                continue;
            };
            let headers = String::from_utf8_lossy(&buffer[..header_end]).to_ascii_lowercase();
            let content_length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buffer.len() >= header_end + 4 + content_length {
                break;
            }
        }

        String::from_utf8_lossy(&buffer).into_owned()
    }

    fn endpoint_for(url: &str) -> ChatbaseEndpoint {
        ChatbaseEndpoint::new(EndpointConfig::new(url, "secret-key", "bot-1")).expect("endpoint")
    }

    fn request() -> ChatRequest {
        ChatRequest::new(
            "bot-1",
            "conversation-1",
            vec![WireMessage::new(WireRole::User, "שלום")],
        )
    }

    #[test]
    fn blank_credentials_are_rejected() {
        let missing_key = ChatbaseEndpoint::new(EndpointConfig::new("", " ", "bot"));
        assert!(matches!(missing_key, Err(EndpointError::MissingApiKey { .. })));

        let missing_bot = ChatbaseEndpoint::new(EndpointConfig::new("", "key", ""));
        assert!(matches!(
            missing_bot,
            Err(EndpointError::MissingChatbotId { .. })
        ));

        let defaulted = ChatbaseEndpoint::new(EndpointConfig::new("", "key", "bot")).expect("ok");
        assert_eq!(defaulted.endpoint(), DEFAULT_CHATBASE_ENDPOINT);
    }

    #[tokio::test]
    async fn success_returns_text_and_sends_bearer_json() {
        let (url, captured) = serve_once("200 OK", r#"{"text":"הי! איך אפשר לעזור?"}"#).await;
        let endpoint = endpoint_for(&url);

        let text = endpoint.complete(request()).await.expect("reply");
        assert_eq!(text, "הי! איך אפשר לעזור?");

        let raw = captured.await.expect("captured request");
        let lowered = raw.to_ascii_lowercase();
        assert!(lowered.starts_with("post /api/v1/chat "));
        assert!(lowered.contains("authorization: bearer secret-key"));
        assert!(lowered.contains("content-type: application/json"));

        let body_start = raw.find("\r\n\r\n").expect("body separator") + 4;
        let body: serde_json::Value = serde_json::from_str(&raw[body_start..]).expect("json body");
        assert_eq!(body["chatbotId"], "bot-1");
        assert_eq!(body["conversationId"], "conversation-1");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "שלום");
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let (url, _captured) = serve_once("500 Internal Server Error", r#"{"message":"boom"}"#).await;
        let error = endpoint_for(&url)
            .complete(request())
            .await
            .expect_err("500 must fail");

        match error {
            EndpointError::Status {
                status,
                reason,
                body,
                ..
            } => {
                assert_eq!(status, 500);
                assert_eq!(reason, "Internal Server Error");
                assert!(body.contains("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let (url, _captured) = serve_once("200 OK", r#"{"answer":"wrong field"}"#).await;
        let error = endpoint_for(&url)
            .complete(request())
            .await
            .expect_err("missing text must fail");
        assert!(matches!(error, EndpointError::DecodeResponse { .. }));
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local addr");
        drop(listener);

        let error = endpoint_for(&format!("http://{address}/api/v1/chat"))
            .complete(request())
            .await
            .expect_err("closed port must fail");
        assert!(matches!(error, EndpointError::Transport { .. }));
    }
}
