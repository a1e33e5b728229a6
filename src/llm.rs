use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, info, warn};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Duration;

use crate::config::Config;
use crate::error::CallError;
use crate::events::Message;

/// Events emitted while a streamed reply arrives
#[derive(Debug)]
pub enum LlmEvent {
    /// Text delta from streaming response
    TextDelta(String),
    /// Stream completed
    StreamComplete,
    /// Error occurred; no further events follow
    Error(CallError),
}

/// Request to send to the model
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

/// What a call returns: the whole text, or fragments to be concatenated in
/// arrival order. The receiver is finite and can only be consumed once.
#[derive(Debug)]
pub enum ChatReply {
    Complete(String),
    Stream(mpsc::Receiver<LlmEvent>),
}

/// A hosted chat model
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send the request and wait for the whole reply
    async fn complete(&self, request: &ChatRequest) -> Result<String, CallError>;

    /// Send the request and receive the reply incrementally
    async fn stream(&self, request: &ChatRequest) -> Result<mpsc::Receiver<LlmEvent>, CallError>;

    /// Dispatch on the request's streaming flag
    async fn send(&self, request: &ChatRequest) -> Result<ChatReply, CallError> {
        if request.stream {
            self.stream(request).await.map(ChatReply::Stream)
        } else {
            self.complete(request).await.map(ChatReply::Complete)
        }
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Client for OpenAI-compatible chat-completions endpoints (Groq, OpenAI,
/// OpenRouter, local servers)
#[derive(Clone)]
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    base_url: String,
}

impl OpenAiCompatClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, CallError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| CallError::InvalidKey(e.to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build a client for the configured provider
    pub fn from_config(config: &Config, api_key: &str) -> anyhow::Result<Self> {
        let provider = config.current_provider()?;
        Ok(Self::new(
            &provider.base_url,
            api_key,
            Duration::from_secs(config.timeout_secs),
        )?)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn post(&self, request: &ChatRequest, stream: bool) -> Result<reqwest::Response, CallError> {
        let mut payload = request.clone();
        payload.stream = stream;

        info!(
            "POST {} model={} messages={} stream={}",
            self.endpoint(),
            payload.model,
            payload.messages.len(),
            stream
        );

        let response = self.http.post(self.endpoint()).json(&payload).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<ApiErrorBody>(&text)
            .map(|b| b.error.message)
            .unwrap_or(text);
        warn!("API returned {}: {}", status, body);
        Err(CallError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ChatBackend for OpenAiCompatClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, CallError> {
        let response = self.post(request, false).await?;
        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| CallError::Malformed(e.to_string()))?;

        let choice = body.choices.into_iter().next().ok_or(CallError::Empty)?;
        Ok(choice.message.content.unwrap_or_default())
    }

    async fn stream(&self, request: &ChatRequest) -> Result<mpsc::Receiver<LlmEvent>, CallError> {
        let response = self.post(request, true).await?;
        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            if let Err(e) = process_sse_stream(response, &tx).await {
                let _ = tx.send(LlmEvent::Error(e)).await;
            }
        });

        Ok(rx)
    }
}

/// Forward the deltas of a Server-Sent Events body until `[DONE]`, a finish
/// reason, or the end of the body.
async fn process_sse_stream(
    response: reqwest::Response,
    tx: &mpsc::Sender<LlmEvent>,
) -> Result<(), CallError> {
    let mut stream = response.bytes_stream();
    let mut decoder = SseDecoder::default();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        for item in decoder.feed(&chunk)? {
            if !forward(item, tx).await {
                return Ok(());
            }
        }
    }

    for item in decoder.finish()? {
        if !forward(item, tx).await {
            return Ok(());
        }
    }
    let _ = tx.send(LlmEvent::StreamComplete).await;
    Ok(())
}

/// Returns false once the stream is over or the receiver is gone
async fn forward(item: SseItem, tx: &mpsc::Sender<LlmEvent>) -> bool {
    match item {
        SseItem::Delta(text) => tx.send(LlmEvent::TextDelta(text)).await.is_ok(),
        SseItem::Done => {
            let _ = tx.send(LlmEvent::StreamComplete).await;
            false
        }
    }
}

#[derive(Debug, PartialEq)]
enum SseItem {
    Delta(String),
    Done,
}

/// Line splitter for `data:` events. Buffers bytes so that lines and UTF-8
/// sequences split across network chunks are reassembled.
#[derive(Default)]
struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    fn feed(&mut self, bytes: &[u8]) -> Result<Vec<SseItem>, CallError> {
        self.buffer.extend_from_slice(bytes);
        let mut items = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.decode_line(&line, &mut items)?;
        }
        Ok(items)
    }

    /// Flush a last line that had no trailing newline
    fn finish(&mut self) -> Result<Vec<SseItem>, CallError> {
        let line = std::mem::take(&mut self.buffer);
        let mut items = Vec::new();
        self.decode_line(&line, &mut items)?;
        Ok(items)
    }

    fn decode_line(&mut self, line: &[u8], items: &mut Vec<SseItem>) -> Result<(), CallError> {
        if self.done {
            return Ok(());
        }
        let line = String::from_utf8_lossy(line);
        let Some(data) = line.trim().strip_prefix("data:") else {
            return Ok(());
        };
        let data = data.trim_start();

        if data == "[DONE]" {
            self.done = true;
            items.push(SseItem::Done);
            return Ok(());
        }

        if let Ok(body) = serde_json::from_str::<ApiErrorBody>(data) {
            return Err(CallError::Stream(body.error.message));
        }

        let chunk: StreamChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                debug!("Skipping unparsable stream line {:?}: {}", data, e);
                return Ok(());
            }
        };

        for choice in chunk.choices {
            if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                items.push(SseItem::Delta(content));
            }
            if choice.finish_reason.is_some() {
                self.done = true;
                items.push(SseItem::Done);
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Message;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(stream: bool) -> ChatRequest {
        ChatRequest {
            model: "test-model".to_string(),
            messages: vec![Message::system("sys"), Message::user("hi")],
            temperature: 0.7,
            max_tokens: 2048,
            stream,
        }
    }

    fn client(server: &MockServer) -> OpenAiCompatClient {
        OpenAiCompatClient::new(&server.uri(), "secret", Duration::from_secs(5)).unwrap()
    }

    fn delta(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({ "choices": [{ "delta": { "content": text }, "finish_reason": null }] })
        )
    }

    async fn collect(mut rx: mpsc::Receiver<LlmEvent>) -> Result<String, CallError> {
        let mut text = String::new();
        while let Some(event) = rx.recv().await {
            match event {
                LlmEvent::TextDelta(delta) => text.push_str(&delta),
                LlmEvent::StreamComplete => break,
                LlmEvent::Error(e) => return Err(e),
            }
        }
        Ok(text)
    }

    #[test]
    fn decoder_reassembles_split_lines_and_characters() {
        let line = delta("최적화");
        let bytes = line.as_bytes();
        // Split inside the first multi-byte character.
        let cut = line.find('최').unwrap() + 1;

        let mut decoder = SseDecoder::default();
        assert!(decoder.feed(&bytes[..cut]).unwrap().is_empty());
        let items = decoder.feed(&bytes[cut..]).unwrap();
        assert_eq!(items, vec![SseItem::Delta("최적화".to_string())]);
    }

    #[test]
    fn decoder_stops_at_done_and_ignores_noise() {
        let mut decoder = SseDecoder::default();
        let body = format!(": keep-alive\n{}data: [DONE]\n{}", delta("a"), delta("late"));
        let items = decoder.feed(body.as_bytes()).unwrap();
        assert_eq!(items, vec![SseItem::Delta("a".into()), SseItem::Done]);
    }

    #[test]
    fn decoder_flushes_unterminated_last_line() {
        let mut decoder = SseDecoder::default();
        let line = delta("tail");
        assert!(decoder.feed(line.trim_end().as_bytes()).unwrap().is_empty());
        assert_eq!(decoder.finish().unwrap(), vec![SseItem::Delta("tail".into())]);
    }

    #[test]
    fn decoder_ends_on_finish_reason() {
        let mut decoder = SseDecoder::default();
        let stop = "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n";
        let items = decoder.feed(stop.as_bytes()).unwrap();
        assert_eq!(items, vec![SseItem::Done]);
    }

    #[test]
    fn decoder_surfaces_in_stream_errors() {
        let mut decoder = SseDecoder::default();
        let line = "data: {\"error\":{\"message\":\"rate limited\"}}\n";
        let err = decoder.feed(line.as_bytes()).unwrap_err();
        assert!(matches!(err, CallError::Stream(ref m) if m == "rate limited"));
    }

    #[tokio::test]
    async fn complete_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(serde_json::json!({
                "model": "test-model",
                "stream": false,
                "max_tokens": 2048,
                "messages": [
                    { "role": "system", "content": "sys" },
                    { "role": "user", "content": "hi" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "hello" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = client(&server).complete(&request(false)).await.unwrap();
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn empty_choices_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let err = client(&server).complete(&request(false)).await.unwrap_err();
        assert!(matches!(err, CallError::Empty));
    }

    #[tokio::test]
    async fn error_status_carries_api_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": { "message": "Invalid API Key" }
            })))
            .mount(&server)
            .await;

        let err = client(&server).complete(&request(false)).await.unwrap_err();
        match err {
            CallError::Api { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "Invalid API Key");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = client(&server).stream(&request(true)).await.unwrap_err();
        assert!(matches!(err, CallError::Api { status: 401, .. }));
    }

    #[tokio::test]
    async fn stream_concatenates_fragments_in_order() {
        let server = MockServer::start().await;
        let body = format!("{}{}{}data: [DONE]\n\n", delta("### ✨ "), delta("Optimized"), delta(" Prompt"));
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({ "stream": true })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        let rx = client(&server).stream(&request(true)).await.unwrap();
        assert_eq!(collect(rx).await.unwrap(), "### ✨ Optimized Prompt");
    }

    #[tokio::test]
    async fn send_dispatches_on_stream_flag() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({ "stream": false })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "content": "whole" } }]
            })))
            .mount(&server)
            .await;

        match client(&server).send(&request(false)).await.unwrap() {
            ChatReply::Complete(text) => assert_eq!(text, "whole"),
            ChatReply::Stream(_) => panic!("expected a complete reply"),
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let client =
            OpenAiCompatClient::new("http://127.0.0.1:9", "secret", Duration::from_secs(2)).unwrap();
        let err = client.complete(&request(false)).await.unwrap_err();
        assert!(matches!(err, CallError::Transport(_)));
    }
}
