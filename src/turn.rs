use log::{info, warn};
use std::sync::Arc;

use crate::config::Config;
use crate::error::CallError;
use crate::format::{FormattedReply, format_reply};
use crate::llm::{ChatBackend, ChatReply, ChatRequest, LlmEvent};
use crate::session::Session;

/// Per-call parameters that do not change between turns
#[derive(Debug, Clone)]
pub struct TurnSettings {
    pub model: String,
    pub system_prompt: String,
    pub marker: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

impl TurnSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.model.clone(),
            system_prompt: config.language.system_prompt().to_string(),
            marker: config.language.marker().to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            stream: config.stream,
        }
    }
}

/// The model's answer to one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub raw: String,
    pub formatted: FormattedReply,
}

#[derive(Debug)]
pub enum TurnOutcome {
    /// Nothing was sent; the input was blank
    Skipped,
    Answered(Answer),
    /// The call failed; the user message stays unanswered
    Failed(CallError),
}

/// Result of handling one submission: the session to use next and what to show
#[derive(Debug)]
pub struct Turn {
    pub session: Session,
    pub outcome: TurnOutcome,
}

/// Handles one user submission at a time against a chat backend
#[derive(Clone)]
pub struct TurnHandler {
    backend: Arc<dyn ChatBackend>,
    settings: TurnSettings,
}

impl TurnHandler {
    pub fn new(backend: Arc<dyn ChatBackend>, settings: TurnSettings) -> Self {
        Self { backend, settings }
    }

    pub fn settings(&self) -> &TurnSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut TurnSettings {
        &mut self.settings
    }

    /// Handle a submission without observing fragments
    pub async fn handle(&self, session: Session, input: &str) -> Turn {
        self.handle_with(session, input, |_| {}).await
    }

    /// Handle a submission. `on_fragment` sees each streamed fragment in
    /// arrival order; for non-streaming calls it sees the whole reply once.
    pub async fn handle_with<F>(&self, mut session: Session, input: &str, mut on_fragment: F) -> Turn
    where
        F: FnMut(&str) + Send,
    {
        let input = input.trim();
        if input.is_empty() {
            return Turn {
                session,
                outcome: TurnOutcome::Skipped,
            };
        }

        session.begin_turn(input);
        let request = ChatRequest {
            model: self.settings.model.clone(),
            messages: session.request_messages(&self.settings.system_prompt),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            stream: self.settings.stream,
        };
        info!(
            "Session {} turn: {} chars, {} messages",
            session.id(),
            input.len(),
            request.messages.len()
        );

        let outcome = match self.call(&request, &mut on_fragment).await {
            Ok(raw) => {
                session.record_reply(raw.clone());
                let formatted = format_reply(&raw, &self.settings.marker);
                TurnOutcome::Answered(Answer { raw, formatted })
            }
            Err(e) => {
                warn!("Session {} call failed: {}", session.id(), e);
                TurnOutcome::Failed(e)
            }
        };

        Turn { session, outcome }
    }

    async fn call<F>(&self, request: &ChatRequest, on_fragment: &mut F) -> Result<String, CallError>
    where
        F: FnMut(&str) + Send,
    {
        match self.backend.send(request).await? {
            ChatReply::Complete(text) => {
                on_fragment(&text);
                Ok(text)
            }
            ChatReply::Stream(mut rx) => {
                let mut text = String::new();
                while let Some(event) = rx.recv().await {
                    match event {
                        LlmEvent::TextDelta(delta) => {
                            on_fragment(&delta);
                            text.push_str(&delta);
                        }
                        LlmEvent::StreamComplete => break,
                        LlmEvent::Error(e) => return Err(e),
                    }
                }
                Ok(text)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::events::ConversationRole;
    use crate::session::MemoryPolicy;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// Backend answering from a fixed script and recording requests
    pub(crate) struct ScriptedBackend {
        pub replies: Mutex<Vec<Result<Vec<String>, CallError>>>,
        pub requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedBackend {
        pub(crate) fn new(replies: Vec<Result<Vec<&str>, CallError>>) -> Arc<Self> {
            let replies = replies
                .into_iter()
                .rev()
                .map(|r| r.map(|parts| parts.into_iter().map(String::from).collect()))
                .collect();
            Arc::new(Self {
                replies: Mutex::new(replies),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn next(&self, request: &ChatRequest) -> Result<Vec<String>, CallError> {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(CallError::Empty))
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn complete(&self, request: &ChatRequest) -> Result<String, CallError> {
            self.next(request).map(|parts| parts.concat())
        }

        async fn stream(&self, request: &ChatRequest) -> Result<mpsc::Receiver<LlmEvent>, CallError> {
            let parts = self.next(request)?;
            let (tx, rx) = mpsc::channel(parts.len() + 1);
            for part in parts {
                tx.send(LlmEvent::TextDelta(part)).await.unwrap();
            }
            tx.send(LlmEvent::StreamComplete).await.unwrap();
            Ok(rx)
        }
    }

    fn settings(stream: bool) -> TurnSettings {
        TurnSettings {
            model: "m".to_string(),
            system_prompt: "SYSTEM".to_string(),
            marker: "### MARKER".to_string(),
            temperature: 0.7,
            max_tokens: 2048,
            stream,
        }
    }

    #[tokio::test]
    async fn streamed_turn_formats_and_records_the_reply() {
        let backend = ScriptedBackend::new(vec![Ok(vec!["intro\n### MAR", "KER\n> line one\n", ">line two\nplain"])]);
        let handler = TurnHandler::new(backend.clone(), settings(true));
        let session = Session::new(MemoryPolicy::SingleTurn, None);

        let mut seen = Vec::new();
        let turn = handler
            .handle_with(session, "make a travel bot", |f| seen.push(f.to_string()))
            .await;

        assert_eq!(seen.len(), 3);
        let TurnOutcome::Answered(answer) = turn.outcome else {
            panic!("expected an answer");
        };
        assert_eq!(answer.formatted.preamble.as_deref(), Some("intro\n"));
        assert_eq!(answer.formatted.body, "### MARKER\nline one\nline two\nplain");
        assert_eq!(turn.session.len(), 2);

        let requests = backend.requests.lock().unwrap();
        let sent = &requests[0];
        assert!(sent.stream);
        assert_eq!(sent.messages[0].role, ConversationRole::System);
        assert_eq!(sent.messages[0].content, "SYSTEM");
        assert_eq!(sent.messages[1].content, "make a travel bot");
    }

    #[tokio::test]
    async fn each_submission_resets_single_turn_session() {
        let backend = ScriptedBackend::new(vec![Ok(vec!["one"]), Ok(vec!["two"])]);
        let handler = TurnHandler::new(backend.clone(), settings(false));
        let session = Session::new(MemoryPolicy::SingleTurn, Some("SEED".into()));
        assert_eq!(session.len(), 1);

        let turn = handler.handle(session, "first").await;
        assert_eq!(turn.session.len(), 3);

        let turn = handler.handle(turn.session, "second").await;
        assert_eq!(turn.session.len(), 3);
        assert_eq!(turn.session.messages()[1].content, "second");
        assert_eq!(turn.session.messages()[2].content, "two");

        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests[1].messages.len(), 2);
        assert_eq!(requests[1].messages[0].content, "SEED");
    }

    #[tokio::test]
    async fn multi_turn_session_sends_history() {
        let backend = ScriptedBackend::new(vec![Ok(vec!["one"]), Ok(vec!["two"])]);
        let handler = TurnHandler::new(backend.clone(), settings(false));
        let session = Session::new(MemoryPolicy::MultiTurn, None);

        let turn = handler.handle(session, "first").await;
        let turn = handler.handle(turn.session, "second").await;
        assert_eq!(turn.session.len(), 4);

        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests[1].messages.len(), 4);
    }

    #[tokio::test]
    async fn failed_call_leaves_user_message_unanswered() {
        let backend = ScriptedBackend::new(vec![Err(CallError::Api {
            status: 429,
            body: "rate limit".into(),
        })]);
        let handler = TurnHandler::new(backend, settings(true));
        let session = Session::new(MemoryPolicy::SingleTurn, None);

        let turn = handler.handle(session, "hello").await;
        match turn.outcome {
            TurnOutcome::Failed(e) => assert!(e.to_string().contains("rate limit")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(turn.session.len(), 1);
        assert!(turn.session.awaiting_reply());
    }

    #[tokio::test]
    async fn blank_input_is_not_sent() {
        let backend = ScriptedBackend::new(vec![]);
        let handler = TurnHandler::new(backend.clone(), settings(false));
        let session = Session::new(MemoryPolicy::SingleTurn, None);

        let turn = handler.handle(session, "   ").await;
        assert!(matches!(turn.outcome, TurnOutcome::Skipped));
        assert!(turn.session.is_empty());
        assert!(backend.requests.lock().unwrap().is_empty());
    }
}
