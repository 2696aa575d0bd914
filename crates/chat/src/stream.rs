// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chat streaming: LLM query wrapper emitting typed, SSE-framable events.
//!
//! The LLM is an opaque collaborator behind [`LlmClient`]; its native
//! event stream is translated here. Tool names lose their external
//! namespace prefix and tool inputs are truncated per value so the
//! dashboard rendering stays compact.

use crate::context;
use crate::tools::ToolPlane;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Longest string kept when rendering a tool input value.
const TOOL_INPUT_MAX: usize = 120;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM query failed: {0}")]
    Query(String),
}

/// Tool metadata handed to the LLM.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// One chat query as the client sees it.
pub struct LlmRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub session_id: Option<String>,
    pub tools: Vec<ToolDescriptor>,
    /// Plane the client invokes tool calls against (in-process MCP).
    pub plane: Option<Arc<ToolPlane>>,
    pub cwd: Option<PathBuf>,
    pub allowed_tools: Option<Vec<String>>,
}

/// Native events an [`LlmClient`] emits.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmEvent {
    SessionInit { session_id: String },
    TextDelta { content: String },
    ToolUse { name: String, input: Value },
    Error { message: String },
    End,
}

/// The opaque LLM collaborator.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn query(&self, request: LlmRequest) -> Result<mpsc::Receiver<LlmEvent>, LlmError>;
}

/// Downstream events, SSE-framed by [`sse_frame`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatStreamEvent {
    #[serde(rename_all = "camelCase")]
    Session { session_id: String },
    Text { content: String },
    Tool { name: String, input: Value },
    Error { message: String },
    Done,
}

/// Render one event as an SSE frame: `data: <JSON>\n\n`.
pub fn sse_frame(event: &ChatStreamEvent) -> String {
    format!(
        "data: {}\n\n",
        serde_json::to_string(event).unwrap_or_else(|_| "{\"type\":\"error\"}".to_string())
    )
}

/// Strip the external tool namespace (`mcp__<server>__get_logs` →
/// `get_logs`).
pub(crate) fn strip_tool_prefix(name: &str) -> &str {
    let Some(rest) = name.strip_prefix("mcp__") else { return name };
    match rest.find("__") {
        Some(pos) => &rest[pos + 2..],
        None => name,
    }
}

/// Truncate every string value in a tool input so rendering stays compact
/// and regex-safe.
pub(crate) fn truncate_input(value: &Value) -> Value {
    match value {
        Value::String(s) if s.chars().count() > TOOL_INPUT_MAX => {
            let cut: String = s.chars().take(TOOL_INPUT_MAX).collect();
            Value::String(format!("{cut}…"))
        }
        Value::Array(items) => Value::Array(items.iter().map(truncate_input).collect()),
        Value::Object(map) => {
            Value::Object(map.iter().map(|(k, v)| (k.clone(), truncate_input(v))).collect())
        }
        other => other.clone(),
    }
}

/// Options for one chat invocation.
#[derive(Default)]
pub struct ChatOptions {
    pub system_prompt: Option<String>,
    pub session_id: Option<String>,
    pub plane: Option<Arc<ToolPlane>>,
    /// Context block prepended to the message (see
    /// [`context::build_context`]).
    pub context: Option<String>,
    pub cwd: Option<PathBuf>,
    pub allowed_tools: Option<Vec<String>>,
    /// Client-disconnect abort: once cancelled, no further events are
    /// emitted and the upstream query is dropped.
    pub cancel: CancellationToken,
}

/// Context-enriched bridge from a dashboard message to the agent.
pub struct ChatStream {
    llm: Arc<dyn LlmClient>,
}

impl ChatStream {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Run one query. The returned receiver yields translated events and
    /// always terminates with `Done` unless the caller aborted.
    pub async fn run(
        &self,
        message: &str,
        options: ChatOptions,
    ) -> Result<mpsc::Receiver<ChatStreamEvent>, LlmError> {
        let prompt = match &options.context {
            Some(context) => format!("{context}\n\n## User message\n{message}"),
            None => message.to_string(),
        };
        let tools = options
            .plane
            .as_deref()
            .map(|plane| {
                plane
                    .tools()
                    .iter()
                    .map(|t| ToolDescriptor {
                        name: t.name.to_string(),
                        description: t.description.to_string(),
                        input_schema: t.input_schema.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let request = LlmRequest {
            prompt,
            system_prompt: options
                .system_prompt
                .or_else(|| Some(context::SYSTEM_PROMPT.to_string())),
            session_id: options.session_id,
            tools,
            plane: options.plane,
            cwd: options.cwd,
            allowed_tools: options.allowed_tools,
        };

        let mut upstream = self.llm.query(request).await?;
        let (tx, rx) = mpsc::channel(64);
        let cancel = options.cancel;

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    event = upstream.recv() => event,
                    _ = cancel.cancelled() => {
                        // Client went away: drop the upstream receiver,
                        // which aborts the query, and write nothing more.
                        return;
                    }
                };
                let Some(event) = event else {
                    let _ = tx.send(ChatStreamEvent::Done).await;
                    return;
                };
                let translated = match event {
                    LlmEvent::SessionInit { session_id } => {
                        ChatStreamEvent::Session { session_id }
                    }
                    LlmEvent::TextDelta { content } => ChatStreamEvent::Text { content },
                    LlmEvent::ToolUse { name, input } => ChatStreamEvent::Tool {
                        name: strip_tool_prefix(&name).to_string(),
                        input: truncate_input(&input),
                    },
                    LlmEvent::Error { message } => ChatStreamEvent::Error { message },
                    LlmEvent::End => {
                        let _ = tx.send(ChatStreamEvent::Done).await;
                        return;
                    }
                };
                if tx.send(translated).await.is_err() {
                    return;
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeLlm;

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;

    /// Scripted LLM for tests: replays a fixed event sequence and records
    /// the requests it saw.
    #[derive(Default)]
    pub struct FakeLlm {
        script: Mutex<Vec<LlmEvent>>,
        pub requests: Mutex<Vec<String>>,
    }

    impl FakeLlm {
        pub fn with_script(events: Vec<LlmEvent>) -> Self {
            Self { script: Mutex::new(events), requests: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl LlmClient for FakeLlm {
        async fn query(
            &self,
            request: LlmRequest,
        ) -> Result<mpsc::Receiver<LlmEvent>, LlmError> {
            self.requests.lock().push(request.prompt.clone());
            let events = self.script.lock().clone();
            let (tx, rx) = mpsc::channel(64);
            tokio::spawn(async move {
                for event in events {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
            });
            Ok(rx)
        }
    }
}

#[cfg(test)]
#[path = "stream_tests.rs"]
mod tests;
