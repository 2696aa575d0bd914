// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool records and the capability-filtered planes built from them.
//!
//! A handler never errors out of band: every failure becomes an
//! `is_error` result with a human-readable message. Capability gating is
//! double-layered: ungated tools are not registered at all, and gated
//! handlers re-check at entry.

pub mod hosted;
pub mod library;
pub mod process;

use futures_util::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// One content block of a tool result (text-only, like the wire shape).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

/// What a handler returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError", skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self { content: vec![ToolContent { kind: "text", text: text.into() }], is_error: false }
    }

    /// Pretty-printed JSON payload.
    pub fn json(value: &(impl Serialize + ?Sized)) -> Self {
        match serde_json::to_string_pretty(value) {
            Ok(text) => Self::text(text),
            Err(e) => Self::error(format!("failed to render result: {e}")),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent { kind: "text", text: message.into() }],
            is_error: true,
        }
    }
}

type Handler = Arc<dyn Fn(Value) -> BoxFuture<'static, ToolResult> + Send + Sync>;

/// A named tool: description + JSON schema + handler.
#[derive(Clone)]
pub struct Tool {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
    handler: Handler,
}

impl Tool {
    pub fn new<F, Fut>(
        name: &'static str,
        description: &'static str,
        input_schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ToolResult> + Send + 'static,
    {
        Self {
            name,
            description,
            input_schema,
            handler: Arc::new(move |input| Box::pin(handler(input))),
        }
    }

    pub async fn call(&self, input: Value) -> ToolResult {
        (self.handler)(input).await
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool").field("name", &self.name).finish()
    }
}

/// The capability-filtered set of tools exposed to one chat invocation.
#[derive(Clone, Default, Debug)]
pub struct ToolPlane {
    tools: Vec<Tool>,
}

impl ToolPlane {
    pub fn new(tools: Vec<Tool>) -> Self {
        Self { tools }
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Invoke a tool by name. Unknown names are an error result, never a
    /// panic or an Err.
    pub async fn invoke(&self, name: &str, input: Value) -> ToolResult {
        match self.get(name) {
            Some(tool) => tool.call(input).await,
            None => ToolResult::error(format!("unknown tool: {name}")),
        }
    }
}

/// Input helpers shared by the tool factories.
pub(crate) fn input_str(input: &Value, key: &str) -> Option<String> {
    input.get(key).and_then(Value::as_str).map(String::from)
}

pub(crate) fn input_u64(input: &Value, key: &str) -> Option<u64> {
    input.get(key).and_then(Value::as_u64)
}

pub(crate) fn require_str(input: &Value, key: &str) -> Result<String, ToolResult> {
    input_str(input, key)
        .ok_or_else(|| ToolResult::error(format!("missing required field: {key}")))
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
