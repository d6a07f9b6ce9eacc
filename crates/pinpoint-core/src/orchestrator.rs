//! The per-query orchestration loop.
//!
//! One query gets at most two backend consultations: one to decide between
//! a direct answer and tool use, and — only if tools were requested — one
//! more after the results are folded into the conversation. The loop is an
//! explicit phase machine rather than nested branching, making the
//! single-extra-round rule structural.

use crate::error::PinpointError;
use crate::session::ToolSource;
use pinpoint_mcp::ToolDescriptor;
use pinpoint_types::{
    AssistantReply, ChatBackend, ChatMessage, ChatRequest, ToolDefinition,
};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Fixed persona for the system message.
const SYSTEM_PROMPT: &str = "You are an assistant that can answer general questions \
     using your own knowledge or use tools if necessary.";

/// Phases of one query.
enum QueryPhase {
    AwaitingDecision,
    ExecutingTools(AssistantReply),
    AwaitingFinalAnswer,
    Done(String),
}

/// Orchestrates one user query against a backend and a tool source.
pub struct Orchestrator {
    backend: Arc<dyn ChatBackend>,
    model: String,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn ChatBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }

    /// Answer one user query, using zero or more tool round-trips.
    ///
    /// Returns one log line per tool call followed by the final answer
    /// text, newline-joined. Conversation messages are appended in a fixed
    /// order the backend's second consultation depends on: assistant
    /// tool-call, then the matching tool result, per call, in request
    /// order.
    pub async fn process_query(
        &self,
        tools: &dyn ToolSource,
        query: &str,
    ) -> Result<String, PinpointError> {
        tracing::debug!(%query, "processing query");

        let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(query)];

        // Fresh catalog for every query; the catalog is not assumed static.
        let catalog = tools.list_tools().await?;
        let definitions: Vec<ToolDefinition> = catalog.iter().map(backend_definition).collect();
        tracing::debug!(tools = definitions.len(), "offering tool schema to backend");

        let mut transcript: Vec<String> = Vec::new();
        let mut phase = QueryPhase::AwaitingDecision;

        loop {
            phase = match phase {
                QueryPhase::AwaitingDecision => {
                    let reply = self.consult(&messages, &definitions).await?;
                    if reply.tool_calls.is_empty() {
                        // Direct answer: no second consultation.
                        QueryPhase::Done(reply.content.unwrap_or_default())
                    } else {
                        QueryPhase::ExecutingTools(reply)
                    }
                }
                QueryPhase::ExecutingTools(reply) => {
                    // Sequential, in request order. Tool-level failures come
                    // back as content, so one call cannot abort the rest.
                    for call in reply.tool_calls {
                        let arguments = parse_arguments(&call.function.arguments)?;
                        let args_display = Value::Object(arguments.clone());
                        tracing::info!(
                            tool = %call.function.name,
                            args = %args_display,
                            "tool call requested"
                        );
                        transcript.push(format!(
                            "[Calling tool {} with args {}]",
                            call.function.name,
                            Value::Object(arguments.clone())
                        ));

                        let call_id = call.id.clone();
                        let tool_name = call.function.name.clone();
                        messages.push(ChatMessage::assistant_tool_call(call));

                        let result = tools.call_tool(&tool_name, arguments).await?;
                        messages.push(ChatMessage::tool_result(
                            call_id,
                            tool_name,
                            result.joined_text(),
                        ));
                    }
                    QueryPhase::AwaitingFinalAnswer
                }
                QueryPhase::AwaitingFinalAnswer => {
                    // At most one extra round: if this reply asks for more
                    // tools, those requests are dropped and only its text is
                    // used.
                    let reply = self.consult(&messages, &definitions).await?;
                    QueryPhase::Done(reply.content.unwrap_or_default())
                }
                QueryPhase::Done(answer) => {
                    transcript.push(answer);
                    return Ok(transcript.join("\n"));
                }
            };
        }
    }

    async fn consult(
        &self,
        messages: &[ChatMessage],
        definitions: &[ToolDefinition],
    ) -> Result<AssistantReply, PinpointError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            tools: (!definitions.is_empty()).then(|| definitions.to_vec()),
            tool_choice: (!definitions.is_empty()).then(|| "auto".to_string()),
        };
        tracing::debug!(
            backend = self.backend.name(),
            messages = request.messages.len(),
            "consulting backend"
        );
        Ok(self.backend.complete(&request).await?)
    }
}

/// Translate a tool descriptor into the backend's function-calling schema.
fn backend_definition(descriptor: &ToolDescriptor) -> ToolDefinition {
    ToolDefinition::function(
        &descriptor.name,
        &descriptor.description,
        descriptor.input_schema.clone(),
    )
}

/// Parse raw tool-call arguments into a mapping (empty if absent).
fn parse_arguments(raw: &str) -> Result<Map<String, Value>, PinpointError> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    serde_json::from_str(raw)
        .map_err(|e| PinpointError::Other(format!("Failed to parse tool arguments: {e}")))
}
