//! Model Client: the abstraction boundary between the Run Engine and
//! whatever LLM backend actually proposes text and tool calls. The engine
//! never talks to a provider SDK directly — it only ever sees this trait,
//! mirroring how the teacher keeps the agent loop provider-agnostic behind
//! its own model abstraction.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{ConversationMessage, ProposedToolCall};

/// Why the model stopped producing output for this step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum FinishReason {
    /// The model produced a final answer with no further tool calls.
    Stop,
    /// The model proposed one or more tool calls and expects their results
    /// before continuing.
    ToolCalls,
    /// The model's own length limit was hit mid-generation.
    Length,
}

/// One step of model output: a natural-language reply, zero or more tool
/// calls, and the reason generation stopped.
#[derive(Debug, Clone)]
pub struct ModelStepResponse {
    pub text: Option<String>,
    pub tool_calls: Vec<ProposedToolCall>,
    pub finish_reason: FinishReason,
}

/// Abstraction over an LLM backend. A single call represents one full
/// non-streaming step; the Run Engine journals the result and decides what
/// happens next (tool execution, suspension, or completion).
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn step(
        &self,
        model: &str,
        messages: &[ConversationMessage],
        available_tools: &[String],
    ) -> Result<ModelStepResponse>;
}

/// Scripted client for tests and local demos: returns a fixed sequence of
/// responses, one per call, then repeats the last one. Grounded in the
/// teacher's reliance on trait objects at this exact seam to keep the agent
/// loop testable without a live provider.
pub struct ScriptedModelClient {
    steps: parking_lot::Mutex<Vec<ModelStepResponse>>,
}

impl ScriptedModelClient {
    pub fn new(steps: Vec<ModelStepResponse>) -> Self {
        Self {
            steps: parking_lot::Mutex::new(steps),
        }
    }
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    async fn step(
        &self,
        _model: &str,
        _messages: &[ConversationMessage],
        _available_tools: &[String],
    ) -> Result<ModelStepResponse> {
        let mut steps = self.steps.lock();
        if steps.len() > 1 {
            Ok(steps.remove(0))
        } else {
            Ok(steps
                .first()
                .cloned()
                .unwrap_or(ModelStepResponse {
                    text: Some(String::new()),
                    tool_calls: Vec::new(),
                    finish_reason: FinishReason::Stop,
                }))
        }
    }
}
