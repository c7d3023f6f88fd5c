use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationState {
    InputStreaming,
    InputAvailable,
    ApprovalRequested,
    ApprovalResponded,
    OutputAvailable,
    OutputError,
}

impl InvocationState {
    /// Index into the monotonic invocation-state sequence:
    /// `input_streaming → input_available → (approval_requested →
    /// approval_responded)? → (output_available | output_error)`.
    ///
    /// The approval pair only applies to gated calls, so two states
    /// (`InputAvailable` and `ApprovalResponded`) both compare as "the step
    /// right before a terminal output state" — `can_transition_to` encodes
    /// the real edges rather than a single linear rank.
    fn allowed_next(self) -> &'static [InvocationState] {
        use InvocationState::*;
        match self {
            InputStreaming => &[InputAvailable],
            InputAvailable => &[ApprovalRequested, OutputAvailable, OutputError],
            ApprovalRequested => &[ApprovalResponded],
            ApprovalResponded => &[OutputAvailable, OutputError],
            OutputAvailable | OutputError => &[],
        }
    }

    pub fn can_transition_to(self, next: InvocationState) -> bool {
        self.allowed_next().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, InvocationState::OutputAvailable | InvocationState::OutputError)
    }
}

/// One Operation dispatch within a Turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool_call_id: String,
    pub operation_id: Uuid,
    pub arguments: Value,
    pub state: InvocationState,
    #[serde(default)]
    pub approval_id: Option<String>,
    #[serde(default)]
    pub approved: Option<bool>,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub upstream_status: Option<u16>,
}

impl ToolInvocation {
    pub fn new(tool_call_id: impl Into<String>, operation_id: Uuid, arguments: Value) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            operation_id,
            arguments,
            state: InvocationState::InputStreaming,
            approval_id: None,
            approved: None,
            output: None,
            duration_ms: None,
            upstream_status: None,
        }
    }

    /// Transition enforcing the monotonic state machine invariant.
    /// Returns an error describing the illegal edge rather than panicking —
    /// callers (Executor, Confirmation Gate) decide how to surface it.
    pub fn transition(&mut self, next: InvocationState) -> Result<(), String> {
        if !self.state.can_transition_to(next) {
            return Err(format!(
                "illegal transition {:?} -> {:?} for tool_call_id '{}'",
                self.state, next, self.tool_call_id
            ));
        }
        self.state = next;
        Ok(())
    }
}
