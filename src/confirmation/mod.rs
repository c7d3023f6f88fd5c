use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::json;
use tokio::sync::oneshot;
use tracing::info;
use uuid::Uuid;

use crate::model::{InvocationState, Operation, RiskLevel, ToolInvocation};

/// Result of waiting on an approval decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Approved,
    Rejected,
    Timeout,
}

/// Per-Operation approval state machine woven into the model-streaming loop
///. One gate instance is shared by every
/// ToolInvocation in a process; pending decisions are keyed by a synthetic
/// `approvalId` delivered through the chat stream's back-channel.
pub struct ConfirmationGate {
    pending: Mutex<HashMap<String, oneshot::Sender<bool>>>,
    timeout: Duration,
}

impl ConfirmationGate {
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Whether an Operation must transit the gate before dispatch.
    pub fn requires_confirmation(op: &Operation) -> bool {
        op.requires_confirmation || op.risk_level == RiskLevel::Dangerous
    }

    /// Step 1: emit `approval_requested` with a synthetic `approvalId` and
    /// register the back-channel the external decision will arrive on.
    /// `invocation` must already be at `InputAvailable`.
    pub fn open(&self, invocation: &mut ToolInvocation) -> Result<(String, oneshot::Receiver<bool>), String> {
        invocation.transition(InvocationState::ApprovalRequested)?;
        let approval_id = Uuid::new_v4().to_string();
        invocation.approval_id = Some(approval_id.clone());

        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .expect("confirmation gate mutex poisoned")
            .insert(approval_id.clone(), tx);

        info!(approval_id = %approval_id, tool_call_id = %invocation.tool_call_id, "approval requested");
        Ok((approval_id, rx))
    }

    /// External decision delivery `(approvalId, approved)`.
    /// Returns `false` if nothing is waiting on this id (already resolved,
    /// timed out, or unknown) — the caller should treat that as a no-op,
    /// not an error.
    pub fn resolve(&self, approval_id: &str, approved: bool) -> bool {
        let sender = self
            .pending
            .lock()
            .expect("confirmation gate mutex poisoned")
            .remove(approval_id);
        match sender {
            Some(tx) => tx.send(approved).is_ok(),
            None => false,
        }
    }

    /// Step 3 + 6: suspend until a decision arrives or the configured
    /// window elapses. Step 2 ("other parallel tool calls proceed") is a
    /// property of the caller awaiting this future concurrently with
    /// others, not of this type.
    pub async fn await_decision(&self, approval_id: &str, rx: oneshot::Receiver<bool>) -> ApprovalOutcome {
        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(true)) => ApprovalOutcome::Approved,
            Ok(Ok(false)) => ApprovalOutcome::Rejected,
            Ok(Err(_)) => ApprovalOutcome::Timeout,
            Err(_) => {
                self.pending.lock().expect("confirmation gate mutex poisoned").remove(approval_id);
                ApprovalOutcome::Timeout
            }
        }
    }
}

/// Apply an `ApprovalOutcome` to the invocation's state machine.
/// `Approved` leaves `state=ApprovalResponded` so the caller
/// can resume by dispatching the Executor and transition to
/// `output_available`/`output_error` themselves. `Rejected` finishes the
/// invocation here with the synthetic `{rejected: true}` body. `Timeout`
/// leaves the invocation at `ApprovalRequested` — `pending_confirmation` is
/// an ActionRecord status, not a further InvocationState transition.
pub fn apply_outcome(invocation: &mut ToolInvocation, outcome: ApprovalOutcome) -> Result<(), String> {
    match outcome {
        ApprovalOutcome::Timeout => Ok(()),
        ApprovalOutcome::Rejected => {
            invocation.approved = Some(false);
            invocation.transition(InvocationState::ApprovalResponded)?;
            invocation.output = Some(json!({ "rejected": true }));
            invocation.transition(InvocationState::OutputAvailable)
        }
        ApprovalOutcome::Approved => {
            invocation.approved = Some(true);
            invocation.transition(InvocationState::ApprovalResponded)
        }
    }
}
