use tracing::debug;
use tracing::info;
use tracing::warn;

use super::actions::RuntimeAction;
use super::actions::SessionAction;
use super::actions::UserAction;
use super::conversation::MessageId;
use super::conversation::Role;
use super::error::RewindError;
use super::error::TransitionError;
use super::state::ActionId;
use super::state::ActionResult;
use super::state::ActionStage;
use super::state::ActionStatus;
use super::state::SessionState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    ShowModeDialog,
    /// Run exactly these actions, in order. Issued by the confirm step, so it
    /// does not re-check the mode.
    RunPending(Vec<ActionId>),
    /// A new batch arrived while the mode is already `auto`.
    ProcessQueue,
    Rewound(RewindReport),
    RewindBlocked(RewindError),
    Rejected(TransitionError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewindReport {
    pub target: MessageId,
    pub removed_messages: Vec<MessageId>,
    pub discarded_actions: Vec<ActionId>,
    /// Document text to restore, when the target carried a snapshot.
    pub snapshot: Option<String>,
}

pub fn reduce(state: &mut SessionState, action: SessionAction) -> Vec<SessionEffect> {
    match action {
        SessionAction::User(user) => reduce_user(state, user),
        SessionAction::Runtime(runtime) => reduce_runtime(state, runtime),
    }
}

fn reduce_user(state: &mut SessionState, action: UserAction) -> Vec<SessionEffect> {
    match action {
        UserAction::ChooseMode(mode) => {
            state.auto_execute.mode = Some(mode);
            Vec::new()
        }
        UserAction::SetRememberChoice(remember) => {
            state.auto_execute.remember_choice = remember;
            Vec::new()
        }
        UserAction::ConfirmModeDialog => confirm_mode_dialog(state),
        UserAction::DismissModeDialog => {
            state.auto_execute.dialog_visible = false;
            Vec::new()
        }
        UserAction::CancelExecution { id } => {
            if let Err(err) = transition(state, &id, ActionStatus::Pending) {
                return rejected(err);
            }
            state.auto_execute.is_executing = false;
            Vec::new()
        }
        UserAction::ClearQueue => {
            state.queue.clear();
            state.auto_execute.is_executing = false;
            Vec::new()
        }
        UserAction::RewindFrom { message_id } => match rewind(state, &message_id) {
            Ok(Some(report)) => vec![SessionEffect::Rewound(report)],
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!(message_id = %message_id, error = %err, "rewind blocked");
                vec![SessionEffect::RewindBlocked(err)]
            }
        },
        UserAction::ClearConversation => {
            let ids: Vec<MessageId> = state
                .conversation
                .messages()
                .iter()
                .map(|message| message.id.clone())
                .collect();
            state.queue.remove_for_messages(&ids);
            state.conversation.clear();
            state.auto_execute.dialog_visible = false;
            state.auto_execute.is_executing = state.queue.executing().is_some();
            Vec::new()
        }
    }
}

fn reduce_runtime(state: &mut SessionState, action: RuntimeAction) -> Vec<SessionEffect> {
    match action {
        RuntimeAction::EnqueueActions(batch) => enqueue_batch(state, batch),
        RuntimeAction::BeginExecution { id } => {
            if let Some(running) = state.queue.executing() {
                if running.id != id {
                    return rejected(TransitionError::AlreadyExecuting {
                        running: running.id.clone(),
                    });
                }
            }
            if let Err(err) = transition(state, &id, ActionStatus::Executing) {
                return rejected(err);
            }
            state.auto_execute.is_executing = true;
            Vec::new()
        }
        RuntimeAction::FinishExecution { id, result } => {
            match transition(state, &id, finished_status(&result)) {
                Ok(action) => action.result = Some(result),
                Err(err) => return rejected(err),
            }
            state.auto_execute.is_executing = false;
            Vec::new()
        }
    }
}

fn confirm_mode_dialog(state: &mut SessionState) -> Vec<SessionEffect> {
    let auto = &mut state.auto_execute;
    auto.dialog_visible = false;

    let mut effects = Vec::new();
    if auto.is_auto() {
        let pending = state.queue.pending_ids();
        if !pending.is_empty() {
            effects.push(SessionEffect::RunPending(pending));
        }
    }
    if !auto.remember_choice {
        auto.mode = None;
    }
    effects
}

fn enqueue_batch(state: &mut SessionState, batch: Vec<ActionStage>) -> Vec<SessionEffect> {
    if batch.is_empty() {
        return Vec::new();
    }

    let mut added = 0usize;
    for action in batch {
        let id = action.id.clone();
        if state.queue.push(action) {
            added += 1;
        } else {
            debug!(action_id = %id, "skipping already queued action");
        }
    }

    let auto = &mut state.auto_execute;
    match auto.mode {
        None if !auto.dialog_visible => {
            auto.dialog_visible = true;
            vec![SessionEffect::ShowModeDialog]
        }
        None => Vec::new(),
        Some(_) if auto.is_auto() && added > 0 => vec![SessionEffect::ProcessQueue],
        Some(_) => Vec::new(),
    }
}

fn transition<'a>(
    state: &'a mut SessionState,
    id: &ActionId,
    next: ActionStatus,
) -> Result<&'a mut ActionStage, TransitionError> {
    let action = state
        .queue
        .get_mut(id)
        .ok_or_else(|| TransitionError::UnknownAction(id.clone()))?;
    if !action.status.can_transition_to(next) {
        return Err(TransitionError::Illegal {
            id: id.clone(),
            from: action.status,
            to: next,
        });
    }
    debug!(
        action_id = %id,
        from = action.status.label(),
        to = next.label(),
        "action status changed"
    );
    action.status = next;
    Ok(action)
}

fn rejected(err: TransitionError) -> Vec<SessionEffect> {
    warn!(error = %err, "rejected action transition");
    vec![SessionEffect::Rejected(err)]
}

/// Where a rewind would cut the conversation, worked out without changing
/// anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewindPlan {
    pub index: usize,
    pub snapshot: Option<String>,
}

/// Checks whether `message_id` can be rewound to. `Ok(None)` for unknown ids
/// and for messages that are not the user's.
pub fn plan_rewind(
    state: &SessionState,
    message_id: &MessageId,
) -> Result<Option<RewindPlan>, RewindError> {
    let Some(index) = state.conversation.position(message_id) else {
        return Ok(None);
    };
    let target = &state.conversation.messages()[index];
    if target.role != Role::User {
        return Ok(None);
    }
    if let Some(stream) = state.conversation.unfinished_stream() {
        return Err(RewindError::StreamInProgress {
            message_id: stream.id.clone(),
        });
    }
    if let Some(running) = state.queue.executing() {
        return Err(RewindError::ExecutionInProgress {
            action_id: running.id.clone(),
        });
    }
    Ok(Some(RewindPlan {
        index,
        snapshot: target.document_snapshot.clone(),
    }))
}

fn rewind(
    state: &mut SessionState,
    message_id: &MessageId,
) -> Result<Option<RewindReport>, RewindError> {
    let Some(RewindPlan { index, snapshot }) = plan_rewind(state, message_id)? else {
        return Ok(None);
    };

    let removed_messages: Vec<MessageId> = state
        .conversation
        .truncate_from(index)
        .into_iter()
        .map(|message| message.id)
        .collect();
    let discarded_actions = state.queue.remove_for_messages(&removed_messages);
    if state.queue.pending_ids().is_empty() {
        state.auto_execute.dialog_visible = false;
    }

    info!(
        message_id = %message_id,
        removed = removed_messages.len(),
        discarded = discarded_actions.len(),
        "rewound conversation"
    );
    Ok(Some(RewindReport {
        target: message_id.clone(),
        removed_messages,
        discarded_actions,
        snapshot,
    }))
}

/// Convenience for callers that only care whether a transition went through.
pub fn first_rejection(effects: &[SessionEffect]) -> Option<&TransitionError> {
    effects.iter().find_map(|effect| match effect {
        SessionEffect::Rejected(err) => Some(err),
        _ => None,
    })
}

fn finished_status(result: &ActionResult) -> ActionStatus {
    if result.success {
        ActionStatus::Success
    } else {
        ActionStatus::Failed
    }
}

#[cfg(test)]
mod tests;
