use std::collections::BTreeMap;

use chrono::DateTime;
use chrono::Utc;
use serde_json::Value;

pub(super) use super::plan_rewind;
pub(super) use super::reduce;
pub(super) use super::RewindPlan;
pub(super) use super::RewindReport;
pub(super) use super::SessionEffect;
pub(super) use crate::actions::RuntimeAction;
pub(super) use crate::actions::SessionAction;
pub(super) use crate::actions::UserAction;
pub(super) use crate::conversation::MessageId;
pub(super) use crate::conversation::RequestParams;
pub(super) use crate::error::RewindError;
pub(super) use crate::error::TransitionError;
pub(super) use crate::state::ActionId;
pub(super) use crate::state::ActionName;
pub(super) use crate::state::ActionResult;
pub(super) use crate::state::ActionStage;
pub(super) use crate::state::ActionStatus;
pub(super) use crate::state::EditMode;
pub(super) use crate::state::ExecutionMode;
pub(super) use crate::state::SessionState;

mod arbitration;

fn state() -> SessionState {
    SessionState::new(true)
}

fn at(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}

fn stage(id: &str, message_id: &MessageId) -> ActionStage {
    let mut arguments = BTreeMap::new();
    arguments.insert("content".to_string(), Value::String(format!("body of {id}")));
    ActionStage::new(
        ActionId::from(id),
        message_id.clone(),
        ActionName::AppendContent,
        arguments,
        at(0),
    )
}

fn user(state: &mut SessionState, action: UserAction) -> Vec<SessionEffect> {
    reduce(state, SessionAction::User(action))
}

fn runtime(state: &mut SessionState, action: RuntimeAction) -> Vec<SessionEffect> {
    reduce(state, SessionAction::Runtime(action))
}

fn enqueue(state: &mut SessionState, actions: Vec<ActionStage>) -> Vec<SessionEffect> {
    runtime(state, RuntimeAction::EnqueueActions(actions))
}

fn begin(state: &mut SessionState, id: &str) -> Vec<SessionEffect> {
    runtime(state, RuntimeAction::BeginExecution { id: ActionId::from(id) })
}

fn finish(state: &mut SessionState, id: &str, result: ActionResult) -> Vec<SessionEffect> {
    runtime(
        state,
        RuntimeAction::FinishExecution {
            id: ActionId::from(id),
            result,
        },
    )
}

fn status_of(state: &SessionState, id: &str) -> ActionStatus {
    state
        .queue
        .get(&ActionId::from(id))
        .map(|action| action.status)
        .unwrap_or_else(|| panic!("action {id} not queued"))
}

fn user_message(state: &mut SessionState, content: &str, snapshot: &str, ms: i64) -> MessageId {
    state.conversation.push_user(
        content.to_string(),
        snapshot.to_string(),
        RequestParams::default(),
        at(ms),
    )
}

fn assistant_message(state: &mut SessionState, content: &str, ms: i64) -> MessageId {
    state.conversation.push_assistant(content.to_string(), at(ms))
}
