use thiserror::Error;

use crate::conversation::MessageId;
use crate::state::ActionId;
use crate::state::ActionStatus;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("action {0} is not queued")]
    UnknownAction(ActionId),
    #[error("action {id} cannot move from {from} to {to}")]
    Illegal {
        id: ActionId,
        from: ActionStatus,
        to: ActionStatus,
    },
    #[error("action {running} is already executing")]
    AlreadyExecuting { running: ActionId },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RewindError {
    #[error("wait for the reply in {message_id} to finish before rewinding")]
    StreamInProgress { message_id: MessageId },
    #[error("wait for action {action_id} to finish before rewinding")]
    ExecutionInProgress { action_id: ActionId },
}
