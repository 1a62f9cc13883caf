use chrono::DateTime;
use chrono::Utc;
use tracing::debug;
use tracing::info;
use tracing::warn;

use scribe_core::first_rejection;
use scribe_core::parse_message;
use scribe_core::plan_rewind;
use scribe_core::reduce;
use scribe_core::ActionId;
use scribe_core::ActionQueue;
use scribe_core::ActionResult;
use scribe_core::ActionStage;
use scribe_core::ActionStatus;
use scribe_core::AutoExecuteState;
use scribe_core::Clock;
use scribe_core::Config;
use scribe_core::Conversation;
use scribe_core::ExecutionMode;
use scribe_core::History;
use scribe_core::MessageId;
use scribe_core::ParsedMessage;
use scribe_core::RewindReport;
use scribe_core::RuntimeAction;
use scribe_core::SessionAction;
use scribe_core::SessionEffect;
use scribe_core::SessionState;
use scribe_core::SystemClock;
use scribe_core::TransitionError;
use scribe_core::UserAction;

use crate::document::DocumentAccessor;
use crate::error::DocumentError;
use crate::error::EngineError;
use crate::mutator::apply_edit;

/// One conversation session over one document.
///
/// Every write to the document goes through `&mut self`, so a session is the
/// single writer of its document. Actions run one at a time, to completion, in
/// queue order.
pub struct Session<D> {
    pub(crate) state: SessionState,
    pub(crate) history: History,
    pub(crate) document: D,
    pub(crate) clock: Box<dyn Clock>,
    pub(crate) config: Config,
}

impl<D: DocumentAccessor> Session<D> {
    pub fn new(document: D, config: Config) -> Self {
        Self::with_clock(document, config, Box::new(SystemClock))
    }

    pub fn with_clock(document: D, config: Config, clock: Box<dyn Clock>) -> Self {
        let mut history = History::new(config.engine.history_capacity);
        history.push(document.content());
        Self {
            state: SessionState::new(config.engine.remember_choice),
            history,
            document,
            clock,
            config,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn auto_execute(&self) -> &AutoExecuteState {
        &self.state.auto_execute
    }

    pub fn queue(&self) -> &ActionQueue {
        &self.state.queue
    }

    pub fn conversation(&self) -> &Conversation {
        &self.state.conversation
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    /// For caret and selection changes. Text edits belong in
    /// [`Session::edit_document`] so they reach history.
    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    pub fn into_document(self) -> D {
        self.document
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Reduces one action and carries out the runs it asks for. The returned
    /// effects are the reducer's, before any follow-up runs.
    pub fn dispatch(&mut self, action: SessionAction) -> Vec<SessionEffect> {
        let effects = reduce(&mut self.state, action);
        for effect in &effects {
            match effect {
                SessionEffect::RunPending(ids) => {
                    self.run_batch(ids);
                }
                SessionEffect::ProcessQueue => {
                    self.process_queue();
                }
                SessionEffect::ShowModeDialog => debug!("waiting for execution mode"),
                SessionEffect::Rewound(_)
                | SessionEffect::RewindBlocked(_)
                | SessionEffect::Rejected(_) => {}
            }
        }
        effects
    }

    /// Queues one action. Returns `false` when its id is already queued.
    pub fn add_to_queue(&mut self, action: ActionStage) -> bool {
        if self.state.queue.contains(&action.id) {
            debug!(action_id = %action.id, "action already queued");
            return false;
        }
        self.dispatch(SessionAction::Runtime(RuntimeAction::EnqueueActions(vec![
            action,
        ])));
        true
    }

    /// Parses a stored message and queues whatever actions it proposes.
    pub fn ingest_message(&mut self, message_id: &MessageId) -> Option<ParsedMessage> {
        let content = self.state.conversation.get(message_id)?.content.clone();
        let parsed = parse_message(message_id, &content, self.clock.as_ref());
        if !parsed.actions.is_empty() {
            self.dispatch(SessionAction::Runtime(RuntimeAction::EnqueueActions(
                parsed.actions.clone(),
            )));
        }
        Some(parsed)
    }

    pub fn choose_mode(&mut self, mode: ExecutionMode) {
        self.dispatch(SessionAction::User(UserAction::ChooseMode(mode)));
    }

    pub fn set_remember_choice(&mut self, remember: bool) {
        self.dispatch(SessionAction::User(UserAction::SetRememberChoice(remember)));
    }

    /// Hides the dialog and, in auto mode, runs what is pending right now.
    /// Returns the ids that were run.
    pub fn confirm_mode_dialog(&mut self) -> Vec<ActionId> {
        let effects = self.dispatch(SessionAction::User(UserAction::ConfirmModeDialog));
        effects
            .into_iter()
            .find_map(|effect| match effect {
                SessionEffect::RunPending(ids) => Some(ids),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn dismiss_mode_dialog(&mut self) {
        self.dispatch(SessionAction::User(UserAction::DismissModeDialog));
    }

    /// Runs a pending or failed action to completion.
    pub fn execute_action(&mut self, id: &ActionId) -> Result<ActionResult, EngineError> {
        self.begin_action(id)?;
        self.complete_action(id)
    }

    /// Runs a failed action again.
    pub fn retry_action(&mut self, id: &ActionId) -> Result<ActionResult, EngineError> {
        let status = self.status_of(id)?;
        if status != ActionStatus::Failed {
            return Err(TransitionError::Illegal {
                id: id.clone(),
                from: status,
                to: ActionStatus::Executing,
            }
            .into());
        }
        self.execute_action(id)
    }

    /// Marks an action as executing without touching the document yet.
    pub fn begin_action(&mut self, id: &ActionId) -> Result<(), EngineError> {
        let effects = reduce(
            &mut self.state,
            SessionAction::Runtime(RuntimeAction::BeginExecution { id: id.clone() }),
        );
        match first_rejection(&effects) {
            Some(err) => Err(err.clone().into()),
            None => Ok(()),
        }
    }

    /// Applies an executing action's edit and records the outcome. A failed
    /// edit is not an error here; it lands in the action's result.
    pub fn complete_action(&mut self, id: &ActionId) -> Result<ActionResult, EngineError> {
        let action = self
            .state
            .queue
            .get(id)
            .ok_or_else(|| TransitionError::UnknownAction(id.clone()))?;
        if action.status != ActionStatus::Executing {
            return Err(TransitionError::Illegal {
                id: id.clone(),
                from: action.status,
                to: ActionStatus::Success,
            }
            .into());
        }
        if !action.name.is_recognized() {
            warn!(action_id = %id, name = action.name.as_str(), "unknown action name, appending");
        }
        let mode = action.name.edit_mode();
        let content = action.content().to_string();

        let result = match apply_edit(
            &mut self.document,
            &mut self.history,
            mode,
            &content,
            &self.config.engine.append_separator,
        ) {
            Ok(outcome) => {
                info!(
                    action_id = %id,
                    mode = mode.label(),
                    previous_length = outcome.previous_length,
                    new_length = outcome.new_length,
                    "applied action"
                );
                ActionResult::applied(outcome.previous_length, outcome.new_length, mode)
            }
            Err(err) => {
                warn!(action_id = %id, mode = mode.label(), error = %err, "action failed");
                ActionResult::failed(err)
            }
        };

        let effects = reduce(
            &mut self.state,
            SessionAction::Runtime(RuntimeAction::FinishExecution {
                id: id.clone(),
                result: result.clone(),
            }),
        );
        match first_rejection(&effects) {
            Some(err) => Err(err.clone().into()),
            None => Ok(result),
        }
    }

    /// Puts an executing action back to pending. Writes already made stay.
    pub fn cancel_execution(&mut self, id: &ActionId) -> Result<(), EngineError> {
        let effects = self.dispatch(SessionAction::User(UserAction::CancelExecution {
            id: id.clone(),
        }));
        match first_rejection(&effects) {
            Some(err) => Err(err.clone().into()),
            None => Ok(()),
        }
    }

    /// In auto mode, runs every pending action in queue order. Returns the ids
    /// that were run; does nothing in any other mode.
    pub fn process_queue(&mut self) -> Vec<ActionId> {
        if !self.state.auto_execute.is_auto() {
            debug!(mode = self.state.auto_execute.mode_label(), "queue not processed");
            return Vec::new();
        }
        let pending = self.state.queue.pending_ids();
        self.run_batch(&pending)
    }

    fn run_batch(&mut self, ids: &[ActionId]) -> Vec<ActionId> {
        let mut ran = Vec::with_capacity(ids.len());
        for id in ids {
            if self.state.queue.get(id).map(|action| action.status) != Some(ActionStatus::Pending) {
                continue;
            }
            match self.execute_action(id) {
                Ok(_) => ran.push(id.clone()),
                Err(err) => warn!(action_id = %id, error = %err, "skipped queued action"),
            }
        }
        ran
    }

    pub fn clear_queue(&mut self) {
        self.dispatch(SessionAction::User(UserAction::ClearQueue));
    }

    /// Removes a user message and everything after it, then puts the document
    /// back to the text captured when that message was sent. The restore does
    /// not add a history entry.
    ///
    /// The snapshot is written before anything is removed. If the write fails
    /// the conversation, queue and document are left as they were.
    pub fn rewind_from(
        &mut self,
        message_id: &MessageId,
    ) -> Result<Option<RewindReport>, EngineError> {
        let Some(plan) = plan_rewind(&self.state, message_id)? else {
            return Ok(None);
        };
        if let Some(snapshot) = plan.snapshot {
            self.document.write(snapshot)?;
        }
        let effects = self.dispatch(SessionAction::User(UserAction::RewindFrom {
            message_id: message_id.clone(),
        }));
        for effect in effects {
            match effect {
                SessionEffect::Rewound(report) => return Ok(Some(report)),
                SessionEffect::RewindBlocked(err) => return Err(err.into()),
                _ => {}
            }
        }
        Ok(None)
    }

    pub fn clear_conversation(&mut self) {
        self.dispatch(SessionAction::User(UserAction::ClearConversation));
    }

    /// An edit made directly by the user.
    pub fn edit_document(&mut self, text: String) -> Result<(), DocumentError> {
        self.document.write(text.clone())?;
        self.history.push(text);
        Ok(())
    }

    /// Steps history back and shows that entry. `Ok(false)` at the oldest entry.
    pub fn undo(&mut self) -> Result<bool, DocumentError> {
        let Some(text) = self.history.undo().map(str::to_string) else {
            return Ok(false);
        };
        if let Err(err) = self.document.write(text) {
            self.history.redo();
            return Err(err);
        }
        Ok(true)
    }

    /// Steps history forward and shows that entry. `Ok(false)` at the tail.
    pub fn redo(&mut self) -> Result<bool, DocumentError> {
        let Some(text) = self.history.redo().map(str::to_string) else {
            return Ok(false);
        };
        if let Err(err) = self.document.write(text) {
            self.history.undo();
            return Err(err);
        }
        Ok(true)
    }

    fn status_of(&self, id: &ActionId) -> Result<ActionStatus, TransitionError> {
        self.state
            .queue
            .get(id)
            .map(|action| action.status)
            .ok_or_else(|| TransitionError::UnknownAction(id.clone()))
    }
}
