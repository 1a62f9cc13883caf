use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

use scribe_core::ActionId;
use scribe_core::ActionStatus;
use scribe_core::MessageId;
use scribe_core::ParsedMessage;
use scribe_core::RequestParams;

use crate::document::DocumentAccessor;
use crate::engine::Session;
use crate::error::TransportError;

/// One item from the model transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum StreamChunk {
    Content(String),
    Error(String),
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    Completed {
        message_id: MessageId,
        parsed: ParsedMessage,
        /// Actions run straight away because the mode was already auto and
        /// applied cleanly. Ones that failed stay in the queue for a retry.
        executed: Vec<ActionId>,
    },
    Failed {
        /// The partial reply, kept as it was when the stream broke.
        message_id: MessageId,
        error_message: MessageId,
        reason: String,
    },
}

impl StreamOutcome {
    pub fn message_id(&self) -> &MessageId {
        match self {
            Self::Completed { message_id, .. } | Self::Failed { message_id, .. } => message_id,
        }
    }
}

impl<D: DocumentAccessor> Session<D> {
    /// Records a user message along with the document as it is right now.
    /// Without explicit parameters the configured request defaults are used.
    pub fn send_user_message(
        &mut self,
        content: impl Into<String>,
        params: Option<RequestParams>,
    ) -> MessageId {
        let params = params.unwrap_or_else(|| self.config.request.clone());
        let snapshot = self.document.content();
        let now = self.clock.now();
        let id = self
            .state
            .conversation
            .push_user(content.into(), snapshot, params, now);
        debug!(message_id = %id, "user message recorded");
        id
    }

    /// Opens an empty assistant message that fragments are appended to.
    pub fn begin_assistant_stream(&mut self) -> MessageId {
        let now = self.clock.now();
        self.state.conversation.push_assistant_stream(now)
    }

    pub fn push_fragment(&mut self, message_id: &MessageId, fragment: &str) -> bool {
        self.state.conversation.append_fragment(message_id, fragment)
    }

    /// Closes a stream, parses the finished reply and queues its actions.
    pub fn finish_stream(&mut self, message_id: &MessageId) -> Option<StreamOutcome> {
        let now = self.clock.now();
        let finished = self.state.conversation.finish_stream(message_id, now)?;
        let queued_before: Vec<ActionId> = self
            .state
            .queue
            .iter()
            .map(|action| action.id.clone())
            .collect();
        let parsed = self.ingest_message(&finished)?;

        let executed = parsed
            .actions
            .iter()
            .filter(|action| !queued_before.contains(&action.id))
            .filter(|action| {
                self.state
                    .queue
                    .get(&action.id)
                    .is_some_and(|queued| queued.status == ActionStatus::Success)
            })
            .map(|action| action.id.clone())
            .collect();

        info!(
            message_id = %finished,
            actions = parsed.actions.len(),
            "assistant reply finished"
        );
        Some(StreamOutcome::Completed {
            message_id: finished,
            parsed,
            executed,
        })
    }

    /// Drains a chunk sequence into the open assistant message.
    ///
    /// Content chunks are appended in order. `Done`, or the end of the
    /// sequence, finishes the reply. An error chunk or transport error stops
    /// reading, keeps the partial reply and adds a visible error message.
    pub fn consume_stream<I>(&mut self, message_id: &MessageId, chunks: I) -> Option<StreamOutcome>
    where
        I: IntoIterator<Item = Result<StreamChunk, TransportError>>,
    {
        for chunk in chunks {
            match chunk {
                Ok(StreamChunk::Content(fragment)) => {
                    if !self.push_fragment(message_id, &fragment) {
                        warn!(message_id = %message_id, "stream target is gone");
                        return None;
                    }
                }
                Ok(StreamChunk::Done) => return self.finish_stream(message_id),
                Ok(StreamChunk::Error(reason)) => return self.fail_stream(message_id, reason),
                Err(err) => return self.fail_stream(message_id, err.to_string()),
            }
        }
        self.finish_stream(message_id)
    }

    fn fail_stream(&mut self, message_id: &MessageId, reason: String) -> Option<StreamOutcome> {
        warn!(message_id = %message_id, reason = %reason, "assistant stream failed");
        let now = self.clock.now();
        let partial = self.state.conversation.finish_stream(message_id, now)?;
        let error_message = self
            .state
            .conversation
            .push_assistant(format!("API error: {reason}"), now);
        Some(StreamOutcome::Failed {
            message_id: partial,
            error_message,
            reason,
        })
    }

    pub fn export_markdown(&self) -> String {
        self.state.conversation.export_markdown(self.clock.now())
    }
}
