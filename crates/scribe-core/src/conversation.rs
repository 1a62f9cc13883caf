use std::collections::BTreeMap;
use std::fmt;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

pub const USER_ID_PREFIX: &str = "user-";
pub const STREAM_ID_PREFIX: &str = "stream-";
pub const FINISHED_ID_PREFIX: &str = "msg-";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Assistant replies keep the stream prefix until the transport reports done.
    pub fn is_stream(&self) -> bool {
        self.0.starts_with(STREAM_ID_PREFIX)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestParams {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for RequestParams {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            temperature: 0.7,
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    /// Captured for user messages only, at send time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_snapshot: Option<String>,
}

impl Message {
    /// A stream counts as unfinished while its body is empty or its last
    /// fragment ended on a line break.
    pub fn is_unfinished_stream(&self) -> bool {
        self.id.is_stream() && (self.content.is_empty() || self.content.ends_with('\n'))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    request_params: BTreeMap<MessageId, RequestParams>,
    next_seq: u64,
}

impl Conversation {
    fn next_id(&mut self, prefix: &str, at: DateTime<Utc>) -> MessageId {
        self.next_seq = self.next_seq.saturating_add(1);
        MessageId(format!(
            "{prefix}{}-{}",
            at.timestamp_millis(),
            self.next_seq
        ))
    }

    pub fn push_user(
        &mut self,
        content: String,
        document_snapshot: String,
        params: RequestParams,
        at: DateTime<Utc>,
    ) -> MessageId {
        let id = self.next_id(USER_ID_PREFIX, at);
        self.request_params.insert(id.clone(), params);
        self.messages.push(Message {
            id: id.clone(),
            role: Role::User,
            content,
            document_snapshot: Some(document_snapshot),
        });
        id
    }

    pub fn push_assistant_stream(&mut self, at: DateTime<Utc>) -> MessageId {
        let id = self.next_id(STREAM_ID_PREFIX, at);
        self.messages.push(Message {
            id: id.clone(),
            role: Role::Assistant,
            content: String::new(),
            document_snapshot: None,
        });
        id
    }

    pub fn push_assistant(&mut self, content: String, at: DateTime<Utc>) -> MessageId {
        let id = self.next_id(FINISHED_ID_PREFIX, at);
        self.messages.push(Message {
            id: id.clone(),
            role: Role::Assistant,
            content,
            document_snapshot: None,
        });
        id
    }

    pub fn append_fragment(&mut self, id: &MessageId, fragment: &str) -> bool {
        match self.messages.iter_mut().find(|message| &message.id == id) {
            Some(message) => {
                message.content.push_str(fragment);
                true
            }
            None => false,
        }
    }

    /// Swaps the stream id for a finished one and returns it.
    pub fn finish_stream(&mut self, id: &MessageId, at: DateTime<Utc>) -> Option<MessageId> {
        let index = self.position(id)?;
        if !self.messages[index].id.is_stream() {
            return Some(self.messages[index].id.clone());
        }
        let finished = self.next_id(FINISHED_ID_PREFIX, at);
        self.messages[index].id = finished.clone();
        Some(finished)
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| &message.id == id)
    }

    pub fn position(&self, id: &MessageId) -> Option<usize> {
        self.messages.iter().position(|message| &message.id == id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn request_params(&self, id: &MessageId) -> Option<&RequestParams> {
        self.request_params.get(id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn unfinished_stream(&self) -> Option<&Message> {
        self.messages
            .iter()
            .find(|message| message.is_unfinished_stream())
    }

    /// Drops the message at `index` and everything after it, along with their
    /// request parameters.
    pub(crate) fn truncate_from(&mut self, index: usize) -> Vec<Message> {
        if index >= self.messages.len() {
            return Vec::new();
        }
        let removed = self.messages.split_off(index);
        for message in &removed {
            self.request_params.remove(&message.id);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.request_params.clear();
    }

    pub fn export_markdown(&self, exported_at: DateTime<Utc>) -> String {
        let mut out = String::from("# Conversation\n\n");
        out.push_str(&format!(
            "Exported at: {}\n\n---\n\n",
            exported_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        let sections: Vec<String> = self
            .messages
            .iter()
            .map(|message| {
                let role = match message.role {
                    Role::User => "👤 User",
                    Role::Assistant => "🤖 Assistant",
                };
                format!("## {role}\n\n{}\n\n---\n", message.content)
            })
            .collect();
        out.push_str(&sections.join("\n"));
        out
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
    }

    #[test]
    fn stream_is_unfinished_while_empty_or_ending_in_newline() {
        let mut conversation = Conversation::default();
        let id = conversation.push_assistant_stream(at(1));
        assert!(conversation.unfinished_stream().is_some());

        conversation.append_fragment(&id, "partial line\n");
        assert!(conversation.unfinished_stream().is_some());

        conversation.append_fragment(&id, "more");
        assert!(conversation.unfinished_stream().is_none());
    }

    #[test]
    fn finishing_a_stream_renames_it() {
        let mut conversation = Conversation::default();
        let id = conversation.push_assistant_stream(at(5));
        let finished = conversation.finish_stream(&id, at(9)).expect("finished id");

        assert!(!finished.is_stream());
        assert!(finished.as_str().starts_with(FINISHED_ID_PREFIX));
        assert!(conversation.get(&id).is_none());
        assert!(conversation.unfinished_stream().is_none());
    }

    #[test]
    fn ids_stay_unique_within_the_same_millisecond() {
        let mut conversation = Conversation::default();
        let first = conversation.push_user(
            "a".to_string(),
            String::new(),
            RequestParams::default(),
            at(7),
        );
        let second = conversation.push_user(
            "b".to_string(),
            String::new(),
            RequestParams::default(),
            at(7),
        );
        assert_ne!(first, second);
    }

    #[test]
    fn truncation_drops_request_params_of_removed_messages() {
        let mut conversation = Conversation::default();
        let keep = conversation.push_user(
            "keep".to_string(),
            String::new(),
            RequestParams::default(),
            at(1),
        );
        let drop = conversation.push_user(
            "drop".to_string(),
            String::new(),
            RequestParams::default(),
            at(2),
        );

        let removed = conversation.truncate_from(1);

        assert_eq!(removed.len(), 1);
        assert!(conversation.request_params(&keep).is_some());
        assert!(conversation.request_params(&drop).is_none());
    }

    #[test]
    fn export_lists_messages_in_order() {
        let mut conversation = Conversation::default();
        conversation.push_user(
            "hello".to_string(),
            String::new(),
            RequestParams::default(),
            at(1),
        );
        conversation.push_assistant("hi there".to_string(), at(2));

        let exported = conversation.export_markdown(at(0));
        let user_at = exported.find("## 👤 User\n\nhello").expect("user section");
        let assistant_at = exported
            .find("## 🤖 Assistant\n\nhi there")
            .expect("assistant section");
        assert!(exported.starts_with("# Conversation\n\n"));
        assert!(user_at < assistant_at);
    }
}
