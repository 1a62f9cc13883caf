use std::collections::BTreeMap;
use std::fmt;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use super::conversation::Conversation;
use super::conversation::MessageId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(pub String);

impl ActionId {
    /// Ids embed the clock so that re-parsing the same text at the same
    /// instant yields the same id, which is what queue de-duplication keys on.
    pub fn for_message(message_id: &MessageId, at: DateTime<Utc>) -> Self {
        Self(format!(
            "{}-action-{}",
            message_id.as_str(),
            at.timestamp_millis()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionName {
    ReplaceContent,
    AppendContent,
    InsertContent,
    ReplaceSelection,
    Unknown(String),
}

impl ActionName {
    /// Only the four edit verbs are recognized; anything else is `None`.
    pub fn recognized(name: &str) -> Option<Self> {
        match name {
            "replace_content" => Some(Self::ReplaceContent),
            "append_content" => Some(Self::AppendContent),
            "insert_content" => Some(Self::InsertContent),
            "replace_selection" => Some(Self::ReplaceSelection),
            _ => None,
        }
    }

    pub fn from_wire(name: &str) -> Self {
        Self::recognized(name).unwrap_or_else(|| Self::Unknown(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::ReplaceContent => "replace_content",
            Self::AppendContent => "append_content",
            Self::InsertContent => "insert_content",
            Self::ReplaceSelection => "replace_selection",
            Self::Unknown(name) => name.as_str(),
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    pub fn edit_mode(&self) -> EditMode {
        match self {
            Self::ReplaceContent => EditMode::Replace,
            Self::AppendContent => EditMode::Append,
            Self::InsertContent => EditMode::Insert,
            Self::ReplaceSelection => EditMode::ReplaceSelection,
            // Open question: unknown names append rather than fail.
            Self::Unknown(_) => EditMode::Append,
        }
    }
}

impl From<String> for ActionName {
    fn from(value: String) -> Self {
        Self::from_wire(&value)
    }
}

impl From<ActionName> for String {
    fn from(value: ActionName) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    Replace,
    Append,
    Insert,
    ReplaceSelection,
}

impl EditMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Append => "append",
            Self::Insert => "insert",
            Self::ReplaceSelection => "replace_selection",
        }
    }

    pub fn uses_selection(self) -> bool {
        matches!(self, Self::Insert | Self::ReplaceSelection)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Executing,
    Success,
    Failed,
}

impl ActionStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Executing => "executing",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn can_transition_to(self, next: ActionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Executing)
                | (Self::Executing, Self::Success)
                | (Self::Executing, Self::Failed)
                | (Self::Executing, Self::Pending)
                | (Self::Failed, Self::Executing)
        )
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResultData {
    pub previous_length: usize,
    pub new_length: usize,
    pub char_diff: i64,
    pub mode: EditMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ActionResultData>,
}

impl ActionResult {
    pub fn applied(previous_length: usize, new_length: usize, mode: EditMode) -> Self {
        let char_diff = new_length as i64 - previous_length as i64;
        Self {
            success: true,
            message: describe_delta(char_diff),
            data: Some(ActionResultData {
                previous_length,
                new_length,
                char_diff,
                mode,
            }),
        }
    }

    pub fn failed(diagnostic: impl fmt::Display) -> Self {
        Self {
            success: false,
            message: format!("Failed: {diagnostic}"),
            data: None,
        }
    }
}

pub fn describe_delta(char_diff: i64) -> String {
    match char_diff {
        0 => "Applied: content modified".to_string(),
        diff if diff > 0 => format!("Applied: added {diff} characters"),
        diff => format!("Applied: removed {} characters", diff.unsigned_abs()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStage {
    pub id: ActionId,
    pub message_id: MessageId,
    pub name: ActionName,
    pub arguments: BTreeMap<String, Value>,
    pub status: ActionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ActionResult>,
    pub created_at: DateTime<Utc>,
}

impl ActionStage {
    pub fn new(
        id: ActionId,
        message_id: MessageId,
        name: ActionName,
        arguments: BTreeMap<String, Value>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            message_id,
            name,
            arguments,
            status: ActionStatus::Pending,
            result: None,
            created_at,
        }
    }

    pub fn content(&self) -> &str {
        self.arguments
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThoughtStatus {
    Streaming,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThoughtStage {
    pub content: String,
    pub status: ThoughtStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Auto,
    Manual,
}

impl ExecutionMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoExecuteState {
    /// `None` until the user has chosen.
    pub mode: Option<ExecutionMode>,
    pub dialog_visible: bool,
    pub remember_choice: bool,
    pub is_executing: bool,
}

impl AutoExecuteState {
    pub fn new(remember_choice: bool) -> Self {
        Self {
            mode: None,
            dialog_visible: false,
            remember_choice,
            is_executing: false,
        }
    }

    pub fn mode_label(&self) -> &'static str {
        self.mode.map_or("unset", ExecutionMode::label)
    }

    pub fn is_auto(&self) -> bool {
        self.mode == Some(ExecutionMode::Auto)
    }
}

impl Default for AutoExecuteState {
    fn default() -> Self {
        Self::new(true)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActionQueue {
    entries: Vec<ActionStage>,
}

impl ActionQueue {
    /// Returns `false` and leaves the queue untouched when the id is already queued.
    pub fn push(&mut self, action: ActionStage) -> bool {
        if self.contains(&action.id) {
            return false;
        }
        self.entries.push(action);
        true
    }

    pub fn contains(&self, id: &ActionId) -> bool {
        self.entries.iter().any(|entry| &entry.id == id)
    }

    pub fn get(&self, id: &ActionId) -> Option<&ActionStage> {
        self.entries.iter().find(|entry| &entry.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: &ActionId) -> Option<&mut ActionStage> {
        self.entries.iter_mut().find(|entry| &entry.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionStage> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pending_ids(&self) -> Vec<ActionId> {
        self.entries
            .iter()
            .filter(|entry| entry.status == ActionStatus::Pending)
            .map(|entry| entry.id.clone())
            .collect()
    }

    pub fn executing(&self) -> Option<&ActionStage> {
        self.entries
            .iter()
            .find(|entry| entry.status == ActionStatus::Executing)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn remove_for_messages(&mut self, message_ids: &[MessageId]) -> Vec<ActionId> {
        let mut removed = Vec::new();
        self.entries.retain(|entry| {
            if message_ids.contains(&entry.message_id) {
                removed.push(entry.id.clone());
                false
            } else {
                true
            }
        });
        removed
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub queue: ActionQueue,
    pub auto_execute: AutoExecuteState,
    pub conversation: Conversation,
}

impl SessionState {
    pub fn new(remember_choice: bool) -> Self {
        Self {
            queue: ActionQueue::default(),
            auto_execute: AutoExecuteState::new(remember_choice),
            conversation: Conversation::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn edit_mode_table_defaults_unknown_names_to_append() {
        let modes: Vec<EditMode> = [
            "replace_content",
            "append_content",
            "insert_content",
            "replace_selection",
            "rewrite_everything",
        ]
        .into_iter()
        .map(|name| ActionName::from_wire(name).edit_mode())
        .collect();
        assert_eq!(
            modes,
            vec![
                EditMode::Replace,
                EditMode::Append,
                EditMode::Insert,
                EditMode::ReplaceSelection,
                EditMode::Append,
            ]
        );
    }

    #[test]
    fn only_documented_status_transitions_are_legal() {
        use ActionStatus::*;
        let all = [Pending, Executing, Success, Failed];
        let legal: Vec<(ActionStatus, ActionStatus)> = all
            .iter()
            .flat_map(|from| all.iter().map(move |to| (*from, *to)))
            .filter(|(from, to)| from.can_transition_to(*to))
            .collect();
        assert_eq!(
            legal,
            vec![
                (Pending, Executing),
                (Executing, Pending),
                (Executing, Success),
                (Executing, Failed),
                (Failed, Executing),
            ]
        );
    }

    #[test]
    fn delta_description_reflects_sign() {
        assert_eq!(describe_delta(7), "Applied: added 7 characters");
        assert_eq!(describe_delta(-3), "Applied: removed 3 characters");
        assert_eq!(describe_delta(0), "Applied: content modified");
    }

    #[test]
    fn action_content_is_empty_when_argument_is_missing_or_not_text() {
        let mut arguments = BTreeMap::new();
        arguments.insert("content".to_string(), Value::from(42));
        let action = ActionStage::new(
            ActionId::from("a"),
            MessageId::from("m"),
            ActionName::AppendContent,
            arguments,
            DateTime::<Utc>::default(),
        );
        assert_eq!(action.content(), "");
    }

    #[test]
    fn action_name_serializes_as_wire_string() {
        let encoded = serde_json::to_string(&ActionName::ReplaceSelection).expect("encode");
        assert_eq!(encoded, "\"replace_selection\"");
        let decoded: ActionName = serde_json::from_str("\"shred\"").expect("decode");
        assert_eq!(decoded, ActionName::Unknown("shred".to_string()));
    }
}
