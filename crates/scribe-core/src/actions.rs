use std::collections::BTreeMap;

use serde_json::Value;

use super::conversation::MessageId;
use super::state::ActionId;
use super::state::ActionName;
use super::state::ActionResult;
use super::state::ActionStage;
use super::state::ExecutionMode;

#[derive(Debug, Clone)]
pub enum SessionAction {
    User(UserAction),
    Runtime(RuntimeAction),
}

#[derive(Debug, Clone)]
pub enum UserAction {
    ChooseMode(ExecutionMode),
    SetRememberChoice(bool),
    ConfirmModeDialog,
    DismissModeDialog,
    CancelExecution { id: ActionId },
    ClearQueue,
    RewindFrom { message_id: MessageId },
    ClearConversation,
}

#[derive(Debug, Clone)]
pub enum RuntimeAction {
    EnqueueActions(Vec<ActionStage>),
    BeginExecution { id: ActionId },
    FinishExecution { id: ActionId, result: ActionResult },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionCategory {
    Edit,
    Insert,
    Replace,
}

impl ActionCategory {
    pub fn label(self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Insert => "insert",
            Self::Replace => "replace",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionDescriptor {
    pub name: &'static str,
    pub display_name: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
    pub category: ActionCategory,
}

pub const ACTION_CATALOG: [ActionDescriptor; 4] = [
    ActionDescriptor {
        name: "replace_content",
        display_name: "Replace content",
        icon: "🔄",
        description: "Replace the whole document with new content",
        category: ActionCategory::Replace,
    },
    ActionDescriptor {
        name: "append_content",
        display_name: "Append content",
        icon: "📎",
        description: "Add content at the end of the document",
        category: ActionCategory::Insert,
    },
    ActionDescriptor {
        name: "insert_content",
        display_name: "Insert content",
        icon: "✏️",
        description: "Insert content at the cursor",
        category: ActionCategory::Insert,
    },
    ActionDescriptor {
        name: "replace_selection",
        display_name: "Replace selection",
        icon: "🎯",
        description: "Replace the selected text",
        category: ActionCategory::Replace,
    },
];

pub fn descriptor_for(name: &ActionName) -> Option<&'static ActionDescriptor> {
    ACTION_CATALOG
        .iter()
        .find(|descriptor| descriptor.name == name.as_str())
}

const ARG_PREVIEW_CHARS: usize = 100;

pub fn format_action_args(arguments: &BTreeMap<String, Value>) -> String {
    if arguments.is_empty() {
        return "{}".to_string();
    }

    let formatted: Vec<String> = arguments
        .iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            let truncated = if text.chars().count() > ARG_PREVIEW_CHARS {
                let head: String = text.chars().take(ARG_PREVIEW_CHARS).collect();
                format!("{head}...")
            } else {
                text
            };
            format!("{key}: \"{truncated}\"")
        })
        .collect();

    format!("{{ {} }}", formatted.join(", "))
}
