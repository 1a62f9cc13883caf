use crate::actions::descriptor_for;
use crate::state::ActionStage;
use crate::state::ActionStatus;

pub fn status_icon(status: ActionStatus) -> &'static str {
    match status {
        ActionStatus::Pending => "⏳",
        ActionStatus::Executing => "⚡",
        ActionStatus::Success => "✅",
        ActionStatus::Failed => "❌",
    }
}

pub fn status_text(status: ActionStatus) -> &'static str {
    match status {
        ActionStatus::Pending => "Pending",
        ActionStatus::Executing => "Executing",
        ActionStatus::Success => "Completed",
        ActionStatus::Failed => "Failed",
    }
}

/// The observation line for an action that has produced a result.
pub fn render_observation(action: &ActionStage) -> Option<String> {
    let result = action.result.as_ref()?;
    Some(format!(
        "{} {}: {}",
        status_icon(action.status),
        status_text(action.status),
        result.message
    ))
}

/// One-line summary used when listing queued actions.
pub fn render_action_line(action: &ActionStage) -> String {
    let (icon, title) = descriptor_for(&action.name)
        .map(|descriptor| (descriptor.icon, descriptor.display_name))
        .unwrap_or(("•", action.name.as_str()));
    format!(
        "{icon} {title} [{}] {}",
        status_text(action.status),
        action.id
    )
}
