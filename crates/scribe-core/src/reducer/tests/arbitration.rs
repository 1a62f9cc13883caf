use super::*;
use pretty_assertions::assert_eq;

#[test]
fn first_batch_shows_dialog_exactly_once() {
    let mut state = state();
    let message = assistant_message(&mut state, "reply", 1);

    let effects = enqueue(&mut state, vec![stage("a", &message)]);
    assert_eq!(effects, vec![SessionEffect::ShowModeDialog]);
    assert!(state.auto_execute.dialog_visible);

    let effects = enqueue(&mut state, vec![stage("b", &message)]);
    assert!(effects.is_empty());
    assert!(state.auto_execute.dialog_visible);
}

#[test]
fn empty_batch_does_not_open_dialog() {
    let mut state = state();
    assert!(enqueue(&mut state, Vec::new()).is_empty());
    assert!(!state.auto_execute.dialog_visible);
}

#[test]
fn confirming_auto_runs_only_currently_pending_actions() {
    let mut state = state();
    let message = assistant_message(&mut state, "reply", 1);
    enqueue(&mut state, vec![stage("a", &message), stage("b", &message)]);
    begin(&mut state, "a");
    finish(&mut state, "a", ActionResult::failed("boom"));

    user(&mut state, UserAction::ChooseMode(ExecutionMode::Auto));
    let effects = user(&mut state, UserAction::ConfirmModeDialog);

    assert_eq!(
        effects,
        vec![SessionEffect::RunPending(vec![ActionId::from("b")])]
    );
    assert!(!state.auto_execute.dialog_visible);
    assert_eq!(state.auto_execute.mode, Some(ExecutionMode::Auto));
}

#[test]
fn confirming_manual_runs_nothing() {
    let mut state = state();
    let message = assistant_message(&mut state, "reply", 1);
    enqueue(&mut state, vec![stage("a", &message)]);

    user(&mut state, UserAction::ChooseMode(ExecutionMode::Manual));
    let effects = user(&mut state, UserAction::ConfirmModeDialog);

    assert!(effects.is_empty());
    assert_eq!(status_of(&state, "a"), ActionStatus::Pending);
    assert_eq!(state.auto_execute.mode_label(), "manual");
}

#[test]
fn later_batches_in_auto_mode_request_queue_processing() {
    let mut state = state();
    let message = assistant_message(&mut state, "reply", 1);
    enqueue(&mut state, vec![stage("a", &message)]);
    user(&mut state, UserAction::ChooseMode(ExecutionMode::Auto));
    user(&mut state, UserAction::ConfirmModeDialog);

    let effects = enqueue(&mut state, vec![stage("b", &message)]);
    assert_eq!(effects, vec![SessionEffect::ProcessQueue]);
    assert!(!state.auto_execute.dialog_visible);
}

#[test]
fn forgetting_the_choice_asks_again_on_the_next_batch() {
    let mut state = state();
    user(&mut state, UserAction::SetRememberChoice(false));
    let message = assistant_message(&mut state, "reply", 1);
    enqueue(&mut state, vec![stage("a", &message)]);

    user(&mut state, UserAction::ChooseMode(ExecutionMode::Auto));
    let effects = user(&mut state, UserAction::ConfirmModeDialog);
    assert_eq!(
        effects,
        vec![SessionEffect::RunPending(vec![ActionId::from("a")])]
    );
    assert_eq!(state.auto_execute.mode, None);

    let effects = enqueue(&mut state, vec![stage("b", &message)]);
    assert_eq!(effects, vec![SessionEffect::ShowModeDialog]);
}

#[test]
fn dismissing_hides_dialog_without_choosing() {
    let mut state = state();
    let message = assistant_message(&mut state, "reply", 1);
    enqueue(&mut state, vec![stage("a", &message)]);

    user(&mut state, UserAction::DismissModeDialog);
    assert!(!state.auto_execute.dialog_visible);
    assert_eq!(state.auto_execute.mode, None);
}
