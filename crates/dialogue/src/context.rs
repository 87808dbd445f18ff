//! Renders the recent transcript as prompt context for the next speaker.

use crate::state::ChatDialogueState;

/// Prepended once the rendered window is long enough for repetition to become a risk.
pub const ANTI_REPETITION_INSTRUCTIONS: &[&str] = &[
    "NOTE: Study the dialogue history below. Your reply must:",
    "- Develop the topic instead of repeating earlier points",
    "- Add new information or ask new questions",
    "- Skip plain greetings if they have already been exchanged",
    "",
    "Dialogue history:",
];

/// `"{speaker}: {text}"` lines for the last `window` turns, oldest first.
///
/// Returns an empty string for an empty transcript. When the window holds more than
/// `instruction_threshold` turns, [`ANTI_REPETITION_INSTRUCTIONS`] come first.
pub fn render_context(
    state: &ChatDialogueState,
    window: usize,
    instruction_threshold: usize,
) -> String {
    let recent: Vec<_> = state.recent(window).collect();
    if recent.is_empty() {
        return String::new();
    }

    let mut lines: Vec<String> = Vec::with_capacity(recent.len() + ANTI_REPETITION_INSTRUCTIONS.len());
    if recent.len() > instruction_threshold {
        lines.extend(ANTI_REPETITION_INSTRUCTIONS.iter().map(|s| s.to_string()));
    }
    lines.extend(
        recent
            .iter()
            .map(|turn| format!("{}: {}", turn.speaker_name, turn.text)),
    );
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::ParticipantId;
    use crate::state::Turn;
    use chrono::Utc;

    fn state_with(n: usize) -> ChatDialogueState {
        let mut state = ChatDialogueState::new();
        for i in 0..n {
            let name = if i % 2 == 0 { "Alice" } else { "Bob" };
            state.push(
                Turn {
                    speaker: ParticipantId::from(name),
                    speaker_name: name.to_string(),
                    text: format!("message {}", i),
                    at: Utc::now(),
                },
                15,
            );
        }
        state
    }

    #[test]
    fn test_empty_history_renders_nothing() {
        assert_eq!(render_context(&ChatDialogueState::new(), 10, 3), "");
    }

    #[test]
    fn test_short_history_has_no_instructions() {
        let rendered = render_context(&state_with(3), 10, 3);
        assert_eq!(rendered, "Alice: message 0\nBob: message 1\nAlice: message 2");
    }

    #[test]
    fn test_long_history_gets_instructions_and_window() {
        let rendered = render_context(&state_with(12), 10, 3);
        assert!(rendered.starts_with(ANTI_REPETITION_INSTRUCTIONS[0]));
        assert!(!rendered.contains("message 1\n"));
        assert!(rendered.contains("Alice: message 2"));
        assert!(rendered.ends_with("Bob: message 11"));

        let history_lines = rendered
            .lines()
            .skip(ANTI_REPETITION_INSTRUCTIONS.len())
            .count();
        assert_eq!(history_lines, 10);
    }
}
