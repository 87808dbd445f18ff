//! Repetition and stagnation heuristics over a chat transcript.
//!
//! Both checks are discrete: exact matches on normalized text, exact matches on the first
//! three words, and a character-count threshold. No fuzzy similarity is computed.

use std::collections::HashSet;

use crate::state::ChatDialogueState;

/// Words compared when checking whether recent messages open the same way.
const OPENING_WORDS: usize = 3;

/// Why the transcript was judged to be looping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    /// Every inspected message is identical after normalization.
    IdenticalMessages,
    /// Every inspected message starts with the same words.
    SameOpening,
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Inspects the last `window` turns; returns None when fewer than `min_history` turns exist.
pub fn detect_loop(state: &ChatDialogueState, window: usize, min_history: usize) -> Option<LoopKind> {
    if state.history().len() < min_history {
        return None;
    }

    let recent: Vec<String> = state.recent(window).map(|t| normalize(&t.text)).collect();

    let distinct: HashSet<&str> = recent.iter().map(String::as_str).collect();
    if distinct.len() < 2 {
        return Some(LoopKind::IdenticalMessages);
    }

    if recent.len() >= 2 {
        let openings: HashSet<String> = recent
            .iter()
            .filter(|text| !text.is_empty())
            .map(|text| {
                text.split_whitespace()
                    .take(OPENING_WORDS)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect();
        if openings.len() < 2 {
            return Some(LoopKind::SameOpening);
        }
    }

    None
}

/// True when at least `window` turns exist and each of the last `window` is shorter than `max_chars`.
pub fn is_stagnating(state: &ChatDialogueState, window: usize, max_chars: usize) -> bool {
    if window == 0 || state.history().len() < window {
        return false;
    }
    state
        .recent(window)
        .all(|t| t.text.chars().count() < max_chars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::ParticipantId;
    use crate::state::Turn;
    use chrono::Utc;

    fn state_with(texts: &[&str]) -> ChatDialogueState {
        let mut state = ChatDialogueState::new();
        for (i, text) in texts.iter().enumerate() {
            let speaker = if i % 2 == 0 { "a" } else { "b" };
            state.push(
                Turn {
                    speaker: ParticipantId::from(speaker),
                    speaker_name: speaker.to_string(),
                    text: text.to_string(),
                    at: Utc::now(),
                },
                15,
            );
        }
        state
    }

    #[test]
    fn test_too_short_history_never_loops() {
        assert_eq!(detect_loop(&state_with(&["hi", "hi"]), 4, 3), None);
        assert_eq!(detect_loop(&state_with(&[]), 4, 3), None);
    }

    #[test]
    fn test_identical_after_normalization() {
        let state = state_with(&["Hello there", "  hello there ", "HELLO THERE"]);
        assert_eq!(detect_loop(&state, 4, 3), Some(LoopKind::IdenticalMessages));
    }

    #[test]
    fn test_same_opening_words() {
        let state = state_with(&[
            "I totally agree with you",
            "I totally agree, and more",
            "i totally agree again",
        ]);
        // "agree," and "agree" differ, so the third word must match exactly for a loop.
        assert_eq!(detect_loop(&state, 4, 3), None);

        let state = state_with(&[
            "I totally agree with you",
            "I totally agree and more",
            "i totally agree again",
        ]);
        assert_eq!(detect_loop(&state, 4, 3), Some(LoopKind::SameOpening));
    }

    #[test]
    fn test_only_last_window_is_inspected() {
        let state = state_with(&["first topic", "same", "same", "same", "same"]);
        assert_eq!(detect_loop(&state, 4, 3), Some(LoopKind::IdenticalMessages));

        let state = state_with(&["same", "same", "same", "something new", "another idea"]);
        assert_eq!(detect_loop(&state, 4, 3), None);
    }

    #[test]
    fn test_distinct_messages_do_not_loop() {
        let state = state_with(&["What about Mars?", "The weather is nice", "Rust is fast"]);
        assert_eq!(detect_loop(&state, 4, 3), None);
    }

    #[test]
    fn test_stagnation() {
        assert!(is_stagnating(&state_with(&["ok", "sure", "yes"]), 3, 50));
        assert!(!is_stagnating(&state_with(&["ok", "sure"]), 3, 50));

        let long = "x".repeat(50);
        assert!(!is_stagnating(&state_with(&["ok", "sure", &long]), 3, 50));
        assert!(is_stagnating(&state_with(&[&long, "ok", "sure", "yes"]), 3, 50));
    }

    #[test]
    fn test_stagnation_counts_characters_not_bytes() {
        let cyrillic = "я".repeat(30);
        assert!(is_stagnating(&state_with(&[&cyrillic, &cyrillic, &cyrillic]), 3, 50));
    }
}
