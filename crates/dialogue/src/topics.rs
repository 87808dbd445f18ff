//! Keyword-based topic extraction, used to nudge the next speaker toward new directions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::state::ChatDialogueState;

/// Broad conversation topics recognized in the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    Technology,
    Science,
    News,
    Entertainment,
    Philosophy,
}

impl Topic {
    /// Scan order; also the order of the returned topics.
    pub const ALL: [Topic; 5] = [
        Topic::Technology,
        Topic::Science,
        Topic::News,
        Topic::Entertainment,
        Topic::Philosophy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Technology => "technology",
            Topic::Science => "science",
            Topic::News => "news",
            Topic::Entertainment => "entertainment",
            Topic::Philosophy => "philosophy",
        }
    }

    /// Lowercase keywords; short ones must match a whole word, longer ones match as substrings.
    fn keywords(self) -> &'static [&'static str] {
        match self {
            Topic::Technology => &[
                "artificial intelligence",
                "ai",
                "technolog",
                "computer",
                "programming",
                "software",
            ],
            Topic::Science => &["science", "research", "discover", "scientist", "experiment"],
            Topic::News => &["news", "event", "incident", "headline"],
            Topic::Entertainment => &["film", "movie", "music", "game", "hobby"],
            Topic::Philosophy => &["meaning", "life", "conscious", "existence", "philosoph"],
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const WHOLE_WORD_MAX_LEN: usize = 3;

fn mentions(text: &str, words: &[&str], keyword: &str) -> bool {
    if keyword.chars().count() <= WHOLE_WORD_MAX_LEN {
        words.iter().any(|w| *w == keyword)
    } else {
        text.contains(keyword)
    }
}

/// Topics mentioned in the last `window` turns.
pub fn extract_topics(state: &ChatDialogueState, window: usize) -> Vec<Topic> {
    let text = state
        .recent(window)
        .map(|t| t.text.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    if text.is_empty() {
        return Vec::new();
    }
    let words: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    Topic::ALL
        .into_iter()
        .filter(|topic| topic.keywords().iter().any(|k| mentions(&text, &words, k)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::ParticipantId;
    use crate::state::Turn;
    use chrono::Utc;

    fn state_with(texts: &[&str]) -> ChatDialogueState {
        let mut state = ChatDialogueState::new();
        for text in texts {
            state.push(
                Turn {
                    speaker: ParticipantId::from("a"),
                    speaker_name: "A".to_string(),
                    text: text.to_string(),
                    at: Utc::now(),
                },
                15,
            );
        }
        state
    }

    #[test]
    fn test_no_history_no_topics() {
        assert!(extract_topics(&ChatDialogueState::new(), 5).is_empty());
    }

    #[test]
    fn test_topics_in_fixed_order() {
        let state = state_with(&["What is the meaning of it all?", "New AI research is wild"]);
        assert_eq!(
            extract_topics(&state, 5),
            vec![Topic::Technology, Topic::Science, Topic::Philosophy]
        );
    }

    #[test]
    fn test_short_keyword_needs_whole_word() {
        let state = state_with(&["She said hello", "Then she waited"]);
        assert!(extract_topics(&state, 5).is_empty());
    }

    #[test]
    fn test_only_window_is_scanned() {
        let state = state_with(&["a movie night", "one", "two", "three", "four", "five"]);
        assert!(extract_topics(&state, 5).is_empty());
        assert_eq!(extract_topics(&state, 6), vec![Topic::Entertainment]);
    }
}
