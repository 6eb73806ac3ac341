use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Gesture requested by an action liveness challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Nod,
    Shake,
    Blink,
    Mouth,
}

impl ActionType {
    pub const ALL: [ActionType; 4] = [
        ActionType::Nod,
        ActionType::Shake,
        ActionType::Blink,
        ActionType::Mouth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Nod => "nod",
            ActionType::Shake => "shake",
            ActionType::Blink => "blink",
            ActionType::Mouth => "mouth",
        }
    }

    /// Prompt shown to the user during the countdown
    pub fn prompt(&self) -> &'static str {
        match self {
            ActionType::Nod => "Nod your head",
            ActionType::Shake => "Shake your head",
            ActionType::Blink => "Blink your eyes",
            ActionType::Mouth => "Open your mouth",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        ActionType::ALL
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(s))
            .with_context(|| format!("unknown action type: {}", s))
    }
}

/// Session details passed along with an action liveness challenge
#[derive(Debug, Clone, Default)]
pub struct LivenessContext {
    pub session_id: Option<String>,
}

/// A biased word for the speech recognizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotWord {
    pub word: String,
    pub weight: u32,
}

impl HotWord {
    /// Parse the `word,weight;word,weight` list the speech service accepts
    pub fn parse_list(input: &str) -> Result<Vec<HotWord>> {
        input
            .split(';')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let (word, weight) = entry
                    .split_once(',')
                    .with_context(|| format!("hot word entry `{}` is missing a weight", entry))?;
                let word = word.trim();
                if word.is_empty() {
                    bail!("hot word entry `{}` has an empty word", entry);
                }
                let weight = weight
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid weight in hot word entry `{}`", entry))?;
                Ok(HotWord {
                    word: word.to_string(),
                    weight,
                })
            })
            .collect()
    }

    pub fn format_list(words: &[HotWord]) -> String {
        words
            .iter()
            .map(|w| format!("{},{}", w.word, w.weight))
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Options for a streaming speech-to-text session
#[derive(Debug, Clone, Default)]
pub struct SpeechOptions {
    pub hot_words: Vec<HotWord>,
}

/// Incremental output of the speech recognizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptFragment {
    pub transcript: String,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// Synthesized speech returned by the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechPayload {
    /// Base64-encoded WAV audio
    pub audio: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hot_word_list() {
        let words = HotWord::parse_list("clear,10; crisp,1;").unwrap();
        assert_eq!(
            words,
            vec![
                HotWord { word: "clear".to_string(), weight: 10 },
                HotWord { word: "crisp".to_string(), weight: 1 },
            ]
        );
        assert_eq!(HotWord::format_list(&words), "clear,10;crisp,1");
    }

    #[test]
    fn rejects_malformed_hot_words() {
        assert!(HotWord::parse_list("clear").is_err());
        assert!(HotWord::parse_list("clear,loud").is_err());
        assert!(HotWord::parse_list(",3").is_err());
        assert!(HotWord::parse_list("").unwrap().is_empty());
    }

    #[test]
    fn action_type_round_trips_through_str() {
        for action in ActionType::ALL {
            assert_eq!(action.as_str().parse::<ActionType>().unwrap(), action);
        }
        assert_eq!("NOD".parse::<ActionType>().unwrap(), ActionType::Nod);
        assert!("wave".parse::<ActionType>().is_err());
    }
}
