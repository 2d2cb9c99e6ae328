//! Conversational-intent classification using regex patterns.
//!
//! Decides whether a message is casual chat or an academic query, which
//! selects the system persona for the LLM call. No ML model involved - pure
//! regex matching, so false positives are expected and accepted.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Messages shorter than this (in words) with no question mark are treated as
/// small talk.
const SHORT_MESSAGE_WORDS: usize = 5;

/// The mode a message is handled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Casual chat: greetings, small talk, emotional check-ins.
    Conversational,
    /// An exam-preparation query, answered by the tutor persona.
    Academic,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Conversational => "conversational",
            Mode::Academic => "academic",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Result of mode classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeResult {
    pub mode: Mode,
    /// Patterns that matched, for tracing.
    pub matched_patterns: Vec<String>,
}

// Compile patterns once at startup. expect() is acceptable: a broken pattern
// is unrecoverable and caught by the test suite.
static ACADEMIC_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // Imperative study verbs
        Regex::new(r"(?i)\b(solve|derive|calculate|evaluate|integrate|differentiate|simplify|prove|balance|find)\b")
            .expect("Invalid regex: study verbs"),
        Regex::new(r"(?i)\b(explain|define|state|describe|compare|distinguish)\b")
            .expect("Invalid regex: explanation verbs"),
        // Physics / maths vocabulary
        Regex::new(r"(?i)\b(equation|formula|theorem|vector|velocity|acceleration|momentum|force|circuit|integral|derivative|matrix|probability|trigonometry)\b")
            .expect("Invalid regex: physics and maths terms"),
        // Chemistry / biology vocabulary
        Regex::new(r"(?i)\b(mechanism|reaction|compound|mole|valency|isomer|titration|cell|enzyme|dna|photosynthesis|mitosis)\b")
            .expect("Invalid regex: chemistry and biology terms"),
        // Exam vocabulary
        Regex::new(r"(?i)\b(neet|jee|mains|advanced|numerical|mcq|syllabus|chapter|previous year)\b")
            .expect("Invalid regex: exam terms"),
    ]
});

static CASUAL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // Greetings
        Regex::new(r"(?i)^(hey|hi|hello|yo|sup|namaste|good morning|good afternoon|good evening)\b")
            .expect("Invalid regex: greetings"),
        // Small talk
        Regex::new(r"(?i)\b(how are you|what's up|whats up|who are you|are you there|nice to meet)\b")
            .expect("Invalid regex: small talk"),
        // Gratitude and farewells
        Regex::new(r"(?i)\b(thank|thanks|thx|bye|goodbye|good night|see you)\b")
            .expect("Invalid regex: gratitude and farewells"),
        // Emotional check-ins common before an exam
        Regex::new(r"(?i)\b(tired|stressed|bored|nervous|anxious|scared|demotivated|sad|happy)\b")
            .expect("Invalid regex: emotional language"),
    ]
});

/// Chat-vs-academic classifier.
///
/// Academic keywords always win: "solve this, thanks!" stays academic.
/// Otherwise a casual keyword match, or a short message without a question
/// mark, is conversational. The default fallback is academic - this is a
/// tutoring product.
pub struct IntentClassifier;

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, text: &str) -> ModeResult {
        let text = text.trim();

        if text.is_empty() {
            return ModeResult {
                mode: Mode::Conversational,
                matched_patterns: vec![],
            };
        }

        let academic_matches = collect_matches(&ACADEMIC_PATTERNS, text);
        if !academic_matches.is_empty() {
            return ModeResult {
                mode: Mode::Academic,
                matched_patterns: academic_matches,
            };
        }

        let casual_matches = collect_matches(&CASUAL_PATTERNS, text);
        if !casual_matches.is_empty() {
            return ModeResult {
                mode: Mode::Conversational,
                matched_patterns: casual_matches,
            };
        }

        let word_count = text.split_whitespace().count();
        if word_count < SHORT_MESSAGE_WORDS && !text.contains('?') {
            return ModeResult {
                mode: Mode::Conversational,
                matched_patterns: vec![],
            };
        }

        ModeResult {
            mode: Mode::Academic,
            matched_patterns: vec![],
        }
    }
}

fn collect_matches(patterns: &[Regex], text: &str) -> Vec<String> {
    patterns
        .iter()
        .filter_map(|p| p.find(text).map(|m| m.as_str().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_academic_detection() {
        let classifier = IntentClassifier::new();

        let result = classifier.classify("Explain Newton's Laws");
        assert_eq!(result.mode, Mode::Academic);

        let result = classifier.classify("Solve: ∫ x²dx from 0 to 5");
        assert_eq!(result.mode, Mode::Academic);

        let result = classifier.classify("What is the mechanism of SN1 reactions?");
        assert_eq!(result.mode, Mode::Academic);
    }

    #[test]
    fn test_conversational_detection() {
        let classifier = IntentClassifier::new();

        let result = classifier.classify("hey how are you");
        assert_eq!(result.mode, Mode::Conversational);

        let result = classifier.classify("I'm so stressed about the exam");
        assert_eq!(result.mode, Mode::Conversational);

        let result = classifier.classify("thanks a lot!");
        assert_eq!(result.mode, Mode::Conversational);
    }

    #[test]
    fn test_academic_keywords_suppress_small_talk() {
        let classifier = IntentClassifier::new();

        // Greeting plus a study verb: the tutor persona must handle it.
        let result = classifier.classify("hi, can you derive the lens formula");
        assert_eq!(result.mode, Mode::Academic);
        assert!(result
            .matched_patterns
            .iter()
            .any(|p| p.eq_ignore_ascii_case("derive")));
    }

    #[test]
    fn test_short_message_without_question_mark() {
        let classifier = IntentClassifier::new();

        let result = classifier.classify("ok cool");
        assert_eq!(result.mode, Mode::Conversational);

        // Same length but with a question mark: academic.
        let result = classifier.classify("ok but why?");
        assert_eq!(result.mode, Mode::Academic);
    }

    #[test]
    fn test_empty_input_is_conversational() {
        let classifier = IntentClassifier::new();

        let result = classifier.classify("");
        assert_eq!(result.mode, Mode::Conversational);

        let result = classifier.classify("   ");
        assert_eq!(result.mode, Mode::Conversational);
    }

    #[test]
    fn test_long_unmatched_message_defaults_to_academic() {
        let classifier = IntentClassifier::new();

        let result =
            classifier.classify("a long message about nothing in particular with many words");
        assert_eq!(result.mode, Mode::Academic);
    }
}
