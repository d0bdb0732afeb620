//! Yes/no answer classification

use regex::RegexSet;

use crate::Result;

/// Affirmative answer patterns (Korean and English yes-forms)
pub const DEFAULT_AFFIRMATIVE: &[&str] = &[
    "네",
    "예",
    "응",
    "좋아",
    "맞아",
    "맞아요",
    "맞습니다",
    "맞습니다요",
    "그래",
    "그래요",
    "그렇습니다",
    "그렇습니다요",
    "좋습니다",
    "좋습니다요",
    "확인",
    "확인해",
    "확인해요",
    "확인합니다",
    "확인합니다요",
    "선택",
    "선택해",
    "선택해요",
    "선택합니다",
    "선택합니다요",
    "설정",
    "설정해",
    "설정해요",
    "설정합니다",
    "설정합니다요",
    "진행",
    "진행해",
    "진행해요",
    "진행합니다",
    "진행합니다요",
    "시작",
    "시작해",
    "시작해요",
    "시작합니다",
    "시작합니다요",
    "go",
    "yes",
    "ok",
    "okay",
    "yep",
    "yeah",
    "sure",
    "right",
];

/// Negative answer patterns (Korean and English no-forms)
pub const DEFAULT_NEGATIVE: &[&str] = &[
    "아니",
    "아니오",
    "아냐",
    "아닙니다",
    "아닙니다요",
    "틀려",
    "틀렸",
    "틀렸어",
    "틀렸어요",
    "틀렸습니다",
    "틀렸습니다요",
    "다시",
    "다시해",
    "다시해요",
    "다시합니다",
    "다시합니다요",
    "취소",
    "취소해",
    "취소해요",
    "취소합니다",
    "취소합니다요",
    "no",
    "nope",
    "not",
    "wrong",
    "cancel",
    "stop",
];

/// Interpretation of a spoken answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    /// Matched an affirmative pattern
    Affirmative,
    /// Matched a negative pattern and no affirmative one
    Negative,
    /// Matched neither set
    Unrecognized,
}

/// Lowercase and trim a transcript before matching
#[must_use]
pub fn normalize(transcript: &str) -> String {
    transcript.to_lowercase().trim().to_string()
}

/// Classifies transcripts against affirmative and negative pattern sets
///
/// Affirmative patterns are checked first, so a transcript matching both
/// sets counts as affirmative.
#[derive(Debug, Clone)]
pub struct AnswerClassifier {
    affirmative: RegexSet,
    negative: RegexSet,
}

impl Default for AnswerClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_AFFIRMATIVE, DEFAULT_NEGATIVE).expect("valid default answer patterns")
    }
}

impl AnswerClassifier {
    /// Build a classifier from pattern lists
    ///
    /// # Errors
    ///
    /// Returns error if any pattern is not a valid regular expression
    pub fn new<A, N>(affirmative: &[A], negative: &[N]) -> Result<Self>
    where
        A: AsRef<str>,
        N: AsRef<str>,
    {
        Ok(Self {
            affirmative: RegexSet::new(affirmative.iter().map(AsRef::<str>::as_ref))?,
            negative: RegexSet::new(negative.iter().map(AsRef::<str>::as_ref))?,
        })
    }

    /// Classify a raw transcript
    #[must_use]
    pub fn classify(&self, transcript: &str) -> Answer {
        self.classify_normalized(&normalize(transcript))
    }

    /// Classify a transcript that already went through [`normalize`]
    #[must_use]
    pub fn classify_normalized(&self, answer: &str) -> Answer {
        if self.affirmative.is_match(answer) {
            Answer::Affirmative
        } else if self.negative.is_match(&answer) {
            Answer::Negative
        } else {
            Answer::Unrecognized
        }
    }
}
