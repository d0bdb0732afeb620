//! Destination confirmation dialog
//!
//! Walks up to three candidate destinations in order, asking a yes/no
//! question about each. The dialog is a pure state machine: every step
//! returns the [`Directive`]s the caller must carry out (speak, listen,
//! resolve), so it can be driven by real engines or by tests alike.

use super::patterns::{Answer, AnswerClassifier, normalize};
use crate::voice::Priority;
use crate::{Error, Result};

/// Maximum number of candidates asked about
pub const MAX_CANDIDATES: usize = 3;

/// Spoken when a candidate is accepted
pub const SELECTED_MESSAGE: &str = "선택되었습니다.";

/// Spoken when every candidate was rejected
pub const NO_SELECTION_MESSAGE: &str = "목적지가 선택되지 않았습니다.";

/// Prompt asking about the candidate at 1-based `position`
#[must_use]
pub fn confirmation_prompt(position: usize, destination: &str) -> String {
    format!(
        "제안 {position}: {destination}. 이 목적지로 선택하시겠습니까? 네 또는 아니오로 대답해주세요."
    )
}

/// Clarification echoing an answer that matched neither pattern set
#[must_use]
pub fn clarification_prompt(heard: &str) -> String {
    format!("\"{heard}\"로 인식되었습니다. 네 또는 아니오로 명확하게 대답해주세요.")
}

/// Action requested by the dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Speak text with the given priority
    Speak {
        /// Text to speak
        text: String,
        /// Queue priority
        priority: Priority,
    },
    /// Start a recognition session for the answer
    Listen,
    /// Finish the dialog with the selected destination, if any
    Resolve(Option<String>),
}

impl Directive {
    fn speak(text: impl Into<String>, priority: Priority) -> Self {
        Self::Speak {
            text: text.into(),
            priority,
        }
    }
}

/// Candidates under confirmation and the one being asked about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationSession {
    candidates: Vec<String>,
    cursor: usize,
}

impl ConfirmationSession {
    /// Start a session over the first [`MAX_CANDIDATES`] destinations
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `destinations` is empty
    pub fn new<S: AsRef<str>>(destinations: &[S]) -> Result<Self> {
        if destinations.is_empty() {
            return Err(Error::InvalidInput(
                "no destinations to confirm".to_string(),
            ));
        }

        Ok(Self {
            candidates: destinations
                .iter()
                .take(MAX_CANDIDATES)
                .map(|d| d.as_ref().to_string())
                .collect(),
            cursor: 0,
        })
    }

    /// Working set of candidates
    #[must_use]
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Index of the candidate being asked about
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Candidate being asked about, or `None` once all were rejected
    #[must_use]
    pub fn current(&self) -> Option<&str> {
        self.candidates.get(self.cursor).map(String::as_str)
    }

    fn advance(&mut self) {
        self.cursor += 1;
    }
}

/// Turn-based yes/no confirmation over candidate destinations
#[derive(Debug, Clone, Default)]
pub struct ConfirmationDialog {
    classifier: AnswerClassifier,
    session: Option<ConfirmationSession>,
}

impl ConfirmationDialog {
    /// Create a dialog using `classifier` to interpret answers
    #[must_use]
    pub const fn new(classifier: AnswerClassifier) -> Self {
        Self {
            classifier,
            session: None,
        }
    }

    /// Live session, if any
    #[must_use]
    pub const fn session(&self) -> Option<&ConfirmationSession> {
        self.session.as_ref()
    }

    /// Whether a session is waiting for an answer
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Begin confirming `destinations`, replacing any live session
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `destinations` is empty; no session
    /// is started in that case.
    pub fn start<S: AsRef<str>>(&mut self, destinations: &[S]) -> Result<Vec<Directive>> {
        let session = ConfirmationSession::new(destinations)?;

        tracing::info!(candidates = ?session.candidates(), "confirmation started");
        self.session = Some(session);

        Ok(self.ask_next())
    }

    /// Interpret the answer to the current question
    ///
    /// Returns no directives when no session is live.
    pub fn answer(&mut self, transcript: &str) -> Vec<Directive> {
        let Some(session) = self.session.as_mut() else {
            tracing::debug!(transcript, "answer ignored, no confirmation in progress");
            return Vec::new();
        };

        let heard = normalize(transcript);
        tracing::info!(answer = %heard, cursor = session.cursor(), "confirmation answer");

        match self.classifier.classify_normalized(&heard) {
            Answer::Affirmative => {
                let selected = session.current().map(ToString::to_string);
                self.session = None;

                tracing::info!(destination = ?selected, "destination selected");
                vec![
                    Directive::speak(SELECTED_MESSAGE, Priority::Normal),
                    Directive::Resolve(selected),
                ]
            }
            Answer::Negative => {
                session.advance();
                self.ask_next()
            }
            Answer::Unrecognized => {
                let mut directives = vec![Directive::speak(
                    clarification_prompt(&heard),
                    Priority::Normal,
                )];
                directives.extend(self.ask_next());
                directives
            }
        }
    }

    /// Ask the current question again after a session heard nothing
    ///
    /// Returns no directives when no session is live.
    pub fn reask(&mut self) -> Vec<Directive> {
        if let Some(session) = self.session.as_ref() {
            tracing::info!(cursor = session.cursor(), "no answer heard, asking again");
        }
        self.ask_next()
    }

    /// Abandon the live session
    ///
    /// Returns the resolution directive, or `None` when nothing was live.
    pub fn cancel(&mut self) -> Option<Directive> {
        self.session.take().map(|session| {
            tracing::info!(cursor = session.cursor(), "confirmation cancelled");
            Directive::Resolve(None)
        })
    }

    /// Ask about the candidate under the cursor, or finish when exhausted
    fn ask_next(&mut self) -> Vec<Directive> {
        let Some(session) = self.session.as_ref() else {
            return Vec::new();
        };

        match session.current() {
            Some(destination) => {
                let prompt = confirmation_prompt(session.cursor() + 1, destination);
                vec![Directive::speak(prompt, Priority::Normal), Directive::Listen]
            }
            None => {
                self.session = None;
                tracing::info!("no destination selected");
                vec![
                    Directive::speak(NO_SELECTION_MESSAGE, Priority::High),
                    Directive::Resolve(None),
                ]
            }
        }
    }
}
