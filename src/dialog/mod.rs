//! Spoken yes/no confirmation over candidate destinations

mod confirmation;
mod patterns;

pub use confirmation::{
    ConfirmationDialog, ConfirmationSession, Directive, MAX_CANDIDATES, NO_SELECTION_MESSAGE,
    SELECTED_MESSAGE, clarification_prompt, confirmation_prompt,
};
pub use patterns::{Answer, AnswerClassifier, DEFAULT_AFFIRMATIVE, DEFAULT_NEGATIVE, normalize};
