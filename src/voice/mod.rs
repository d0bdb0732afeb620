//! Voice processing module
//!
//! Speech output queue, recognition control, voice selection and the
//! short audio alert queue. The platform engines themselves are
//! collaborators described by the traits in [`engine`].

mod alerts;
pub mod engine;
mod recognition;
mod selector;
mod speech_queue;

pub use alerts::{ALERT_GAP, ALERT_WINDOW, AudioAlertQueue, RECENT_PLAYS_CAPACITY, RecentPlays};
pub use engine::{
    ClipPlayer, RecognitionAlternative, RecognitionOptions, SpeechRecognizer, SpeechSynthesizer,
    SynthesisRequest,
};
pub use recognition::{
    AUTO_RESTART_DELAY, ERROR_RETRY_DELAY, ListenState, RecognitionController,
    RecognitionErrorKind, SessionEnd, SessionEndHandler, SessionOutcome, TranscriptHandler,
    best_transcript,
};
pub use selector::{DEFAULT_VOICE_PRIORITY, VoiceDescriptor, VoiceSelector};
pub use speech_queue::{Priority, SpeechOutputQueue, UTTERANCE_GAP, Utterance};
