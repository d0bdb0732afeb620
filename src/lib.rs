//! navi-voice - Voice interaction core for a navigation assistant
//!
//! This library provides the orchestration around platform speech engines:
//! - Serialized text-to-speech output with priority preemption
//! - Single-shot speech recognition with retry and auto restart
//! - A spoken yes/no confirmation dialog over candidate destinations
//! - A deduplicating queue for short audio alerts
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  VoiceAssistant                      │
//! │   speak  │  confirm_destinations  │  enqueue_alert   │
//! └──────┬──────────────┬──────────────────────┬────────┘
//!        │              │                      │
//! ┌──────▼──────┐ ┌─────▼──────────────┐ ┌─────▼───────┐
//! │ SpeechOutput│◄┤ ConfirmationDialog │ │ AudioAlert  │
//! │ Queue       │ │ RecognitionControl │ │ Queue       │
//! └──────┬──────┘ └─────┬──────────────┘ └─────┬───────┘
//!        │              │                      │
//! ┌──────▼──────────────▼──────────────────────▼────────┐
//! │     Platform engines (synthesis, recognition, clips) │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod assistant;
pub mod config;
pub mod console;
pub mod dialog;
pub mod error;
pub mod voice;

pub use assistant::{VoiceAssistant, VoiceAssistantBuilder};
pub use config::Config;
pub use dialog::{Answer, AnswerClassifier, ConfirmationDialog, Directive};
pub use error::{Error, Result};
pub use voice::{
    AudioAlertQueue, ListenState, Priority, RecognitionController, RecognitionErrorKind,
    SpeechOutputQueue, VoiceDescriptor, VoiceSelector,
};
