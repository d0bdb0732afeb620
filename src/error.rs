//! Error types for navi-voice

use thiserror::Error;

use crate::voice::RecognitionErrorKind;

/// Result type alias for navi-voice operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in navi-voice
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Speech synthesis failed for one utterance
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Recognition session ended with a platform error
    #[error("recognition error: {0}")]
    Recognition(RecognitionErrorKind),

    /// Audio clip playback failed
    #[error("playback error: {0}")]
    Playback(String),

    /// Caller supplied unusable input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Platform capability not available
    #[error("capability missing: {0}")]
    CapabilityMissing(&'static str),

    /// Answer or voice pattern failed to compile
    #[error("pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
