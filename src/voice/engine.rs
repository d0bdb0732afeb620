//! Platform speech and audio capabilities
//!
//! The synthesis engine, the recognition engine and the clip player are
//! provided by the host platform. The services in this crate only drive
//! them through these traits.

use async_trait::async_trait;
use tokio::sync::watch;

use super::recognition::RecognitionErrorKind;
use super::selector::VoiceDescriptor;
use crate::Result;

/// Recognition language for every session
pub const RECOGNITION_LANGUAGE: &str = "ko-KR";

/// Number of alternative transcripts requested per session
pub const MAX_ALTERNATIVES: u8 = 3;

/// One text-to-speech request handed to the engine
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    /// Text to speak
    pub text: String,

    /// Voice to use; `None` leaves the platform default
    pub voice: Option<VoiceDescriptor>,

    /// Speaking rate multiplier
    pub rate: f32,

    /// Pitch multiplier
    pub pitch: f32,

    /// Output volume (0.0 to 1.0)
    pub volume: f32,
}

impl SynthesisRequest {
    /// Create a request with neutral rate, pitch and full volume
    #[must_use]
    pub fn new(text: impl Into<String>, voice: Option<VoiceDescriptor>) -> Self {
        Self {
            text: text.into(),
            voice,
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

/// Session configuration passed to the recognition engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionOptions {
    /// BCP 47 language tag
    pub language: String,

    /// Keep the session open after the first result
    pub continuous: bool,

    /// Emit partial results while the user is speaking
    pub interim_results: bool,

    /// Maximum alternatives per result
    pub max_alternatives: u8,
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self {
            language: RECOGNITION_LANGUAGE.to_string(),
            continuous: false,
            interim_results: false,
            max_alternatives: MAX_ALTERNATIVES,
        }
    }
}

/// One ranked transcript candidate
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionAlternative {
    /// Transcript text
    pub transcript: String,

    /// Engine-reported confidence, if any
    pub confidence: Option<f32>,
}

impl RecognitionAlternative {
    /// Create an alternative with a known confidence
    #[must_use]
    pub fn new(transcript: impl Into<String>, confidence: f32) -> Self {
        Self {
            transcript: transcript.into(),
            confidence: Some(confidence),
        }
    }

    /// Confidence with a missing value read as zero
    #[must_use]
    pub fn score(&self) -> f32 {
        self.confidence.unwrap_or(0.0)
    }
}

/// Text-to-speech engine
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Voice set reported by the platform
    ///
    /// The receiver observes every later update of the set.
    fn voices(&self) -> watch::Receiver<Vec<VoiceDescriptor>>;

    /// Speak one utterance, resolving when it has finished playing
    ///
    /// # Errors
    ///
    /// Returns error if the engine fails to synthesize or play the text
    async fn speak(&self, request: &SynthesisRequest) -> Result<()>;

    /// Stop the utterance currently being spoken
    fn cancel(&self);
}

/// Single-shot speech recognition engine
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Run one recognition session until it ends
    ///
    /// Resolves with the alternatives of the final result. An empty list
    /// means the session ended without producing a result.
    ///
    /// # Errors
    ///
    /// Returns the classified platform error when the session fails
    async fn recognize(
        &self,
        options: &RecognitionOptions,
    ) -> std::result::Result<Vec<RecognitionAlternative>, RecognitionErrorKind>;

    /// Ask the engine to end the running session
    fn stop(&self);
}

/// Audio clip playback primitive
#[async_trait]
pub trait ClipPlayer: Send + Sync {
    /// Play a referenced clip, resolving when it ends
    ///
    /// # Errors
    ///
    /// Returns error if the clip cannot be loaded or played
    async fn play(&self, clip: &str) -> Result<()>;
}
