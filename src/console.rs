//! Terminal stand-ins for the platform engines
//!
//! Used by the `navi-voice` binary: speech is printed to stdout, answers
//! are read from stdin lines and alert clips are only logged.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::{Mutex, Notify, watch};

use crate::Result;
use crate::voice::{
    ClipPlayer, RecognitionAlternative, RecognitionErrorKind, RecognitionOptions,
    SpeechRecognizer, SpeechSynthesizer, SynthesisRequest, VoiceDescriptor,
};

/// Simulated speaking time per character
const TIME_PER_CHAR: Duration = Duration::from_millis(40);

/// Upper bound on simulated speaking time
const MAX_UTTERANCE_TIME: Duration = Duration::from_secs(4);

/// Simulated length of one alert clip
const CLIP_TIME: Duration = Duration::from_millis(300);

/// Synthesizer printing each utterance to stdout
pub struct ConsoleSynthesizer {
    voices: watch::Sender<Vec<VoiceDescriptor>>,
    cancelled: Notify,
}

impl Default for ConsoleSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleSynthesizer {
    /// Create a synthesizer offering one Korean and one English voice
    #[must_use]
    pub fn new() -> Self {
        let (voices, _) = watch::channel(vec![
            VoiceDescriptor::new("console-en", "Console English", "en-US"),
            VoiceDescriptor::new("console-ko", "Console Korean", "ko-KR"),
        ]);

        Self {
            voices,
            cancelled: Notify::new(),
        }
    }

    fn speaking_time(text: &str) -> Duration {
        let chars = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
        TIME_PER_CHAR.saturating_mul(chars).min(MAX_UTTERANCE_TIME)
    }
}

#[async_trait]
impl SpeechSynthesizer for ConsoleSynthesizer {
    fn voices(&self) -> watch::Receiver<Vec<VoiceDescriptor>> {
        self.voices.subscribe()
    }

    async fn speak(&self, request: &SynthesisRequest) -> Result<()> {
        let voice = request.voice.as_ref().map_or("default", |v| v.name.as_str());
        println!("[{voice}] {}", request.text);

        tokio::select! {
            () = tokio::time::sleep(Self::speaking_time(&request.text)) => {}
            () = self.cancelled.notified() => {
                println!("[{voice}] (interrupted)");
            }
        }

        Ok(())
    }

    fn cancel(&self) {
        self.cancelled.notify_waiters();
    }
}

/// Recognizer reading one answer per stdin line
///
/// A blank line counts as "no speech"; end of input is reported as a
/// capture failure and flagged on [`closed`](Self::closed).
pub struct StdinRecognizer {
    lines: Mutex<Lines<BufReader<Stdin>>>,
    stopped: Notify,
    closed: watch::Sender<bool>,
}

impl Default for StdinRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl StdinRecognizer {
    /// Create a recognizer over the process stdin
    #[must_use]
    pub fn new() -> Self {
        let (closed, _) = watch::channel(false);

        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
            stopped: Notify::new(),
            closed,
        }
    }

    /// Observe whether stdin has reached end of input
    #[must_use]
    pub fn closed(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }
}

#[async_trait]
impl SpeechRecognizer for StdinRecognizer {
    async fn recognize(
        &self,
        options: &RecognitionOptions,
    ) -> std::result::Result<Vec<RecognitionAlternative>, RecognitionErrorKind> {
        tracing::debug!(language = %options.language, "waiting for typed answer");
        let mut lines = self.lines.lock().await;

        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => Err(RecognitionErrorKind::NoSpeech),
                Ok(Some(line)) => Ok(vec![RecognitionAlternative::new(line.trim(), 1.0)]),
                Ok(None) => {
                    self.closed.send_replace(true);
                    Err(RecognitionErrorKind::AudioCapture)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read stdin");
                    Err(RecognitionErrorKind::AudioCapture)
                }
            },
            () = self.stopped.notified() => Ok(Vec::new()),
        }
    }

    fn stop(&self) {
        self.stopped.notify_waiters();
    }
}

/// Clip player that logs each clip instead of playing audio
#[derive(Debug, Default)]
pub struct LogClipPlayer;

#[async_trait]
impl ClipPlayer for LogClipPlayer {
    async fn play(&self, clip: &str) -> Result<()> {
        tracing::info!(clip, "playing alert");
        println!("[alert] {clip}");
        tokio::time::sleep(CLIP_TIME).await;
        Ok(())
    }
}
