//! Voice assistant facade
//!
//! Wires the speech queue, recognition controller, confirmation dialog and
//! alert queue together and exposes the navigation-facing operations.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::Result;
use crate::config::Config;
use crate::dialog::{ConfirmationDialog, Directive, MAX_CANDIDATES};
use crate::voice::{
    AudioAlertQueue, ClipPlayer, Priority, RecognitionController, SessionEnd, SessionOutcome,
    SpeechOutputQueue, SpeechRecognizer, SpeechSynthesizer, TranscriptHandler,
};

/// Opening of the top destinations announcement
pub const TOP_DESTINATIONS_HEADER: &str = "추천 목적지입니다. ";

/// Callback receiving the outcome of a confirmation dialog
type ResolveCallback = Box<dyn FnOnce(Option<String>) + Send>;

struct DialogSlot {
    dialog: ConfirmationDialog,
    /// Present exactly while a dialog is live
    on_resolved: Option<ResolveCallback>,
    /// Receives transcripts heard outside a dialog
    transcripts: Option<TranscriptHandler>,
}

struct DialogShared {
    slot: Mutex<DialogSlot>,
    speech: SpeechOutputQueue,
    recognition: RecognitionController,
}

impl DialogShared {
    fn lock(&self) -> MutexGuard<'_, DialogSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Route a transcript to the live dialog, or to the general handler
    fn dispatch(&self, transcript: String) {
        let (directives, resolved, fallback) = {
            let mut slot = self.lock();
            if slot.dialog.is_active() {
                let directives = slot.dialog.answer(&transcript);
                let resolved = take_if_resolved(&mut slot, &directives);
                (directives, resolved, None)
            } else {
                (Vec::new(), None, slot.transcripts.clone())
            }
        };

        if let Some(handler) = fallback {
            handler(transcript);
            return;
        }
        if directives.is_empty() {
            tracing::debug!(transcript = %transcript, "transcript heard with no listener");
            return;
        }

        self.apply(directives, resolved);
    }

    /// Keep a live dialog moving after a session that produced no answer
    ///
    /// Silence asks the current question again. A failure that will not be
    /// retried resolves the dialog with `None`; its message was already
    /// spoken by the controller.
    fn session_ended(&self, end: SessionEnd) {
        if end.restart_pending || end.outcome == SessionOutcome::Heard {
            return;
        }

        let (directives, resolved) = {
            let mut slot = self.lock();
            if !slot.dialog.is_active() {
                return;
            }

            let directives = match end.outcome {
                SessionOutcome::Failed(kind) => {
                    tracing::warn!(error = %kind, "recognition failed, abandoning confirmation");
                    slot.dialog.cancel().into_iter().collect()
                }
                SessionOutcome::Silent | SessionOutcome::Heard => slot.dialog.reask(),
            };
            let resolved = take_if_resolved(&mut slot, &directives);
            (directives, resolved)
        };

        self.apply(directives, resolved);
    }

    /// Carry out dialog directives without holding the dialog lock
    fn apply(&self, directives: Vec<Directive>, mut resolved: Option<ResolveCallback>) {
        for directive in directives {
            match directive {
                Directive::Speak { text, priority } => self.speech.speak(&text, priority),
                Directive::Listen => {
                    if !self.recognition.start_listening() {
                        tracing::warn!("could not start listening for confirmation answer");
                    }
                }
                Directive::Resolve(selection) => {
                    if let Some(callback) = resolved.take() {
                        callback(selection);
                    }
                }
            }
        }
    }
}

fn take_if_resolved(slot: &mut DialogSlot, directives: &[Directive]) -> Option<ResolveCallback> {
    if directives.iter().any(|d| matches!(d, Directive::Resolve(_))) {
        slot.on_resolved.take()
    } else {
        None
    }
}

/// Builder for [`VoiceAssistant`]
///
/// Any engine left unset is treated as missing on this platform: the
/// matching operations log and do nothing.
pub struct VoiceAssistantBuilder {
    config: Config,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
    clip_player: Option<Arc<dyn ClipPlayer>>,
}

impl VoiceAssistantBuilder {
    /// Create a builder from configuration
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            synthesizer: None,
            recognizer: None,
            clip_player: None,
        }
    }

    /// Set the speech synthesis engine
    #[must_use]
    pub fn synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Set the speech recognition engine
    #[must_use]
    pub fn recognizer(mut self, recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    /// Set the alert clip player
    #[must_use]
    pub fn clip_player(mut self, player: Arc<dyn ClipPlayer>) -> Self {
        self.clip_player = Some(player);
        self
    }

    /// Build the assistant
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if a configured voice or answer pattern is invalid
    pub fn build(self) -> Result<VoiceAssistant> {
        let voices = self.config.voice_selector()?;
        let classifier = self.config.answer_classifier()?;

        let speech = if let Some(synthesizer) = self.synthesizer {
            SpeechOutputQueue::new(synthesizer, voices)
        } else {
            tracing::warn!("speech synthesis not available");
            SpeechOutputQueue::unavailable()
        };
        if !self.config.speech.enabled {
            speech.set_voice_enabled(false);
        }

        let recognition = if let Some(recognizer) = self.recognizer {
            RecognitionController::new(recognizer, speech.clone())
        } else {
            tracing::warn!("speech recognition not available");
            RecognitionController::unavailable(speech.clone())
        };

        let alerts = self
            .clip_player
            .map_or_else(AudioAlertQueue::unavailable, AudioAlertQueue::new);

        let dialog = Arc::new(DialogShared {
            slot: Mutex::new(DialogSlot {
                dialog: ConfirmationDialog::new(classifier),
                on_resolved: None,
                transcripts: None,
            }),
            speech: speech.clone(),
            recognition: recognition.clone(),
        });

        // The controller holds these handlers, so they must not keep the dialog alive
        let weak: Weak<DialogShared> = Arc::downgrade(&dialog);
        let handler = recognition.initialize(Arc::new(move |transcript| {
            if let Some(dialog) = weak.upgrade() {
                dialog.dispatch(transcript);
            }
        }));
        if let Err(e) = handler {
            tracing::warn!(error = %e, "voice answers will not be heard");
        }

        let weak: Weak<DialogShared> = Arc::downgrade(&dialog);
        recognition.on_session_end(Arc::new(move |end| {
            if let Some(dialog) = weak.upgrade() {
                dialog.session_ended(end);
            }
        }));

        let assistant = VoiceAssistant {
            speech,
            recognition,
            alerts,
            dialog,
        };

        if self.config.recognition.auto_restart {
            assistant.enable_auto_recognition();
        }

        tracing::info!(
            speech = assistant.speech.is_available(),
            recognition = assistant.recognition.is_initialized(),
            "voice assistant ready"
        );

        Ok(assistant)
    }
}

/// Voice interaction surface for the navigation assistant
///
/// Cheap to clone; clones share the same services.
#[derive(Clone)]
pub struct VoiceAssistant {
    speech: SpeechOutputQueue,
    recognition: RecognitionController,
    alerts: AudioAlertQueue,
    dialog: Arc<DialogShared>,
}

impl std::fmt::Debug for VoiceAssistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceAssistant")
            .field("speech", &self.speech)
            .field("recognition", &self.recognition)
            .field("alerts", &self.alerts)
            .field("confirming", &self.is_confirming())
            .finish()
    }
}

impl VoiceAssistant {
    /// Start building an assistant
    #[must_use]
    pub fn builder(config: Config) -> VoiceAssistantBuilder {
        VoiceAssistantBuilder::new(config)
    }

    /// Speak text through the output queue
    pub fn speak(&self, text: &str, priority: Priority) {
        self.speech.speak(text, priority);
    }

    /// Alias of [`speak`](Self::speak)
    pub fn speak_text(&self, text: &str, priority: Priority) {
        self.speak(text, priority);
    }

    /// Enable or disable speech output
    pub fn set_voice_enabled(&self, enabled: bool) {
        self.speech.set_voice_enabled(enabled);
    }

    /// Receive transcripts heard while no confirmation is running
    pub fn set_transcript_handler<F>(&self, handler: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.dialog.lock().transcripts = Some(Arc::new(handler));
    }

    /// Keep listening: restart recognition whenever a session ends
    pub fn enable_auto_recognition(&self) {
        self.recognition.set_auto_restart(true);
    }

    /// Stop restarting recognition; a running session finishes normally
    pub fn disable_auto_recognition(&self) {
        self.recognition.set_auto_restart(false);
    }

    /// Announce the first three destinations as a numbered list
    pub fn read_top_destinations<S: AsRef<str>>(&self, destinations: &[S]) {
        if destinations.is_empty() {
            tracing::warn!("no destinations to announce");
            return;
        }

        let mut text = String::from(TOP_DESTINATIONS_HEADER);
        for (i, destination) in destinations.iter().take(MAX_CANDIDATES).enumerate() {
            text.push_str(&format!("{}번: {}. ", i + 1, destination.as_ref()));
        }

        self.speech.speak(&text, Priority::Normal);
    }

    /// Ask the user to confirm one of the candidate destinations
    ///
    /// `on_resolved` is called exactly once: with the accepted destination,
    /// or with `None` when every candidate was rejected, the dialog was
    /// cancelled or superseded, or the list was empty. A dialog already
    /// running is superseded and resolved with `None`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `destinations` is empty, after
    /// `on_resolved` has been called with `None`
    pub fn confirm_destinations<S, F>(&self, destinations: &[S], on_resolved: F) -> Result<()>
    where
        S: AsRef<str>,
        F: FnOnce(Option<String>) + Send + 'static,
    {
        let started = {
            let mut slot = self.dialog.lock();
            match slot.dialog.start(destinations) {
                Ok(directives) => {
                    let superseded = slot.on_resolved.replace(Box::new(on_resolved));
                    Ok((directives, superseded))
                }
                Err(e) => Err((e, on_resolved)),
            }
        };

        let (directives, superseded) = match started {
            Ok(started) => started,
            Err((e, on_resolved)) => {
                tracing::error!(error = %e, "cannot start confirmation");
                on_resolved(None);
                return Err(e);
            }
        };

        if let Some(previous) = superseded {
            tracing::info!("previous confirmation superseded");
            self.recognition.stop_listening();
            previous(None);
        }

        self.dialog.apply(directives, None);
        Ok(())
    }

    /// Abandon a running confirmation, resolving it with `None`
    pub fn cancel_confirmation(&self) {
        let (directive, resolved) = {
            let mut slot = self.dialog.lock();
            let directive = slot.dialog.cancel();
            let resolved = slot.on_resolved.take();
            (directive, resolved)
        };

        if let Some(directive) = directive {
            self.recognition.stop_listening();
            self.dialog.apply(vec![directive], resolved);
        }
    }

    /// Whether a confirmation dialog is waiting for an answer
    #[must_use]
    pub fn is_confirming(&self) -> bool {
        self.dialog.lock().dialog.is_active()
    }

    /// Request playback of an alert clip
    ///
    /// Returns `false` when the request was dropped as a duplicate.
    pub fn enqueue_alert(&self, clip: &str) -> bool {
        self.alerts.enqueue_alert(clip)
    }

    /// Stop all voice activity
    ///
    /// Cancels recognition and any pending retry, resolves a running
    /// confirmation with `None`, silences speech and clears queued alerts.
    pub fn shutdown(&self) {
        self.recognition.shutdown();
        self.cancel_confirmation();
        self.speech.set_voice_enabled(false);
        self.alerts.clear();
        tracing::info!("voice assistant shut down");
    }

    /// Speech output queue
    #[must_use]
    pub fn speech(&self) -> &SpeechOutputQueue {
        &self.speech
    }

    /// Recognition controller
    #[must_use]
    pub fn recognition(&self) -> &RecognitionController {
        &self.recognition
    }

    /// Alert queue
    #[must_use]
    pub fn alerts(&self) -> &AudioAlertQueue {
        &self.alerts
    }
}
