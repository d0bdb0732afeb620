//! Speech recognition session control
//!
//! Wraps single-shot recognition sessions with the listening state machine,
//! best-alternative selection, spoken error reporting, error retries and
//! the optional always-listening restart.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use super::engine::{RecognitionAlternative, RecognitionOptions, SpeechRecognizer};
use super::speech_queue::{Priority, SpeechOutputQueue};
use crate::{Error, Result};

/// Delay before an ended session is restarted in auto recognition mode
pub const AUTO_RESTART_DELAY: Duration = Duration::from_millis(500);

/// Delay before retrying after a "no speech" or "aborted" error
pub const ERROR_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Callback receiving the winning transcript of a session
pub type TranscriptHandler = Arc<dyn Fn(String) + Send + Sync>;

/// How a recognition session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// A transcript was handed to the transcript handler
    Heard,
    /// The engine finished without any transcript
    Silent,
    /// The engine reported an error
    Failed(RecognitionErrorKind),
}

/// Report passed to the session end handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionEnd {
    /// What the session produced
    pub outcome: SessionOutcome,

    /// An error retry or a deferred start will open another session
    pub restart_pending: bool,
}

/// Callback told about every session that ran to completion
pub type SessionEndHandler = Arc<dyn Fn(SessionEnd) + Send + Sync>;

/// Listening state of a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenState {
    /// No session running
    Idle,
    /// A session is capturing speech
    Listening,
    /// A result is being handed to the transcript handler
    Processing,
}

/// Canonical recognition failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecognitionErrorKind {
    /// No speech was detected
    NoSpeech,
    /// The session was aborted
    Aborted,
    /// No microphone could be opened
    AudioCapture,
    /// The recognition service could not be reached
    Network,
    /// Microphone permission was denied
    NotAllowed,
    /// The recognition service refused the request
    ServiceNotAllowed,
    /// Any other failure
    Other,
}

impl RecognitionErrorKind {
    /// Map a platform error code to its category
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "no-speech" => Self::NoSpeech,
            "aborted" => Self::Aborted,
            "audio-capture" => Self::AudioCapture,
            "network" => Self::Network,
            "not-allowed" => Self::NotAllowed,
            "service-not-allowed" => Self::ServiceNotAllowed,
            _ => Self::Other,
        }
    }

    /// Platform error code for this category
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NoSpeech => "no-speech",
            Self::Aborted => "aborted",
            Self::AudioCapture => "audio-capture",
            Self::Network => "network",
            Self::NotAllowed => "not-allowed",
            Self::ServiceNotAllowed => "service-not-allowed",
            Self::Other => "other",
        }
    }

    /// Message spoken to the user
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NoSpeech => "음성이 감지되지 않았습니다. 다시 말씀해주세요.",
            Self::Aborted => "음성 인식이 중단되었습니다. 다시 시도해주세요.",
            Self::AudioCapture => "마이크를 찾을 수 없습니다. 마이크 연결을 확인해주세요.",
            Self::Network => {
                "네트워크 오류로 음성 인식이 실패했습니다. 인터넷 연결을 확인해주세요."
            }
            Self::NotAllowed => {
                "마이크 사용 권한이 거부되었습니다. 브라우저 설정에서 마이크 권한을 허용해주세요."
            }
            Self::ServiceNotAllowed => "음성 인식 서비스가 허용되지 않았습니다.",
            Self::Other => "음성 인식 중 오류가 발생했습니다.",
        }
    }

    /// Whether this failure schedules an automatic retry
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::NoSpeech | Self::Aborted)
    }
}

impl std::fmt::Display for RecognitionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Pick the highest-confidence alternative
///
/// Missing confidence counts as zero; on a tie the earlier alternative wins.
#[must_use]
pub fn best_transcript(alternatives: &[RecognitionAlternative]) -> Option<&RecognitionAlternative> {
    let mut iter = alternatives.iter();
    let first = iter.next()?;

    Some(iter.fold(first, |best, alt| {
        if alt.score() > best.score() { alt } else { best }
    }))
}

struct Session {
    id: u64,
    task: JoinHandle<()>,
}

struct ControllerState {
    listen: ListenState,
    auto_restart: bool,
    handler: Option<TranscriptHandler>,
    session_end: Option<SessionEndHandler>,
    session: Option<Session>,
    next_session: u64,
    /// Start requested while a result was being processed
    start_deferred: bool,
    /// Bumped on shutdown so pending timers become no-ops
    generation: u64,
}

struct Inner {
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
    speech: SpeechOutputQueue,
    options: RecognitionOptions,
    state: Mutex<ControllerState>,
}

/// Recognition controller
///
/// Only one session runs at a time per controller. Cheap to clone; clones
/// share the same state.
#[derive(Clone)]
pub struct RecognitionController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RecognitionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("RecognitionController")
            .field("available", &self.inner.recognizer.is_some())
            .field("state", &state.listen)
            .field("auto_restart", &state.auto_restart)
            .finish_non_exhaustive()
    }
}

impl RecognitionController {
    /// Create a controller driving the given engine
    ///
    /// Errors are reported to the user through `speech`.
    #[must_use]
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>, speech: SpeechOutputQueue) -> Self {
        Self::build(Some(recognizer), speech)
    }

    /// Create a controller for a platform without speech recognition
    #[must_use]
    pub fn unavailable(speech: SpeechOutputQueue) -> Self {
        Self::build(None, speech)
    }

    fn build(recognizer: Option<Arc<dyn SpeechRecognizer>>, speech: SpeechOutputQueue) -> Self {
        Self {
            inner: Arc::new(Inner {
                recognizer,
                speech,
                options: RecognitionOptions::default(),
                state: Mutex::new(ControllerState {
                    listen: ListenState::Idle,
                    auto_restart: false,
                    handler: None,
                    session_end: None,
                    session: None,
                    next_session: 0,
                    start_deferred: false,
                    generation: 0,
                }),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install the handler receiving each session's best transcript
    ///
    /// Replaces any previous handler.
    ///
    /// # Errors
    ///
    /// Returns `Error::CapabilityMissing` when there is no recognition engine
    pub fn initialize(&self, handler: TranscriptHandler) -> Result<()> {
        if self.inner.recognizer.is_none() {
            return Err(Error::CapabilityMissing("speech recognition"));
        }

        self.lock().handler = Some(handler);
        Ok(())
    }

    /// Install the handler told how each completed session ended
    ///
    /// Sessions cut short by [`stop_listening`](Self::stop_listening) are
    /// not reported.
    pub fn on_session_end(&self, handler: SessionEndHandler) {
        self.lock().session_end = Some(handler);
    }

    /// Whether an engine and a transcript handler are both present
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner.recognizer.is_some() && self.lock().handler.is_some()
    }

    /// Current listening state
    #[must_use]
    pub fn state(&self) -> ListenState {
        self.lock().listen
    }

    /// Whether a session is running or its result is being processed
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.lock().listen != ListenState::Idle
    }

    /// Whether ended sessions are restarted automatically
    #[must_use]
    pub fn auto_restart(&self) -> bool {
        self.lock().auto_restart
    }

    /// Session configuration sent to the engine
    #[must_use]
    pub fn options(&self) -> &RecognitionOptions {
        &self.inner.options
    }

    /// Start a recognition session
    ///
    /// Logs and returns `false` if the controller is not initialized or a
    /// session is already running. A start requested from inside the
    /// transcript handler is deferred until the handler returns.
    pub fn start_listening(&self) -> bool {
        let Some(recognizer) = self.inner.recognizer.clone() else {
            tracing::warn!("speech recognition is not initialized");
            return false;
        };

        let mut state = self.lock();
        if state.handler.is_none() {
            tracing::warn!("speech recognition is not initialized");
            return false;
        }

        match state.listen {
            ListenState::Listening => {
                tracing::warn!("recognition session already active");
                return false;
            }
            ListenState::Processing => {
                tracing::debug!("start deferred until result handling completes");
                state.start_deferred = true;
                return true;
            }
            ListenState::Idle => {}
        }

        let id = state.next_session;
        state.next_session += 1;
        state.listen = ListenState::Listening;

        let task = tokio::spawn(run_session(self.clone(), recognizer, id));
        state.session = Some(Session { id, task });

        tracing::info!(
            session = id,
            language = %self.inner.options.language,
            "recognition started"
        );
        true
    }

    /// Stop the running session, discarding its outcome
    ///
    /// No-op unless a session is listening. In auto recognition mode a new
    /// session is still scheduled, as for any other session end.
    pub fn stop_listening(&self) {
        let (session, auto_restart) = {
            let mut state = self.lock();
            if state.listen != ListenState::Listening {
                return;
            }
            state.listen = ListenState::Idle;
            (state.session.take(), state.auto_restart)
        };

        if let Some(recognizer) = &self.inner.recognizer {
            recognizer.stop();
        }
        if let Some(session) = session {
            session.task.abort();
            tracing::info!(session = session.id, "recognition stopped");
        }

        if auto_restart {
            self.schedule_auto_restart();
        }
    }

    /// Turn always-listening mode on or off
    ///
    /// Turning it on starts a session right away when the controller is
    /// initialized and idle.
    pub fn set_auto_restart(&self, enabled: bool) {
        let start_now = {
            let mut state = self.lock();
            state.auto_restart = enabled;
            enabled && state.listen == ListenState::Idle && state.handler.is_some()
        };

        tracing::info!(enabled, "auto recognition toggled");

        if start_now && self.inner.recognizer.is_some() {
            self.start_listening();
        }
    }

    /// Stop listening and cancel every pending restart or retry
    pub fn shutdown(&self) {
        {
            let mut state = self.lock();
            state.auto_restart = false;
            state.start_deferred = false;
            state.generation += 1;
        }
        self.stop_listening();
    }

    /// Handle the end of a session
    fn finish_session(
        &self,
        id: u64,
        outcome: std::result::Result<Vec<RecognitionAlternative>, RecognitionErrorKind>,
    ) {
        let handler = {
            let mut state = self.lock();
            if state.session.as_ref().is_none_or(|s| s.id != id) {
                return;
            }
            state.session = None;

            let has_result = outcome.as_ref().is_ok_and(|alts| !alts.is_empty());
            if has_result {
                state.listen = ListenState::Processing;
                state.handler.clone()
            } else {
                state.listen = ListenState::Idle;
                None
            }
        };

        let mut retry_scheduled = false;
        let ended = match outcome {
            Ok(alternatives) => {
                for (rank, alt) in alternatives.iter().enumerate() {
                    tracing::debug!(
                        rank = rank + 1,
                        transcript = %alt.transcript,
                        confidence = ?alt.confidence,
                        "recognition alternative"
                    );
                }

                if let Some(best) = best_transcript(&alternatives) {
                    tracing::info!(
                        session = id,
                        transcript = %best.transcript,
                        confidence = best.score(),
                        "recognition result"
                    );
                    if let Some(handler) = handler {
                        handler(best.transcript.clone());
                    }
                    SessionOutcome::Heard
                } else {
                    tracing::debug!(session = id, "session ended without a result");
                    SessionOutcome::Silent
                }
            }
            Err(kind) => {
                tracing::warn!(session = id, error = %kind, "recognition error");
                self.inner.speech.speak(kind.message(), Priority::High);
                if kind.is_retryable() {
                    self.schedule_retry();
                    retry_scheduled = true;
                }
                SessionOutcome::Failed(kind)
            }
        };

        let (start_deferred, auto_restart, session_end) = {
            let mut state = self.lock();
            if state.listen == ListenState::Processing {
                state.listen = ListenState::Idle;
            }
            (
                std::mem::take(&mut state.start_deferred),
                state.auto_restart,
                state.session_end.clone(),
            )
        };

        tracing::info!(session = id, outcome = ?ended, "recognition ended");

        if start_deferred {
            self.start_listening();
        }
        if auto_restart {
            self.schedule_auto_restart();
        }
        if let Some(session_end) = session_end {
            session_end(SessionEnd {
                outcome: ended,
                restart_pending: retry_scheduled || start_deferred,
            });
        }
    }

    fn schedule_retry(&self) {
        let controller = self.clone();
        let generation = self.lock().generation;

        tokio::spawn(async move {
            tokio::time::sleep(ERROR_RETRY_DELAY).await;

            if controller.lock().generation != generation {
                return;
            }
            if controller.is_active() {
                tracing::debug!("retry skipped, session already active");
                return;
            }

            tracing::info!("retrying speech recognition");
            controller.start_listening();
        });
    }

    fn schedule_auto_restart(&self) {
        let controller = self.clone();
        let generation = self.lock().generation;

        tokio::spawn(async move {
            tokio::time::sleep(AUTO_RESTART_DELAY).await;

            {
                let state = controller.lock();
                if state.generation != generation || !state.auto_restart {
                    return;
                }
                if state.listen != ListenState::Idle {
                    tracing::debug!("auto restart skipped, session already active");
                    return;
                }
            }

            controller.start_listening();
        });
    }
}

/// Drive one engine session and hand its outcome back to the controller
async fn run_session(
    controller: RecognitionController,
    recognizer: Arc<dyn SpeechRecognizer>,
    id: u64,
) {
    let outcome = recognizer.recognize(&controller.inner.options).await;
    controller.finish_session(id, outcome);
}
