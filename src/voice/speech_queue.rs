//! Serialized text-to-speech output
//!
//! Utterances are spoken one at a time in FIFO order. A high priority
//! utterance interrupts whatever is playing and drops the queued normal
//! utterances before it is queued itself.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::engine::{SpeechSynthesizer, SynthesisRequest};
use super::selector::{VoiceDescriptor, VoiceSelector};

/// Pause between consecutive utterances
pub const UTTERANCE_GAP: Duration = Duration::from_millis(100);

/// Utterance priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Priority {
    /// Queued behind everything already pending
    #[default]
    Normal,
    /// Interrupts the current utterance and drops pending normal ones
    High,
}

/// A single text-to-speech request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// Text to speak
    pub text: String,

    /// Scheduling priority
    pub priority: Priority,
}

/// Background drain task currently owning the engine
struct Worker {
    epoch: u64,
    handle: JoinHandle<()>,
    interrupt: Option<oneshot::Sender<()>>,
}

struct QueueState {
    pending: VecDeque<Utterance>,
    enabled: bool,
    worker: Option<Worker>,
    next_epoch: u64,
}

impl QueueState {
    fn owned_by(&self, epoch: u64) -> bool {
        self.worker.as_ref().is_some_and(|w| w.epoch == epoch)
    }
}

struct Inner {
    engine: Option<Arc<dyn SpeechSynthesizer>>,
    voices: VoiceSelector,
    voice_watch: Option<JoinHandle<()>>,
    state: Mutex<QueueState>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(watch) = self.voice_watch.take() {
            watch.abort();
        }
    }
}

/// Speech output queue with priority preemption
///
/// Cheap to clone; clones share the same queue and engine.
#[derive(Clone)]
pub struct SpeechOutputQueue {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SpeechOutputQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("SpeechOutputQueue")
            .field("available", &self.inner.engine.is_some())
            .field("enabled", &state.enabled)
            .field("speaking", &state.worker.is_some())
            .field("pending", &state.pending.len())
            .finish()
    }
}

impl SpeechOutputQueue {
    /// Create a queue driving the given engine
    ///
    /// The preferred voice is selected now and re-selected whenever the
    /// engine reports a new voice set. Must be called from within a Tokio
    /// runtime.
    #[must_use]
    pub fn new(engine: Arc<dyn SpeechSynthesizer>, voices: VoiceSelector) -> Self {
        let voice_watch = voices.follow(engine.voices());
        Self::build(Some(engine), voices, Some(voice_watch))
    }

    /// Create a queue for a platform without speech synthesis
    ///
    /// Every request is logged and ignored.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::build(None, VoiceSelector::default(), None)
    }

    fn build(
        engine: Option<Arc<dyn SpeechSynthesizer>>,
        voices: VoiceSelector,
        voice_watch: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                engine,
                voices,
                voice_watch,
                state: Mutex::new(QueueState {
                    pending: VecDeque::new(),
                    enabled: true,
                    worker: None,
                    next_epoch: 0,
                }),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue text for speaking
    ///
    /// Returns immediately; the utterance plays once everything ahead of
    /// it has finished. Never fails: an unavailable engine, disabled
    /// output or empty text only produce a log line.
    pub fn speak(&self, text: &str, priority: Priority) {
        let Some(engine) = self.inner.engine.clone() else {
            tracing::warn!(text, "speech synthesis unavailable, dropping utterance");
            return;
        };

        if text.trim().is_empty() {
            tracing::debug!("ignoring empty utterance");
            return;
        }

        let mut state = self.lock();
        if !state.enabled {
            return;
        }

        tracing::info!(text, ?priority, "speak");

        if priority == Priority::High {
            if let Some(worker) = state.worker.as_mut() {
                if let Some(interrupt) = worker.interrupt.take() {
                    let _ = interrupt.send(());
                }

                let before = state.pending.len();
                state.pending.retain(|u| u.priority == Priority::High);
                tracing::debug!(
                    dropped = before - state.pending.len(),
                    "high priority utterance preempting queue"
                );
            }
        }

        state.pending.push_back(Utterance {
            text: text.to_string(),
            priority,
        });

        if state.worker.is_none() {
            let epoch = state.next_epoch;
            state.next_epoch += 1;

            let handle = tokio::spawn(drain(Arc::clone(&self.inner), engine, epoch));
            state.worker = Some(Worker {
                epoch,
                handle,
                interrupt: None,
            });
        }
    }

    /// Enable or disable speech output
    ///
    /// Disabling stops the current utterance at once and drops everything
    /// still pending.
    pub fn set_voice_enabled(&self, enabled: bool) {
        let worker = {
            let mut state = self.lock();
            state.enabled = enabled;
            if enabled {
                None
            } else {
                state.pending.clear();
                state.worker.take()
            }
        };

        tracing::info!(enabled, "voice output toggled");

        if !enabled {
            if let Some(worker) = worker {
                worker.handle.abort();
            }
            if let Some(engine) = &self.inner.engine {
                engine.cancel();
            }
        }
    }

    /// Whether speech output is enabled
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    /// Whether an utterance is playing or the queue is still draining
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.lock().worker.is_some()
    }

    /// Number of utterances waiting behind the current one
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Whether a synthesis engine is present
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.inner.engine.is_some()
    }

    /// Voice currently used for new utterances
    #[must_use]
    pub fn preferred_voice(&self) -> Option<VoiceDescriptor> {
        self.inner.voices.preferred()
    }
}

/// Speak queued utterances until the queue is empty
async fn drain(inner: Arc<Inner>, engine: Arc<dyn SpeechSynthesizer>, epoch: u64) {
    loop {
        let (utterance, interrupted) = {
            let mut state = inner.state.lock().unwrap_or_else(PoisonError::into_inner);
            if !state.owned_by(epoch) {
                return;
            }

            let Some(utterance) = state.pending.pop_front() else {
                state.worker = None;
                tracing::debug!("speech queue idle");
                return;
            };

            let (tx, rx) = oneshot::channel();
            if let Some(worker) = state.worker.as_mut() {
                worker.interrupt = Some(tx);
            }
            (utterance, rx)
        };

        let request = SynthesisRequest::new(utterance.text, inner.voices.preferred());

        tokio::select! {
            result = engine.speak(&request) => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, text = %request.text, "speech synthesis failed");
                }
            }
            _ = interrupted => {
                engine.cancel();
                tracing::debug!(text = %request.text, "utterance interrupted");
            }
        }

        tokio::time::sleep(UTTERANCE_GAP).await;
    }
}
