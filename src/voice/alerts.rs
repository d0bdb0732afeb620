//! Short audio alert playback queue
//!
//! Repeated triggers of the same clip inside the alert window are dropped,
//! and queued clips that waited longer than the window are discarded
//! instead of being played late.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::engine::ClipPlayer;

/// Dedup and staleness window
pub const ALERT_WINDOW: Duration = Duration::from_secs(2);

/// Number of recent play records kept for deduplication
pub const RECENT_PLAYS_CAPACITY: usize = 10;

/// Pause between consecutive clips
pub const ALERT_GAP: Duration = Duration::from_millis(100);

/// A requested clip and when it was requested
#[derive(Debug, Clone, PartialEq, Eq)]
struct AlertEntry {
    clip: String,
    enqueued_at: Instant,
}

/// Bounded history of recent play requests
#[derive(Debug)]
pub struct RecentPlays {
    records: VecDeque<AlertEntry>,
    capacity: usize,
}

impl Default for RecentPlays {
    fn default() -> Self {
        Self::with_capacity(RECENT_PLAYS_CAPACITY)
    }
}

impl RecentPlays {
    /// Create a history keeping at most `capacity` records
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Whether `clip` was recorded less than [`ALERT_WINDOW`] before `now`
    #[must_use]
    pub fn is_recent(&self, clip: &str, now: Instant) -> bool {
        self.records
            .iter()
            .any(|r| r.clip == clip && now.duration_since(r.enqueued_at) < ALERT_WINDOW)
    }

    /// Record a play request, evicting the oldest record when full
    pub fn record(&mut self, clip: &str, now: Instant) {
        self.records.push_back(AlertEntry {
            clip: clip.to_string(),
            enqueued_at: now,
        });
        while self.records.len() > self.capacity {
            self.records.pop_front();
        }
    }

    /// Number of records held
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records are held
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

struct AlertState {
    recent: RecentPlays,
    queue: VecDeque<AlertEntry>,
    worker: Option<(u64, JoinHandle<()>)>,
    next_epoch: u64,
}

impl AlertState {
    fn owned_by(&self, epoch: u64) -> bool {
        self.worker.as_ref().is_some_and(|(e, _)| *e == epoch)
    }

    /// Drop entries that waited longer than the alert window
    fn purge_stale(&mut self, now: Instant) {
        while let Some(entry) = self.queue.front() {
            if now.duration_since(entry.enqueued_at) <= ALERT_WINDOW {
                break;
            }
            tracing::debug!(clip = %entry.clip, "discarding stale alert");
            self.queue.pop_front();
        }
    }
}

struct Inner {
    player: Option<Arc<dyn ClipPlayer>>,
    state: Mutex<AlertState>,
}

/// Deduplicating FIFO for one-shot alert clips
///
/// Cheap to clone; clones share the same queue.
#[derive(Clone)]
pub struct AudioAlertQueue {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for AudioAlertQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("AudioAlertQueue")
            .field("available", &self.inner.player.is_some())
            .field("playing", &state.worker.is_some())
            .field("queued", &state.queue.len())
            .finish()
    }
}

impl AudioAlertQueue {
    /// Create a queue playing through `player`
    #[must_use]
    pub fn new(player: Arc<dyn ClipPlayer>) -> Self {
        Self::build(Some(player))
    }

    /// Create a queue for a platform without clip playback
    #[must_use]
    pub fn unavailable() -> Self {
        Self::build(None)
    }

    fn build(player: Option<Arc<dyn ClipPlayer>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                player,
                state: Mutex::new(AlertState {
                    recent: RecentPlays::default(),
                    queue: VecDeque::new(),
                    worker: None,
                    next_epoch: 0,
                }),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AlertState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Request playback of a clip
    ///
    /// Returns `false` when the request was dropped as a duplicate or no
    /// player is available. Must be called from within a Tokio runtime.
    pub fn enqueue_alert(&self, clip: &str) -> bool {
        let Some(player) = self.inner.player.clone() else {
            tracing::warn!(clip, "audio playback unavailable, dropping alert");
            return false;
        };

        let now = Instant::now();
        let mut state = self.lock();

        if state.recent.is_recent(clip, now) {
            tracing::debug!(clip, "duplicate alert suppressed");
            return false;
        }

        state.recent.record(clip, now);
        state.queue.push_back(AlertEntry {
            clip: clip.to_string(),
            enqueued_at: now,
        });

        if state.worker.is_none() {
            let epoch = state.next_epoch;
            state.next_epoch += 1;

            let handle = tokio::spawn(play_queued(Arc::clone(&self.inner), player, epoch));
            state.worker = Some((epoch, handle));
        }

        true
    }

    /// Whether a clip is playing or the queue is still draining
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.lock().worker.is_some()
    }

    /// Number of clips waiting to be played
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Stop playback and drop every queued clip
    ///
    /// The dedup history is kept, so a clip cleared here is still
    /// suppressed until its window has passed.
    pub fn clear(&self) {
        let worker = {
            let mut state = self.lock();
            state.queue.clear();
            state.worker.take()
        };

        if let Some((_, handle)) = worker {
            handle.abort();
        }
    }
}

/// Play queued clips until none are left
async fn play_queued(inner: Arc<Inner>, player: Arc<dyn ClipPlayer>, epoch: u64) {
    loop {
        let clip = {
            let mut state = inner.state.lock().unwrap_or_else(PoisonError::into_inner);
            if !state.owned_by(epoch) {
                return;
            }

            state.purge_stale(Instant::now());

            let Some(entry) = state.queue.pop_front() else {
                state.worker = None;
                return;
            };
            entry.clip
        };

        match player.play(&clip).await {
            Ok(()) => tracing::debug!(clip = %clip, "alert played"),
            Err(e) => tracing::warn!(clip = %clip, error = %e, "alert playback failed"),
        }

        tokio::time::sleep(ALERT_GAP).await;
    }
}
