//! Shared test utilities
//!
//! Mock platform engines recording every call. All timing runs on the
//! Tokio clock, so tests use `start_paused = true` and advance it with
//! `tokio::time::sleep`.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use navi_voice::voice::{
    ClipPlayer, RecognitionAlternative, RecognitionErrorKind, RecognitionOptions,
    SpeechRecognizer, SpeechSynthesizer, SynthesisRequest, VoiceDescriptor,
};
use navi_voice::{Config, Error, VoiceAssistant};
use tokio::sync::{Notify, watch};
use tokio::time::Instant;

/// Let spawned tasks run without advancing the clock
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

/// Advance the paused clock
pub async fn advance_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Korean and English voices in the order a platform might report them
pub fn platform_voices() -> Vec<VoiceDescriptor> {
    vec![
        VoiceDescriptor::new("en-1", "Samantha", "en-US"),
        VoiceDescriptor::new("ko-1", "Yuna", "ko-KR"),
    ]
}

/// What the mock synthesizer observed
#[derive(Debug, Default)]
pub struct SynthLog {
    /// Texts in the order speaking began
    pub started: Vec<String>,
    /// Start instant of each entry in `started`
    pub start_times: Vec<Instant>,
    /// Texts that played to completion
    pub completed: Vec<String>,
    /// Texts cut off before completion
    pub interrupted: Vec<String>,
    /// Voice id requested for each utterance
    pub voices_used: Vec<Option<String>>,
    /// Utterances currently in flight
    pub active: usize,
    /// Highest number of utterances ever in flight at once
    pub max_active: usize,
    /// Number of cancel calls
    pub cancel_calls: usize,
}

struct InFlight {
    log: Arc<Mutex<SynthLog>>,
    text: String,
    done: bool,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.active -= 1;
        if !self.done {
            log.interrupted.push(self.text.clone());
        }
    }
}

/// Synthesizer taking a fixed time per utterance
pub struct MockSynthesizer {
    log: Arc<Mutex<SynthLog>>,
    duration: Duration,
    failing: HashSet<String>,
    voices: watch::Sender<Vec<VoiceDescriptor>>,
    cancelled: Notify,
}

impl MockSynthesizer {
    pub fn new(duration: Duration) -> Self {
        let (voices, _) = watch::channel(platform_voices());
        Self {
            log: Arc::new(Mutex::new(SynthLog::default())),
            duration,
            failing: HashSet::new(),
            voices,
            cancelled: Notify::new(),
        }
    }

    /// Make synthesis of `text` fail
    pub fn failing_on(mut self, text: &str) -> Self {
        self.failing.insert(text.to_string());
        self
    }

    pub fn log(&self) -> MutexGuard<'_, SynthLog> {
        self.log.lock().unwrap()
    }

    pub fn started(&self) -> Vec<String> {
        self.log().started.clone()
    }

    /// Report a new voice set
    pub fn set_voices(&self, voices: Vec<VoiceDescriptor>) {
        self.voices.send_replace(voices);
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    fn voices(&self) -> watch::Receiver<Vec<VoiceDescriptor>> {
        self.voices.subscribe()
    }

    async fn speak(&self, request: &SynthesisRequest) -> navi_voice::Result<()> {
        {
            let mut log = self.log();
            log.started.push(request.text.clone());
            log.start_times.push(Instant::now());
            log.voices_used
                .push(request.voice.as_ref().map(|v| v.id.clone()));
            log.active += 1;
            log.max_active = log.max_active.max(log.active);
        }

        let mut in_flight = InFlight {
            log: Arc::clone(&self.log),
            text: request.text.clone(),
            done: false,
        };

        if self.failing.contains(&request.text) {
            in_flight.done = true;
            return Err(Error::Synthesis("engine failure".to_string()));
        }

        tokio::select! {
            () = tokio::time::sleep(self.duration) => {
                in_flight.done = true;
                self.log().completed.push(request.text.clone());
            }
            () = self.cancelled.notified() => {}
        }

        Ok(())
    }

    fn cancel(&self) {
        self.log().cancel_calls += 1;
        self.cancelled.notify_waiters();
    }
}

type Scripted = Result<Vec<RecognitionAlternative>, RecognitionErrorKind>;

/// What the mock recognizer observed
#[derive(Debug, Default)]
pub struct RecognizerLog {
    /// Options of every session started
    pub sessions: Vec<RecognitionOptions>,
    /// Sessions currently running
    pub active: usize,
    /// Highest number of sessions ever running at once
    pub max_active: usize,
    /// Number of stop calls
    pub stop_calls: usize,
}

struct RunningSession(Arc<Mutex<RecognizerLog>>);

impl Drop for RunningSession {
    fn drop(&mut self) {
        self.0.lock().unwrap().active -= 1;
    }
}

/// Recognizer replaying scripted outcomes
///
/// Each session takes the next scripted outcome after a fixed delay.
/// With nothing scripted a session waits until an outcome is pushed or
/// the session is stopped.
pub struct MockRecognizer {
    log: Arc<Mutex<RecognizerLog>>,
    script: Mutex<VecDeque<Scripted>>,
    delay: Duration,
    pushed: Notify,
    stopped: Notify,
}

impl Default for MockRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRecognizer {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(RecognizerLog::default())),
            script: Mutex::new(VecDeque::new()),
            delay: Duration::from_millis(100),
            pushed: Notify::new(),
            stopped: Notify::new(),
        }
    }

    fn push(&self, outcome: Scripted) {
        self.script.lock().unwrap().push_back(outcome);
        self.pushed.notify_one();
    }

    /// Script a single-alternative answer
    pub fn push_answer(&self, transcript: &str) {
        self.push(Ok(vec![RecognitionAlternative::new(transcript, 0.9)]));
    }

    /// Script a result with several alternatives
    pub fn push_alternatives(&self, alternatives: Vec<RecognitionAlternative>) {
        self.push(Ok(alternatives));
    }

    /// Script a session error
    pub fn push_error(&self, kind: RecognitionErrorKind) {
        self.push(Err(kind));
    }

    pub fn log(&self) -> MutexGuard<'_, RecognizerLog> {
        self.log.lock().unwrap()
    }

    pub fn session_count(&self) -> usize {
        self.log().sessions.len()
    }
}

#[async_trait]
impl SpeechRecognizer for MockRecognizer {
    async fn recognize(&self, options: &RecognitionOptions) -> Scripted {
        {
            let mut log = self.log();
            log.sessions.push(options.clone());
            log.active += 1;
            log.max_active = log.max_active.max(log.active);
        }
        let _running = RunningSession(Arc::clone(&self.log));

        loop {
            let next = self.script.lock().unwrap().pop_front();
            if let Some(outcome) = next {
                tokio::time::sleep(self.delay).await;
                return outcome;
            }

            tokio::select! {
                () = self.pushed.notified() => {}
                () = self.stopped.notified() => return Ok(Vec::new()),
            }
        }
    }

    fn stop(&self) {
        self.log().stop_calls += 1;
        self.stopped.notify_waiters();
    }
}

/// What the mock clip player observed
#[derive(Debug, Default)]
pub struct PlayerLog {
    /// Clips in the order playback began, with start instants
    pub played: Vec<(String, Instant)>,
    /// Clips that played to completion
    pub completed: Vec<String>,
    /// Clips currently playing
    pub active: usize,
    /// Highest number of clips ever playing at once
    pub max_active: usize,
}

/// Clip player taking a fixed time per clip
pub struct MockClipPlayer {
    log: Arc<Mutex<PlayerLog>>,
    duration: Duration,
    failing: HashSet<String>,
}

impl MockClipPlayer {
    pub fn new(duration: Duration) -> Self {
        Self {
            log: Arc::new(Mutex::new(PlayerLog::default())),
            duration,
            failing: HashSet::new(),
        }
    }

    /// Make playback of `clip` fail
    pub fn failing_on(mut self, clip: &str) -> Self {
        self.failing.insert(clip.to_string());
        self
    }

    pub fn log(&self) -> MutexGuard<'_, PlayerLog> {
        self.log.lock().unwrap()
    }

    pub fn played(&self) -> Vec<String> {
        self.log().played.iter().map(|(c, _)| c.clone()).collect()
    }
}

#[async_trait]
impl ClipPlayer for MockClipPlayer {
    async fn play(&self, clip: &str) -> navi_voice::Result<()> {
        {
            let mut log = self.log();
            log.played.push((clip.to_string(), Instant::now()));
            log.active += 1;
            log.max_active = log.max_active.max(log.active);
        }

        if self.failing.contains(clip) {
            self.log().active -= 1;
            return Err(Error::Playback(format!("cannot load {clip}")));
        }

        tokio::time::sleep(self.duration).await;

        let mut log = self.log();
        log.active -= 1;
        log.completed.push(clip.to_string());
        Ok(())
    }
}

/// Assistant wired to fresh mocks
pub struct Harness {
    pub assistant: VoiceAssistant,
    pub synth: Arc<MockSynthesizer>,
    pub recognizer: Arc<MockRecognizer>,
    pub player: Arc<MockClipPlayer>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let synth = Arc::new(MockSynthesizer::new(Duration::from_millis(10)));
        let recognizer = Arc::new(MockRecognizer::new());
        let player = Arc::new(MockClipPlayer::new(Duration::from_millis(10)));

        let assistant = VoiceAssistant::builder(config)
            .synthesizer(Arc::clone(&synth) as Arc<dyn SpeechSynthesizer>)
            .recognizer(Arc::clone(&recognizer) as Arc<dyn SpeechRecognizer>)
            .clip_player(Arc::clone(&player) as Arc<dyn ClipPlayer>)
            .build()
            .unwrap();

        Self {
            assistant,
            synth,
            recognizer,
            player,
        }
    }

    /// Spoken texts in order
    pub fn spoken(&self) -> Vec<String> {
        self.synth.started()
    }
}

/// Collects callback outcomes
#[derive(Clone, Default)]
pub struct Outcomes(Arc<Mutex<Vec<Option<String>>>>);

impl Outcomes {
    pub fn callback(&self) -> impl FnOnce(Option<String>) + Send + 'static {
        let outcomes = Arc::clone(&self.0);
        move |selection| outcomes.lock().unwrap().push(selection)
    }

    pub fn get(&self) -> Vec<Option<String>> {
        self.0.lock().unwrap().clone()
    }
}
