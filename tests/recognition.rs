//! Recognition controller integration tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use navi_voice::voice::{
    RecognitionAlternative, SessionEnd, SessionOutcome, SpeechRecognizer, SpeechSynthesizer,
    TranscriptHandler,
};
use navi_voice::{
    ListenState, Priority, RecognitionController, RecognitionErrorKind, SpeechOutputQueue,
    VoiceSelector,
};

mod common;
use common::{MockRecognizer, MockSynthesizer, advance_ms, settle};

struct Fixture {
    controller: RecognitionController,
    recognizer: Arc<MockRecognizer>,
    synth: Arc<MockSynthesizer>,
    heard: Arc<Mutex<Vec<String>>>,
}

impl Fixture {
    fn new() -> Self {
        let synth = Arc::new(MockSynthesizer::new(Duration::from_millis(50)));
        let recognizer = Arc::new(MockRecognizer::new());
        let speech = SpeechOutputQueue::new(
            Arc::clone(&synth) as Arc<dyn SpeechSynthesizer>,
            VoiceSelector::default(),
        );
        let controller = RecognitionController::new(
            Arc::clone(&recognizer) as Arc<dyn SpeechRecognizer>,
            speech,
        );

        Self {
            controller,
            recognizer,
            synth,
            heard: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn initialized() -> Self {
        let fixture = Self::new();
        let heard = Arc::clone(&fixture.heard);
        let handler: TranscriptHandler = Arc::new(move |t| heard.lock().unwrap().push(t));
        fixture.controller.initialize(handler).unwrap();
        fixture
    }

    fn heard(&self) -> Vec<String> {
        self.heard.lock().unwrap().clone()
    }
}

#[tokio::test(start_paused = true)]
async fn test_best_alternative_reaches_handler() {
    let f = Fixture::initialized();
    f.recognizer.push_alternatives(vec![
        RecognitionAlternative::new("내", 0.6),
        RecognitionAlternative::new("네", 0.9),
        RecognitionAlternative::new("예", 0.9),
    ]);

    assert!(f.controller.start_listening());
    assert_eq!(f.controller.state(), ListenState::Listening);

    advance_ms(500).await;

    assert_eq!(f.heard(), vec!["네"]);
    assert_eq!(f.controller.state(), ListenState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_session_options() {
    let f = Fixture::initialized();
    f.recognizer.push_answer("네");

    f.controller.start_listening();
    advance_ms(500).await;

    let log = f.recognizer.log();
    let options = &log.sessions[0];
    assert_eq!(options.language, "ko-KR");
    assert!(!options.continuous);
    assert!(!options.interim_results);
    assert_eq!(options.max_alternatives, 3);
}

#[tokio::test(start_paused = true)]
async fn test_start_refused_while_listening() {
    let f = Fixture::initialized();

    assert!(f.controller.start_listening());
    assert!(!f.controller.start_listening());
    settle().await;

    assert_eq!(f.recognizer.session_count(), 1);
    assert_eq!(f.recognizer.log().max_active, 1);
}

#[tokio::test(start_paused = true)]
async fn test_start_refused_without_handler() {
    let f = Fixture::new();

    assert!(!f.controller.is_initialized());
    assert!(!f.controller.start_listening());
    settle().await;

    assert_eq!(f.recognizer.session_count(), 0);
    assert_eq!(f.controller.state(), ListenState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_stop_listening_returns_to_idle() {
    let f = Fixture::initialized();

    f.controller.start_listening();
    settle().await;

    f.controller.stop_listening();
    assert_eq!(f.controller.state(), ListenState::Idle);
    assert_eq!(f.recognizer.log().stop_calls, 1);

    // Not listening: no-op
    f.controller.stop_listening();
    assert_eq!(f.recognizer.log().stop_calls, 1);

    settle().await;
    assert_eq!(f.recognizer.log().active, 0);
    assert!(f.heard().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_session_without_result_goes_idle() {
    let f = Fixture::initialized();
    f.recognizer.push_alternatives(Vec::new());

    f.controller.start_listening();
    advance_ms(500).await;

    assert!(f.heard().is_empty());
    assert_eq!(f.controller.state(), ListenState::Idle);
    assert!(f.synth.started().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_no_speech_retries_once_after_delay() {
    let f = Fixture::initialized();
    f.recognizer.push_error(RecognitionErrorKind::NoSpeech);

    f.controller.start_listening();

    // Error arrives after 100ms, retry is due 2s later
    advance_ms(2_050).await;
    assert_eq!(f.recognizer.session_count(), 1);
    assert_eq!(f.controller.state(), ListenState::Idle);
    assert_eq!(
        f.synth.started(),
        vec![RecognitionErrorKind::NoSpeech.message()]
    );

    advance_ms(100).await;
    assert_eq!(f.recognizer.session_count(), 2);
    assert_eq!(f.controller.state(), ListenState::Listening);

    advance_ms(10_000).await;
    assert_eq!(f.recognizer.session_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_aborted_retries() {
    let f = Fixture::initialized();
    f.recognizer.push_error(RecognitionErrorKind::Aborted);
    f.recognizer.push_answer("네");

    f.controller.start_listening();
    advance_ms(3_000).await;

    assert_eq!(f.recognizer.session_count(), 2);
    assert_eq!(f.heard(), vec!["네"]);
}

#[tokio::test(start_paused = true)]
async fn test_retry_skipped_when_session_active() {
    let f = Fixture::initialized();
    f.recognizer.push_error(RecognitionErrorKind::NoSpeech);

    f.controller.start_listening();
    advance_ms(200).await;

    // Caller restarts before the retry fires
    assert!(f.controller.start_listening());
    advance_ms(5_000).await;

    assert_eq!(f.recognizer.session_count(), 2);
    assert_eq!(f.recognizer.log().max_active, 1);
}

#[tokio::test(start_paused = true)]
async fn test_other_errors_do_not_retry() {
    for kind in [
        RecognitionErrorKind::AudioCapture,
        RecognitionErrorKind::Network,
        RecognitionErrorKind::NotAllowed,
        RecognitionErrorKind::ServiceNotAllowed,
        RecognitionErrorKind::Other,
    ] {
        let f = Fixture::initialized();
        f.recognizer.push_error(kind);

        f.controller.start_listening();
        advance_ms(5_000).await;

        assert_eq!(f.recognizer.session_count(), 1, "{kind}");
        assert_eq!(f.synth.started(), vec![kind.message()], "{kind}");
        assert_eq!(f.controller.state(), ListenState::Idle);
    }
}

#[tokio::test(start_paused = true)]
async fn test_error_message_interrupts_speech() {
    let synth = Arc::new(MockSynthesizer::new(Duration::from_secs(1)));
    let recognizer = Arc::new(MockRecognizer::new());
    let speech = SpeechOutputQueue::new(
        Arc::clone(&synth) as Arc<dyn SpeechSynthesizer>,
        VoiceSelector::default(),
    );
    let controller = RecognitionController::new(
        Arc::clone(&recognizer) as Arc<dyn SpeechRecognizer>,
        speech.clone(),
    );
    controller.initialize(Arc::new(|_| {})).unwrap();

    speech.speak("긴 안내", Priority::Normal);
    speech.speak("다음 안내", Priority::Normal);
    recognizer.push_error(RecognitionErrorKind::Network);
    controller.start_listening();

    advance_ms(3_000).await;

    let log = synth.log();
    assert_eq!(
        log.started,
        vec!["긴 안내", RecognitionErrorKind::Network.message()]
    );
    assert_eq!(log.interrupted, vec!["긴 안내"]);
}

#[tokio::test(start_paused = true)]
async fn test_auto_restart_keeps_listening() {
    let f = Fixture::initialized();
    f.recognizer.push_answer("하나");
    f.recognizer.push_answer("둘");

    // Turning auto mode on starts a session immediately
    f.controller.set_auto_restart(true);
    assert_eq!(f.controller.state(), ListenState::Listening);

    // Sessions end at 100ms and 700ms, restarts follow 500ms later
    advance_ms(1_000).await;
    assert_eq!(f.heard(), vec!["하나", "둘"]);
    assert_eq!(f.recognizer.session_count(), 2);

    advance_ms(300).await;
    assert_eq!(f.recognizer.session_count(), 3);

    f.controller.set_auto_restart(false);
    f.controller.stop_listening();
    advance_ms(5_000).await;

    assert_eq!(f.recognizer.session_count(), 3);
    assert_eq!(f.controller.state(), ListenState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_stop_in_auto_mode_restarts_after_delay() {
    let f = Fixture::initialized();

    f.controller.set_auto_restart(true);
    settle().await;
    f.controller.stop_listening();
    assert_eq!(f.controller.state(), ListenState::Idle);

    advance_ms(400).await;
    assert_eq!(f.recognizer.session_count(), 1);

    advance_ms(200).await;
    assert_eq!(f.recognizer.session_count(), 2);
    assert_eq!(f.controller.state(), ListenState::Listening);
}

#[tokio::test(start_paused = true)]
async fn test_auto_restart_after_error() {
    let f = Fixture::initialized();
    f.recognizer.push_error(RecognitionErrorKind::Network);

    f.controller.set_auto_restart(true);
    advance_ms(700).await;

    assert_eq!(f.recognizer.session_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_start_from_handler_is_deferred() {
    let f = Fixture::new();
    let controller = f.controller.clone();
    let heard = Arc::clone(&f.heard);
    f.controller.initialize(Arc::new(move |t| {
        heard.lock().unwrap().push(t);
        assert_eq!(controller.state(), ListenState::Processing);
        assert!(controller.start_listening());
    }))
    .unwrap();
    f.recognizer.push_answer("하나");

    f.controller.start_listening();
    advance_ms(150).await;

    assert_eq!(f.heard(), vec!["하나"]);
    assert_eq!(f.recognizer.session_count(), 2);
    assert_eq!(f.controller.state(), ListenState::Listening);
}

fn record_session_ends(controller: &RecognitionController) -> Arc<Mutex<Vec<SessionEnd>>> {
    let ends = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&ends);
    controller.on_session_end(Arc::new(move |end| sink.lock().unwrap().push(end)));
    ends
}

#[tokio::test(start_paused = true)]
async fn test_session_end_reports_outcome() {
    let f = Fixture::initialized();
    let ends = record_session_ends(&f.controller);
    f.recognizer.push_answer("네");
    f.recognizer.push_alternatives(Vec::new());
    f.recognizer.push_error(RecognitionErrorKind::Network);

    for _ in 0..3 {
        f.controller.start_listening();
        advance_ms(500).await;
    }

    assert_eq!(
        *ends.lock().unwrap(),
        vec![
            SessionEnd {
                outcome: SessionOutcome::Heard,
                restart_pending: false,
            },
            SessionEnd {
                outcome: SessionOutcome::Silent,
                restart_pending: false,
            },
            SessionEnd {
                outcome: SessionOutcome::Failed(RecognitionErrorKind::Network),
                restart_pending: false,
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_session_end_marks_pending_retry() {
    let f = Fixture::initialized();
    let ends = record_session_ends(&f.controller);
    f.recognizer.push_error(RecognitionErrorKind::NoSpeech);

    f.controller.start_listening();
    advance_ms(500).await;

    assert_eq!(
        *ends.lock().unwrap(),
        vec![SessionEnd {
            outcome: SessionOutcome::Failed(RecognitionErrorKind::NoSpeech),
            restart_pending: true,
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_stopped_session_is_not_reported() {
    let f = Fixture::initialized();
    let ends = record_session_ends(&f.controller);

    f.controller.start_listening();
    settle().await;
    f.controller.stop_listening();
    advance_ms(1_000).await;

    assert!(ends.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_retry() {
    let f = Fixture::initialized();
    f.recognizer.push_error(RecognitionErrorKind::NoSpeech);

    f.controller.start_listening();
    advance_ms(500).await;

    f.controller.shutdown();
    advance_ms(5_000).await;

    assert_eq!(f.recognizer.session_count(), 1);
    assert!(!f.controller.auto_restart());
}
