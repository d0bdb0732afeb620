use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

use navi_voice::config::file::config_file_path;
use navi_voice::console::{ConsoleSynthesizer, LogClipPlayer, StdinRecognizer};
use navi_voice::{Config, Error, Priority, RecognitionErrorKind, VoiceAssistant};

/// How often the CLI checks whether queued output has finished
const IDLE_POLL: Duration = Duration::from_millis(50);

/// navi-voice - Voice interaction core for a navigation assistant
#[derive(Parser)]
#[command(name = "navi-voice", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Speak text through the console synthesizer
    Say {
        /// Text to speak
        text: String,
        /// Interrupt anything already queued
        #[arg(long)]
        high: bool,
    },
    /// Announce the top destinations
    Announce {
        /// Destinations in ranked order
        #[arg(required = true)]
        destinations: Vec<String>,
    },
    /// Confirm a destination, answering on stdin
    Confirm {
        /// Candidate destinations in ranked order
        #[arg(required = true)]
        destinations: Vec<String>,
    },
    /// Queue alert clips
    Alert {
        /// Clip references
        #[arg(required = true)]
        clips: Vec<String>,
        /// Delay between requests in milliseconds
        #[arg(long, default_value = "0")]
        interval_ms: u64,
    },
    /// Print the config file location
    ConfigPath,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info",
        1 => "info,navi_voice=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Say { text, high } => cmd_say(&text, high).await,
        Command::Announce { destinations } => cmd_announce(&destinations).await,
        Command::Confirm { destinations } => cmd_confirm(&destinations).await,
        Command::Alert { clips, interval_ms } => cmd_alert(&clips, interval_ms).await,
        Command::ConfigPath => {
            match config_file_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("no config directory available"),
            }
            Ok(())
        }
    }
}

fn speaking_assistant() -> anyhow::Result<VoiceAssistant> {
    let config = Config::load()?;
    tracing::debug!(?config, "loaded configuration");

    Ok(VoiceAssistant::builder(config)
        .synthesizer(Arc::new(ConsoleSynthesizer::new()))
        .build()?)
}

/// Wait until the speech queue has drained
async fn wait_for_speech(assistant: &VoiceAssistant) {
    while assistant.speech().is_speaking() {
        tokio::time::sleep(IDLE_POLL).await;
    }
}

async fn cmd_say(text: &str, high: bool) -> anyhow::Result<()> {
    let assistant = speaking_assistant()?;
    let priority = if high { Priority::High } else { Priority::Normal };

    assistant.speak_text(text, priority);
    wait_for_speech(&assistant).await;
    Ok(())
}

async fn cmd_announce(destinations: &[String]) -> anyhow::Result<()> {
    let assistant = speaking_assistant()?;

    assistant.read_top_destinations(destinations);
    wait_for_speech(&assistant).await;
    Ok(())
}

async fn cmd_confirm(destinations: &[String]) -> anyhow::Result<()> {
    let config = Config::load()?;
    let recognizer = Arc::new(StdinRecognizer::new());
    let mut closed = recognizer.closed();

    let assistant = VoiceAssistant::builder(config)
        .synthesizer(Arc::new(ConsoleSynthesizer::new()))
        .recognizer(recognizer)
        .build()?;

    let (tx, rx) = oneshot::channel();
    assistant.confirm_destinations(destinations, move |selection| {
        let _ = tx.send(selection);
    })?;

    let selection = tokio::select! {
        biased;

        _ = closed.wait_for(|closed| *closed) => {
            assistant.shutdown();
            return Err(Error::Recognition(RecognitionErrorKind::AudioCapture).into());
        }
        result = rx => result.ok().flatten(),
        _ = tokio::signal::ctrl_c() => {
            assistant.cancel_confirmation();
            None
        }
    };

    wait_for_speech(&assistant).await;
    assistant.shutdown();

    match selection {
        Some(destination) => println!("selected: {destination}"),
        None => println!("no destination selected"),
    }
    Ok(())
}

async fn cmd_alert(clips: &[String], interval_ms: u64) -> anyhow::Result<()> {
    let config = Config::load()?;
    let assistant = VoiceAssistant::builder(config)
        .clip_player(Arc::new(LogClipPlayer))
        .build()?;

    let interval = Duration::from_millis(interval_ms);
    for clip in clips {
        if !assistant.enqueue_alert(clip) {
            println!("[alert] {clip} (suppressed)");
        }
        if !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
    }

    while assistant.alerts().is_playing() {
        tokio::time::sleep(IDLE_POLL).await;
    }
    Ok(())
}
