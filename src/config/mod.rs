//! Configuration management for navi-voice

pub mod file;

use crate::dialog::{AnswerClassifier, DEFAULT_AFFIRMATIVE, DEFAULT_NEGATIVE};
use crate::voice::{DEFAULT_VOICE_PRIORITY, VoiceSelector};
use crate::{Error, Result};

use self::file::ConfigFile;

/// Voice assistant configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Speech output configuration
    pub speech: SpeechConfig,

    /// Speech recognition configuration
    pub recognition: RecognitionConfig,

    /// Confirmation dialog configuration
    pub confirmation: ConfirmationConfig,
}

/// Speech output configuration
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// Speak utterances at all
    pub enabled: bool,

    /// Voice language patterns in priority order
    pub voice_priority: Vec<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            voice_priority: to_strings(DEFAULT_VOICE_PRIORITY),
        }
    }
}

/// Speech recognition configuration
#[derive(Debug, Clone, Default)]
pub struct RecognitionConfig {
    /// Restart recognition whenever a session ends
    pub auto_restart: bool,
}

/// Confirmation dialog configuration
#[derive(Debug, Clone)]
pub struct ConfirmationConfig {
    /// Affirmative answer patterns
    pub affirmative: Vec<String>,

    /// Negative answer patterns
    pub negative: Vec<String>,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            affirmative: to_strings(DEFAULT_AFFIRMATIVE),
            negative: to_strings(DEFAULT_NEGATIVE),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

fn parse_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

impl Config {
    /// Load configuration from the config file and environment
    ///
    /// Precedence: env > toml > default.
    ///
    /// # Errors
    ///
    /// Returns error if a configured pattern is not a valid regular expression
    pub fn load() -> Result<Self> {
        let config = Self::from_sources(file::load_config_file(), |key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Merge a parsed config file with environment lookups over the defaults
    pub fn from_sources<F>(fc: ConfigFile, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let speech = SpeechConfig {
            enabled: env("NAVI_VOICE_ENABLED")
                .map(|v| parse_flag(&v))
                .or(fc.speech.enabled)
                .unwrap_or(defaults.speech.enabled),
            voice_priority: fc
                .speech
                .voice_priority
                .unwrap_or(defaults.speech.voice_priority),
        };

        let recognition = RecognitionConfig {
            auto_restart: env("NAVI_VOICE_AUTO_RECOGNITION")
                .map(|v| parse_flag(&v))
                .or(fc.recognition.auto_restart)
                .unwrap_or(defaults.recognition.auto_restart),
        };

        let confirmation = ConfirmationConfig {
            affirmative: fc
                .confirmation
                .affirmative
                .unwrap_or(defaults.confirmation.affirmative),
            negative: fc
                .confirmation
                .negative
                .unwrap_or(defaults.confirmation.negative),
        };

        Self {
            speech,
            recognition,
            confirmation,
        }
    }

    /// Check pattern lists and compile every configured pattern once
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an empty answer pattern list and
    /// `Error::Pattern` for the first invalid pattern
    pub fn validate(&self) -> Result<()> {
        if self.confirmation.affirmative.is_empty() {
            return Err(Error::Config(
                "confirmation.affirmative must list at least one pattern".to_string(),
            ));
        }
        if self.confirmation.negative.is_empty() {
            return Err(Error::Config(
                "confirmation.negative must list at least one pattern".to_string(),
            ));
        }

        self.voice_selector()?;
        self.answer_classifier()?;
        Ok(())
    }

    /// Voice selector built from the configured language priority
    ///
    /// # Errors
    ///
    /// Returns error if a voice pattern is invalid
    pub fn voice_selector(&self) -> Result<VoiceSelector> {
        VoiceSelector::new(&self.speech.voice_priority)
    }

    /// Answer classifier built from the configured pattern sets
    ///
    /// # Errors
    ///
    /// Returns error if an answer pattern is invalid
    pub fn answer_classifier(&self) -> Result<AnswerClassifier> {
        AnswerClassifier::new(&self.confirmation.affirmative, &self.confirmation.negative)
    }
}
