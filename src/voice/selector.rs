//! Preferred synthesis voice selection

use std::sync::{Arc, PoisonError, RwLock};

use regex::Regex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::Result;

/// Default language priority: Korean first, then English
pub const DEFAULT_VOICE_PRIORITY: &[&str] = &["(?i)ko", "(?i)en"];

/// A voice reported by the synthesis engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceDescriptor {
    /// Engine-specific voice identifier
    pub id: String,

    /// Human readable name
    pub name: String,

    /// Language tag (e.g. "ko-KR")
    pub lang: String,
}

impl VoiceDescriptor {
    /// Create a voice descriptor
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            lang: lang.into(),
        }
    }
}

/// Picks the preferred voice from the platform voice set
///
/// Language patterns are tried in order; the first voice whose language
/// tag matches the earliest pattern wins. Without any match the first
/// available voice is used, and an empty set yields no preference so the
/// engine falls back to its default voice.
#[derive(Debug, Clone)]
pub struct VoiceSelector {
    priority: Arc<[Regex]>,
    preferred: Arc<RwLock<Option<VoiceDescriptor>>>,
}

impl Default for VoiceSelector {
    fn default() -> Self {
        let priority = DEFAULT_VOICE_PRIORITY
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();

        Self {
            priority,
            preferred: Arc::new(RwLock::new(None)),
        }
    }
}

impl VoiceSelector {
    /// Create a selector from language patterns in priority order
    ///
    /// # Errors
    ///
    /// Returns error if a pattern is not a valid regular expression
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let priority = patterns
            .iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<std::result::Result<Arc<[Regex]>, _>>()?;

        Ok(Self {
            priority,
            preferred: Arc::new(RwLock::new(None)),
        })
    }

    /// Choose the preferred voice from a voice set without storing it
    #[must_use]
    pub fn select_preferred(&self, voices: &[VoiceDescriptor]) -> Option<VoiceDescriptor> {
        self.priority
            .iter()
            .find_map(|pattern| voices.iter().find(|v| pattern.is_match(&v.lang)))
            .or_else(|| voices.first())
            .cloned()
    }

    /// Re-evaluate the preference against an updated voice set
    pub fn refresh(&self, voices: &[VoiceDescriptor]) -> Option<VoiceDescriptor> {
        let chosen = self.select_preferred(voices);

        tracing::debug!(
            available = voices.len(),
            voice = chosen.as_ref().map_or("none", |v| v.name.as_str()),
            "preferred voice selected"
        );

        *self
            .preferred
            .write()
            .unwrap_or_else(PoisonError::into_inner) = chosen.clone();

        chosen
    }

    /// Currently preferred voice
    #[must_use]
    pub fn preferred(&self) -> Option<VoiceDescriptor> {
        self.preferred
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Select from the current voice set and keep following its updates
    ///
    /// Must be called from within a Tokio runtime.
    pub fn follow(&self, mut voices: watch::Receiver<Vec<VoiceDescriptor>>) -> JoinHandle<()> {
        self.refresh(&voices.borrow_and_update());

        let selector = self.clone();
        tokio::spawn(async move {
            while voices.changed().await.is_ok() {
                let set = voices.borrow_and_update().clone();
                selector.refresh(&set);
            }
        })
    }
}
