//! Participant (persona) configuration
//!
//! A participant is a configured conversational identity: the model it talks
//! through, its system prompt, and the knobs the scheduler uses to decide how
//! eager it is to speak.

use serde::{Deserialize, Serialize};

/// Default system prompt used when a participant has none configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful collaborator.";

/// Static configuration of a participant.
///
/// Immutable for the duration of a scheduling pass; edits go through the
/// scheduler so its affinity state stays attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Participant {
    //=== Identity ===
    /// Unique identifier, used as the message author id
    pub id: String,

    /// Display name; mentions are detected against it
    pub name: String,

    /// Free-form description shown to humans
    pub description: String,

    //=== Model ===
    /// Provider model string (e.g. "openrouter/auto")
    pub model: String,

    /// System prompt prepended to every request
    pub prompt: String,

    /// Sampling temperature passed to the provider
    pub temperature: f64,

    //=== Scheduling ===
    /// Baseline willingness to speak, roughly in [0, 1]
    pub eagerness: f64,

    /// Subtracted from the politeness score right after speaking
    pub politeness_penalty: f64,

    /// Messages until the politeness penalty halves
    pub politeness_half_life: f64,

    /// Added to the mention score when named by another author
    pub mention_boost: f64,
}

impl Default for Participant {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: "New Participant".to_string(),
            description: String::new(),
            model: "openrouter/auto".to_string(),
            prompt: "You are a helpful collaborator who reasons carefully and communicates succinctly.".to_string(),
            temperature: 0.7,
            eagerness: 0.5,
            politeness_penalty: 0.2,
            politeness_half_life: 4.0,
            mention_boost: 1.0,
        }
    }
}

impl Participant {
    /// Create a participant with default scheduling parameters
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set eagerness
    pub fn with_eagerness(mut self, eagerness: f64) -> Self {
        self.eagerness = eagerness;
        self
    }

    /// Set politeness penalty and half-life together
    pub fn with_politeness(mut self, penalty: f64, half_life: f64) -> Self {
        self.politeness_penalty = penalty;
        self.politeness_half_life = half_life;
        self
    }

    /// Set mention boost
    pub fn with_mention_boost(mut self, boost: f64) -> Self {
        self.mention_boost = boost;
        self
    }

    /// Set system prompt
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// System prompt, falling back to the default when blank
    pub fn system_prompt(&self) -> &str {
        if self.prompt.trim().is_empty() {
            DEFAULT_SYSTEM_PROMPT
        } else {
            &self.prompt
        }
    }

    /// Lowercased, trimmed display name used for mention matching.
    /// Returns None for blank names, which can never be mentioned.
    pub fn mention_key(&self) -> Option<String> {
        let key = self.name.trim().to_lowercase();
        if key.is_empty() { None } else { Some(key) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_defaults() {
        let p = Participant::new("alpha", "Alpha");
        assert_eq!(p.id, "alpha");
        assert_eq!(p.eagerness, 0.5);
        assert_eq!(p.politeness_penalty, 0.2);
        assert_eq!(p.politeness_half_life, 4.0);
        assert_eq!(p.mention_boost, 1.0);
        assert_eq!(p.model, "openrouter/auto");
    }

    #[test]
    fn test_participant_builder() {
        let p = Participant::new("beta", "Beta")
            .with_eagerness(0.4)
            .with_politeness(0.2, 4.0)
            .with_mention_boost(1.0);
        assert_eq!(p.eagerness, 0.4);
        assert_eq!(p.politeness_penalty, 0.2);
        assert_eq!(p.mention_boost, 1.0);
    }

    #[test]
    fn test_system_prompt_fallback() {
        let p = Participant::new("a", "A").with_prompt("   ");
        assert_eq!(p.system_prompt(), DEFAULT_SYSTEM_PROMPT);

        let p = p.with_prompt("Be terse.");
        assert_eq!(p.system_prompt(), "Be terse.");
    }

    #[test]
    fn test_mention_key() {
        assert_eq!(Participant::new("a", "  Alpha ").mention_key(), Some("alpha".to_string()));
        assert_eq!(Participant::new("a", "   ").mention_key(), None);
    }

    #[test]
    fn test_participant_yaml_partial() {
        let yaml = "id: gamma\nname: Gamma\neagerness: 0.9\n";
        let p: Participant = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(p.id, "gamma");
        assert_eq!(p.eagerness, 0.9);
        assert_eq!(p.mention_boost, 1.0);
    }
}
