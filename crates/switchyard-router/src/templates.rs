// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic local responses for trivial queries.
//!
//! Triggers are compared on their normalized, stopword-stripped form. Exact
//! matches win; otherwise a trigger within `max_edit_distance` edits matches,
//! provided both sides are at least `min_fuzzy_len` characters long.

use switchyard_config::model::TemplateConfig;
use switchyard_core::text::{normalize, strip_stopwords};

const GREETING: &str = "Hello! How can I help you today?";
const THANKS: &str = "You're welcome! Anything else I can help with?";
const FAREWELL: &str = "Goodbye! Come back any time.";
const ACK: &str = "Great. Let me know if there's anything else you need.";

const BUILTIN: &[(&[&str], &str)] = &[
    (
        &["hi", "hello", "hey", "hiya", "howdy", "good morning", "good afternoon", "good evening"],
        GREETING,
    ),
    (
        &["thanks", "thank you", "thanks a lot", "thank you so much", "thx", "cheers", "much appreciated"],
        THANKS,
    ),
    (&["bye", "goodbye", "see you later", "good night", "farewell"], FAREWELL),
    (&["ok", "okay", "got it", "cool", "sounds good", "great"], ACK),
];

struct Template {
    trigger: String,
    response: String,
}

/// Registry of local templates.
pub struct TemplateRegistry {
    templates: Vec<Template>,
    max_edit_distance: usize,
    min_fuzzy_len: usize,
    apology: Option<String>,
    clarification: Option<String>,
}

/// Stopword-stripped normalized form used for matching.
pub fn template_signature(text: &str) -> String {
    strip_stopwords(&normalize(text))
}

impl TemplateRegistry {
    pub fn new(config: &TemplateConfig) -> Self {
        let builtin = BUILTIN
            .iter()
            .filter(|_| config.builtin)
            .flat_map(|(triggers, response)| triggers.iter().map(move |t| (t.to_string(), response.to_string())));
        let configured = config
            .entries
            .iter()
            .flat_map(|e| e.triggers.iter().map(move |t| (t.clone(), e.response.clone())));

        let mut templates: Vec<Template> = Vec::new();
        // Configured entries come last so they override built-ins with the same trigger.
        for (trigger, response) in builtin.chain(configured) {
            let trigger = template_signature(&trigger);
            if trigger.is_empty() {
                continue;
            }
            match templates.iter_mut().find(|t| t.trigger == trigger) {
                Some(existing) => existing.response = response,
                None => templates.push(Template { trigger, response }),
            }
        }

        Self {
            templates,
            max_edit_distance: config.max_edit_distance,
            min_fuzzy_len: config.min_fuzzy_len,
            apology: config.apology.clone().filter(|a| !a.trim().is_empty()),
            clarification: config
                .clarification
                .clone()
                .filter(|c| !c.trim().is_empty()),
        }
    }

    /// The deterministic reply for `text`, if any template matches.
    pub fn respond(&self, text: &str) -> Option<&str> {
        let sig = template_signature(text);
        if sig.is_empty() {
            return None;
        }
        if let Some(t) = self.templates.iter().find(|t| t.trigger == sig) {
            return Some(&t.response);
        }

        let sig_len = sig.chars().count();
        if sig_len < self.min_fuzzy_len || self.max_edit_distance == 0 {
            return None;
        }
        self.templates
            .iter()
            .filter(|t| t.trigger.chars().count() >= self.min_fuzzy_len)
            .map(|t| (strsim::levenshtein(&sig, &t.trigger), t))
            .filter(|(d, _)| *d <= self.max_edit_distance)
            .min_by_key(|(d, _)| *d)
            .map(|(_, t)| t.response.as_str())
    }

    /// Whether `text` is answered locally. Such text is never cached.
    pub fn matches(&self, text: &str) -> bool {
        self.respond(text).is_some()
    }

    /// Apology used when nothing better is available; `None` when disabled.
    pub fn apology(&self) -> Option<&str> {
        self.apology.as_deref()
    }

    /// Reply asking the user to restate an unreadable query.
    pub fn clarification(&self) -> Option<&str> {
        self.clarification.as_deref()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new(&TemplateConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_config::model::TemplateEntry;

    #[test]
    fn builtin_greeting_matches_exactly() {
        let registry = TemplateRegistry::default();
        assert_eq!(registry.respond("Hi!"), Some(GREETING));
        assert_eq!(registry.respond("  HELLO  "), Some(GREETING));
        assert_eq!(registry.respond("Thank you so much"), Some(THANKS));
    }

    #[test]
    fn stopwords_do_not_block_a_match() {
        let registry = TemplateRegistry::default();
        assert_eq!(registry.respond("oh hi"), Some(GREETING));
        assert_eq!(registry.respond("well, thanks"), Some(THANKS));
    }

    #[test]
    fn fuzzy_match_needs_min_length() {
        let registry = TemplateRegistry::default();
        assert_eq!(registry.respond("helo"), Some(GREETING));
        assert_eq!(registry.respond("thnks"), Some(THANKS));
        // Too short for fuzzy matching.
        assert_eq!(registry.respond("ho"), None);
    }

    #[test]
    fn unrelated_text_does_not_match() {
        let registry = TemplateRegistry::default();
        assert_eq!(registry.respond("how do I reset my password"), None);
        assert_eq!(registry.respond(""), None);
        assert_eq!(registry.respond("the"), None);
        assert!(!registry.matches("hello world"));
    }

    #[test]
    fn configured_templates_extend_and_override() {
        let config = TemplateConfig {
            entries: vec![
                TemplateEntry {
                    triggers: vec!["What are your hours?".to_string()],
                    response: "We're open around the clock.".to_string(),
                },
                TemplateEntry {
                    triggers: vec!["hello".to_string()],
                    response: "Welcome back.".to_string(),
                },
            ],
            ..TemplateConfig::default()
        };
        let registry = TemplateRegistry::new(&config);
        assert_eq!(
            registry.respond("what are your hours"),
            Some("We're open around the clock.")
        );
        assert_eq!(registry.respond("hello"), Some("Welcome back."));
        assert_eq!(registry.respond("hi"), Some(GREETING));
    }

    #[test]
    fn builtins_can_be_disabled() {
        let config = TemplateConfig {
            builtin: false,
            ..TemplateConfig::default()
        };
        let registry = TemplateRegistry::new(&config);
        assert!(registry.is_empty());
        assert_eq!(registry.respond("hi"), None);
    }

    #[test]
    fn empty_apology_disables_it() {
        assert!(TemplateRegistry::default().apology().is_some());
        let config = TemplateConfig {
            apology: Some(String::new()),
            ..TemplateConfig::default()
        };
        assert!(TemplateRegistry::new(&config).apology().is_none());
    }
}
