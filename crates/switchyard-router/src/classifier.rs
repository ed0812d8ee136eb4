// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heuristic query complexity classification.
//!
//! Classifies queries into trivial/standard/complex/critical using weighted
//! feature scoring over the text, the conversation context, and the pattern
//! history of similar queries. No provider call, no network, no latency.

use switchyard_config::model::ClassifierConfig;
use switchyard_core::text::normalize;
use switchyard_core::{ComplexityClass, ConversationContext, EmotionalState, Pattern, SwitchyardError, Urgency};

/// Result of classifying a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub class: ComplexityClass,
    /// Weighted score in [0, 1].
    pub score: f64,
    /// Human-readable reason for the classification.
    pub reason: &'static str,
    /// Set when the input was empty or malformed and the caller should ask
    /// for a restatement.
    pub needs_clarification: bool,
}

/// Words and phrases that indicate a demanding query (normalized form).
const COMPLEX_INDICATORS: &[&str] = &[
    "analyze", "analyse", "analysis", "compare", "comparison", "evaluate", "implement",
    "design", "architecture", "trade off", "trade offs", "tradeoff", "tradeoffs",
    "pros and cons",
    "step by step", "explain in detail", "debug", "refactor", "code review",
    "write a function", "write code", "write a program", "optimize", "algorithm",
    "strategy", "in depth", "comprehensive", "research", "prove", "derive", "diagnose",
    "migrate", "summarize",
];

/// Phrases that force the critical class regardless of score.
const CRITICAL_INDICATORS: &[&str] = &[
    "suicide", "kill myself", "self harm", "hurt myself", "overdose", "chest pain",
    "cant breathe", "heart attack", "stroke symptoms", "emergency", "data breach",
    "security breach", "production is down",
];

/// Normalized length at which the length feature saturates.
const LENGTH_SATURATION_WORDS: f64 = 30.0;
/// Context depth at which the depth feature saturates.
const DEPTH_SATURATION_TURNS: f64 = 10.0;

/// Weighted-feature complexity classifier.
pub struct QueryClassifier {
    config: ClassifierConfig,
    complex_keywords: Vec<String>,
    critical_keywords: Vec<String>,
}

impl QueryClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        let complex_keywords = COMPLEX_INDICATORS
            .iter()
            .map(|k| k.to_string())
            .chain(config.extra_complex_keywords.iter().map(|k| normalize(k)))
            .filter(|k| !k.is_empty())
            .collect();
        let critical_keywords = CRITICAL_INDICATORS
            .iter()
            .map(|k| k.to_string())
            .chain(config.extra_critical_keywords.iter().map(|k| normalize(k)))
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            config: config.clone(),
            complex_keywords,
            critical_keywords,
        }
    }

    /// Classify, degrading malformed input to trivial with
    /// `needs_clarification` set.
    pub fn classify(
        &self,
        text: &str,
        context: &ConversationContext,
        pattern: Option<&Pattern>,
    ) -> Classification {
        match self.try_classify(text, context, pattern) {
            Ok(classification) => classification,
            Err(e) => {
                tracing::debug!(error = %e, "classification degraded to trivial");
                Classification {
                    class: ComplexityClass::Trivial,
                    score: 0.0,
                    reason: "malformed input",
                    needs_clarification: true,
                }
            }
        }
    }

    /// Classify a query, rejecting empty, control-only, or oversized input.
    pub fn try_classify(
        &self,
        text: &str,
        context: &ConversationContext,
        pattern: Option<&Pattern>,
    ) -> Result<Classification, SwitchyardError> {
        let chars = text.chars().count();
        if chars > self.config.max_query_chars {
            return Err(SwitchyardError::Classification(format!(
                "query is {chars} characters, limit is {}",
                self.config.max_query_chars
            )));
        }
        let normalized = normalize(text);
        if normalized.is_empty() {
            return Err(SwitchyardError::Classification(
                "query has no readable content".to_string(),
            ));
        }

        let c = &self.config;
        let features = [
            (c.length_weight, Self::length_feature(&normalized), "message length"),
            (c.keyword_weight, self.keyword_feature(&normalized), "complexity indicators"),
            (c.history_weight, self.history_feature(pattern), "pattern history"),
            (c.emotion_weight, context.emotion.intensity(), "emotional state"),
            (
                c.depth_weight,
                (context.recent_turns.len() as f64 / DEPTH_SATURATION_TURNS).min(1.0),
                "conversation depth",
            ),
        ];

        let mut score: f64 = features.iter().map(|(w, f, _)| w * f).sum();
        let mut reason = features
            .iter()
            .filter(|(w, f, _)| w * f > 0.0)
            .max_by(|a, b| (a.0 * a.1).total_cmp(&(b.0 * b.1)))
            .map(|(_, _, name)| *name)
            .unwrap_or("no complexity signals");

        if context.urgency == Urgency::Elevated {
            score += c.elevated_urgency_bonus;
        }
        score = score.clamp(0.0, 1.0);

        let forced = if context.urgency == Urgency::Critical {
            Some("critical urgency")
        } else if context.emotion == EmotionalState::Crisis {
            Some("crisis emotional state")
        } else if self.has_critical_keyword(&normalized) {
            Some("critical keyword")
        } else {
            None
        };
        if let Some(why) = forced {
            score = score.max(c.critical_threshold);
            reason = why;
        }

        Ok(Classification {
            class: self.bucket(score),
            score,
            reason,
            needs_clarification: false,
        })
    }

    /// Map a score to its class. Boundaries resolve to the higher class.
    pub fn bucket(&self, score: f64) -> ComplexityClass {
        let c = &self.config;
        if score >= c.critical_threshold {
            ComplexityClass::Critical
        } else if score >= c.complex_threshold {
            ComplexityClass::Complex
        } else if score >= c.standard_threshold {
            ComplexityClass::Standard
        } else {
            ComplexityClass::Trivial
        }
    }

    fn length_feature(normalized: &str) -> f64 {
        let words = normalized.split_whitespace().count() as f64;
        (words / LENGTH_SATURATION_WORDS).min(1.0)
    }

    fn keyword_feature(&self, normalized: &str) -> f64 {
        let padded = format!(" {normalized} ");
        let hits = self
            .complex_keywords
            .iter()
            .filter(|k| padded.contains(&format!(" {k} ")))
            .count();
        (0.5 * hits as f64).min(1.0)
    }

    fn history_feature(&self, pattern: Option<&Pattern>) -> f64 {
        match pattern {
            Some(p) if p.frequency >= self.config.min_pattern_frequency => {
                (0.5 * p.avg_complexity + 0.5 * (1.0 - p.success_rate)).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }

    fn has_critical_keyword(&self, normalized: &str) -> bool {
        let padded = format!(" {normalized} ");
        self.critical_keywords
            .iter()
            .any(|k| padded.contains(&format!(" {k} ")))
    }
}

impl Default for QueryClassifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn ctx() -> ConversationContext {
        ConversationContext::new("s1")
    }

    fn pattern(frequency: f64, success_rate: f64, avg_complexity: f64) -> Pattern {
        Pattern {
            signature: "sig".to_string(),
            frequency,
            success_rate,
            avg_complexity,
            exemplar: "example".to_string(),
            last_seen: Utc::now(),
        }
    }

    #[test]
    fn greetings_are_trivial() {
        let c = QueryClassifier::default();
        for text in ["hi", "hello", "thanks", "bye"] {
            let result = c.classify(text, &ctx(), None);
            assert_eq!(result.class, ComplexityClass::Trivial, "{text}");
            assert!(!result.needs_clarification);
        }
    }

    #[test]
    fn one_indicator_is_standard() {
        let c = QueryClassifier::default();
        let result = c.classify("can you summarize this article for me", &ctx(), None);
        assert_eq!(result.class, ComplexityClass::Standard);
        assert_eq!(result.reason, "complexity indicators");
    }

    #[test]
    fn research_comparison_is_complex() {
        let c = QueryClassifier::default();
        let result = c.classify(
            "Compare and analyze the long term economic trade-offs of carbon taxes versus cap and trade",
            &ctx(),
            None,
        );
        assert_eq!(result.class, ComplexityClass::Complex);
        assert!(result.score >= 0.40 && result.score < 0.80);
    }

    #[test]
    fn critical_urgency_forces_critical() {
        let c = QueryClassifier::default();
        let context = ctx().with_urgency(Urgency::Critical);
        let result = c.classify("what is the plan", &context, None);
        assert_eq!(result.class, ComplexityClass::Critical);
        assert_eq!(result.reason, "critical urgency");
    }

    #[test]
    fn crisis_emotion_forces_critical() {
        let c = QueryClassifier::default();
        let context = ctx().with_emotion(EmotionalState::Crisis);
        assert_eq!(c.classify("hi", &context, None).class, ComplexityClass::Critical);
    }

    #[test]
    fn critical_keyword_forces_critical() {
        let c = QueryClassifier::default();
        let result = c.classify("I have chest pain, what should I do?", &ctx(), None);
        assert_eq!(result.class, ComplexityClass::Critical);
        assert_eq!(result.reason, "critical keyword");
    }

    #[test]
    fn configured_keywords_are_normalized() {
        let config = ClassifierConfig {
            extra_critical_keywords: vec!["Panic Attack!".to_string()],
            extra_complex_keywords: vec!["Benchmark".to_string()],
            ..ClassifierConfig::default()
        };
        let c = QueryClassifier::new(&config);
        assert_eq!(
            c.classify("i think it's a panic attack", &ctx(), None).class,
            ComplexityClass::Critical
        );
        assert_eq!(
            c.classify("benchmark these", &ctx(), None).class,
            ComplexityClass::Standard
        );
    }

    #[test]
    fn elevated_urgency_adds_bonus() {
        let c = QueryClassifier::default();
        let plain = c.classify("hello there", &ctx(), None);
        let urgent = c.classify("hello there", &ctx().with_urgency(Urgency::Elevated), None);
        assert!((urgent.score - plain.score - 0.15).abs() < 1e-9);
        assert_eq!(urgent.class, ComplexityClass::Standard);
    }

    #[test]
    fn history_needs_enough_observations() {
        let c = QueryClassifier::default();
        let text = "the usual question";
        let rare = c.classify(text, &ctx(), Some(&pattern(2.0, 0.0, 1.0)));
        let seen = c.classify(text, &ctx(), Some(&pattern(3.0, 0.0, 1.0)));
        assert!((seen.score - rare.score - 0.15).abs() < 1e-9);
    }

    #[test]
    fn depth_and_emotion_contribute() {
        let c = QueryClassifier::default();
        let turns = vec!["turn".to_string(); 20];
        let context = ctx().with_turns(turns).with_emotion(EmotionalState::Distressed);
        let result = c.classify("ok", &context, None);
        // 0.05 depth + 0.12 emotion + a sliver of length.
        assert_eq!(result.class, ComplexityClass::Standard);
    }

    #[test]
    fn boundary_scores_resolve_upward() {
        let c = QueryClassifier::default();
        assert_eq!(c.bucket(0.15), ComplexityClass::Standard);
        assert_eq!(c.bucket(0.40), ComplexityClass::Complex);
        assert_eq!(c.bucket(0.80), ComplexityClass::Critical);
        assert_eq!(c.bucket(0.1499), ComplexityClass::Trivial);
    }

    #[test]
    fn malformed_input_needs_clarification() {
        let c = QueryClassifier::default();
        for text in ["", "   ", "\u{0}\u{7}", "?!"] {
            let result = c.classify(text, &ctx(), None);
            assert_eq!(result.class, ComplexityClass::Trivial);
            assert!(result.needs_clarification, "{text:?}");
            assert!(c.try_classify(text, &ctx(), None).is_err());
        }
        let long = "word ".repeat(2000);
        assert!(matches!(
            c.try_classify(&long, &ctx(), None),
            Err(SwitchyardError::Classification(_))
        ));
    }

    proptest::proptest! {
        #[test]
        fn score_stays_in_unit_range(
            text in "[a-z ]{1,200}",
            turns in 0usize..40,
            freq in 0.0f64..10.0,
            success in 0.0f64..=1.0,
            complexity in 0.0f64..=1.0,
        ) {
            let c = QueryClassifier::default();
            let context = ctx()
                .with_turns(vec!["t".to_string(); turns])
                .with_urgency(Urgency::Elevated)
                .with_emotion(EmotionalState::Distressed);
            let p = pattern(freq, success, complexity);
            let result = c.classify(&text, &context, Some(&p));
            proptest::prop_assert!((0.0..=1.0).contains(&result.score));
            proptest::prop_assert_eq!(result.class, c.bucket(result.score));
        }
    }
}
