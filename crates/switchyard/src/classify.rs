// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `switchyard classify`: dry run of the classifier and template responder.

use serde::Serialize;
use switchyard_config::SwitchyardConfig;
use switchyard_core::{ComplexityClass, ConversationContext, SwitchyardError};
use switchyard_router::{QueryClassifier, TemplateRegistry};

#[derive(Debug, Serialize)]
pub struct ClassifyOutput {
    pub class: ComplexityClass,
    pub score: f64,
    pub reason: String,
    pub needs_clarification: bool,
    /// Canned reply the template responder would serve, if any.
    pub template: Option<String>,
    pub quality_floor: f64,
    pub max_tokens: u32,
}

pub fn classify(config: &SwitchyardConfig, text: &str) -> ClassifyOutput {
    let classification =
        QueryClassifier::new(&config.classifier).classify(text, &ConversationContext::new("cli"), None);
    let templates = TemplateRegistry::new(&config.templates);
    let template = if classification.needs_clarification {
        templates.clarification().map(str::to_string)
    } else if classification.class == ComplexityClass::Trivial {
        templates.respond(text).map(str::to_string)
    } else {
        None
    };
    ClassifyOutput {
        class: classification.class,
        score: classification.score,
        reason: classification.reason.to_string(),
        needs_clarification: classification.needs_clarification,
        template,
        quality_floor: config.selector.quality_floors.for_class(classification.class),
        max_tokens: config.selector.max_tokens_for(classification.class),
    }
}

pub fn run_classify(config: &SwitchyardConfig, text: &str, json: bool) -> Result<(), SwitchyardError> {
    let output = classify(config, text);
    if json {
        let rendered = serde_json::to_string_pretty(&output)
            .map_err(|e| SwitchyardError::Internal(format!("failed to render JSON: {e}")))?;
        println!("{rendered}");
        return Ok(());
    }

    println!();
    println!("  class:    {} (score {:.3})", output.class, output.score);
    println!("  reason:   {}", output.reason);
    println!(
        "  budget:   quality floor {:.2}, up to {} tokens",
        output.quality_floor, output.max_tokens
    );
    match &output.template {
        Some(reply) => println!("  template: {reply}"),
        None => println!("  template: none, would route upstream"),
    }
    println!();
    Ok(())
}
