// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-to-miette error bridge with fuzzy match suggestions.
//!
//! Every Figment failure becomes a [`ConfigError`] carrying, where the key can
//! be found again in the TOML text, a source span. Unknown keys and unknown
//! enum values (provider tiers, budget periods) get a "did you mean" hint.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use figment::error::Kind;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity for a suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.75;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(switchyard::config::unknown_key),
        help("{}", suggestion_help(suggestion.as_deref(), "valid keys", valid_keys))
    )]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        /// Comma-separated keys accepted by the enclosing section.
        valid_keys: String,
        #[label("this key is not recognized")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// An enum-valued key (`tier`, `period`, ...) holds an unknown value.
    #[error("`{value}` is not a valid value for `{key}`")]
    #[diagnostic(
        code(switchyard::config::invalid_choice),
        help("{}", suggestion_help(suggestion.as_deref(), "expected one of", choices))
    )]
    InvalidChoice {
        key: String,
        value: String,
        suggestion: Option<String>,
        choices: String,
        #[label("unknown value")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(code(switchyard::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
        #[label("wrong type here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(switchyard::config::missing_key),
        help("every [[providers]] entry needs `id` and `tier`; other keys have defaults")
    )]
    MissingKey { key: String },

    /// Post-deserialization check failure (ranges, ordering, duplicates).
    #[error("validation error: {message}")]
    #[diagnostic(code(switchyard::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(switchyard::config::other))]
    Other(String),
}

fn suggestion_help(suggestion: Option<&str>, label: &str, options: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? {label}: {options}"),
        None => format!("{label}: {options}"),
    }
}

/// Convert a `figment::Error` (which may hold several failures) into
/// diagnostics. `toml_sources` pairs each file path with its content.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| {
            let path: Vec<String> = error.path.clone();
            let source = source_for(&error, toml_sources);
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let (span, src) = locate(source, &path, field);
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        suggestion: suggest_key(field, expected),
                        valid_keys: expected.join(", "),
                        span,
                        src,
                    }
                }
                Kind::UnknownVariant(value, expected) => {
                    let (span, src) = locate_leaf(source, &path);
                    ConfigError::InvalidChoice {
                        key: path.join("."),
                        value: value.clone(),
                        suggestion: suggest_key(&value.to_lowercase(), expected),
                        choices: expected.join(", "),
                        span,
                        src,
                    }
                }
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: qualified(&path, field),
                },
                Kind::InvalidType(actual, expected) => {
                    let (span, src) = locate_leaf(source, &path);
                    ConfigError::InvalidType {
                        key: path.join("."),
                        detail: format!("found {actual}, expected {expected}"),
                        expected: expected.to_string(),
                        span,
                        src,
                    }
                }
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

fn qualified(path: &[String], field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{}.{field}", path.join("."))
    }
}

/// The TOML file an error came from, if it came from one we read.
fn source_for<'a>(
    error: &figment::error::Error,
    toml_sources: &'a [(String, String)],
) -> Option<(&'a str, &'a str)> {
    let origin = match error.metadata.as_ref()?.source.as_ref()? {
        figment::Source::File(path) => path.display().to_string(),
        _ => return None,
    };
    toml_sources
        .iter()
        .find(|(path, _)| *path == origin)
        .map(|(path, content)| (path.as_str(), content.as_str()))
}

/// Span for the last path segment, which names the offending key.
fn locate_leaf(
    source: Option<(&str, &str)>,
    path: &[String],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    match path.split_last() {
        Some((field, section)) => locate(source, section, field),
        None => (None, None),
    }
}

fn locate(
    source: Option<(&str, &str)>,
    section: &[String],
    field: &str,
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let Some((name, content)) = source else {
        return (None, None);
    };
    match find_key_offset(content, section, field) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(name, content.to_string())),
        ),
        None => (None, None),
    }
}

/// Byte offset of `field` inside the table named by `section`.
///
/// `["cache"]` searches after the `[cache]` header. `["providers", "2"]`
/// searches after the third `[[providers]]` header; a non-numeric or missing
/// index means the first one. An empty section searches from the top.
pub fn find_key_offset(content: &str, section: &[String], field: &str) -> Option<usize> {
    let start = match section.first() {
        None => 0,
        Some(table) => table_start(content, table, section.get(1))?,
    };
    // Stop at the next table header so a key in a later table never matches.
    let mut offset = start;
    for line in content[start..].split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') {
            break;
        }
        if let Some(rest) = trimmed.strip_prefix(field) {
            if rest.trim_start().starts_with('=') {
                return Some(offset + (line.len() - trimmed.len()));
            }
        }
        offset += line.len();
    }
    None
}

fn table_start(content: &str, table: &str, index: Option<&String>) -> Option<usize> {
    let array_header = format!("[[{table}]]");
    let nth = index.and_then(|i| i.parse::<usize>().ok()).unwrap_or(0);
    let mut offset = 0;
    let mut seen = 0;
    for line in content.split_inclusive('\n') {
        let header = line.trim();
        if header == array_header {
            if seen == nth {
                return Some(offset + line.len());
            }
            seen += 1;
        } else if header == format!("[{table}]") {
            return Some(offset + line.len());
        }
        offset += line.len();
    }
    None
}

/// Closest entry of `valid` by Jaro-Winkler similarity, if any is close enough.
pub fn suggest_key(unknown: &str, valid: &[&str]) -> Option<String> {
    valid
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Render each error to stderr through miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        match handler.render_report(&mut buf, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{buf}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
    if errors.len() > 1 {
        eprintln!("{} configuration errors", errors.len());
    }
}
