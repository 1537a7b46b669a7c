//! Strict parsing of the model's screening response.
//!
//! The model is asked for exactly two labeled fields, `Decision:` and
//! `Explanation:`. Anything that does not carry both is a typed parse
//! failure — the pipeline never guesses a decision from loose prose.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A screening decision. The only three values ever persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Include,
    Exclude,
    Unsure,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Include => "include",
            Decision::Exclude => "exclude",
            Decision::Unsure => "unsure",
        }
    }

    /// Case-insensitive match against the three allowed labels.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "include" => Some(Decision::Include),
            "exclude" => Some(Decision::Exclude),
            "unsure" => Some(Decision::Unsure),
            _ => None,
        }
    }
}

/// Decision + explanation pair. Transient: consumed by the persistence
/// layer or returned to the ad-hoc caller, never stored as its own row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub decision: Decision,
    pub explanation: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("response contains no `Decision:` field")]
    MissingDecision,

    #[error("decision `{0}` is not one of Include/Exclude/Unsure")]
    InvalidDecision(String),

    #[error("response contains no `Explanation:` field")]
    MissingExplanation,
}

fn decision_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^\s*\**\s*decision\s*\**\s*:\s*\**\s*([A-Za-z]+)").unwrap()
    })
}

// Line-anchored like the decision label; the capture stops before a
// following `Decision:` line so label order does not matter.
fn explanation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?ims)^\s*\**\s*explanation\s*\**\s*:\s*(.+?)(?:\n\s*\**\s*decision\s*\**\s*:|\z)")
            .unwrap()
    })
}

/// Parse a raw completion into an [`Evaluation`].
///
/// Tolerates code fences and Markdown bold around the labels; rejects
/// anything missing either field or using a decision outside the enum.
pub fn parse_evaluation(raw: &str) -> Result<Evaluation, ParseError> {
    let text = strip_code_fences(raw);

    let decision_caps = decision_re()
        .captures(&text)
        .ok_or(ParseError::MissingDecision)?;
    let decision_word = decision_caps.get(1).map_or("", |m| m.as_str());
    let decision = Decision::parse(decision_word)
        .ok_or_else(|| ParseError::InvalidDecision(decision_word.to_string()))?;

    let explanation = explanation_re()
        .captures(&text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_matches('*').trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(ParseError::MissingExplanation)?;

    Ok(Evaluation {
        decision,
        explanation,
    })
}

/// Drop Markdown fence lines (```), keeping fenced content.
fn strip_code_fences(raw: &str) -> String {
    raw.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}
