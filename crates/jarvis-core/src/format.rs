//! Fence-aware message formatting
//!
//! A message is split on triple backticks into alternating text and code
//! spans. Code spans may open with a language tag on their first line.

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use crate::highlight::{Highlight, Highlighted};

pub const FENCE: &str = "```";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Code(CodeBlock),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Language declared after the opening fence, if any.
    pub language: Option<String>,
    /// Body with the language line stripped, exactly as authored.
    pub raw: String,
    pub highlighted: Highlighted,
}

impl CodeBlock {
    /// Text placed on the clipboard by the block's copy action.
    pub fn copy_text(&self) -> &str {
        &self.raw
    }

    /// Label for the block: the declared language, else the detected one.
    pub fn label(&self) -> Option<&str> {
        self.language
            .as_deref()
            .or(self.highlighted.language.as_deref())
    }
}

fn language_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z0-9_]+)\r?\n").expect("language regex is valid"))
}

/// Split a code span into its declared language and cleaned body.
fn split_language(span: &str) -> (Option<String>, &str) {
    match language_line().captures(span) {
        Some(caps) => {
            let whole = caps.get(0).map_or(0, |m| m.end());
            (Some(caps[1].to_string()), &span[whole..])
        }
        None => (None, span),
    }
}

/// Turn one message's raw text into renderable segments, in authored order.
///
/// Spans at even positions are text and odd positions are code, so an
/// unterminated fence still yields a trailing code segment. Highlighting
/// errors degrade to the unstyled body.
pub fn format_message(text: &str, highlighter: &dyn Highlight) -> Vec<Segment> {
    text.split(FENCE)
        .enumerate()
        .map(|(index, span)| {
            if index % 2 == 0 {
                Segment::Text(span.to_string())
            } else {
                Segment::Code(code_block(span, highlighter))
            }
        })
        .collect()
}

fn code_block(span: &str, highlighter: &dyn Highlight) -> CodeBlock {
    let (language, body) = split_language(span);
    let highlighted = highlighter
        .highlight(body, language.as_deref())
        .unwrap_or_else(|e| {
            warn!(error = %e, "falling back to plain code block");
            Highlighted::plain(body)
        });

    CodeBlock {
        language,
        raw: body.to_string(),
        highlighted,
    }
}

/// Cleaned bodies of a message's code blocks, in order, without highlighting.
pub fn code_sources(text: &str) -> Vec<&str> {
    text.split(FENCE)
        .skip(1)
        .step_by(2)
        .map(|span| split_language(span).1)
        .collect()
}
