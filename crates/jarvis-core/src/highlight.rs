//! Syntax highlighting for fenced code blocks
//!
//! Output comes in two forms: annotated HTML (escaped by syntect, safe to
//! embed) and styled lines for terminal front ends.

use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Style, Theme, ThemeSet};
use syntect::html::{styled_line_to_highlighted_html, IncludeBackground};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_THEME: &str = "base16-ocean.dark";

#[derive(Debug, Error)]
pub enum HighlightError {
    #[error("highlighting failed: {0}")]
    Syntect(#[from] syntect::Error),
}

/// The highlighting capability used by the message formatter.
pub trait Highlight {
    /// Highlight `code`, honouring `language` when it names a known syntax and
    /// auto-detecting otherwise.
    fn highlight(&self, code: &str, language: Option<&str>) -> Result<Highlighted, HighlightError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanStyle {
    pub foreground: Option<Rgb>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledSpan {
    pub text: String,
    pub style: SpanStyle,
}

/// One source line, without its line terminator
pub type StyledLine = Vec<StyledSpan>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlighted {
    /// Name of the syntax that was applied, `None` for plain text.
    pub language: Option<String>,
    pub html: String,
    pub lines: Vec<StyledLine>,
}

impl Highlighted {
    /// Unstyled rendition of `code`, HTML-escaped.
    pub fn plain(code: &str) -> Self {
        let lines = code
            .lines()
            .map(|line| {
                vec![StyledSpan {
                    text: line.to_string(),
                    style: SpanStyle::default(),
                }]
            })
            .collect();

        Self {
            language: None,
            html: html_escape::encode_text(code).into_owned(),
            lines,
        }
    }
}

pub struct SyntectHighlighter {
    syntax_set: SyntaxSet,
    theme: Theme,
}

impl SyntectHighlighter {
    pub fn new(theme_name: &str) -> Self {
        let mut theme_set = ThemeSet::load_defaults();
        let theme = match theme_set.themes.remove(theme_name) {
            Some(theme) => theme,
            None => {
                warn!(theme = theme_name, "unknown highlight theme, using {}", DEFAULT_THEME);
                theme_set
                    .themes
                    .remove(DEFAULT_THEME)
                    .unwrap_or_default()
            }
        };

        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme,
        }
    }

    fn resolve_syntax(&self, code: &str, language: Option<&str>) -> &SyntaxReference {
        language
            .and_then(|lang| self.syntax_set.find_syntax_by_token(lang))
            .or_else(|| {
                code.lines()
                    .next()
                    .and_then(|first| self.syntax_set.find_syntax_by_first_line(first))
            })
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text())
    }
}

impl Default for SyntectHighlighter {
    fn default() -> Self {
        Self::new(DEFAULT_THEME)
    }
}

impl Highlight for SyntectHighlighter {
    fn highlight(&self, code: &str, language: Option<&str>) -> Result<Highlighted, HighlightError> {
        let syntax = self.resolve_syntax(code, language);
        let mut highlighter = HighlightLines::new(syntax, &self.theme);

        let mut html = String::new();
        let mut lines = Vec::new();

        for line in LinesWithEndings::from(code) {
            let ranges = highlighter.highlight_line(line, &self.syntax_set)?;
            html.push_str(&styled_line_to_highlighted_html(&ranges, IncludeBackground::No)?);
            lines.push(to_styled_line(&ranges));
        }

        let language = if syntax.name == self.syntax_set.find_syntax_plain_text().name {
            None
        } else {
            Some(syntax.name.clone())
        };

        Ok(Highlighted {
            language,
            html,
            lines,
        })
    }
}

fn to_styled_line(ranges: &[(Style, &str)]) -> StyledLine {
    ranges
        .iter()
        .filter_map(|(style, text)| {
            let text = text.trim_end_matches(['\n', '\r']);
            if text.is_empty() {
                return None;
            }
            let fg = style.foreground;
            Some(StyledSpan {
                text: text.to_string(),
                style: SpanStyle {
                    foreground: Some(Rgb(fg.r, fg.g, fg.b)),
                    bold: style.font_style.contains(FontStyle::BOLD),
                    italic: style.font_style.contains(FontStyle::ITALIC),
                    underline: style.font_style.contains(FontStyle::UNDERLINE),
                },
            })
        })
        .collect()
}
