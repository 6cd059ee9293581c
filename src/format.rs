//! Accumulates streamed text and formats it for display.
//!
//! Formatting is recomputed from the whole message on every append. Rules
//! such as "a line starting with `1. ` is an ordinal" depend on text that can
//! arrive split across two deltas, so patching the previous output would
//! drift from formatting the finished message.

use std::fmt;

/// Characters that get a following space when glued to the next word.
const SENTENCE_PUNCTUATION: [char; 4] = ['.', ',', '!', '?'];

/// Bullet markers recognized at the start of a line.
const BULLET_MARKERS: [char; 2] = ['-', '•'];

/// Canonical bullet used when rendering [`FormattedLine::Bullet`].
pub const BULLET: char = '•';

/// One display line of a formatted message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormattedLine {
    /// Ordinary text.
    Text(String),
    /// A bulleted item, without its marker.
    Bullet(String),
    /// An emphasized numbered line such as `2. Current State`.
    Ordinal {
        /// The leading number, without the period.
        number: String,
        /// Everything after `<number>. `.
        text: String,
    },
}

impl fmt::Display for FormattedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormattedLine::Text(text) => f.write_str(text),
            FormattedLine::Bullet(text) => write!(f, "{BULLET} {text}"),
            FormattedLine::Ordinal { number, text } => write!(f, "{number}. {text}"),
        }
    }
}

/// A fully formatted message.
///
/// `Display` renders it as plain text with one `\n` between lines.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormattedText {
    lines: Vec<FormattedLine>,
}

impl FormattedText {
    /// Formats `text` from scratch.
    pub fn format(text: &str) -> Self {
        let lines = split_lines(text)
            .map(|line| classify(&space_after_punctuation(line)))
            .collect();
        Self { lines }
    }

    /// The formatted lines in order.
    pub fn lines(&self) -> &[FormattedLine] {
        &self.lines
    }

    /// Returns true if there is nothing to display.
    pub fn is_empty(&self) -> bool {
        self.lines
            .iter()
            .all(|line| matches!(line, FormattedLine::Text(text) if text.is_empty()))
    }
}

impl fmt::Display for FormattedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, line) in self.lines.iter().enumerate() {
            if idx > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Running text of one assistant reply.
#[derive(Clone, Debug, Default)]
pub struct ResponseAccumulator {
    text: String,
}

impl ResponseAccumulator {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a delta and returns the formatted version of the whole reply.
    pub fn append(&mut self, text: &str) -> FormattedText {
        self.text.push_str(text);
        FormattedText::format(&self.text)
    }

    /// The raw accumulated text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Formats the accumulated text without appending.
    pub fn formatted(&self) -> FormattedText {
        FormattedText::format(&self.text)
    }
}

fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n')
        .filter(move |_| !text.is_empty())
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
}

fn space_after_punctuation(line: &str) -> String {
    let mut out = String::with_capacity(line.len() + 8);
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        out.push(c);
        if SENTENCE_PUNCTUATION.contains(&c)
            && let Some(next) = chars.peek()
            && !next.is_whitespace()
        {
            out.push(' ');
        }
    }
    out
}

fn classify(line: &str) -> FormattedLine {
    let trimmed = line.trim_start();
    if let Some(rest) = trimmed.strip_prefix(BULLET_MARKERS) {
        return FormattedLine::Bullet(rest.trim_start().to_string());
    }
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0
        && let Some(text) = line[digits..].strip_prefix(". ")
    {
        return FormattedLine::Ordinal {
            number: line[..digits].to_string(),
            text: text.to_string(),
        };
    }
    FormattedLine::Text(line.to_string())
}
