//! A streaming parser and editor for the legacy (pre-v6) KiCad schematic
//! format that preserves the exact bytes of everything it does not touch.
//!
//! The format is line-oriented: `$Sheet…$EndSheet` and `$Comp…$EndComp`
//! blocks with tag-prefixed body lines. Instead of parsing into an AST and
//! pretty-printing, every line is split into a sequence of tokens whose
//! concatenation reproduces the line byte-for-byte, and parsed fields are
//! [`TokenView`]s: windows into those tokens that support in-place slice
//! replacement. Editing a view changes exactly that slice of the output and
//! nothing else.
//!
//! - [`tokenize`] - whitespace-preserving line splitter
//! - [`SchReader`] - pull-based record event iterator
//! - [`SchMapper`] - same events, plus a pass-through output sink

mod mapper;
mod reader;
mod record;

pub use mapper::SchMapper;
pub use reader::{Block, Event, SchReader};
pub use record::{ArEntry, CompRecord, FieldEntry, SheetRecord};

use thiserror::Error;

/// One tokenized line. Concatenating the tokens reproduces the original
/// line, including its end-of-line bytes.
pub type Line = Vec<String>;

/// Errors raised while streaming a schematic.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: unbalanced {tag}")]
    UnbalancedExit { line: usize, tag: &'static str },

    #[error("line {line}: {tag} still open at end of file")]
    UnclosedBlock { line: usize, tag: &'static str },
}

/// Split a line into tokens.
///
/// A token is either a run of whitespace or a run of non-space characters in
/// which an opening `"` starts a quoted sub-string (closed by an unescaped
/// `"`). Token index 0 is always the leading-whitespace token, possibly
/// empty, so the numeric indices of payload tokens do not depend on
/// indentation: payload sits at odd indices, whitespace at even ones.
///
/// The splitter is total: any input, including unterminated quotes, round
/// trips through split-then-concat.
pub fn tokenize(line: &str) -> Line {
    let mut tokens: Line = vec![String::new()];
    let mut in_ws = true;
    let mut in_quote = false;
    let mut escaped = false;

    for ch in line.chars() {
        let is_ws = !in_quote && ch.is_whitespace();
        if is_ws != in_ws {
            tokens.push(String::new());
            in_ws = is_ws;
        }
        tokens.last_mut().unwrap().push(ch);

        if !in_ws {
            if in_quote {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == '"' {
                    in_quote = false;
                }
            } else if ch == '"' {
                in_quote = true;
                escaped = false;
            }
        }
    }
    tokens
}

/// Wrap a value in double quotes, escaping embedded quotes.
pub fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\\\""))
}

/// Strip one layer of surrounding double quotes, if present.
pub fn unquote(s: &str) -> &str {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

/// A window into one token of a line buffer.
///
/// The view denotes the byte slice `[start, end)` of token `token` on line
/// `line` (an `end` of `None` means "to the end of the token"). Assignment
/// replaces exactly that slice and, when `end` is bounded, moves `end` to
/// `start + len(new)` so the view keeps covering the written value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenView {
    pub line: usize,
    pub token: usize,
    pub start: usize,
    pub end: Option<usize>,
}

impl TokenView {
    /// View covering a whole token.
    pub fn new(line: usize, token: usize) -> Self {
        Self { line, token, start: 0, end: None }
    }

    /// View covering a sub-slice of a token.
    pub fn with_range(line: usize, token: usize, start: usize, end: Option<usize>) -> Self {
        Self { line, token, start, end }
    }

    /// The raw slice, quotes and all.
    pub fn get<'a>(&self, lines: &'a [Line]) -> &'a str {
        let tok = &lines[self.line][self.token];
        match self.end {
            Some(end) => &tok[self.start..end],
            None => &tok[self.start..],
        }
    }

    /// The slice with one layer of surrounding quotes removed.
    pub fn value<'a>(&self, lines: &'a [Line]) -> &'a str {
        unquote(self.get(lines))
    }

    /// Replace the viewed slice with `value`.
    pub fn set(&mut self, lines: &mut [Line], value: &str) {
        let tok = &mut lines[self.line][self.token];
        let tail = match self.end {
            Some(end) => tok[end..].to_string(),
            None => String::new(),
        };
        tok.truncate(self.start);
        tok.push_str(value);
        tok.push_str(&tail);
        if self.end.is_some() {
            self.end = Some(self.start + value.len());
        }
    }

    /// Replace the viewed slice with `value` wrapped in escaped quotes.
    pub fn set_quoted(&mut self, lines: &mut [Line], value: &str) {
        self.set(lines, &quote(value));
    }

    /// The same view into a different line, used when a backing line has
    /// been deep-cloned.
    pub fn clone_onto(&self, line: usize) -> Self {
        Self { line, ..*self }
    }
}

/// A field position that may not be materialized in the source yet.
///
/// Parsed fields whose token exists are `Token` views. A `Virtual` slot
/// carries a fixed logical value (for example the synthetic name of an
/// unnamed field) and remembers where the token would sit; the first
/// assignment splices a delimiter and a fresh token into the line, after
/// which the slot behaves like any other view.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Token(TokenView),
    Virtual { value: String, line: usize, token: usize },
}

impl Slot {
    /// The raw value: the backing slice, or the logical value while virtual.
    pub fn get<'a>(&'a self, lines: &'a [Line]) -> &'a str {
        match self {
            Slot::Token(view) => view.get(lines),
            Slot::Virtual { value, .. } => value,
        }
    }

    /// As [`Slot::get`], minus surrounding quotes.
    pub fn value<'a>(&'a self, lines: &'a [Line]) -> &'a str {
        unquote(self.get(lines))
    }

    pub fn set(&mut self, lines: &mut [Line], value: &str) {
        match self {
            Slot::Token(view) => view.set(lines, value),
            Slot::Virtual { value: current, line, token } => {
                if current.as_str() == value {
                    return;
                }
                let (line, token) = (*line, *token);
                // Materialize just before the trailing whitespace token so
                // the new token lands ahead of the end-of-line bytes.
                let at = token.saturating_sub(1).min(lines[line].len());
                lines[line].insert(at, " ".to_string());
                lines[line].insert(at + 1, value.to_string());
                *self = Slot::Token(TokenView::new(line, at + 1));
            }
        }
    }

    pub fn set_quoted(&mut self, lines: &mut [Line], value: &str) {
        self.set(lines, &quote(value));
    }

    pub fn clone_onto(&self, line: usize) -> Self {
        match self {
            Slot::Token(view) => Slot::Token(view.clone_onto(line)),
            Slot::Virtual { value, token, .. } => Slot::Virtual {
                value: value.clone(),
                line,
                token: *token,
            },
        }
    }
}
