use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Placeholder reported for calls whose method name is computed at runtime
pub const DYNAMIC_METHOD: &str = "<dynamic>";

/// Resolved name of the invoked method
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodName {
    /// `client.get(..)` or `client["get"](..)`
    Static(String),

    /// `client[expr](..)` with a non-literal `expr`
    Dynamic,
}

impl MethodName {
    pub fn as_str(&self) -> &str {
        match self {
            MethodName::Static(name) => name,
            MethodName::Dynamic => DYNAMIC_METHOD,
        }
    }
}

impl fmt::Display for MethodName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse literal shape of an argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArgShape {
    StringLiteral,
    NumericLiteral,
    Other,
}

impl ArgShape {
    pub fn is_literal(self) -> bool {
        matches!(self, ArgShape::StringLiteral | ArgShape::NumericLiteral)
    }

    pub fn describe(self) -> &'static str {
        match self {
            ArgShape::StringLiteral => "a string literal",
            ArgShape::NumericLiteral => "a numeric literal",
            ArgShape::Other => "an expression",
        }
    }
}

/// Which extraction strategy produced a call site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallOrigin {
    Code,
    MarkdownFence,
    MarkdownInline,
}

/// First positional argument as seen by an extractor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstArgument {
    pub shape: ArgShape,
    pub text: String,
}

const MAX_ARGUMENT_TEXT: usize = 60;

impl FirstArgument {
    pub fn new(shape: ArgShape, text: &str) -> Self {
        let text = text.trim();
        let text = match text.char_indices().nth(MAX_ARGUMENT_TEXT) {
            Some((cut, _)) => format!("{}...", &text[..cut]),
            None => text.to_string(),
        };
        Self { shape, text }
    }
}

/// A single client method invocation found in code or documentation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub file: PathBuf,

    /// 1-based line of the method name token
    pub line: usize,

    /// 1-based column of the method name token
    pub column: usize,

    pub method: MethodName,
    pub argument_count: usize,
    pub first_argument: Option<FirstArgument>,
    pub origin: CallOrigin,
}

/// A file or block that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseFailure {
    /// Failure that applies to the file as a whole
    pub fn whole_file(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: 1,
            column: 1,
            message: message.into(),
        }
    }
}

/// Everything an extractor found in one piece of text
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub calls: Vec<CallSite>,
    pub failures: Vec<ParseFailure>,
}

impl Extraction {
    pub fn failed(failure: ParseFailure) -> Self {
        Self {
            calls: Vec::new(),
            failures: vec![failure],
        }
    }

    pub fn merge(&mut self, other: Extraction) {
        self.calls.extend(other.calls);
        self.failures.extend(other.failures);
    }

    /// Move every position down by `lines`, for text embedded in a larger file
    pub fn offset_lines(mut self, lines: usize) -> Self {
        for call in &mut self.calls {
            call.line += lines;
        }
        for failure in &mut self.failures {
            failure.line += lines;
        }
        self
    }

    /// Shift columns per line, for embedded text whose lines carry a stripped prefix
    pub fn offset_columns(mut self, per_line: &[usize]) -> Self {
        let shift = |line: usize| per_line.get(line.saturating_sub(1)).copied().unwrap_or(0);
        for call in &mut self.calls {
            call.column += shift(call.line);
        }
        for failure in &mut self.failures {
            failure.column += shift(failure.line);
        }
        self
    }

    pub fn with_origin(mut self, origin: CallOrigin) -> Self {
        for call in &mut self.calls {
            call.origin = origin;
        }
        self
    }
}
