//! Call extraction from markdown documentation.
//!
//! Fenced script blocks go through the tree-sitter extractor. Everything
//! outside fences is prose, where only a regex over `receiver.method(...)`
//! applies. The two strategies stay separate; prose results are
//! approximate and are tagged `markdown-inline` so they can be told apart.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use regex::Regex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;

use crate::error::Result;
use super::call_site::{ArgShape, CallOrigin, CallSite, Extraction, FirstArgument, MethodName};
use super::heuristics::{is_client_receiver, should_skip_call};
use super::languages::{CallExtractor, ScriptDialect, ScriptExtractor};

/// A fenced code block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock {
    /// Info string after the opening fence, e.g. `ts title="x"`
    pub info: String,
    pub content: String,

    /// 1-based line of the first content line
    pub first_line: usize,

    /// Per content line, the width of the container prefix (list indent, `> `) stripped from it
    pub column_offsets: Vec<usize>,
}

impl FencedBlock {
    /// Map positions found in `content` back onto the surrounding document
    fn realign(&self, extraction: Extraction) -> Extraction {
        extraction
            .offset_columns(&self.column_offsets)
            .offset_lines(self.first_line - 1)
    }
}

/// Markdown split into fenced blocks and the remaining prose
#[derive(Debug, Clone)]
pub struct MarkdownLayout {
    pub blocks: Vec<FencedBlock>,

    /// Original text with every fenced block blanked, so offsets map to the same lines
    pub prose: String,
}

struct OpenFence {
    info: String,
    first_line: usize,
    content: String,
    column_offsets: Vec<usize>,
    at_line_start: bool,
}

impl OpenFence {
    fn push(&mut self, chunk: &str, source: &str, range: Range<usize>, lines: &LineIndex) {
        // Owned chunks (tab expansion) have no exact source position
        let borrowed = source.get(range.clone()) == Some(chunk);
        let mut offset = range.start;
        for piece in chunk.split_inclusive('\n') {
            if self.at_line_start {
                let prefix = if borrowed { lines.position(offset).1 - 1 } else { 0 };
                self.column_offsets.push(prefix);
            }
            self.content.push_str(piece);
            self.at_line_start = piece.ends_with('\n');
            offset += piece.len();
        }
    }

    fn close(mut self) -> FencedBlock {
        if self.content.ends_with('\n') {
            self.content.pop();
        }
        FencedBlock {
            info: self.info,
            content: self.content,
            first_line: self.first_line,
            column_offsets: self.column_offsets,
        }
    }
}

/// Separate fenced code blocks, including those nested in lists and blockquotes, from prose
pub fn split_fences(text: &str) -> MarkdownLayout {
    let lines = LineIndex::new(text);
    let mut blocks = Vec::new();
    let mut fenced: Vec<Range<usize>> = Vec::new();
    let mut open: Option<OpenFence> = None;

    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    for (event, range) in Parser::new_ext(text, options).into_offset_iter() {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                open = Some(OpenFence {
                    info: info.trim().to_string(),
                    first_line: lines.position(range.start).0 + 1,
                    content: String::new(),
                    column_offsets: Vec::new(),
                    at_line_start: true,
                });
                fenced.push(range);
            }
            Event::Text(chunk) => {
                if let Some(fence) = open.as_mut() {
                    fence.push(&chunk, text, range, &lines);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(fence) = open.take() {
                    blocks.push(fence.close());
                }
            }
            _ => {}
        }
    }

    MarkdownLayout {
        blocks,
        prose: blank_ranges(text, &fenced),
    }
}

/// Replace every character inside `ranges` with a space, keeping newlines
fn blank_ranges(text: &str, ranges: &[Range<usize>]) -> String {
    let mut prose = String::with_capacity(text.len());
    let mut cursor = 0;
    for range in ranges {
        if range.start < cursor {
            continue;
        }
        prose.push_str(&text[cursor..range.start]);
        prose.extend(
            text[range.clone()]
                .chars()
                .map(|c| if c == '\n' { '\n' } else { ' ' }),
        );
        cursor = range.end;
    }
    prose.push_str(&text[cursor..]);
    prose
}

const BRACKET_PAIRS: [(char, char); 3] = [('{', '}'), ('[', ']'), ('(', ')')];

/// A comma counts as enclosed when, for some bracket kind, the next closing
/// bracket comes before the next opening one. Nested mixed brackets can fool
/// this and over-count arguments; that miscount is part of the rule.
fn comma_is_enclosed(rest: &str) -> bool {
    BRACKET_PAIRS.iter().any(|&(open, close)| match rest.find(close) {
        Some(close_at) => !rest[..close_at].contains(open),
        None => false,
    })
}

/// Approximate split of raw argument text into arguments
pub fn split_arguments(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;

    for (idx, ch) in text.char_indices() {
        if ch == ',' && !comma_is_enclosed(&text[idx + 1..]) {
            pieces.push(&text[start..idx]);
            start = idx + 1;
        }
    }
    pieces.push(&text[start..]);

    pieces
        .into_iter()
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect()
}

/// Byte offset to 1-based line/column mapping
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(idx, _)| idx + 1));
        Self { starts }
    }

    fn position(&self, offset: usize) -> (usize, usize) {
        let line = self.starts.partition_point(|start| *start <= offset);
        (line, offset - self.starts[line - 1] + 1)
    }
}

/// Regex-based call extractor for markdown prose
pub struct InlineExtractor {
    call_head: Regex,
    numeric_literal: Regex,
}

impl InlineExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            call_head: Regex::new(
                r"([A-Za-z_$][\w$]*(?:[!?]*\.[A-Za-z_$][\w$]*)*)[!?]*\.([A-Za-z_$][\w$]*)\s*\(",
            )?,
            numeric_literal: Regex::new(
                r"^[+-]?(?:0[xX][0-9a-fA-F_]+|0[bB][01_]+|0[oO][0-7_]+|\d[\d_]*(?:\.\d*)?(?:[eE][+-]?\d+)?|\.\d+(?:[eE][+-]?\d+)?)n?$",
            )?,
        })
    }

    fn literal_shape(&self, argument: &str) -> ArgShape {
        let argument = argument.trim();
        if argument.starts_with(['"', '\'', '`']) {
            ArgShape::StringLiteral
        } else if self.numeric_literal.is_match(argument) {
            ArgShape::NumericLiteral
        } else {
            ArgShape::Other
        }
    }
}

/// Byte offset of the `)` balancing the `(` at `open`. Gives up at a blank line.
fn closing_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, ch) in text[open..].char_indices() {
        let at = open + idx;
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(at);
                }
            }
            '\n' => {
                let next_line = text[at + 1..].split('\n').next().unwrap_or("");
                if next_line.trim().is_empty() {
                    return None;
                }
            }
            _ => {}
        }
    }
    None
}

impl CallExtractor for InlineExtractor {
    fn extract(&mut self, text: &str, file: &Path) -> Result<Extraction> {
        let lines = LineIndex::new(text);
        let mut calls = Vec::new();

        for caps in self.call_head.captures_iter(text) {
            let (Some(whole), Some(receiver), Some(method)) = (caps.get(0), caps.get(1), caps.get(2)) else {
                continue;
            };

            if !is_client_receiver(receiver.as_str()) || should_skip_call(receiver.as_str(), method.as_str()) {
                continue;
            }

            let open = whole.end() - 1;
            let Some(close) = closing_paren(text, open) else {
                continue;
            };

            let arguments = split_arguments(&text[open + 1..close]);
            let first_argument = arguments
                .first()
                .map(|arg| FirstArgument::new(self.literal_shape(arg), arg));
            let (line, column) = lines.position(method.start());

            calls.push(CallSite {
                file: file.to_path_buf(),
                line,
                column,
                method: MethodName::Static(method.as_str().to_string()),
                argument_count: arguments.len(),
                first_argument,
                origin: CallOrigin::MarkdownInline,
            });
        }

        Ok(Extraction {
            calls,
            failures: Vec::new(),
        })
    }
}

/// Two-pass documentation extractor: fenced blocks, then prose
pub struct DocExtractor {
    inline: InlineExtractor,
    scripts: HashMap<ScriptDialect, ScriptExtractor>,
    timeout_micros: u64,
}

impl DocExtractor {
    pub fn new(timeout_micros: u64) -> Result<Self> {
        Ok(Self {
            inline: InlineExtractor::new()?,
            scripts: HashMap::new(),
            timeout_micros,
        })
    }

    fn script_extractor(&mut self, dialect: ScriptDialect) -> Result<&mut ScriptExtractor> {
        match self.scripts.entry(dialect) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(ScriptExtractor::new(dialect, self.timeout_micros)?)),
        }
    }
}

impl CallExtractor for DocExtractor {
    fn extract(&mut self, text: &str, file: &Path) -> Result<Extraction> {
        let layout = split_fences(text);
        let mut extraction = Extraction::default();

        for block in &layout.blocks {
            let Some(dialect) = ScriptDialect::from_fence_tag(&block.info) else {
                continue;
            };
            let found = self.script_extractor(dialect)?.extract(&block.content, file)?;
            extraction.merge(block.realign(found).with_origin(CallOrigin::MarkdownFence));
        }

        extraction.merge(self.inline.extract(&layout.prose, file)?);

        extraction.calls.sort_by_key(|call| (call.line, call.column));
        extraction.failures.sort_by_key(|failure| (failure.line, failure.column));
        Ok(extraction)
    }
}
