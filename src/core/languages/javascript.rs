use std::path::Path;
use tree_sitter::{Node, Parser};

use crate::core::call_site::{
    ArgShape, CallOrigin, CallSite, Extraction, FirstArgument, MethodName, ParseFailure,
};
use crate::core::heuristics::{is_client_receiver, should_skip_call};
use crate::error::{CallguardError, Result};
use super::{CallExtractor, ScriptDialect};

/// JavaScript/TypeScript call extractor using Tree-sitter
pub struct ScriptExtractor {
    parser: Parser,
    dialect: ScriptDialect,
}

impl ScriptExtractor {
    /// `timeout_micros` bounds a single parse; 0 disables the bound
    pub fn new(dialect: ScriptDialect, timeout_micros: u64) -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&dialect.language())
            .map_err(|e| CallguardError::Parser(format!("Failed to set {:?} language: {}", dialect, e)))?;
        parser.set_timeout_micros(timeout_micros);

        Ok(Self { parser, dialect })
    }
}

impl CallExtractor for ScriptExtractor {
    fn extract(&mut self, text: &str, file: &Path) -> Result<Extraction> {
        // A timed-out parse leaves state behind that must not leak into the next one
        self.parser.reset();

        let tree = match self.parser.parse(text, None) {
            Some(tree) => tree,
            None => {
                return Ok(Extraction::failed(ParseFailure::whole_file(
                    file,
                    "parser gave up (timeout exceeded)",
                )))
            }
        };

        let root = tree.root_node();
        if root.has_error() {
            return Ok(Extraction::failed(self.describe_error(root, text, file)));
        }

        let mut calls = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.kind() == "call_expression" {
                if let Some(call) = self.parse_call_expression(node, text, file) {
                    calls.push(call);
                }
            }
            let mut cursor = node.walk();
            stack.extend(node.named_children(&mut cursor));
        }

        calls.sort_by_key(|call| (call.line, call.column));

        Ok(Extraction {
            calls,
            failures: Vec::new(),
        })
    }
}

impl ScriptExtractor {
    /// Turn a `call_expression` into a call site if it targets a client
    fn parse_call_expression(&self, node: Node, source: &str, file: &Path) -> Option<CallSite> {
        let mut callee = node.child_by_field_name("function")?;
        let arguments = node.child_by_field_name("arguments")?;

        // Tagged templates put a template_string where the arguments go
        if arguments.kind() != "arguments" {
            return None;
        }

        // TypeScript parses `await client.get<T>(..)` with the await inside the callee
        while callee.kind() == "await_expression" {
            callee = callee.named_child(0)?;
        }

        let (receiver, method, anchor) = match callee.kind() {
            "member_expression" => {
                let object = callee.child_by_field_name("object")?;
                let property = callee.child_by_field_name("property")?;
                let name = self.node_text(property, source).to_string();
                (object, MethodName::Static(name), property)
            }
            "subscript_expression" => {
                let object = callee.child_by_field_name("object")?;
                let index = callee.child_by_field_name("index")?;
                let method = match self.literal_string(index, source) {
                    Some(name) => MethodName::Static(name),
                    None => MethodName::Dynamic,
                };
                (object, method, index)
            }
            _ => return None,
        };

        let receiver_text = self.node_text(receiver, source);
        if !is_client_receiver(receiver_text) {
            return None;
        }
        if let MethodName::Static(name) = &method {
            if should_skip_call(receiver_text, name) {
                return None;
            }
        }

        let mut cursor = arguments.walk();
        let args: Vec<Node> = arguments
            .named_children(&mut cursor)
            .filter(|arg| arg.kind() != "comment")
            .collect();

        let first_argument = args
            .first()
            .map(|arg| FirstArgument::new(self.argument_shape(*arg, source), self.node_text(*arg, source)));

        let position = anchor.start_position();

        Some(CallSite {
            file: file.to_path_buf(),
            line: position.row + 1,
            column: position.column + 1,
            method,
            argument_count: args.len(),
            first_argument,
            origin: CallOrigin::Code,
        })
    }

    /// Contents of a string literal, or of a template literal without substitutions
    fn literal_string(&self, node: Node, source: &str) -> Option<String> {
        match node.kind() {
            "string" => {}
            "template_string" => {
                let mut cursor = node.walk();
                let has_substitution = node
                    .named_children(&mut cursor)
                    .any(|child| child.kind() == "template_substitution");
                if has_substitution {
                    return None;
                }
            }
            _ => return None,
        }

        let text = self.node_text(node, source);
        if text.len() < 2 {
            return None;
        }
        Some(text[1..text.len() - 1].to_string())
    }

    fn argument_shape(&self, node: Node, source: &str) -> ArgShape {
        match node.kind() {
            "string" | "template_string" => ArgShape::StringLiteral,
            "number" => ArgShape::NumericLiteral,
            "unary_expression" => {
                let operator = node
                    .child_by_field_name("operator")
                    .map(|op| self.node_text(op, source));
                let operand = node.child_by_field_name("argument").map(|arg| arg.kind());
                match (operator, operand) {
                    (Some("-") | Some("+"), Some("number")) => ArgShape::NumericLiteral,
                    _ => ArgShape::Other,
                }
            }
            _ => ArgShape::Other,
        }
    }

    fn describe_error(&self, root: Node, source: &str, file: &Path) -> ParseFailure {
        let Some(node) = self.first_error_node(root) else {
            return ParseFailure::whole_file(file, format!("{:?} syntax error", self.dialect));
        };

        let message = if node.is_missing() {
            format!("{:?} syntax error: missing `{}`", self.dialect, node.kind())
        } else {
            let snippet: String = self
                .node_text(node, source)
                .lines()
                .next()
                .unwrap_or("")
                .chars()
                .take(30)
                .collect();
            format!("{:?} syntax error near `{}`", self.dialect, snippet.trim())
        };

        let position = node.start_position();
        ParseFailure {
            file: file.to_path_buf(),
            line: position.row + 1,
            column: position.column + 1,
            message,
        }
    }

    /// First ERROR or MISSING node in document order
    fn first_error_node<'tree>(&self, root: Node<'tree>) -> Option<Node<'tree>> {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.is_error() || node.is_missing() {
                return Some(node);
            }
            if !node.has_error() {
                continue;
            }
            let mut cursor = node.walk();
            let children: Vec<Node> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
        None
    }

    /// Extract text content of a node
    fn node_text<'s>(&self, node: Node, source: &'s str) -> &'s str {
        &source[node.byte_range()]
    }
}
