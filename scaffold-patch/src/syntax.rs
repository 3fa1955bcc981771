//! Parsed C# source: text plus its tree-sitter tree.
//!
//! A [`SourceDocument`] is never mutated. Edits go through
//! [`SourceDocument::edit`], which splices the text surgically and parses the
//! result into a new document, leaving the old one valid.

use std::fmt;
use std::ops::Range;

use tree_sitter::{Node, Parser, Tree};

use crate::error::EditError;
use crate::surgical::{apply_text_edits, TextEdit};

pub const USING_DIRECTIVE: &str = "using_directive";
pub const GLOBAL_STATEMENT: &str = "global_statement";
pub const CLASS_DECLARATION: &str = "class_declaration";
pub const DECLARATION_LIST: &str = "declaration_list";
pub const ATTRIBUTE_LIST: &str = "attribute_list";
pub const METHOD_DECLARATION: &str = "method_declaration";
pub const CONSTRUCTOR_DECLARATION: &str = "constructor_declaration";
pub const PARAMETER_LIST: &str = "parameter_list";
pub const PARAMETER: &str = "parameter";
pub const BLOCK: &str = "block";
pub const EXPRESSION_STATEMENT: &str = "expression_statement";
pub const INVOCATION_EXPRESSION: &str = "invocation_expression";
pub const COMMENT: &str = "comment";

const LAMBDA_KINDS: &[&str] = &[
    "lambda_expression",
    "parenthesized_lambda_expression",
    "simple_lambda_expression",
];

fn csharp_parser() -> Result<Parser, EditError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_c_sharp::LANGUAGE.into())
        .map_err(|e| EditError::Language(e.to_string()))?;
    Ok(parser)
}

/// One parsed source file.
#[derive(Clone)]
pub struct SourceDocument {
    text: String,
    tree: Tree,
}

impl SourceDocument {
    pub fn parse(text: impl Into<String>) -> Result<Self, EditError> {
        let text = text.into();
        let tree = csharp_parser()?.parse(&text, None).ok_or(EditError::Parse)?;
        Ok(Self { text, tree })
    }

    /// The exact source text. For a document that was never edited this is
    /// byte-for-byte the text it was parsed from.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn node_text(&self, node: Node<'_>) -> &str {
        &self.text[node.byte_range()]
    }

    pub fn has_syntax_errors(&self) -> bool {
        self.root().has_error()
    }

    /// Apply surgical edits and parse the result into a new document.
    pub fn edit(&self, edits: Vec<TextEdit>) -> Result<SourceDocument, EditError> {
        let text = apply_text_edits(&self.text, edits)?;
        SourceDocument::parse(text)
    }

    /// Byte offset of the start of the line containing `byte`.
    pub fn line_start(&self, byte: usize) -> usize {
        self.text[..byte].rfind('\n').map(|i| i + 1).unwrap_or(0)
    }

    /// Leading whitespace of the line containing `byte`.
    pub fn line_indent(&self, byte: usize) -> &str {
        let start = self.line_start(byte);
        let line = &self.text[start..];
        let width = line
            .find(|c: char| c != ' ' && c != '\t')
            .unwrap_or(line.len());
        &line[..width]
    }

    /// `byte` moved past a `//` comment that follows it on the same line, so
    /// text inserted there does not take the comment away from its code.
    pub fn past_trailing_comment(&self, byte: usize) -> usize {
        let rest = &self.text[byte..];
        let line = rest.split('\n').next().unwrap_or(rest).trim_end_matches('\r');
        if line.trim_start_matches([' ', '\t']).starts_with("//") {
            byte + line.len()
        } else {
            byte
        }
    }

    /// True when only spaces or tabs precede `byte` on its line.
    pub fn starts_line(&self, byte: usize) -> bool {
        self.text[self.line_start(byte)..byte]
            .chars()
            .all(|c| c == ' ' || c == '\t')
    }
}

impl fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceDocument")
            .field("bytes", &self.text.len())
            .field("has_syntax_errors", &self.has_syntax_errors())
            .finish()
    }
}

/// The container a change is applied in: the file itself (top-level
/// statements) or a `{ ... }` block.
#[derive(Debug, Clone, Copy)]
pub enum Scope<'t> {
    File(Node<'t>),
    Block(Node<'t>),
}

impl<'t> Scope<'t> {
    pub fn node(&self) -> Node<'t> {
        match self {
            Scope::File(node) | Scope::Block(node) => *node,
        }
    }

    /// Anchor candidates: top-level statements and declarations of a file
    /// (usings excluded), every statement of a block.
    pub fn members(&self) -> Vec<Node<'t>> {
        match self {
            Scope::File(node) => members(*node)
                .into_iter()
                .filter(|member| member.kind() != USING_DIRECTIVE)
                .collect(),
            Scope::Block(node) => members(*node),
        }
    }

    /// Executable statements only. For a file these are the top-level
    /// statements; usings and type declarations are excluded.
    pub fn statements(&self) -> Vec<Node<'t>> {
        match self {
            Scope::File(node) => children_of_kind(*node, GLOBAL_STATEMENT),
            Scope::Block(node) => members(*node),
        }
    }
}

pub fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    let children = node.named_children(&mut cursor).collect();
    children
}

pub fn children_of_kind<'t>(node: Node<'t>, kind: &str) -> Vec<Node<'t>> {
    named_children(node)
        .into_iter()
        .filter(|child| child.kind() == kind)
        .collect()
}

/// Named children that carry code: comments and preprocessor lines are
/// not members.
pub fn members(node: Node<'_>) -> Vec<Node<'_>> {
    named_children(node)
        .into_iter()
        .filter(|child| child.kind() != COMMENT && !child.kind().starts_with("preproc"))
        .collect()
}

/// Pre-order walk, `node` included.
pub fn descendants(node: Node<'_>) -> Vec<Node<'_>> {
    let mut out = Vec::new();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        out.push(current);
        let mut children = named_children(current);
        children.reverse();
        stack.extend(children);
    }
    out
}

pub fn find_first<'t>(node: Node<'t>, pred: impl Fn(Node<'t>) -> bool) -> Option<Node<'t>> {
    descendants(node).into_iter().find(|n| pred(*n))
}

pub fn is_lambda(node: Node<'_>) -> bool {
    LAMBDA_KINDS.contains(&node.kind())
}

pub fn using_directives(root: Node<'_>) -> Vec<Node<'_>> {
    children_of_kind(root, USING_DIRECTIVE)
}

/// `using System.Linq;` -> `System.Linq`. `global` prefixes are dropped;
/// `static` and alias forms keep their full text.
pub fn using_name(doc: &SourceDocument, directive: Node<'_>) -> String {
    let collapsed = doc
        .node_text(directive)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let rest = collapsed.strip_prefix("global ").unwrap_or(&collapsed);
    let rest = rest.strip_prefix("using ").unwrap_or(rest);
    rest.trim_end_matches(';').trim().to_string()
}

pub fn first_class(root: Node<'_>) -> Option<Node<'_>> {
    find_first(root, |n| n.kind() == CLASS_DECLARATION)
}

pub fn class_body(class: Node<'_>) -> Option<Node<'_>> {
    class
        .child_by_field_name("body")
        .filter(|body| body.kind() == DECLARATION_LIST)
        .or_else(|| children_of_kind(class, DECLARATION_LIST).into_iter().next())
}

/// Every method and constructor in the file, in source order.
pub fn callables(root: Node<'_>) -> Vec<Node<'_>> {
    descendants(root)
        .into_iter()
        .filter(|n| n.kind() == METHOD_DECLARATION || n.kind() == CONSTRUCTOR_DECLARATION)
        .collect()
}

pub fn declared_name<'d>(doc: &'d SourceDocument, node: Node<'_>) -> Option<&'d str> {
    node.child_by_field_name("name").map(|name| doc.node_text(name))
}

pub fn parameter_list(node: Node<'_>) -> Option<Node<'_>> {
    node.child_by_field_name("parameters")
        .filter(|list| list.kind() == PARAMETER_LIST)
        .or_else(|| children_of_kind(node, PARAMETER_LIST).into_iter().next())
}

/// The `{ ... }` body of a method, constructor or lambda, if it has one.
pub fn body_block(node: Node<'_>) -> Option<Node<'_>> {
    node.child_by_field_name("body")
        .filter(|body| body.kind() == BLOCK)
        .or_else(|| children_of_kind(node, BLOCK).into_iter().next())
}

pub fn return_type(method: Node<'_>) -> Option<Node<'_>> {
    method
        .child_by_field_name("returns")
        .or_else(|| method.child_by_field_name("type"))
}

/// Byte range of an `async` modifier on a declaration, if present.
pub fn async_modifier(doc: &SourceDocument, node: Node<'_>) -> Option<Range<usize>> {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .find(|child| match child.kind() {
            "async" => true,
            "modifier" => doc.node_text(*child) == "async",
            _ => false,
        });
    found.map(|child| child.byte_range())
}

pub fn lambda_parameters(lambda: Node<'_>) -> Option<Node<'_>> {
    lambda.child_by_field_name("parameters").or_else(|| {
        named_children(lambda).into_iter().find(|child| {
            matches!(
                child.kind(),
                PARAMETER_LIST | "implicit_parameter" | "identifier" | PARAMETER
            )
        })
    })
}

pub fn lambda_body(lambda: Node<'_>) -> Option<Node<'_>> {
    lambda
        .child_by_field_name("body")
        .or_else(|| named_children(lambda).into_iter().last())
}

/// The expression of an expression statement.
pub fn statement_expression(statement: Node<'_>) -> Option<Node<'_>> {
    members(statement).into_iter().next()
}
