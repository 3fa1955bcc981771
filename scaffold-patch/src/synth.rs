//! Node synthesis: turn raw config text into a validated node of the kind
//! its insertion point needs, and render it with formatting directives.
//!
//! Validation parses the text inside a minimal wrapper program for its kind.
//! Text that does not parse cleanly, or that parses into more than one node
//! or outside its slot in the wrapper, is a configuration error.

use std::ops::Range;

use tree_sitter::Node;

use crate::error::EditError;
use crate::model::Formatting;
use crate::syntax::{
    self, SourceDocument, ATTRIBUTE_LIST, CLASS_DECLARATION, GLOBAL_STATEMENT, PARAMETER,
};

macro_rules! method_body_open {
    () => {
        "class __ScratchClass\n{\n    void __ScratchMethod()\n    {\n"
    };
}

macro_rules! method_body_close {
    () => {
        "\n    }\n}\n"
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A file-scoped (top-level) statement.
    TopLevel,
    /// A statement inside a `{ ... }` block.
    BlockStatement,
    ClassMember,
    Attribute,
    Parameter,
    ReturnType,
    /// The tail appended to an expression after a `.`.
    MemberAccess,
    LambdaParameter,
    Using,
}

impl NodeKind {
    pub fn label(self) -> &'static str {
        match self {
            NodeKind::TopLevel => "top-level statement",
            NodeKind::BlockStatement => "statement",
            NodeKind::ClassMember => "class member",
            NodeKind::Attribute => "attribute",
            NodeKind::Parameter => "parameter",
            NodeKind::ReturnType => "return type",
            NodeKind::MemberAccess => "member access",
            NodeKind::LambdaParameter => "lambda parameter",
            NodeKind::Using => "using",
        }
    }

    /// Text placed before and after the snippet to make a complete program.
    fn wrapper(self) -> (&'static str, &'static str) {
        match self {
            NodeKind::TopLevel => ("", ""),
            NodeKind::BlockStatement => (method_body_open!(), method_body_close!()),
            NodeKind::ClassMember => ("class __ScratchClass\n{\n", "\n}\n"),
            NodeKind::Attribute => ("", "\nclass __ScratchClass { }\n"),
            NodeKind::Parameter => ("class __ScratchClass { void __ScratchMethod(", ") { } }\n"),
            NodeKind::ReturnType => ("class __ScratchClass { ", " __ScratchMethod() { } }\n"),
            NodeKind::MemberAccess => (
                concat!(method_body_open!(), "__scratch."),
                concat!(";", method_body_close!()),
            ),
            NodeKind::LambdaParameter => (
                concat!(method_body_open!(), "var __scratch = ("),
                concat!(") => 0;", method_body_close!()),
            ),
            NodeKind::Using => ("using ", ";\n"),
        }
    }

    fn wrap(self, text: &str) -> Wrapped {
        let (prefix, suffix) = self.wrapper();
        Wrapped {
            source: format!("{}{}{}", prefix, text, suffix),
            span: prefix.len()..prefix.len() + text.len(),
        }
    }

    /// The wrapped text parsed cleanly, kept the wrapper's shape, and produced
    /// exactly one node of this kind lying inside the snippet's span.
    fn accepts(self, wrapped: &SourceDocument, span: &Range<usize>) -> bool {
        if wrapped.has_syntax_errors() {
            return false;
        }
        let root = wrapped.root();
        let within = |node: Node<'_>| node.start_byte() >= span.start && node.end_byte() <= span.end;
        let encloses = |node: Node<'_>| node.start_byte() < span.start && node.end_byte() > span.end;

        match self {
            NodeKind::TopLevel => {
                let members = syntax::members(root);
                members.len() == 1 && members[0].kind() == GLOBAL_STATEMENT
            }
            NodeKind::Using => {
                syntax::members(root).len() == 1 && syntax::using_directives(root).len() == 1
            }
            NodeKind::Attribute => match wrapper_class(root) {
                Some(class) => {
                    let attributes = syntax::children_of_kind(class, ATTRIBUTE_LIST);
                    !attributes.is_empty() && attributes.iter().all(|a| within(*a))
                }
                None => false,
            },
            NodeKind::ClassMember => {
                let Some(body) = wrapper_class(root).and_then(syntax::class_body) else {
                    return false;
                };
                let members = syntax::members(body);
                encloses(body) && members.len() == 1 && within(members[0])
            }
            NodeKind::Parameter => {
                let Some(list) = wrapper_method(root).and_then(syntax::parameter_list) else {
                    return false;
                };
                let parameters = syntax::children_of_kind(list, PARAMETER);
                encloses(list) && parameters.len() == 1 && within(parameters[0])
            }
            NodeKind::ReturnType => wrapper_method(root)
                .and_then(syntax::return_type)
                .map(within)
                .unwrap_or(false),
            NodeKind::BlockStatement => {
                let Some(body) = wrapper_method(root).and_then(syntax::body_block) else {
                    return false;
                };
                let statements = syntax::members(body);
                encloses(body) && statements.len() == 1 && within(statements[0])
            }
            NodeKind::MemberAccess | NodeKind::LambdaParameter => {
                let Some(body) = wrapper_method(root).and_then(syntax::body_block) else {
                    return false;
                };
                encloses(body) && syntax::members(body).len() == 1
            }
        }
    }
}

struct Wrapped {
    source: String,
    /// Where the snippet sits inside `source`.
    span: Range<usize>,
}

/// The only top-level declaration, when it is still the wrapper class.
fn wrapper_class(root: Node<'_>) -> Option<Node<'_>> {
    let members = syntax::members(root);
    match members.as_slice() {
        [class] if class.kind() == CLASS_DECLARATION => Some(*class),
        _ => None,
    }
}

/// The wrapper's single method. A snippet that closes the wrapper early
/// leaves more than one.
fn wrapper_method(root: Node<'_>) -> Option<Node<'_>> {
    wrapper_class(root)?;
    match syntax::callables(root).as_slice() {
        [method] => Some(*method),
        _ => None,
    }
}

/// Validated text ready to be spliced into a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub kind: NodeKind,
    text: String,
    leading: Formatting,
    trailing: Formatting,
}

/// Validate `text` as a `kind` node and attach its formatting.
pub fn make_node(
    kind: NodeKind,
    text: &str,
    leading: Formatting,
    trailing: Formatting,
) -> Result<Snippet, EditError> {
    let trimmed = text.trim();
    let invalid = || EditError::InvalidSnippet {
        kind: kind.label(),
        text: text.to_string(),
    };
    if trimmed.is_empty() {
        return Err(invalid());
    }
    if kind == NodeKind::Attribute && !trimmed.starts_with('[') {
        return Err(invalid());
    }
    let Wrapped { source, span } = kind.wrap(trimmed);
    if !kind.accepts(&SourceDocument::parse(source)?, &span) {
        return Err(invalid());
    }
    Ok(Snippet {
        kind,
        text: trimmed.to_string(),
        leading,
        trailing,
    })
}

impl Snippet {
    /// Shorthand for nodes that carry no formatting directives.
    pub fn plain(kind: NodeKind, text: &str) -> Result<Snippet, EditError> {
        make_node(kind, text, Formatting::default(), Formatting::default())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Fixed-width indentation when requested, otherwise `inherited`.
    pub fn indent(&self, inherited: &str) -> String {
        if self.leading.number_of_spaces > 0 {
            " ".repeat(self.leading.number_of_spaces)
        } else {
            inherited.to_string()
        }
    }

    /// Every non-blank line prefixed with the indentation.
    fn indented_lines(&self, inherited: &str, eol: &str) -> String {
        let indent = self.indent(inherited);
        self.text
            .lines()
            .map(|line| {
                let line = line.trim_end();
                if line.is_empty() {
                    String::new()
                } else {
                    format!("{}{}", indent, line)
                }
            })
            .collect::<Vec<_>>()
            .join(eol)
    }

    /// Text to splice in right after an existing node's last byte.
    pub fn render_after(&self, inherited: &str, eol: &str) -> String {
        let mut out = String::from(eol);
        if self.leading.newline {
            out.push_str(eol);
        }
        out.push_str(&self.indented_lines(inherited, eol));
        if self.trailing.newline {
            out.push_str(eol);
        }
        out
    }

    /// Text to splice in at the start of the line holding an existing node.
    pub fn render_before(&self, inherited: &str, eol: &str) -> String {
        let mut out = String::new();
        if self.leading.newline {
            out.push_str(eol);
        }
        out.push_str(&self.indented_lines(inherited, eol));
        out.push_str(eol);
        if self.trailing.newline {
            out.push_str(eol);
        }
        out
    }

    /// `.Tail` appended to an expression, optionally on its own line.
    pub fn render_member_access(&self, inherited: &str, eol: &str) -> String {
        if self.leading.newline {
            format!("{}{}.{}", eol, self.indent(inherited), self.text)
        } else {
            format!(".{}", self.text)
        }
    }
}

/// The line terminator a document already uses.
pub fn line_ending(doc: &SourceDocument) -> &'static str {
    if doc.text().contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_valid(kind: NodeKind, text: &str) -> bool {
        Snippet::plain(kind, text).is_ok()
    }

    #[test]
    fn accepts_statements() {
        assert!(is_valid(NodeKind::BlockStatement, "services.AddRazorPages();"));
        assert!(is_valid(NodeKind::BlockStatement, "if (env.IsDevelopment())\n{\n    app.UseDeveloperExceptionPage();\n}"));
        assert!(is_valid(NodeKind::TopLevel, "app.MapRazorPages();"));
        assert!(is_valid(NodeKind::TopLevel, "var connection = builder.Configuration.GetConnectionString(\"Default\");"));
    }

    #[test]
    fn rejects_malformed_statements() {
        assert!(!is_valid(NodeKind::BlockStatement, "services.AddRazorPages(;"));
        assert!(!is_valid(NodeKind::TopLevel, "app.MapRazorPages(;"));
        assert!(!is_valid(NodeKind::BlockStatement, "   "));
    }

    #[test]
    fn rejects_text_that_escapes_its_slot() {
        assert!(!is_valid(NodeKind::BlockStatement, "a(); } public void Injected() { b();"));
        assert!(!is_valid(NodeKind::ClassMember, "public int X { get; set; } } class Other {"));
        assert!(!is_valid(NodeKind::Parameter, "int id) { } void Other(int x"));
        assert!(!is_valid(NodeKind::Attribute, "[Authorize] class Other { } [Obsolete]"));
        assert!(!is_valid(NodeKind::MemberAccess, "AddX(); } void Other() { __scratch.AddY()"));
    }

    #[test]
    fn rejects_more_than_one_node() {
        assert!(!is_valid(NodeKind::BlockStatement, "services.AddRazorPages(); services.AddControllers();"));
        assert!(!is_valid(NodeKind::TopLevel, "app.UseRouting();\napp.UseAuthorization();"));
        assert!(!is_valid(NodeKind::ClassMember, "public int X { get; set; }\npublic int Y { get; set; }"));
        assert!(!is_valid(NodeKind::Parameter, "int id, string name"));
        assert!(!is_valid(NodeKind::Using, "System; using System.Linq"));
        assert!(is_valid(NodeKind::BlockStatement, "app.UseRouting(); // routing"));
    }

    #[test]
    fn top_level_rejects_declarations() {
        assert!(!is_valid(NodeKind::TopLevel, "using System;"));
        assert!(!is_valid(NodeKind::TopLevel, "class Extra { }"));
    }

    #[test]
    fn validates_members_attributes_and_parameters() {
        assert!(is_valid(NodeKind::ClassMember, "public DbSet<Movie> Movies { get; set; }"));
        assert!(is_valid(NodeKind::Attribute, "[Authorize]"));
        assert!(!is_valid(NodeKind::Attribute, "Authorize"));
        assert!(is_valid(NodeKind::Parameter, "IWebHostEnvironment env"));
        assert!(is_valid(NodeKind::ReturnType, "async Task"));
        assert!(is_valid(NodeKind::MemberAccess, "AddMicrosoftIdentityUI()"));
        assert!(is_valid(NodeKind::LambdaParameter, "sp"));
        assert!(is_valid(NodeKind::Using, "Microsoft.EntityFrameworkCore"));
        assert!(!is_valid(NodeKind::Using, "Microsoft..EntityFrameworkCore;;"));
    }

    #[test]
    fn renders_with_formatting() {
        let leading = Formatting { newline: true, number_of_spaces: 4 };
        let snippet = make_node(NodeKind::BlockStatement, "if (x)\n{\n    y();\n}", leading, Formatting::default()).unwrap();
        assert_eq!(snippet.render_after("        ", "\n"), "\n\n    if (x)\n    {\n        y();\n    }");

        let plain = Snippet::plain(NodeKind::BlockStatement, "  z();  ").unwrap();
        assert_eq!(plain.render_after("    ", "\n"), "\n    z();");
        assert_eq!(plain.render_before("    ", "\r\n"), "    z();\r\n");
    }

    #[test]
    fn renders_member_access_tail() {
        let plain = Snippet::plain(NodeKind::MemberAccess, "AddX()").unwrap();
        assert_eq!(plain.render_member_access("    ", "\n"), ".AddX()");

        let broken = make_node(
            NodeKind::MemberAccess,
            "AddX()",
            Formatting { newline: true, number_of_spaces: 8 },
            Formatting::default(),
        )
        .unwrap();
        assert_eq!(broken.render_member_access("", "\n"), "\n        .AddX()");
    }
}
