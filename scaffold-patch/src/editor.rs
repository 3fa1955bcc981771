//! The document builder: applies one [`ChangeSet`] to one parsed file.
//!
//! Work runs as a strictly ordered sequence of stages. Every stage plans its
//! edits against the current document, splices them into the text and
//! re-parses, so later stages always see the result of earlier ones. Node
//! handles never outlive the document they came from; methods are tracked by
//! their position among the file's callables and re-located after each edit.

use std::collections::BTreeSet;

use tree_sitter::Node;
use tracing::{debug, warn};

use crate::anchor;
use crate::error::{EditError, SkipReason, SkippedChange};
use crate::model::{ChangeKind, ChangeSet, CodeChange, MethodEdit, Placement, GLOBAL_METHOD};
use crate::options::{self, Gated, ProjectShape};
use crate::signature::{self, ParameterMap};
use crate::surgical::TextEdit;
use crate::synth::{self, make_node, NodeKind, Snippet};
use crate::syntax::{
    self, Scope, SourceDocument, ATTRIBUTE_LIST, BLOCK, CONSTRUCTOR_DECLARATION,
    EXPRESSION_STATEMENT, PARAMETER, PARAMETER_LIST,
};

/// Result of running a change set over one document.
#[derive(Debug)]
pub struct EditOutcome {
    pub document: SourceDocument,
    /// Number of instructions that changed the document.
    pub applied: usize,
    pub skipped: Vec<SkippedChange>,
}

impl EditOutcome {
    pub fn is_up_to_date(&self) -> bool {
        self.applied == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Start,
    ImportsApplied,
    ClassAttributesApplied,
    ClassPropertiesApplied,
    MethodsApplied,
    Done,
}

/// What one instruction does to the current document.
#[derive(Debug)]
enum Plan {
    Edit(Vec<TextEdit>),
    AlreadyApplied,
    Skip(SkipReason),
}

/// Validate `changes`, then run every stage over `document`.
///
/// Returns an error only for a malformed change set or invalid insertion
/// text. Everything else that cannot be applied is reported in
/// [`EditOutcome::skipped`].
pub fn apply_changes(
    changes: &ChangeSet,
    shape: &ProjectShape,
    document: &SourceDocument,
) -> Result<EditOutcome, EditError> {
    DocumentBuilder::new(changes, shape, document)?.finish()
}

/// Checks that need no document: they fail the same way on every file.
pub fn validate(changes: &ChangeSet) -> Result<(), EditError> {
    for (name, edit) in &changes.methods {
        if name.trim().is_empty() {
            return Err(EditError::EmptyMethodName);
        }
        if let Some(reference) = &edit.code_changes_from {
            if !changes.methods.contains_key(reference) {
                return Err(EditError::UnknownMethodEdit {
                    method: name.clone(),
                    reference: reference.clone(),
                });
            }
        }
        for (index, change) in edit.code_changes.iter().enumerate() {
            if change.code_change_type != ChangeKind::Default && change.parent.is_none() {
                return Err(EditError::MissingParent {
                    location: format!("Methods.{}.CodeChanges[{}]", name, index),
                    kind: change.code_change_type.to_string(),
                });
            }
        }
    }
    Ok(())
}

pub struct DocumentBuilder<'c> {
    changes: &'c ChangeSet,
    shape: &'c ProjectShape,
    document: SourceDocument,
    eol: &'static str,
    stage: Stage,
    applied: usize,
    skipped: Vec<SkippedChange>,
}

impl<'c> DocumentBuilder<'c> {
    pub fn new(
        changes: &'c ChangeSet,
        shape: &'c ProjectShape,
        document: &SourceDocument,
    ) -> Result<Self, EditError> {
        validate(changes)?;
        Ok(Self {
            changes,
            shape,
            eol: synth::line_ending(document),
            document: document.clone(),
            stage: Stage::Start,
            applied: 0,
            skipped: Vec::new(),
        })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn document(&self) -> &SourceDocument {
        &self.document
    }

    /// Run the current stage and move to the next one.
    pub fn advance(&mut self) -> Result<Stage, EditError> {
        let next = match self.stage {
            Stage::Start => {
                if self.changes.applies_to(self.shape) {
                    self.apply_imports()?;
                    Stage::ImportsApplied
                } else {
                    self.skip(
                        "Options",
                        SkipReason::OptionsNotSatisfied {
                            options: self.changes.options.clone(),
                        },
                    );
                    Stage::Done
                }
            }
            Stage::ImportsApplied => {
                let changes = self.changes;
                self.apply_class_changes("ClassAttributes", &changes.class_attributes, NodeKind::Attribute)?;
                Stage::ClassAttributesApplied
            }
            Stage::ClassAttributesApplied => {
                let changes = self.changes;
                self.apply_class_changes("ClassProperties", &changes.class_properties, NodeKind::ClassMember)?;
                Stage::ClassPropertiesApplied
            }
            Stage::ClassPropertiesApplied => {
                self.apply_methods()?;
                Stage::MethodsApplied
            }
            Stage::MethodsApplied | Stage::Done => Stage::Done,
        };
        self.stage = next;
        Ok(next)
    }

    /// Run the remaining stages and hand back the new document.
    pub fn finish(mut self) -> Result<EditOutcome, EditError> {
        while self.stage != Stage::Done {
            self.advance()?;
        }
        Ok(EditOutcome {
            document: self.document,
            applied: self.applied,
            skipped: self.skipped,
        })
    }

    fn skip(&mut self, location: impl Into<String>, reason: SkipReason) {
        let location = location.into();
        debug!(location = %location, reason = %reason, "skipped change");
        self.skipped.push(SkippedChange { location, reason });
    }

    fn skip_dropped<T: Gated>(&mut self, section: &str, dropped: &[(usize, &T)]) {
        for (index, item) in dropped {
            self.skip(
                format!("{}[{}]", section, index),
                SkipReason::OptionsNotSatisfied {
                    options: item.options().to_vec(),
                },
            );
        }
    }

    fn splice(&mut self, location: &str, edits: Vec<TextEdit>, count: usize) -> Result<(), EditError> {
        let had_errors = self.document.has_syntax_errors();
        self.document = self.document.edit(edits)?;
        if !had_errors && self.document.has_syntax_errors() {
            warn!(location = %location, "edit left the document with syntax errors");
        }
        self.applied += count;
        debug!(location = %location, count, "applied change");
        Ok(())
    }

    fn execute(&mut self, location: &str, plan: Plan) -> Result<(), EditError> {
        match plan {
            Plan::Edit(edits) => self.splice(location, edits, 1),
            Plan::AlreadyApplied => {
                debug!(location = %location, "already applied");
                Ok(())
            }
            Plan::Skip(reason) => {
                self.skip(location, reason);
                Ok(())
            }
        }
    }

    fn apply_imports(&mut self) -> Result<(), EditError> {
        let changes = self.changes;
        let (kept, dropped) = options::partition(&changes.usings_with_options, self.shape);
        self.skip_dropped("UsingsWithOptions", &dropped);

        let requested = changes
            .usings
            .iter()
            .map(String::as_str)
            .chain(kept.iter().map(|(_, using)| using.name.as_str()));
        if let Some((edit, count)) = plan_imports(&self.document, requested, self.eol)? {
            self.splice("Usings", vec![edit], count)?;
        }
        Ok(())
    }

    fn apply_class_changes(
        &mut self,
        section: &str,
        items: &[CodeChange],
        kind: NodeKind,
    ) -> Result<(), EditError> {
        let (kept, dropped) = options::partition(items, self.shape);
        self.skip_dropped(section, &dropped);

        for (index, change) in kept {
            let location = format!("{}[{}]", section, index);
            let snippet = make_node(kind, &change.block, change.leading_trivia, change.trailing_trivia)?;
            let plan = plan_class_change(&self.document, change, &snippet, self.eol);
            self.execute(&location, plan)?;
        }
        Ok(())
    }

    fn apply_methods(&mut self) -> Result<(), EditError> {
        let changes = self.changes;
        for (name, edit) in &changes.methods {
            let location = format!("Methods.{}", name);
            let (target, names) = match locate_method(&self.document, name, &edit.parameters) {
                Ok(found) => found,
                Err(reason) => {
                    self.skip(location, reason);
                    continue;
                }
            };

            self.apply_added_parameters(&target, edit, &names, &location)?;
            self.apply_return_type(&target, edit, &names, &location)?;
            if let Some(reference) = &edit.code_changes_from {
                if let Some(borrowed) = changes.methods.get(reference) {
                    let section = format!("{}.CodeChangesFrom({})", location, reference);
                    self.apply_code_changes(&target, &borrowed.code_changes, &names, &section)?;
                }
            }
            let section = format!("{}.CodeChanges", location);
            self.apply_code_changes(&target, &edit.code_changes, &names, &section)?;
        }
        Ok(())
    }

    fn apply_added_parameters(
        &mut self,
        target: &Target,
        edit: &MethodEdit,
        names: &ParameterMap,
        location: &str,
    ) -> Result<(), EditError> {
        let section = format!("{}.AddParameters", location);
        let (kept, dropped) = options::partition(&edit.add_parameters, self.shape);
        self.skip_dropped(&section, &dropped);

        for (index, change) in kept {
            let location = format!("{}[{}]", section, index);
            let change = change.with_substitutions(names);
            let snippet = make_node(NodeKind::Parameter, &change.block, change.leading_trivia, change.trailing_trivia)?;
            let plan = match target.declaration(&self.document) {
                Ok(method) => plan_added_parameter(&self.document, method, &change, &snippet),
                Err(reason) => Plan::Skip(reason),
            };
            self.execute(&location, plan)?;
        }
        Ok(())
    }

    fn apply_return_type(
        &mut self,
        target: &Target,
        edit: &MethodEdit,
        names: &ParameterMap,
        location: &str,
    ) -> Result<(), EditError> {
        let Some(change) = &edit.edit_type else {
            return Ok(());
        };
        let location = format!("{}.EditType", location);
        if !change.applies_to(self.shape) {
            self.skip(
                location,
                SkipReason::OptionsNotSatisfied {
                    options: change.options.clone(),
                },
            );
            return Ok(());
        }

        let change = change.with_substitutions(names);
        make_node(NodeKind::ReturnType, &change.block, change.leading_trivia, change.trailing_trivia)?;
        let plan = match target.declaration(&self.document) {
            Ok(method) => plan_return_type(&self.document, method, &change),
            Err(reason) => Plan::Skip(reason),
        };
        self.execute(&location, plan)
    }

    fn apply_code_changes(
        &mut self,
        target: &Target,
        items: &[CodeChange],
        names: &ParameterMap,
        section: &str,
    ) -> Result<(), EditError> {
        let (kept, dropped) = options::partition(items, self.shape);
        self.skip_dropped(section, &dropped);

        for (index, change) in kept {
            let location = format!("{}[{}]", section, index);
            let change = change.with_substitutions(names);
            let snippet = synthesize(target, &change)?;
            let plan = plan_code_change(&self.document, target, &change, &snippet, self.eol);
            self.execute(&location, plan)?;
        }
        Ok(())
    }
}

/// A located method edit target.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    /// The file's top-level statements.
    Global,
    /// The `ordinal`-th method or constructor of the file.
    Callable { name: String, ordinal: usize },
}

impl Target {
    /// The declaration node in `doc`, re-located by ordinal.
    fn declaration<'d>(&self, doc: &'d SourceDocument) -> Result<Node<'d>, SkipReason> {
        match self {
            Target::Global => Err(SkipReason::Unsupported {
                detail: "top-level statements have no declaration to edit".to_string(),
            }),
            Target::Callable { name, ordinal } => syntax::callables(doc.root())
                .get(*ordinal)
                .copied()
                .filter(|node| syntax::declared_name(doc, *node) == Some(name.as_str()))
                .ok_or_else(|| SkipReason::MethodNotFound {
                    method: name.clone(),
                }),
        }
    }

    fn scope<'d>(&self, doc: &'d SourceDocument) -> Result<Scope<'d>, SkipReason> {
        match self {
            Target::Global => Ok(Scope::File(doc.root())),
            Target::Callable { name, .. } => {
                let method = self.declaration(doc)?;
                syntax::body_block(method)
                    .map(Scope::Block)
                    .ok_or_else(|| SkipReason::Unsupported {
                        detail: format!("`{}` has no block body", name),
                    })
            }
        }
    }
}

/// Find the method edit's target, picking the overload by signature.
fn locate_method(
    doc: &SourceDocument,
    name: &str,
    required: &[String],
) -> Result<(Target, ParameterMap), SkipReason> {
    if name == GLOBAL_METHOD {
        if Scope::File(doc.root()).statements().is_empty() {
            return Err(SkipReason::MethodNotFound {
                method: name.to_string(),
            });
        }
        return Ok((Target::Global, ParameterMap::new()));
    }

    let candidates: Vec<(usize, Node<'_>)> = syntax::callables(doc.root())
        .into_iter()
        .enumerate()
        .filter(|(_, node)| syntax::declared_name(doc, *node) == Some(name))
        .collect();
    if candidates.is_empty() {
        return Err(SkipReason::MethodNotFound {
            method: name.to_string(),
        });
    }

    candidates
        .into_iter()
        .find_map(|(ordinal, node)| {
            signature::verify(required, &signature::parameters_of(doc, node)).map(|names| {
                let target = Target::Callable {
                    name: name.to_string(),
                    ordinal,
                };
                (target, names)
            })
        })
        .ok_or_else(|| SkipReason::SignatureNotMatched {
            method: name.to_string(),
            required: required.to_vec(),
        })
}

/// Validate a code change's text as the node kind its insertion point needs.
fn synthesize(target: &Target, change: &CodeChange) -> Result<Snippet, EditError> {
    let kind = match change.code_change_type {
        ChangeKind::MemberAccess => NodeKind::MemberAccess,
        ChangeKind::Lambda => NodeKind::LambdaParameter,
        ChangeKind::InLambda => NodeKind::BlockStatement,
        ChangeKind::Default if change.parent.is_some() => NodeKind::BlockStatement,
        ChangeKind::Default => match target {
            Target::Global => NodeKind::TopLevel,
            Target::Callable { .. } => NodeKind::BlockStatement,
        },
    };
    make_node(kind, &change.block, change.leading_trivia, change.trailing_trivia)
}

fn plan_imports<'a>(
    doc: &SourceDocument,
    requested: impl Iterator<Item = &'a str>,
    eol: &str,
) -> Result<Option<(TextEdit, usize)>, EditError> {
    let directives = syntax::using_directives(doc.root());
    let existing: BTreeSet<String> = directives
        .iter()
        .map(|directive| syntax::using_name(doc, *directive))
        .collect();

    let mut missing: Vec<&str> = Vec::new();
    for name in requested {
        let name = name.trim();
        Snippet::plain(NodeKind::Using, name)?;
        if !existing.contains(name) && !missing.contains(&name) {
            missing.push(name);
        }
    }
    if missing.is_empty() {
        return Ok(None);
    }

    let edit = match directives.last() {
        Some(last) => {
            let indent = doc.line_indent(last.start_byte());
            let text: String = missing
                .iter()
                .map(|name| format!("{}{}using {};", eol, indent, name))
                .collect();
            TextEdit::insert(doc.past_trailing_comment(last.end_byte()), text)
        }
        None => {
            let mut text: String = missing
                .iter()
                .map(|name| format!("using {};{}", name, eol))
                .collect();
            text.push_str(eol);
            let at = if doc.text().starts_with('\u{feff}') { '\u{feff}'.len_utf8() } else { 0 };
            TextEdit::insert(at, text)
        }
    };
    Ok(Some((edit, missing.len())))
}

/// True when one of `nodes` already carries `change`: normalized equality
/// with the block, or containment of the explicit check text.
fn already_present(doc: &SourceDocument, nodes: &[Node<'_>], change: &CodeChange) -> bool {
    match change.check_block.as_deref() {
        Some(check) => nodes
            .iter()
            .any(|node| anchor::contains_normalized(doc.node_text(*node), check)),
        None => nodes
            .iter()
            .any(|node| anchor::equals_normalized(doc.node_text(*node), &change.block)),
    }
}

fn plan_class_change(doc: &SourceDocument, change: &CodeChange, snippet: &Snippet, eol: &str) -> Plan {
    let Some(class) = syntax::first_class(doc.root()) else {
        return Plan::Skip(SkipReason::ClassNotFound);
    };

    if snippet.kind == NodeKind::Attribute {
        let attributes = syntax::children_of_kind(class, ATTRIBUTE_LIST);
        if already_present(doc, &attributes, change) {
            return Plan::AlreadyApplied;
        }
        return Plan::Edit(vec![insert_before(doc, class, snippet, eol)]);
    }

    let Some(body) = syntax::class_body(class) else {
        return Plan::Skip(SkipReason::Unsupported {
            detail: "class has no body".to_string(),
        });
    };
    let members = syntax::members(body);
    if already_present(doc, &members, change) {
        return Plan::AlreadyApplied;
    }
    let inherited = match members.first() {
        Some(first) => doc.line_indent(first.start_byte()).to_string(),
        None => format!("{}    ", doc.line_indent(body.start_byte())),
    };
    Plan::Edit(vec![TextEdit::insert(
        doc.past_trailing_comment(body.start_byte() + 1),
        snippet.render_after(&inherited, eol),
    )])
}

fn plan_added_parameter(doc: &SourceDocument, method: Node<'_>, change: &CodeChange, snippet: &Snippet) -> Plan {
    let Some(list) = syntax::parameter_list(method) else {
        return Plan::Skip(SkipReason::Unsupported {
            detail: "declaration has no parameter list".to_string(),
        });
    };
    let parameters = syntax::children_of_kind(list, PARAMETER);
    if already_present(doc, &parameters, change) {
        return Plan::AlreadyApplied;
    }
    let edit = match parameters.last() {
        Some(last) => TextEdit::insert(last.end_byte(), format!(", {}", snippet.text())),
        None => TextEdit::insert(list.start_byte() + 1, snippet.text()),
    };
    Plan::Edit(vec![edit])
}

fn plan_return_type(doc: &SourceDocument, method: Node<'_>, change: &CodeChange) -> Plan {
    if method.kind() == CONSTRUCTOR_DECLARATION {
        return Plan::Skip(SkipReason::Unsupported {
            detail: "constructors have no return type".to_string(),
        });
    }
    let Some(current) = syntax::return_type(method) else {
        return Plan::Skip(SkipReason::Unsupported {
            detail: "declaration has no return type".to_string(),
        });
    };

    let requested = change.block.trim();
    let (wants_async, ty) = match requested.strip_prefix("async") {
        Some(rest) if rest.starts_with(char::is_whitespace) => (true, rest.trim()),
        _ => (false, requested),
    };
    let async_range = syntax::async_modifier(doc, method);
    if async_range.is_some() == wants_async && anchor::equals_normalized(doc.node_text(current), ty) {
        return Plan::AlreadyApplied;
    }

    let mut edits = Vec::new();
    match async_range {
        None if wants_async => {
            edits.push(TextEdit::new(current.byte_range(), format!("async {}", ty)));
        }
        Some(range) if !wants_async => {
            let trailing = doc.text()[range.end..]
                .find(|c: char| !c.is_whitespace())
                .unwrap_or(0);
            edits.push(TextEdit::delete(range.start..range.end + trailing));
            edits.push(TextEdit::new(current.byte_range(), ty));
        }
        _ => edits.push(TextEdit::new(current.byte_range(), ty)),
    }
    Plan::Edit(edits)
}

fn anchor_not_found(doc: &SourceDocument, scope: Scope<'_>, anchors: &[&str]) -> SkipReason {
    SkipReason::AnchorNotFound {
        anchor: anchors.join(" | "),
        closest: anchors
            .first()
            .and_then(|first| anchor::closest_candidate(doc, scope, first)),
    }
}

fn plan_code_change(
    doc: &SourceDocument,
    target: &Target,
    change: &CodeChange,
    snippet: &Snippet,
    eol: &str,
) -> Plan {
    let scope = match target.scope(doc) {
        Ok(scope) => scope,
        Err(reason) => return Plan::Skip(reason),
    };
    let Some(parent_anchor) = change.parent.as_deref() else {
        return plan_insert(doc, scope, change, snippet, eol);
    };
    let Some(parent) = anchor::resolve(doc, scope, parent_anchor) else {
        return Plan::Skip(anchor_not_found(doc, scope, &[parent_anchor]));
    };
    let unsupported = |detail: &str| {
        Plan::Skip(SkipReason::Unsupported {
            detail: format!("`{}` {}", parent_anchor, detail),
        })
    };

    match change.code_change_type {
        ChangeKind::Default => match syntax::find_first(parent, |n| n.kind() == BLOCK) {
            Some(block) => plan_insert(doc, Scope::Block(block), change, snippet, eol),
            None => unsupported("contains no block"),
        },
        ChangeKind::InLambda => {
            let Some(lambda) = syntax::find_first(parent, syntax::is_lambda) else {
                return unsupported("contains no lambda");
            };
            match syntax::lambda_body(lambda).filter(|body| body.kind() == BLOCK) {
                Some(body) => plan_insert(doc, Scope::Block(body), change, snippet, eol),
                None => unsupported("has an expression-bodied lambda"),
            }
        }
        ChangeKind::MemberAccess => {
            let statement = syntax::find_first(parent, |n| n.kind() == EXPRESSION_STATEMENT);
            let Some((statement, expression)) =
                statement.and_then(|s| syntax::statement_expression(s).map(|e| (s, e)))
            else {
                return unsupported("is not an expression statement");
            };
            let check = change
                .check_block
                .clone()
                .unwrap_or_else(|| format!(".{}", change.block.trim()));
            if anchor::contains_normalized(doc.node_text(statement), &check) {
                return Plan::AlreadyApplied;
            }
            let inherited = format!("{}    ", doc.line_indent(statement.start_byte()));
            Plan::Edit(vec![TextEdit::insert(
                expression.end_byte(),
                snippet.render_member_access(&inherited, eol),
            )])
        }
        ChangeKind::Lambda => {
            let Some(lambda) = syntax::find_first(parent, syntax::is_lambda) else {
                return unsupported("contains no lambda");
            };
            let Some(parameters) = syntax::lambda_parameters(lambda) else {
                return unsupported("has a lambda without parameters");
            };
            let untyped = is_untyped_parameter(snippet.text());
            if parameters.kind() != PARAMETER_LIST {
                // Implicit `x => ...` parameter.
                if already_present(doc, &[parameters], change) {
                    return Plan::AlreadyApplied;
                }
                if !untyped {
                    return unsupported("has an implicitly typed lambda parameter; the added parameter must be untyped too");
                }
                let text = format!("({}, {})", doc.node_text(parameters), snippet.text());
                return Plan::Edit(vec![TextEdit::new(parameters.byte_range(), text)]);
            }
            let existing = syntax::children_of_kind(parameters, PARAMETER);
            if already_present(doc, &existing, change) {
                return Plan::AlreadyApplied;
            }
            if let Some(first) = existing.first() {
                let existing_untyped = first.child_by_field_name("type").is_none();
                if existing_untyped != untyped {
                    return unsupported("has lambda parameters that cannot mix typed and untyped declarations");
                }
            }
            let edit = match existing.last() {
                Some(last) => TextEdit::insert(last.end_byte(), format!(", {}", snippet.text())),
                None => TextEdit::insert(parameters.start_byte() + 1, snippet.text()),
            };
            Plan::Edit(vec![edit])
        }
    }
}

/// `x` as opposed to `HttpContext x`.
fn is_untyped_parameter(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c == '_' || c.is_alphanumeric())
}

/// Insert a statement into `scope` according to the change's placement.
fn plan_insert(doc: &SourceDocument, scope: Scope<'_>, change: &CodeChange, snippet: &Snippet, eol: &str) -> Plan {
    if anchor::contains_normalized(doc.node_text(scope.node()), change.check_text()) {
        return Plan::AlreadyApplied;
    }

    let edit = match change.placement() {
        Placement::After(anchor_text) => match anchor::resolve(doc, scope, anchor_text) {
            Some(node) => insert_after(doc, node, snippet, eol),
            None => return Plan::Skip(anchor_not_found(doc, scope, &[anchor_text])),
        },
        Placement::Before(anchors) => match anchor::resolve_any(doc, scope, anchors) {
            Some(node) => insert_before(doc, node, snippet, eol),
            None => {
                let anchors: Vec<&str> = anchors.iter().map(String::as_str).collect();
                return Plan::Skip(anchor_not_found(doc, scope, &anchors));
            }
        },
        Placement::Start => match scope.statements().first() {
            Some(first) => insert_before(doc, *first, snippet, eol),
            None => match insert_into_empty(doc, scope, snippet, eol) {
                Some(edit) => edit,
                None => return Plan::Skip(no_statements(scope)),
            },
        },
        Placement::End => match scope.statements().last() {
            Some(last) => insert_after(doc, *last, snippet, eol),
            None => match insert_into_empty(doc, scope, snippet, eol) {
                Some(edit) => edit,
                None => return Plan::Skip(no_statements(scope)),
            },
        },
    };
    Plan::Edit(vec![edit])
}

fn no_statements(scope: Scope<'_>) -> SkipReason {
    SkipReason::Unsupported {
        detail: format!("{} has no statements to place the change against", scope.node().kind()),
    }
}

fn insert_after(doc: &SourceDocument, node: Node<'_>, snippet: &Snippet, eol: &str) -> TextEdit {
    let inherited = doc.line_indent(node.start_byte());
    TextEdit::insert(
        doc.past_trailing_comment(node.end_byte()),
        snippet.render_after(inherited, eol),
    )
}

fn insert_before(doc: &SourceDocument, node: Node<'_>, snippet: &Snippet, eol: &str) -> TextEdit {
    let at = node.start_byte();
    if doc.starts_line(at) {
        let inherited = doc.line_indent(at);
        TextEdit::insert(doc.line_start(at), snippet.render_before(inherited, eol))
    } else {
        TextEdit::insert(at, format!("{} ", snippet.text()))
    }
}

/// A block with no statements gets the snippet right after its `{`, one
/// level deeper than the brace.
fn insert_into_empty(doc: &SourceDocument, scope: Scope<'_>, snippet: &Snippet, eol: &str) -> Option<TextEdit> {
    match scope {
        Scope::Block(block) => {
            let inherited = format!("{}    ", doc.line_indent(block.start_byte()));
            Some(TextEdit::insert(
                doc.past_trailing_comment(block.start_byte() + 1),
                snippet.render_after(&inherited, eol),
            ))
        }
        Scope::File(_) => None,
    }
}
