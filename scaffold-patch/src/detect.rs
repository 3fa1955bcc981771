use std::collections::BTreeMap;

use crate::options::ProjectShape;
use crate::syntax::{self, SourceDocument, GLOBAL_STATEMENT, INVOCATION_EXPRESSION};

const MINIMAL_HOSTING_CALL: &str = "WebApplication.CreateBuilder";

/// Compute the shape of one parsed file. `capabilities` are the caller's
/// flags and are copied in as given.
pub fn detect_shape(doc: &SourceDocument, capabilities: &BTreeMap<String, bool>) -> ProjectShape {
    let root = doc.root();
    let uses_top_level_statements = syntax::named_children(root)
        .iter()
        .any(|child| child.kind() == GLOBAL_STATEMENT);
    let uses_minimal_hosting = syntax::descendants(root).into_iter().any(|node| {
        node.kind() == INVOCATION_EXPRESSION && doc.node_text(node).contains(MINIMAL_HOSTING_CALL)
    });
    let existing_usings = syntax::using_directives(root)
        .into_iter()
        .map(|directive| syntax::using_name(doc, directive))
        .collect();

    ProjectShape {
        uses_top_level_statements,
        uses_minimal_hosting,
        existing_usings,
        capabilities: capabilities.clone(),
    }
}
