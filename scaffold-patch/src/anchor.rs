//! Anchor resolution: find the node a snippet of config text refers to.
//!
//! Both sides are normalized before comparing, so an anchor written as
//! `app.UseRouting();` still finds `app.UseRouting() ;` or a call split over
//! several lines. A candidate matches when its normalized text *contains* the
//! normalized anchor; the first match in source order wins.

use tree_sitter::Node;

use crate::syntax::{Scope, SourceDocument};

/// Trimmed from both ends of normalized text.
const TRIM_CHARS: &[char] = &[';'];

/// Trimmed from the end of an anchor on the relaxed second pass.
const RELAXED_TRIM_CHARS: &[char] = &[';', ')', '(', '}', '{', ','];

/// Drop every whitespace character and trim statement terminators.
pub fn normalize(text: &str) -> String {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    compact.trim_matches(TRIM_CHARS).to_string()
}

/// The anchor used for the second pass: normalized, then stripped of
/// trailing terminators and brace/paren padding.
pub fn relax(anchor: &str) -> String {
    normalize(anchor)
        .trim_end_matches(RELAXED_TRIM_CHARS)
        .to_string()
}

/// True when normalized `haystack` contains normalized `needle`. An empty
/// needle never matches.
pub fn contains_normalized(haystack: &str, needle: &str) -> bool {
    let needle = normalize(needle);
    !needle.is_empty() && normalize(haystack).contains(&needle)
}

pub fn equals_normalized(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

fn first_containing<'t>(
    doc: &SourceDocument,
    candidates: &[Node<'t>],
    needle: &str,
) -> Option<Node<'t>> {
    if needle.is_empty() {
        return None;
    }
    candidates
        .iter()
        .copied()
        .find(|node| normalize(doc.node_text(*node)).contains(needle))
}

/// Find the first member of `scope` matching `anchor`, trying the exact
/// normalized anchor first and the relaxed one second.
pub fn resolve<'t>(doc: &SourceDocument, scope: Scope<'t>, anchor: &str) -> Option<Node<'t>> {
    let candidates = scope.members();
    first_containing(doc, &candidates, &normalize(anchor))
        .or_else(|| first_containing(doc, &candidates, &relax(anchor)))
}

/// Try each anchor in order and return the first that resolves.
pub fn resolve_any<'t>(
    doc: &SourceDocument,
    scope: Scope<'t>,
    anchors: &[String],
) -> Option<Node<'t>> {
    anchors.iter().find_map(|anchor| resolve(doc, scope, anchor))
}

/// The member of `scope` most similar to `anchor`, for skip reports.
pub fn closest_candidate(doc: &SourceDocument, scope: Scope<'_>, anchor: &str) -> Option<String> {
    let target = normalize(anchor);
    let mut best: Option<(f64, String)> = None;
    for node in scope.members() {
        let text = doc.node_text(node).trim();
        let first_line = text.lines().next().unwrap_or(text).trim();
        let score = strsim::normalized_levenshtein(&normalize(first_line), &target);
        // Ties keep the earlier statement.
        if score >= 0.5 && best.as_ref().map_or(true, |(top, _)| score > *top) {
            best = Some((score, first_line.to_string()));
        }
    }
    best.map(|(_, line)| line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax;

    const BODY: &str = r#"class C
{
    void M()
    {
        var a = 1;
        services.AddDbContext<AppDbContext>(options =>
            options.UseSqlite(connection));
        // comment mentioning app.UseRouting()
        app.UseRouting(  );
        app.UseRouting();
    }
}
"#;

    fn body_scope(doc: &SourceDocument) -> Scope<'_> {
        let method = syntax::callables(doc.root())[0];
        Scope::Block(syntax::body_block(method).unwrap())
    }

    #[test]
    fn normalization_ignores_whitespace_and_terminators() {
        assert_eq!(normalize("  app.UseRouting( ) ;\n"), "app.UseRouting()");
        assert_eq!(relax("app.UseRouting();"), "app.UseRouting");
        assert_eq!(relax("if (x) {"), "if(x");
        assert_eq!(normalize(" ; "), "");
    }

    #[test]
    fn resolves_first_match_in_source_order() {
        let doc = SourceDocument::parse(BODY).unwrap();
        let found = resolve(&doc, body_scope(&doc), "app.UseRouting();").unwrap();
        assert_eq!(doc.node_text(found), "app.UseRouting(  );");
    }

    #[test]
    fn comments_are_not_candidates() {
        let doc = SourceDocument::parse(BODY).unwrap();
        let found = resolve(&doc, body_scope(&doc), "app.UseRouting()").unwrap();
        assert_ne!(found.kind(), syntax::COMMENT);
    }

    #[test]
    fn matches_across_line_breaks() {
        let doc = SourceDocument::parse(BODY).unwrap();
        let found = resolve(&doc, body_scope(&doc), "options => options.UseSqlite(connection)").unwrap();
        assert!(doc.node_text(found).starts_with("services.AddDbContext"));
    }

    #[test]
    fn relaxed_pass_tolerates_different_arguments() {
        let doc = SourceDocument::parse(BODY).unwrap();
        let found = resolve(&doc, body_scope(&doc), "services.AddDbContext<AppDbContext>();").unwrap();
        assert!(doc.node_text(found).contains("UseSqlite"));
    }

    #[test]
    fn missing_anchor_is_none() {
        let doc = SourceDocument::parse(BODY).unwrap();
        assert!(resolve(&doc, body_scope(&doc), "app.MapControllers();").is_none());
        assert!(resolve(&doc, body_scope(&doc), ";").is_none());
    }

    #[test]
    fn resolve_any_takes_first_resolving_anchor() {
        let doc = SourceDocument::parse(BODY).unwrap();
        let anchors = vec!["app.Run();".to_string(), "var a = 1;".to_string()];
        let found = resolve_any(&doc, body_scope(&doc), &anchors).unwrap();
        assert_eq!(doc.node_text(found), "var a = 1;");
    }

    #[test]
    fn closest_candidate_suggests_near_miss() {
        let doc = SourceDocument::parse(BODY).unwrap();
        let closest = closest_candidate(&doc, body_scope(&doc), "app.UseRoutin();");
        assert_eq!(closest.as_deref(), Some("app.UseRouting(  );"));
    }

    #[test]
    fn file_scope_candidates_skip_usings() {
        let doc = SourceDocument::parse("using System;\nvar x = 1;\nConsole.WriteLine(x);\n").unwrap();
        let scope = Scope::File(doc.root());
        let found = resolve(&doc, scope, "Console.WriteLine(x);").unwrap();
        assert_eq!(found.kind(), syntax::GLOBAL_STATEMENT);
        assert!(resolve(&doc, scope, "using System").is_none());
    }
}
