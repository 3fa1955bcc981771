//! Project shape and the option filter that gates changes on it.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::model::{ChangeSet, CodeChange, GatedUsing};

pub const TOP_LEVEL_STATEMENTS: &str = "TopLevelStatements";
pub const MINIMAL_APP: &str = "MinimalApp";
pub const NON_MINIMAL_APP: &str = "NonMinimalApp";
/// `Using:System.Linq` is true when the file already imports `System.Linq`.
pub const USING_PREFIX: &str = "Using:";

/// Structural facts about one target file, computed once before any change
/// is applied and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectShape {
    pub uses_top_level_statements: bool,
    pub uses_minimal_hosting: bool,
    pub existing_usings: BTreeSet<String>,
    /// Caller-declared flags such as `MicrosoftGraph`. Names absent from
    /// this map are unknown, not false.
    pub capabilities: BTreeMap<String, bool>,
}

impl ProjectShape {
    /// Value of a known option, `None` for an unknown one.
    fn lookup(&self, option: &str) -> Option<bool> {
        match option {
            TOP_LEVEL_STATEMENTS => Some(self.uses_top_level_statements),
            MINIMAL_APP => Some(self.uses_minimal_hosting),
            NON_MINIMAL_APP => Some(!self.uses_minimal_hosting),
            _ => {
                if let Some(name) = option.strip_prefix(USING_PREFIX) {
                    return Some(self.existing_usings.contains(name.trim()));
                }
                self.capabilities.get(option).copied()
            }
        }
    }

    /// Evaluate one option. `!Name` negates a known option; unknown names
    /// (negated or not) are false so newer configs degrade gracefully.
    pub fn evaluate(&self, option: &str) -> bool {
        let option = option.trim();
        match option.strip_prefix('!') {
            Some(inner) => self.lookup(inner.trim()).map(|v| !v).unwrap_or(false),
            None => self.lookup(option).unwrap_or(false),
        }
    }

    pub fn satisfies(&self, options: &[String]) -> bool {
        options.iter().all(|option| self.evaluate(option))
    }
}

/// Anything carrying an applicability list.
pub trait Gated {
    fn options(&self) -> &[String];

    fn applies_to(&self, shape: &ProjectShape) -> bool {
        shape.satisfies(self.options())
    }
}

impl Gated for CodeChange {
    fn options(&self) -> &[String] {
        &self.options
    }
}

impl Gated for GatedUsing {
    fn options(&self) -> &[String] {
        &self.options
    }
}

impl Gated for ChangeSet {
    fn options(&self) -> &[String] {
        &self.options
    }
}

/// Keep the changes whose options all hold, in their original order.
pub fn filter(changes: &[CodeChange], shape: &ProjectShape) -> Vec<CodeChange> {
    changes
        .iter()
        .filter(|change| change.applies_to(shape))
        .cloned()
        .collect()
}

/// Split into (kept, dropped), both order-preserving, each entry paired with
/// its index in `items`.
pub fn partition<'a, T: Gated>(
    items: &'a [T],
    shape: &ProjectShape,
) -> (Vec<(usize, &'a T)>, Vec<(usize, &'a T)>) {
    items
        .iter()
        .enumerate()
        .partition(|(_, item)| item.applies_to(shape))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gated(block: &str, options: &[&str]) -> CodeChange {
        CodeChange {
            options: options.iter().map(|s| s.to_string()).collect(),
            ..CodeChange::new(block)
        }
    }

    fn top_level_shape() -> ProjectShape {
        ProjectShape {
            uses_top_level_statements: true,
            uses_minimal_hosting: true,
            existing_usings: ["System".to_string()].into_iter().collect(),
            capabilities: [("MicrosoftGraph".to_string(), true), ("DownstreamApi".to_string(), false)]
                .into_iter()
                .collect(),
        }
    }

    #[test]
    fn ungated_changes_always_pass() {
        let changes = vec![CodeChange::new("a();")];
        assert_eq!(filter(&changes, &ProjectShape::default()).len(), 1);
    }

    #[test]
    fn top_level_option_follows_shape() {
        let changes = vec![gated("a();", &["TopLevelStatements"])];
        assert_eq!(filter(&changes, &top_level_shape()).len(), 1);
        assert!(filter(&changes, &ProjectShape::default()).is_empty());
    }

    #[test]
    fn every_option_must_hold() {
        let shape = top_level_shape();
        assert!(shape.satisfies(&["TopLevelStatements".into(), "MicrosoftGraph".into()]));
        assert!(!shape.satisfies(&["TopLevelStatements".into(), "DownstreamApi".into()]));
    }

    #[test]
    fn negation_applies_to_known_options_only() {
        let shape = top_level_shape();
        assert!(shape.evaluate("!DownstreamApi"));
        assert!(!shape.evaluate("!TopLevelStatements"));
        assert!(!shape.evaluate("!SomethingNew"));
        assert!(shape.evaluate(NON_MINIMAL_APP) == !shape.uses_minimal_hosting);
    }

    #[test]
    fn unknown_and_skip_options_drop_the_change() {
        let shape = top_level_shape();
        assert!(!shape.evaluate("Skip"));
        assert!(!shape.evaluate("FutureFeature"));
    }

    #[test]
    fn using_options_check_existing_imports() {
        let shape = top_level_shape();
        assert!(shape.evaluate("Using:System"));
        assert!(!shape.evaluate("Using:System.Linq"));
        assert!(shape.evaluate("!Using:System.Linq"));
    }

    #[test]
    fn filter_preserves_order() {
        let changes = vec![
            gated("a();", &[]),
            gated("b();", &["Skip"]),
            gated("c();", &["MinimalApp"]),
            gated("d();", &[]),
        ];
        let kept: Vec<_> = filter(&changes, &top_level_shape())
            .into_iter()
            .map(|c| c.block)
            .collect();
        assert_eq!(kept, vec!["a();", "c();", "d();"]);
    }

    #[test]
    fn partition_reports_dropped_indices() {
        let changes = vec![gated("a();", &["Skip"]), gated("b();", &[])];
        let (kept, dropped) = partition(&changes, &ProjectShape::default());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].0, 1);
        assert_eq!(dropped[0].0, 0);
    }
}
