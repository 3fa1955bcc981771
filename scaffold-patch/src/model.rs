use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Method key that addresses a file's top-level statements.
pub const GLOBAL_METHOD: &str = "Global";

/// A scaffolder's full set of source edits, one [`ChangeSet`] per file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifierConfig {
    pub identifier: String,
    #[serde(default)]
    pub files: Vec<ChangeSet>,
}

/// Everything to change in one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChangeSet {
    /// Target file: a bare name (`Program.cs`) or a path relative to the
    /// project root.
    pub file_name: String,
    /// Whole-file applicability options.
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub usings: Vec<String>,
    #[serde(default)]
    pub usings_with_options: Vec<GatedUsing>,
    #[serde(default)]
    pub class_attributes: Vec<CodeChange>,
    #[serde(default)]
    pub class_properties: Vec<CodeChange>,
    /// Applied in file order.
    #[serde(default)]
    pub methods: IndexMap<String, MethodEdit>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GatedUsing {
    pub name: String,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MethodEdit {
    /// Parameter types that pick the overload. Empty matches by name only.
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub add_parameters: Vec<CodeChange>,
    /// New return type, e.g. `async Task`.
    #[serde(default)]
    pub edit_type: Option<CodeChange>,
    #[serde(default)]
    pub code_changes: Vec<CodeChange>,
    /// Another method key whose code changes run before this edit's own.
    #[serde(default)]
    pub code_changes_from: Option<String>,
}

/// One block of text and where it goes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CodeChange {
    pub block: String,
    /// Text whose presence means this change was already applied.
    /// Defaults to `block`.
    #[serde(default)]
    pub check_block: Option<String>,
    #[serde(default)]
    pub insert_after: Option<String>,
    #[serde(default)]
    pub insert_before: Vec<String>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub code_change_type: ChangeKind,
    #[serde(default)]
    pub prepend: bool,
    #[serde(default)]
    pub leading_trivia: Formatting,
    #[serde(default)]
    pub trailing_trivia: Formatting,
    #[serde(default)]
    pub options: Vec<String>,
}

/// What a `Parent` anchor does with the node it finds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    /// Insert a statement; with a parent, into the first block under it.
    #[default]
    Default,
    /// Append `.Block` to the first expression statement under the parent.
    MemberAccess,
    /// Add `Block` as a parameter of the first lambda under the parent.
    Lambda,
    /// Insert a statement into the body of the first lambda under the parent.
    InLambda,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Default => write!(f, "Default"),
            ChangeKind::MemberAccess => write!(f, "MemberAccess"),
            ChangeKind::Lambda => write!(f, "Lambda"),
            ChangeKind::InLambda => write!(f, "InLambda"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Formatting {
    /// Leading: blank line before the node. Trailing: blank line after it.
    #[serde(default)]
    pub newline: bool,
    /// Indentation width; 0 inherits the insertion point's indentation.
    #[serde(default)]
    pub number_of_spaces: usize,
}

/// Where a change lands, derived from the flat serialized fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement<'a> {
    After(&'a str),
    Before(&'a [String]),
    Start,
    End,
}

impl CodeChange {
    pub fn new(block: impl Into<String>) -> Self {
        Self {
            block: block.into(),
            ..Self::default()
        }
    }

    pub fn placement(&self) -> Placement<'_> {
        if let Some(anchor) = self.insert_after.as_deref() {
            Placement::After(anchor)
        } else if !self.insert_before.is_empty() {
            Placement::Before(&self.insert_before)
        } else if self.prepend {
            Placement::Start
        } else {
            Placement::End
        }
    }

    /// The text to look for when deciding whether this change already ran.
    pub fn check_text(&self) -> &str {
        self.check_block.as_deref().unwrap_or(&self.block)
    }

    /// Replace `{Type}` placeholders with the parameter names they map to.
    pub fn with_substitutions(&self, names: &crate::signature::ParameterMap) -> CodeChange {
        if names.is_empty() {
            return self.clone();
        }
        let sub = |text: &str| crate::signature::substitute(text, names);
        CodeChange {
            block: sub(&self.block),
            check_block: self.check_block.as_deref().map(sub),
            insert_after: self.insert_after.as_deref().map(sub),
            insert_before: self.insert_before.iter().map(|a| sub(a.as_str())).collect(),
            parent: self.parent.as_deref().map(sub),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_pascal_case_config() {
        let json = r#"{
            "Identifier": "MinimalApiIdentity",
            "Files": [{
                "FileName": "Program.cs",
                "Usings": ["Microsoft.AspNetCore.Identity"],
                "UsingsWithOptions": [{ "Name": "Microsoft.Identity.Web", "Options": ["MicrosoftGraph"] }],
                "Methods": {
                    "Global": {
                        "CodeChanges": [{
                            "Block": "app.UseAuthentication();",
                            "InsertAfter": "app.UseRouting();",
                            "LeadingTrivia": { "Newline": true, "NumberOfSpaces": 4 },
                            "Options": ["TopLevelStatements"]
                        }, {
                            "Block": "AddEntityFrameworkStores<AppDbContext>()",
                            "Parent": "builder.Services.AddDefaultIdentity",
                            "CodeChangeType": "MemberAccess"
                        }]
                    },
                    "Main": { "Parameters": ["string[]"], "CodeChangesFrom": "Global" }
                }
            }]
        }"#;

        let config: ModifierConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.identifier, "MinimalApiIdentity");
        let file = &config.files[0];
        assert_eq!(file.usings_with_options[0].options, vec!["MicrosoftGraph"]);

        let keys: Vec<_> = file.methods.keys().cloned().collect();
        assert_eq!(keys, vec!["Global", "Main"]);

        let global = &file.methods["Global"];
        assert_eq!(global.code_changes[0].leading_trivia.number_of_spaces, 4);
        assert_eq!(global.code_changes[0].placement(), Placement::After("app.UseRouting();"));
        assert_eq!(global.code_changes[1].code_change_type, ChangeKind::MemberAccess);
        assert_eq!(file.methods["Main"].code_changes_from.as_deref(), Some("Global"));
    }

    #[test]
    fn placement_precedence() {
        let mut change = CodeChange::new("x();");
        assert_eq!(change.placement(), Placement::End);
        change.prepend = true;
        assert_eq!(change.placement(), Placement::Start);
        change.insert_before = vec!["y();".to_string()];
        assert!(matches!(change.placement(), Placement::Before(_)));
        change.insert_after = Some("z();".to_string());
        assert_eq!(change.placement(), Placement::After("z();"));
    }

    #[test]
    fn check_text_defaults_to_block() {
        let mut change = CodeChange::new("services.AddRazorPages();");
        assert_eq!(change.check_text(), "services.AddRazorPages();");
        change.check_block = Some("AddRazorPages".to_string());
        assert_eq!(change.check_text(), "AddRazorPages");
    }
}
