//! Overload selection by parameter types.
//!
//! Configs know the types a method takes but not what the author of the
//! target file named the parameters. Matching is exact on the rendered type
//! text: there is no semantic model, only syntax.

use std::collections::BTreeMap;

use tree_sitter::Node;

use crate::syntax::{self, SourceDocument, PARAMETER};

/// Required type -> actual parameter name.
pub type ParameterMap = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterInfo {
    pub ty: String,
    pub name: String,
    /// Full declaration text, e.g. `IServiceCollection services`.
    pub text: String,
}

impl ParameterInfo {
    pub fn new(ty: &str, name: &str) -> Self {
        Self {
            ty: ty.to_string(),
            name: name.to_string(),
            text: format!("{} {}", ty, name),
        }
    }
}

/// Match `required` against `actual`. Every required type must be carried by
/// exactly one parameter. An empty requirement matches anything.
pub fn verify(required: &[String], actual: &[ParameterInfo]) -> Option<ParameterMap> {
    let mut names = ParameterMap::new();
    for ty in required {
        let ty = ty.trim();
        let mut matching = actual.iter().filter(|p| p.ty.trim() == ty);
        let found = matching.next()?;
        if matching.next().is_some() {
            return None;
        }
        names.insert(ty.to_string(), found.name.clone());
    }
    Some(names)
}

/// Replace `{Type}` placeholders with actual parameter names.
pub fn substitute(text: &str, names: &ParameterMap) -> String {
    names.iter().fold(text.to_string(), |acc, (ty, name)| {
        acc.replace(&format!("{{{}}}", ty), name)
    })
}

/// Parameters declared by a method, constructor or lambda parameter list.
pub fn parameters_of(doc: &SourceDocument, declaration: Node<'_>) -> Vec<ParameterInfo> {
    let Some(list) = syntax::parameter_list(declaration) else {
        return Vec::new();
    };
    syntax::children_of_kind(list, PARAMETER)
        .into_iter()
        .map(|param| {
            let ty = param
                .child_by_field_name("type")
                .map(|n| doc.node_text(n).trim().to_string())
                .unwrap_or_default();
            let name = param
                .child_by_field_name("name")
                .map(|n| doc.node_text(n).to_string())
                .unwrap_or_default();
            ParameterInfo {
                ty,
                name,
                text: doc.node_text(param).trim().to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required(types: &[&str]) -> Vec<String> {
        types.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn matches_types_and_records_names() {
        let actual = vec![
            ParameterInfo::new("IApplicationBuilder", "app"),
            ParameterInfo::new("IWebHostEnvironment", "env"),
        ];
        let names = verify(&required(&["IWebHostEnvironment", "IApplicationBuilder"]), &actual).unwrap();
        assert_eq!(names["IApplicationBuilder"], "app");
        assert_eq!(names["IWebHostEnvironment"], "env");
    }

    #[test]
    fn empty_requirement_matches_by_name_only() {
        let names = verify(&[], &[ParameterInfo::new("int", "x")]).unwrap();
        assert!(names.is_empty());
    }

    #[test]
    fn missing_type_is_not_matched() {
        let actual = vec![ParameterInfo::new("IServiceCollection", "services")];
        assert!(verify(&required(&["IConfiguration"]), &actual).is_none());
    }

    #[test]
    fn ambiguous_type_is_not_matched() {
        let actual = vec![ParameterInfo::new("string", "a"), ParameterInfo::new("string", "b")];
        assert!(verify(&required(&["string"]), &actual).is_none());
    }

    #[test]
    fn comparison_is_exact_text() {
        let actual = vec![ParameterInfo::new("List<string>", "items")];
        assert!(verify(&required(&["List<string>"]), &actual).is_some());
        assert!(verify(&required(&["IList<string>"]), &actual).is_none());
        assert!(verify(&required(&["System.Collections.Generic.List<string>"]), &actual).is_none());
    }

    #[test]
    fn substitutes_placeholders() {
        let mut names = ParameterMap::new();
        names.insert("IServiceCollection".to_string(), "svc".to_string());
        assert_eq!(
            substitute("{IServiceCollection}.AddRazorPages();", &names),
            "svc.AddRazorPages();"
        );
        assert_eq!(substitute("IServiceCollection x;", &names), "IServiceCollection x;");
    }

    #[test]
    fn reads_parameters_from_source() {
        let doc = SourceDocument::parse(
            "class C { void M(IServiceCollection services, int count = 3) { } }",
        )
        .unwrap();
        let method = syntax::callables(doc.root())[0];
        let params = parameters_of(&doc, method);
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].ty, "IServiceCollection");
        assert_eq!(params[0].name, "services");
        assert_eq!(params[0].text, "IServiceCollection services");
        assert_eq!(params[1].ty, "int");
        assert_eq!(params[1].text, "int count = 3");
    }
}
