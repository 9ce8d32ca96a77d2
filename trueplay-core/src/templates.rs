//! Template registry: the starter scripts offered by the playground.
//!
//! Script bodies are embedded from `templates/` at build time; the metadata
//! below decides which of them are listed and how.

use include_dir::{include_dir, Dir};
use once_cell::sync::Lazy;
use serde::Serialize;
use trueplay_types::{CodeLanguage, TemplateCategory};

static TEMPLATE_FILES: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/templates");

/// Id of the blank template used as the fallback
pub const BLANK_TEMPLATE_ID: &str = "custom-template";

/// A ready-to-run script shown in the template list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Template {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub category: TemplateCategory,
    pub language: CodeLanguage,
    pub code: &'static str,
}

struct TemplateMeta {
    id: &'static str,
    title: &'static str,
    description: &'static str,
    category: TemplateCategory,
}

const METADATA: &[TemplateMeta] = &[
    TemplateMeta {
        id: "attestation-basic",
        title: "Create an Attestation",
        description: "Create and issue a basic attestation",
        category: TemplateCategory::Attestations,
    },
    TemplateMeta {
        id: "attestation-update",
        title: "Update an Attestation",
        description: "Change the values of an existing attestation",
        category: TemplateCategory::Attestations,
    },
    TemplateMeta {
        id: "attestation-read",
        title: "Read Attestations",
        description: "Fetch the attestations issued to a user",
        category: TemplateCategory::Attestations,
    },
    TemplateMeta {
        id: "reputation-model",
        title: "Basic Reputation Model",
        description: "Create a reputation model with configurable weights",
        category: TemplateCategory::Reputation,
    },
    TemplateMeta {
        id: "trust-algorithm",
        title: "Trust Algorithm",
        description: "Implement a custom algorithm for computing trust scores",
        category: TemplateCategory::Utility,
    },
    TemplateMeta {
        id: BLANK_TEMPLATE_ID,
        title: "Custom Template",
        description: "Start with a blank template",
        category: TemplateCategory::Attestations,
    },
];

static TEMPLATES: Lazy<Vec<Template>> = Lazy::new(|| {
    METADATA
        .iter()
        .filter_map(|meta| {
            let file = TEMPLATE_FILES.get_file(format!("{}.ts", meta.id));
            let code = file.and_then(|f| f.contents_utf8());
            if code.is_none() {
                tracing::warn!(id = meta.id, "Template script missing from bundle");
            }
            Some(Template {
                id: meta.id,
                title: meta.title,
                description: meta.description,
                category: meta.category,
                language: CodeLanguage::Typescript,
                code: code?,
            })
        })
        .collect()
});

/// Every template, in display order
pub fn all() -> &'static [Template] {
    &TEMPLATES
}

pub fn get_by_id(id: &str) -> Option<&'static Template> {
    TEMPLATES.iter().find(|t| t.id == id)
}

pub fn by_category(category: TemplateCategory) -> Vec<&'static Template> {
    TEMPLATES.iter().filter(|t| t.category == category).collect()
}

/// Code of the template titled `title`, or the blank template's code
pub fn code_by_title(title: &str) -> &'static str {
    TEMPLATES
        .iter()
        .find(|t| t.title == title)
        .or_else(|| get_by_id(BLANK_TEMPLATE_ID))
        .map(|t| t.code)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_listed_template_is_bundled() {
        assert_eq!(all().len(), METADATA.len());
        for template in all() {
            assert!(!template.code.trim().is_empty(), "{} is empty", template.id);
            assert_eq!(template.language, CodeLanguage::Typescript);
        }
    }

    #[test]
    fn test_lookup() {
        let read = get_by_id("attestation-read").unwrap();
        assert_eq!(read.title, "Read Attestations");
        assert!(read.code.contains("getAttestations"));
        assert!(get_by_id("missing").is_none());
    }

    #[test]
    fn test_by_category() {
        let ids: Vec<_> = by_category(TemplateCategory::Attestations).iter().map(|t| t.id).collect();
        assert_eq!(
            ids,
            ["attestation-basic", "attestation-update", "attestation-read", "custom-template"]
        );
        assert_eq!(by_category(TemplateCategory::Reputation).len(), 1);
    }

    #[test]
    fn test_code_by_title_falls_back_to_blank() {
        assert!(code_by_title("Trust Algorithm").contains("trustAlgorithm"));
        assert_eq!(code_by_title("No such title"), get_by_id(BLANK_TEMPLATE_ID).unwrap().code);
    }

    #[test]
    fn test_templates_avoid_imports() {
        for template in all() {
            assert!(!template.code.contains("import "), "{} uses an import", template.id);
            assert!(!template.code.contains("export "), "{} uses an export", template.id);
        }
    }
}
