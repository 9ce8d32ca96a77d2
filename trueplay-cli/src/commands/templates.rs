//! Template listing and display.

use anyhow::{bail, Context, Result};
use trueplay_core::templates;
use trueplay_types::TemplateCategory;

/// List templates, optionally restricted to one category
pub fn list_templates(category: Option<&str>, json: bool) -> Result<()> {
    let listed: Vec<_> = match category {
        Some(raw) => {
            let Some(category) = TemplateCategory::parse(raw) else {
                let names: Vec<_> = TemplateCategory::ALL.iter().map(|c| c.as_str()).collect();
                bail!("Unknown category '{}' (expected one of: {})", raw, names.join(", "));
            };
            templates::by_category(category)
        }
        None => templates::all().iter().collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&listed)?);
        return Ok(());
    }

    let width = listed.iter().map(|t| t.id.len()).max().unwrap_or(0);
    for template in listed {
        println!(
            "{:<width$}  [{}] {}: {}",
            template.id,
            template.category,
            template.title,
            template.description,
            width = width
        );
    }
    Ok(())
}

/// Print a template's code to stdout
pub fn show_template(id: &str) -> Result<()> {
    let template = templates::get_by_id(id).with_context(|| format!("Template '{}' not found", id))?;
    print!("{}", template.code);
    Ok(())
}
