//! Prompt templates stored as plain text on disk, keyed by `(task, version)`
//! e.g. `labeling/v1.0` (§6). Loaded once at startup; components render them
//! with simple `{{placeholder}}` substitution rather than a templating engine,
//! matching the "single text-in / text-out" LLM contract.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

pub struct PromptStore {
    templates: HashMap<String, String>,
}

impl PromptStore {
    /// Load every `*.txt` file under `dir`, keyed by its relative path minus
    /// the extension (e.g. `labeling/v1.0.txt` -> `labeling/v1.0`).
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let mut templates = HashMap::new();
        load_recursive(dir, dir, &mut templates)
            .with_context(|| format!("loading prompt templates from {}", dir.display()))?;
        Ok(Self { templates })
    }

    pub fn get(&self, key: &str) -> Result<&str> {
        self.templates
            .get(key)
            .map(|s| s.as_str())
            .with_context(|| format!("missing prompt template: {key}"))
    }

    /// Render a template, substituting `{{name}}` placeholders.
    pub fn render(&self, key: &str, vars: &[(&str, &str)]) -> Result<String> {
        let mut rendered = self.get(key)?.to_string();
        for (name, value) in vars {
            rendered = rendered.replace(&format!("{{{{{name}}}}}"), value);
        }
        Ok(rendered)
    }
}

fn load_recursive(
    root: &Path,
    dir: &Path,
    templates: &mut HashMap<String, String>,
) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            load_recursive(root, &path, templates)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("txt") {
            let key = path
                .strip_prefix(root)?
                .with_extension("")
                .to_string_lossy()
                .replace(std::path::MAIN_SEPARATOR, "/");
            let contents = std::fs::read_to_string(&path)?;
            templates.insert(key, contents);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_placeholders() {
        let mut templates = HashMap::new();
        templates.insert(
            "labeling/v1.0".to_string(),
            "Label this: {{headlines}}".to_string(),
        );
        let store = PromptStore { templates };
        let rendered = store
            .render("labeling/v1.0", &[("headlines", "ECB hikes rates")])
            .unwrap();
        assert_eq!(rendered, "Label this: ECB hikes rates");
    }

    #[test]
    fn missing_template_errors() {
        let store = PromptStore {
            templates: HashMap::new(),
        };
        assert!(store.get("missing/v1.0").is_err());
    }
}
