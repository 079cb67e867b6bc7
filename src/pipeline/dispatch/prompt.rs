use std::collections::BTreeMap;
use std::path::Path;

use super::DispatchError;
use crate::models::Category;

/// Prompt templates keyed by artifact category.
///
/// On disk a catalog is a directory holding `<category>.txt` files, e.g.
/// `daily_course.txt`. Every daily-course record shares one template.
#[derive(Debug, Clone, Default)]
pub struct PromptCatalog {
    templates: BTreeMap<Category, String>,
}

impl PromptCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every category template present in `dir`. Missing files are
    /// logged and left out; artifacts of those categories will be skipped.
    pub fn load(dir: &Path) -> Result<Self, DispatchError> {
        let mut catalog = Self::new();
        for category in Category::ORDER {
            let path = dir.join(format!("{}.txt", category.as_str()));
            if !path.is_file() {
                tracing::warn!(category = %category, path = %path.display(), "Prompt template missing");
                continue;
            }
            let template = std::fs::read_to_string(&path)
                .map_err(|source| DispatchError::Io { path, source })?;
            catalog.insert(category, template);
        }
        tracing::info!(templates = catalog.len(), "Prompt catalog loaded");
        Ok(catalog)
    }

    pub fn insert(&mut self, category: Category, template: impl Into<String>) {
        self.templates.insert(category, template.into().trim().to_string());
    }

    pub fn get(&self, category: Category) -> Option<&str> {
        self.templates.get(&category).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Template, a blank line, then the artifact text.
    pub fn compose(&self, category: Category, text: &str) -> Result<String, DispatchError> {
        let template = self
            .get(category)
            .ok_or(DispatchError::PromptMissing(category))?;
        Ok(format!("{template}\n\n{text}"))
    }
}
