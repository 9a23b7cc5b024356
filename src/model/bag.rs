//! Registry of models by entity identifier and alias.

use super::Model;
use crate::error::{Lookup, Result, StorageError};
use indexmap::IndexMap;
use std::sync::Arc;

/// Lookup of models by entity identifier or alias.
///
/// The bag is filled during start-up and only read afterwards; models are
/// handed out as shared `Arc<Model>` handles.
#[derive(Debug, Clone, Default)]
pub struct ModelBag {
    models: IndexMap<String, Arc<Model>>,
    aliases: IndexMap<String, String>,
}

impl ModelBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model under its entity identifier and, optionally, an alias.
    pub fn set(&mut self, model: Model, alias: Option<&str>) -> Arc<Model> {
        let entity = model.entity().to_string();
        let model = Arc::new(model);
        if let Some(alias) = alias {
            self.aliases.insert(alias.to_string(), entity.clone());
        }
        self.models.insert(entity, Arc::clone(&model));
        model
    }

    fn resolve<'a>(&'a self, id: &'a str) -> &'a str {
        self.aliases.get(id).map(String::as_str).unwrap_or(id)
    }

    pub fn has(&self, id: &str) -> bool {
        self.models.contains_key(self.resolve(id))
    }

    pub fn get(&self, id: &str) -> Result<Arc<Model>> {
        self.models
            .get(self.resolve(id))
            .cloned()
            .ok_or_else(|| StorageError::not_found(Lookup::Model, id, id))
    }

    /// Every registered model, in registration order.
    pub fn all(&self) -> Vec<Arc<Model>> {
        self.models.values().cloned().collect()
    }
}
