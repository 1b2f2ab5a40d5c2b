use crate::error::{FluxgenError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    pub path: String,
}

/// Public model ids mapped to backend model paths. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelRegistry {
    models: BTreeMap<String, String>,
}

impl ModelRegistry {
    pub fn new(models: BTreeMap<String, String>) -> Self {
        Self { models }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let models: BTreeMap<String, String> = serde_json::from_str(raw)
            .map_err(|e| FluxgenError::ConfigError(format!("Invalid model map: {}", e)))?;
        Ok(Self::new(models))
    }

    pub fn resolve(&self, model_id: &str) -> Option<&str> {
        self.models.get(model_id).map(String::as_str)
    }

    pub fn contains(&self, model_id: &str) -> bool {
        self.models.contains_key(model_id)
    }

    pub fn list(&self) -> Vec<ModelEntry> {
        self.models
            .iter()
            .map(|(id, path)| ModelEntry {
                id: id.clone(),
                path: path.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl FromIterator<(String, String)> for ModelRegistry {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_and_unknown() {
        let registry = ModelRegistry::from_json(
            r#"{"FLUX.1-Schnell-CF":"@cf/black-forest-labs/flux-1-schnell"}"#,
        )
        .unwrap();

        assert_eq!(
            registry.resolve("FLUX.1-Schnell-CF"),
            Some("@cf/black-forest-labs/flux-1-schnell")
        );
        assert_eq!(registry.resolve("flux.1-schnell-cf"), None);
        assert!(!registry.contains(""));
    }

    #[test]
    fn test_list_is_ordered() {
        let registry: ModelRegistry = vec![
            ("b".to_string(), "@cf/b".to_string()),
            ("a".to_string(), "@cf/a".to_string()),
        ]
        .into_iter()
        .collect();

        let ids: Vec<String> = registry.list().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(ModelRegistry::from_json("[]").is_err());
    }
}
