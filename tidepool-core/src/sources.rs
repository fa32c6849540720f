//! Catalog source registry.
//!
//! A source is one third-party catalog backend. The registry is an ordered,
//! read-only snapshot of source descriptors passed into each aggregation run,
//! so a run's behavior is a pure function of (query, snapshot). Editing the
//! registry is an external concern; the core only reads it.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// One catalog backend: a MacCMS-style `api.php/provide/vod` JSON endpoint.
///
/// Priority only affects display ordering, never correctness.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceDescriptor {
    pub id: String,
    pub name: String,
    pub base_url: String,
    pub enabled: bool,
    pub priority: u32,
}

/// Ordered, immutable snapshot of known catalog sources.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<SourceDescriptor>,
}

impl SourceRegistry {
    /// Creates a registry from an explicit descriptor list.
    pub fn with_sources(sources: Vec<SourceDescriptor>) -> Self {
        Self { sources }
    }

    /// Loads a registry from a JSON file containing a descriptor array.
    ///
    /// # Errors
    /// - `SourceRegistryError::Io` - File could not be read
    /// - `SourceRegistryError::Parse` - File is not a valid descriptor array
    pub fn from_json_file(path: &Path) -> Result<Self, SourceRegistryError> {
        let raw = std::fs::read_to_string(path)?;
        let sources: Vec<SourceDescriptor> = serde_json::from_str(&raw)?;
        Ok(Self { sources })
    }

    /// All descriptors in registry order.
    pub fn all_sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    /// Descriptors with the enabled flag set, sorted by display priority.
    pub fn enabled_sources(&self) -> Vec<&SourceDescriptor> {
        let mut enabled: Vec<&SourceDescriptor> =
            self.sources.iter().filter(|s| s.enabled).collect();
        enabled.sort_by_key(|s| s.priority);
        enabled
    }

    /// Looks up a descriptor by id.
    pub fn source_by_id(&self, id: &str) -> Option<&SourceDescriptor> {
        self.sources.iter().find(|s| s.id == id)
    }

    /// Display name for a source id, falling back to the id itself.
    pub fn display_name(&self, id: &str) -> String {
        self.source_by_id(id)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Resolves requested ids into descriptors.
    ///
    /// Unknown ids are silently dropped; duplicates collapse to the first
    /// occurrence with request order otherwise preserved.
    pub fn resolve(&self, ids: &[String]) -> Vec<SourceDescriptor> {
        let mut seen = std::collections::HashSet::new();
        ids.iter()
            .filter(|id| seen.insert(id.as_str()))
            .filter_map(|id| self.source_by_id(id))
            .cloned()
            .collect()
    }
}

/// Registry loading errors.
#[derive(Debug, thiserror::Error)]
pub enum SourceRegistryError {
    #[error("Failed to read registry file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid registry file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Compiled-in default source list.
///
/// Mirrors the registry shipped with the original deployment so the server
/// is usable without a registry file. Endpoints are third-party and churn;
/// a JSON registry file overrides this list wholesale.
pub fn default_sources() -> Vec<SourceDescriptor> {
    let table = [
        ("dytt", "电影天堂", "http://caiji.dyttzyapi.com/api.php/provide/vod"),
        ("ruyi", "如意", "https://cj.rycjapi.com/api.php/provide/vod"),
        ("baofeng", "暴风", "https://bfzyapi.com/api.php/provide/vod"),
        ("tianya", "天涯", "https://tyyszy.com/api.php/provide/vod"),
        ("feifan", "非凡影视", "http://ffzy5.tv/api.php/provide/vod"),
        ("wolong", "卧龙", "https://wolongzyw.com/api.php/provide/vod"),
        ("jisu", "极速", "https://jszyapi.com/api.php/provide/vod"),
        ("mozhua", "魔爪", "https://mozhuazy.com/api.php/provide/vod"),
        ("modu", "魔都", "https://www.mdzyapi.com/api.php/provide/vod"),
        ("zuida", "最大", "https://api.zuidapi.com/api.php/provide/vod"),
        ("yinghua", "樱花", "https://m3u8.apiyhzy.com/api.php/provide/vod"),
        ("wujin", "无尽", "https://api.wujinapi.me/api.php/provide/vod"),
        ("wangwang", "旺旺", "https://api.wwzy.tv/api.php/provide/vod"),
        ("ikun", "iKun", "https://ikunzyapi.com/api.php/provide/vod"),
    ];

    table
        .iter()
        .enumerate()
        .map(|(index, (id, name, base_url))| SourceDescriptor {
            id: (*id).to_string(),
            name: (*name).to_string(),
            base_url: (*base_url).to_string(),
            enabled: true,
            priority: index as u32 + 1,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn test_registry() -> SourceRegistry {
        SourceRegistry::with_sources(vec![
            SourceDescriptor {
                id: "alpha".to_string(),
                name: "Alpha".to_string(),
                base_url: "https://alpha.example.com/api.php/provide/vod".to_string(),
                enabled: true,
                priority: 2,
            },
            SourceDescriptor {
                id: "beta".to_string(),
                name: "Beta".to_string(),
                base_url: "https://beta.example.com/api.php/provide/vod".to_string(),
                enabled: false,
                priority: 1,
            },
            SourceDescriptor {
                id: "gamma".to_string(),
                name: "Gamma".to_string(),
                base_url: "https://gamma.example.com/api.php/provide/vod".to_string(),
                enabled: true,
                priority: 1,
            },
        ])
    }

    #[test]
    fn test_enabled_sources_sorted_by_priority() {
        let registry = test_registry();
        let enabled: Vec<&str> = registry
            .enabled_sources()
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(enabled, vec!["gamma", "alpha"]);
    }

    #[test]
    fn test_resolve_drops_unknown_and_duplicate_ids() {
        let registry = test_registry();
        let resolved = registry.resolve(&[
            "alpha".to_string(),
            "missing".to_string(),
            "alpha".to_string(),
            "beta".to_string(),
        ]);
        let ids: Vec<&str> = resolved.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let registry = test_registry();
        assert_eq!(registry.display_name("alpha"), "Alpha");
        assert_eq!(registry.display_name("missing"), "missing");
    }

    #[test]
    fn test_default_sources_have_unique_ids() {
        let sources = default_sources();
        let mut ids: Vec<&str> = sources.iter().map(|s| s.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), sources.len());
    }

    #[test]
    fn test_from_json_file_round_trip() {
        let sources = test_registry().all_sources().to_vec();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", serde_json::to_string(&sources).unwrap()).unwrap();

        let registry = SourceRegistry::from_json_file(file.path()).unwrap();
        assert_eq!(registry.all_sources(), sources.as_slice());
    }

    #[test]
    fn test_from_json_file_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let result = SourceRegistry::from_json_file(file.path());
        assert!(matches!(result, Err(SourceRegistryError::Parse(_))));
    }
}
