//! Per compile unit binder configuration.
//!
//! ```toml
//! debug_heap = true
//!
//! [debug_heap_redirects]
//! MemAlloc = "DebugHeapMemAlloc"
//! MemFree = "DebugHeapMemFree"
//! ```

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::ConfigError;

/// Configuration owned by one [`crate::Binder`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BinderConfig {
    /// Redirect well-known allocation functions to their instrumented versions.
    pub debug_heap: bool,
    /// Allocation function name to instrumented replacement.
    pub debug_heap_redirects: IndexMap<String, String>,
}

impl Default for BinderConfig {
    fn default() -> Self {
        let mut debug_heap_redirects = IndexMap::new();
        debug_heap_redirects.insert("MemAlloc".to_string(), "DebugHeapMemAlloc".to_string());
        debug_heap_redirects.insert("MemFree".to_string(), "DebugHeapMemFree".to_string());
        Self { debug_heap: false, debug_heap_redirects }
    }
}

impl BinderConfig {
    /// Parse a configuration from TOML. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: BinderConfig = toml::from_str(text)?;
        if let Some((from, _)) = config.debug_heap_redirects.iter().find(|(_, to)| to.is_empty()) {
            return Err(ConfigError::EmptyRedirect(from.clone()));
        }
        Ok(config)
    }

    pub fn with_debug_heap(mut self, enabled: bool) -> Self {
        self.debug_heap = enabled;
        self
    }

    /// The replacement for `function_name` when the debug heap is on.
    pub fn debug_heap_redirect(&self, function_name: &str) -> Option<&str> {
        if !self.debug_heap {
            return None;
        }
        self.debug_heap_redirects.get(function_name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_allocator_redirects_but_is_off() {
        let config = BinderConfig::default();
        assert!(!config.debug_heap);
        assert_eq!(config.debug_heap_redirects.len(), 2);
        assert_eq!(config.debug_heap_redirect("MemAlloc"), None);
    }

    #[test]
    fn test_from_toml_enables_debug_heap() {
        let config = BinderConfig::from_toml_str("debug_heap = true").unwrap();
        assert_eq!(config.debug_heap_redirect("MemAlloc"), Some("DebugHeapMemAlloc"));
        assert_eq!(config.debug_heap_redirect("MemFree"), Some("DebugHeapMemFree"));
        assert_eq!(config.debug_heap_redirect("Other"), None);
    }

    #[test]
    fn test_from_toml_custom_redirects() {
        let config = BinderConfig::from_toml_str(
            "debug_heap = true\n[debug_heap_redirects]\nAlloc = \"TracedAlloc\"\n",
        )
        .unwrap();
        assert_eq!(config.debug_heap_redirect("Alloc"), Some("TracedAlloc"));
        assert_eq!(config.debug_heap_redirect("MemAlloc"), None);
    }

    #[test]
    fn test_from_toml_rejects_empty_target() {
        let err = BinderConfig::from_toml_str("[debug_heap_redirects]\nMemAlloc = \"\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyRedirect(name) if name == "MemAlloc"));
    }

    #[test]
    fn test_from_toml_rejects_bad_syntax() {
        assert!(BinderConfig::from_toml_str("debug_heap = ").is_err());
    }
}
