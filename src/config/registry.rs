// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::sync::Arc;

use crate::traits::ProviderFactory;

/// Maps lowercase file extensions (without the dot) to provider factories.
///
/// Format readers plug into data selection by registering here.
///
/// # Example
/// ```ignore
/// let mut registry = ProviderRegistry::new();
/// registry.register(&["h5", "hdf5"], Arc::new(Hdf5Factory::default()));
/// assert!(registry.supports(Path::new("/data/raw.h5")));
/// ```
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    factories: HashMap<String, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` for each of `extensions`, replacing earlier registrations.
    pub fn register(&mut self, extensions: &[&str], factory: Arc<dyn ProviderFactory>) {
        for ext in extensions {
            let key = ext.trim_start_matches('.').to_ascii_lowercase();
            self.factories.insert(key, factory.clone());
        }
    }

    pub fn get(&self, extension: &str) -> Option<Arc<dyn ProviderFactory>> {
        self.factories
            .get(&extension.trim_start_matches('.').to_ascii_lowercase())
            .cloned()
    }

    /// Factory for the extension of `path`.
    pub fn for_path(&self, path: &Path) -> Option<Arc<dyn ProviderFactory>> {
        let ext = path.extension()?.to_str()?;
        self.get(ext)
    }

    pub fn supports(&self, path: &Path) -> bool {
        self.for_path(path).is_some()
    }

    /// Registered extensions, sorted.
    pub fn supported_extensions(&self) -> Vec<String> {
        let mut exts: Vec<String> = self.factories.keys().cloned().collect();
        exts.sort();
        exts
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Debug for ProviderRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("extensions", &self.supported_extensions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::GraphError;
    use crate::graph::Node;
    use crate::traits::ProviderRequest;

    struct NullFactory;

    impl ProviderFactory for NullFactory {
        fn open(&self, parent: &Node, _request: &ProviderRequest) -> Result<Node, GraphError> {
            Err(GraphError::configuration(parent.name(), "not a real reader"))
        }
    }

    #[test]
    fn lookup_is_case_insensitive_and_dot_tolerant() {
        let mut registry = ProviderRegistry::new();
        registry.register(&[".H5", "hdf5"], Arc::new(NullFactory));

        assert!(registry.get("h5").is_some());
        assert!(registry.get(".hdf5").is_some());
        assert!(registry.supports(Path::new("/tmp/volume.H5")));
        assert!(!registry.supports(Path::new("/tmp/volume.png")));
        assert!(!registry.supports(Path::new("/tmp/no_extension")));
        assert_eq!(registry.supported_extensions(), vec!["h5", "hdf5"]);
    }
}
