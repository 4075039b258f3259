//! Process-wide table of archive formats, keyed by identifier.
//!
//! Registering an identifier twice is rejected; the first registration stays.

use std::path::Path;
use std::sync::OnceLock;

use log::error;

use crate::error::RegistryError;
use crate::format::Format;
use crate::tar_zst::{TarZst, TAR_ZST_ID};

/// Ordered set of formats. Lookup by path tries them in registration order.
#[derive(Debug, Default)]
pub struct FormatRegistry {
    formats: Vec<(String, Box<dyn Format>)>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, identifier: impl Into<String>, format: Box<dyn Format>) -> Result<(), RegistryError> {
        let identifier = identifier.into();
        if self.get(&identifier).is_some() {
            return Err(RegistryError::Duplicate(identifier));
        }
        self.formats.push((identifier, format));
        Ok(())
    }

    pub fn get(&self, identifier: &str) -> Option<&dyn Format> {
        self.formats
            .iter()
            .find(|(id, _)| id == identifier)
            .map(|(_, f)| f.as_ref())
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.formats.iter().map(|(id, _)| id.as_str())
    }

    /// First format whose `matches` accepts `path`.
    pub fn detect(&self, path: &Path) -> Option<(&str, &dyn Format)> {
        self.formats
            .iter()
            .find(|(_, f)| f.matches(path))
            .map(|(id, f)| (id.as_str(), f.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

/// The process-wide registry, filled with the built-in formats on first use.
pub fn global() -> &'static FormatRegistry {
    static REGISTRY: OnceLock<FormatRegistry> = OnceLock::new();
    REGISTRY.get_or_init(builtin)
}

fn builtin() -> FormatRegistry {
    let mut registry = FormatRegistry::new();
    if let Err(e) = registry.register(TAR_ZST_ID, Box::new(TarZst::new())) {
        error!("built-in format registration failed: {}", e);
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_has_tar_zst() {
        let registry = global();
        assert_eq!(registry.identifiers().collect::<Vec<_>>(), vec![TAR_ZST_ID]);
        assert_eq!(registry.get(TAR_ZST_ID).unwrap().name(), TAR_ZST_ID);
        assert!(registry.get("Zip").is_none());
    }

    #[test]
    fn global_is_initialized_once() {
        assert!(std::ptr::eq(global(), global()));
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut registry = FormatRegistry::new();
        assert!(registry.is_empty());
        registry.register("TarZst", Box::new(TarZst::new())).unwrap();
        let err = registry.register("TarZst", Box::new(TarZst::new())).unwrap_err();
        assert_eq!(err, RegistryError::Duplicate("TarZst".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn detect_by_extension() {
        let registry = global();
        let (id, _) = registry.detect(Path::new("no/such/archive.TZST")).unwrap();
        assert_eq!(id, TAR_ZST_ID);
        assert!(registry.detect(Path::new("no/such/archive.zip")).is_none());
    }
}
