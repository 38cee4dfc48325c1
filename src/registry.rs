use crate::config::TransformConfig;
use crate::error::{PipelineError, Result};
use crate::rle;
use crate::stage::{PassthroughStage, Transform};
use std::collections::HashMap;

/// Builds a transform from its configuration
pub type TransformFactory = fn(&TransformConfig) -> Result<Box<dyn Transform>>;

/// Maps stage identifiers used in configuration to transform factories
#[derive(Clone)]
pub struct StageRegistry {
    factories: HashMap<String, TransformFactory>,
}

impl StageRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry with the built-in `rle` and `passthrough` stages
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("rle", rle_factory);
        registry.register("passthrough", |_| Ok(Box::new(PassthroughStage)));
        registry
    }

    /// Add or replace a factory. Names are case-insensitive.
    pub fn register(&mut self, name: &str, factory: TransformFactory) {
        self.factories.insert(name.to_ascii_lowercase(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_ascii_lowercase())
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build the transform a configuration entry names
    pub fn create(&self, config: &TransformConfig) -> Result<Box<dyn Transform>> {
        let factory = self
            .factories
            .get(&config.stage.to_ascii_lowercase())
            .ok_or_else(|| {
                PipelineError::Config(format!(
                    "unknown stage '{}', registered: {}",
                    config.stage,
                    self.names().join(", ")
                ))
            })?;
        factory(config)
    }
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn rle_factory(config: &TransformConfig) -> Result<Box<dyn Transform>> {
    let mode = config
        .mode
        .ok_or_else(|| PipelineError::Config("stage 'rle' requires a mode".into()))?;
    Ok(rle::codec(mode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rle::Mode;

    fn entry(stage: &str, mode: Option<Mode>) -> TransformConfig {
        TransformConfig {
            stage: stage.into(),
            buffer_size: 16,
            mode,
        }
    }

    #[test]
    fn test_defaults_build_codec_by_mode() {
        let registry = StageRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["passthrough", "rle"]);
        let encoder = registry.create(&entry("RLE", Some(Mode::Encode))).unwrap();
        assert_eq!(encoder.name(), "rle-encode");
        let decoder = registry.create(&entry("rle", Some(Mode::Decode))).unwrap();
        assert_eq!(decoder.name(), "rle-decode");
    }

    #[test]
    fn test_rle_without_mode_is_rejected() {
        let registry = StageRegistry::with_defaults();
        assert!(matches!(
            registry.create(&entry("rle", None)),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_unknown_stage() {
        let registry = StageRegistry::with_defaults();
        let err = registry.create(&entry("huffman", None)).err().unwrap();
        assert!(err.to_string().contains("unknown stage 'huffman'"));
    }

    #[test]
    fn test_register_custom_stage() {
        let mut registry = StageRegistry::new();
        assert!(!registry.contains("copy"));
        registry.register("Copy", |_| Ok(Box::new(PassthroughStage)));
        assert!(registry.contains("COPY"));
        assert!(registry.create(&entry("copy", None)).is_ok());
    }
}
