//! Configuration for a pipeline run.

use crate::rle::Mode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration: where to read, what to run, where to write
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Input file
    pub input: PathBuf,

    /// Output file, created or truncated
    pub output: PathBuf,

    /// Optional file that receives a copy of the run's log
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    /// Source stage
    #[serde(default)]
    pub reader: BufferConfig,

    /// Transform stages, in pipeline order
    #[serde(default)]
    pub transforms: Vec<TransformConfig>,

    /// Sink stage
    #[serde(default)]
    pub writer: BufferConfig,
}

/// Settings for a stage that only needs a buffer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
        }
    }
}

/// One transform stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Registry name of the stage, e.g. `rle`
    pub stage: String,

    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Codec direction, for stages that have one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
}

fn default_buffer_size() -> usize {
    4096
}

impl PipelineConfig {
    /// Load configuration from a YAML or JSON file, chosen by extension
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let config: PipelineConfig = match ext {
            "json" => serde_json::from_str(&contents)?,
            _ => serde_yaml::from_str(&contents)?,
        };
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Serialize configuration to YAML.
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// A single-stage encoding run
    pub fn sample() -> Self {
        Self {
            input: PathBuf::from("input.bin"),
            output: PathBuf::from("output.rle"),
            log_file: None,
            reader: BufferConfig::default(),
            transforms: vec![TransformConfig {
                stage: "rle".to_string(),
                buffer_size: default_buffer_size(),
                mode: Some(Mode::Encode),
            }],
            writer: BufferConfig::default(),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.reader.buffer_size == 0 {
            anyhow::bail!("reader buffer_size must be positive");
        }
        if self.writer.buffer_size == 0 {
            anyhow::bail!("writer buffer_size must be positive");
        }
        for (i, transform) in self.transforms.iter().enumerate() {
            if transform.buffer_size == 0 {
                anyhow::bail!("transform {} ('{}') buffer_size must be positive", i, transform.stage);
            }
            if transform.stage.eq_ignore_ascii_case("rle") && transform.mode.is_none() {
                anyhow::bail!("transform {} ('rle') requires a mode of ENCODE or DECODE", i);
            }
        }
        if self.input == self.output {
            anyhow::bail!("input and output must be different files");
        }
        Ok(())
    }
}
