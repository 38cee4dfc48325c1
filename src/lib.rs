//! A stage-based streaming byte pipeline.
//!
//! A source stage reads raw bytes from an input in fixed-size chunks, a chain
//! of transform stages processes them, and a sink stage writes the result to
//! an output. The transform shipped with the crate is a run-length
//! encoder/decoder.
//!
//! # Features
//!
//! - Pull-based links: a provider notifies its consumer, which pulls an owned
//!   copy of the current chunk in a representation negotiated at wiring time
//! - End of stream is the absence of a chunk, never a reserved byte value
//! - A run-length codec whose decoder survives records split across chunks
//! - Per-stage metrics: chunks, bytes in/out, handling latency percentiles
//! - A registry mapping stage names from configuration to transform factories
//!
//! # Example
//!
//! ```
//! use chunk_pipeline::{rle, Mode, PipelineBuilder};
//!
//! let input: &[u8] = b"AAABBBBB";
//! let mut pipeline = PipelineBuilder::new()
//!     .source("reader", input, 4)
//!     .transform("rle", rle::codec(Mode::Encode), 4)
//!     .sink("writer", std::io::sink(), 4)
//!     .build()?;
//! pipeline.run()?;
//! # Ok::<(), chunk_pipeline::PipelineError>(())
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod link;
pub mod metrics;
pub mod pipeline;
pub mod registry;
pub mod rle;
pub mod sink;
pub mod source;
pub mod stage;

// Re-exports for convenience
pub use buffer::StageBuffer;
pub use config::{BufferConfig, PipelineConfig, TransformConfig};
pub use error::{PipelineError, Result};
pub use link::{negotiate, Chunk, Consumer, Downstream, Provider, Representation};
pub use metrics::{MetricsSnapshot, StageMetrics};
pub use pipeline::{assemble, Pipeline, PipelineBuilder};
pub use registry::StageRegistry;
pub use rle::{encode_chunk, Mode, RleDecoder, RleEncoder};
pub use sink::ChunkSink;
pub use source::ChunkSource;
pub use stage::{ByteSink, PassthroughStage, Transform, TransformStage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
