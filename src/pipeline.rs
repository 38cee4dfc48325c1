use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::link::Consumer;
use crate::metrics::StageMetrics;
use crate::registry::StageRegistry;
use crate::sink::ChunkSink;
use crate::source::ChunkSource;
use crate::stage::{Transform, TransformStage};
use std::io::{Read, Write};

/// A transform waiting to be wired
struct PendingTransform {
    name: String,
    transform: Box<dyn Transform>,
    buffer_capacity: usize,
    metrics: StageMetrics,
}

/// The source waiting to be wired
struct PendingSource<R> {
    name: String,
    input: R,
    buffer_capacity: usize,
    metrics: StageMetrics,
}

/// Builder for constructing pipelines
///
/// Links are negotiated in `build`, back to front, so a wiring error is
/// reported before any input is read. A sink that failed to construct is
/// held until then too.
pub struct PipelineBuilder<R: Read> {
    source: Option<PendingSource<R>>,
    transforms: Vec<PendingTransform>,
    sink: Option<Result<(Box<dyn Consumer>, StageMetrics)>>,
}

impl<R: Read> PipelineBuilder<R> {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            source: None,
            transforms: Vec::new(),
            sink: None,
        }
    }

    /// Set the stage that reads `input`, `buffer_capacity` bytes at a time
    pub fn source(mut self, name: impl Into<String>, input: R, buffer_capacity: usize) -> Self {
        let name = name.into();
        self.source = Some(PendingSource {
            metrics: StageMetrics::new(&name),
            name,
            input,
            buffer_capacity,
        });
        self
    }

    /// Append a transform stage
    pub fn transform(
        mut self,
        name: impl Into<String>,
        transform: Box<dyn Transform>,
        buffer_capacity: usize,
    ) -> Self {
        let name = name.into();
        self.transforms.push(PendingTransform {
            metrics: StageMetrics::new(&name),
            name,
            transform,
            buffer_capacity,
        });
        self
    }

    /// Set the stage that writes to `output`
    pub fn sink<W: Write + 'static>(
        mut self,
        name: impl Into<String>,
        output: W,
        buffer_capacity: usize,
    ) -> Self {
        let name = name.into();
        let metrics = StageMetrics::new(&name);
        self.sink = Some(
            ChunkSink::new(name, output, buffer_capacity, metrics.clone())
                .map(|sink| (Box::new(sink) as Box<dyn Consumer>, metrics)),
        );
        self
    }

    /// Set a preconfigured sink, e.g. one with its own representation preferences
    pub fn sink_stage<W: Write + 'static>(
        mut self,
        sink: ChunkSink<W>,
        metrics: StageMetrics,
    ) -> Self {
        tracing::debug!("sink '{}' buffers {} bytes", sink.name(), sink.capacity());
        self.sink = Some(Ok((Box::new(sink) as Box<dyn Consumer>, metrics)));
        self
    }

    /// Wire the stages together
    pub fn build(self) -> Result<Pipeline<R>> {
        let source = self
            .source
            .ok_or_else(|| PipelineError::Config("pipeline has no source".into()))?;
        let (mut consumer, sink_metrics) = self
            .sink
            .ok_or_else(|| PipelineError::Config("pipeline has no sink".into()))??;

        let mut metrics = vec![sink_metrics];
        for pending in self.transforms.into_iter().rev() {
            let downstream_name = consumer.name().to_string();
            let stage = TransformStage::new(
                pending.name.clone(),
                pending.transform,
                pending.buffer_capacity,
                consumer,
                pending.metrics.clone(),
            )?;
            tracing::debug!(
                "linked '{}' -> '{}' as {:?}, {} byte buffer",
                pending.name,
                downstream_name,
                stage.output_representation(),
                stage.capacity()
            );
            metrics.push(pending.metrics);
            consumer = Box::new(stage);
        }

        let downstream_name = consumer.name().to_string();
        let chunk_source = ChunkSource::new(
            source.name.clone(),
            source.input,
            source.buffer_capacity,
            consumer,
            source.metrics.clone(),
        )?;
        tracing::debug!(
            "linked '{}' -> '{}' as {:?}, {} byte reads",
            source.name,
            downstream_name,
            chunk_source.output_representation(),
            chunk_source.capacity()
        );
        metrics.push(source.metrics);
        metrics.reverse();

        Ok(Pipeline {
            source: chunk_source,
            metrics,
            has_run: false,
        })
    }
}

impl<R: Read> Default for PipelineBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// A wired pipeline, ready to run once
pub struct Pipeline<R: Read> {
    source: ChunkSource<R>,
    metrics: Vec<StageMetrics>,
    has_run: bool,
}

impl<R: Read> Pipeline<R> {
    /// Stream the whole input through every stage
    pub fn run(&mut self) -> Result<()> {
        if self.has_run {
            return Err(PipelineError::AlreadyRun);
        }
        self.has_run = true;

        tracing::debug!("running pipeline with {} stages", self.metrics.len());
        let result = self.source.run();
        if let Some(flush_error) = self.source.take_flush_error() {
            tracing::warn!("end-of-stream flush after a failed read also failed: {}", flush_error);
        }
        match &result {
            Ok(()) => tracing::info!(
                "pipeline finished: {} bytes in, {} bytes out",
                self.metrics.first().map_or(0, StageMetrics::total_bytes_in),
                self.metrics.last().map_or(0, StageMetrics::total_bytes_out),
            ),
            Err(e) => tracing::debug!("pipeline aborted: {}", e),
        }
        result
    }

    /// Check if the pipeline has already been run
    pub fn has_run(&self) -> bool {
        self.has_run
    }

    /// Number of stages, source and sink included
    pub fn stage_count(&self) -> usize {
        self.metrics.len()
    }

    /// Get metrics for a specific stage; 0 is the source
    pub fn stage_metrics(&self, index: usize) -> Option<&StageMetrics> {
        self.metrics.get(index)
    }

    /// Get all stage metrics, source first
    pub fn all_metrics(&self) -> &[StageMetrics] {
        &self.metrics
    }

    /// Get a summary of all metrics
    pub fn metrics_summary(&self) -> String {
        let mut summary = String::from("Pipeline Metrics Summary:\n");
        for (i, metrics) in self.metrics.iter().enumerate() {
            summary.push_str(&format!("  Stage {}: {}\n", i, metrics.snapshot()));
        }
        summary
    }
}

/// Build a pipeline from configuration values and ready-to-use streams
pub fn assemble<R: Read, W: Write + 'static>(
    config: &PipelineConfig,
    registry: &StageRegistry,
    input: R,
    output: W,
) -> Result<Pipeline<R>> {
    let mut builder = PipelineBuilder::new().source("reader", input, config.reader.buffer_size);
    for entry in &config.transforms {
        let transform = registry.create(entry)?;
        let name = transform.name().to_string();
        builder = builder.transform(name, transform, entry.buffer_size);
    }
    builder
        .sink("writer", output, config.writer.buffer_size)
        .build()
}
