use crate::buffer::StageBuffer;
use crate::error::Result;
use crate::link::{Chunk, Consumer, Downstream, Outlet, Provider, Representation};
use crate::metrics::StageMetrics;
use std::time::Instant;

/// Representations a transform stage offers and accepts
const BYTE_LINK: &[Representation] = &[Representation::Bytes];

/// Destination for the bytes a transform produces
///
/// Every call is fallible because a write may fill the stage buffer and
/// trigger a downstream flush.
pub trait ByteSink {
    fn put(&mut self, byte: u8) -> Result<()>;

    fn put_slice(&mut self, bytes: &[u8]) -> Result<()> {
        for &byte in bytes {
            self.put(byte)?;
        }
        Ok(())
    }

    fn put_repeated(&mut self, byte: u8, count: usize) -> Result<()> {
        for _ in 0..count {
            self.put(byte)?;
        }
        Ok(())
    }
}

impl ByteSink for Vec<u8> {
    fn put(&mut self, byte: u8) -> Result<()> {
        self.push(byte);
        Ok(())
    }

    fn put_slice(&mut self, bytes: &[u8]) -> Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }

    fn put_repeated(&mut self, byte: u8, count: usize) -> Result<()> {
        self.resize(self.len() + count, byte);
        Ok(())
    }
}

/// Trait for the processing core of a transform stage
pub trait Transform: 'static {
    /// Process one chunk, or the end-of-stream notice when `input` is `None`.
    /// Output goes to `out`; flushing it at end of stream is the stage's job.
    fn process(&mut self, input: Option<&[u8]>, out: &mut dyn ByteSink) -> Result<()>;

    /// Get a human-readable name for this transform
    fn name(&self) -> &str {
        "transform"
    }
}

/// A stage's output buffer together with the link it flushes into
pub struct ChunkWriter {
    stage: String,
    buffer: StageBuffer,
    downstream: Downstream,
    metrics: StageMetrics,
}

impl ChunkWriter {
    /// Hand the buffered bytes downstream, if there are any
    pub fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.metrics.record_output(self.buffer.len());
        let result = self.notify_downstream();
        self.buffer.clear();
        result
    }

    /// Flush the tail, then send the end-of-stream notice
    pub fn finish(&mut self) -> Result<()> {
        self.flush()?;
        self.notify_downstream()
    }

    fn notify_downstream(&mut self) -> Result<()> {
        let outlet = Outlet {
            stage: &self.stage,
            offers: BYTE_LINK,
            buffer: &self.buffer,
        };
        self.downstream.notify(&outlet)
    }
}

impl ByteSink for ChunkWriter {
    fn put(&mut self, byte: u8) -> Result<()> {
        if self.buffer.push(byte) {
            self.flush()?;
        }
        Ok(())
    }

    fn put_slice(&mut self, mut bytes: &[u8]) -> Result<()> {
        while !bytes.is_empty() {
            let n = self.buffer.extend_from(bytes);
            bytes = &bytes[n..];
            if self.buffer.is_full() {
                self.flush()?;
            }
        }
        Ok(())
    }
}

/// Runs a [`Transform`] between two links
pub struct TransformStage {
    transform: Box<dyn Transform>,
    representation: Representation,
    writer: ChunkWriter,
    metrics: StageMetrics,
}

impl TransformStage {
    /// Create a stage with an output buffer of `capacity` bytes, wired into `consumer`
    pub fn new(
        name: impl Into<String>,
        transform: Box<dyn Transform>,
        capacity: usize,
        consumer: Box<dyn Consumer>,
        metrics: StageMetrics,
    ) -> Result<Self> {
        let name = name.into();
        let buffer = StageBuffer::for_stage(&name, capacity)?;
        let downstream = Downstream::connect(&name, BYTE_LINK, consumer)?;
        Ok(Self {
            transform,
            representation: Representation::Bytes,
            writer: ChunkWriter {
                stage: name,
                buffer,
                downstream,
                metrics: metrics.clone(),
            },
            metrics,
        })
    }

    /// Representation negotiated with the next stage
    pub fn output_representation(&self) -> Representation {
        self.writer.downstream.representation()
    }

    /// Size of the output buffer in bytes
    pub fn capacity(&self) -> usize {
        self.writer.buffer.capacity()
    }
}

impl Consumer for TransformStage {
    fn name(&self) -> &str {
        &self.writer.stage
    }

    fn accepts(&self) -> &[Representation] {
        BYTE_LINK
    }

    fn bind(&mut self, representation: Representation) {
        self.representation = representation;
    }

    fn notify(&mut self, upstream: &dyn Provider) -> Result<()> {
        let start = Instant::now();
        let input = upstream.pull(self.representation)?.map(Chunk::into_bytes);

        self.transform.process(input.as_deref(), &mut self.writer)?;
        if input.is_none() {
            self.writer.finish()?;
        }

        self.metrics
            .record_chunk(input.as_ref().map_or(0, Vec::len), start.elapsed());
        Ok(())
    }
}

/// A transform that hands its input through unchanged
#[derive(Debug, Default)]
pub struct PassthroughStage;

impl Transform for PassthroughStage {
    fn process(&mut self, input: Option<&[u8]>, out: &mut dyn ByteSink) -> Result<()> {
        match input {
            Some(bytes) => out.put_slice(bytes),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}
