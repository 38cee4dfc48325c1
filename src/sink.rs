use crate::buffer::StageBuffer;
use crate::error::{PipelineError, Result};
use crate::link::{Chunk, Consumer, Provider, Representation};
use crate::metrics::StageMetrics;
use std::io::Write;
use std::time::Instant;

/// Default preference order of a sink
pub const SINK_ACCEPTS: &[Representation] = &[
    Representation::Bytes,
    Representation::Ints,
    Representation::Chars,
];

/// The tail of a pipeline: buffers incoming bytes and writes them to the
/// external output whenever the buffer fills, and once more at end of stream
pub struct ChunkSink<W: Write> {
    name: String,
    output: W,
    buffer: StageBuffer,
    accepts: Vec<Representation>,
    representation: Representation,
    metrics: StageMetrics,
}

impl<W: Write> ChunkSink<W> {
    /// Create a sink that writes `capacity` bytes at a time to `output`
    pub fn new(
        name: impl Into<String>,
        output: W,
        capacity: usize,
        metrics: StageMetrics,
    ) -> Result<Self> {
        let name = name.into();
        let buffer = StageBuffer::for_stage(&name, capacity)?;
        Ok(Self {
            name,
            output,
            buffer,
            accepts: SINK_ACCEPTS.to_vec(),
            representation: Representation::Bytes,
            metrics,
        })
    }

    /// Replace the preference order used when the incoming link is negotiated
    pub fn with_accepts(mut self, accepts: &[Representation]) -> Self {
        self.accepts = accepts.to_vec();
        self
    }

    /// Representation negotiated with the previous stage
    pub fn input_representation(&self) -> Representation {
        self.representation
    }

    /// Size of the write buffer in bytes
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    fn write_buffer(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let len = self.buffer.len();
        let result = self.output.write_all(self.buffer.as_slice());
        self.buffer.clear();
        result.map_err(|e| PipelineError::io(&self.name, e))?;
        self.metrics.record_output(len);
        Ok(())
    }

    fn accept(&mut self, mut bytes: &[u8]) -> Result<()> {
        while !bytes.is_empty() {
            let n = self.buffer.extend_from(bytes);
            bytes = &bytes[n..];
            if self.buffer.is_full() {
                self.write_buffer()?;
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.write_buffer()?;
        self.output
            .flush()
            .map_err(|e| PipelineError::io(&self.name, e))
    }
}

impl<W: Write + 'static> Consumer for ChunkSink<W> {
    fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self) -> &[Representation] {
        &self.accepts
    }

    fn bind(&mut self, representation: Representation) {
        self.representation = representation;
    }

    fn notify(&mut self, upstream: &dyn Provider) -> Result<()> {
        let start = Instant::now();
        let (len, result) = match upstream.pull(self.representation)? {
            Some(chunk) => {
                let bytes = Chunk::into_bytes(chunk);
                (bytes.len(), self.accept(&bytes))
            }
            None => (0, self.finish()),
        };
        self.metrics.record_chunk(len, start.elapsed());
        result
    }
}
