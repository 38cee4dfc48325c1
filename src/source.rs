use crate::buffer::StageBuffer;
use crate::error::{PipelineError, Result};
use crate::link::{Consumer, Downstream, Outlet, Representation};
use crate::metrics::StageMetrics;
use std::io::Read;
use std::time::Instant;

/// Everything a source can hand out; the buffer is reinterpreted on pull
const SOURCE_OFFERS: &[Representation] = &[
    Representation::Bytes,
    Representation::Chars,
    Representation::Ints,
];

/// The head of a pipeline: reads the external input one chunk at a time and
/// drives everything downstream
pub struct ChunkSource<R: Read> {
    name: String,
    input: R,
    buffer: StageBuffer,
    downstream: Downstream,
    metrics: StageMetrics,
    flush_error: Option<PipelineError>,
}

impl<R: Read> ChunkSource<R> {
    /// Create a source reading up to `capacity` bytes at a time, wired into `consumer`
    pub fn new(
        name: impl Into<String>,
        input: R,
        capacity: usize,
        consumer: Box<dyn Consumer>,
        metrics: StageMetrics,
    ) -> Result<Self> {
        let name = name.into();
        let buffer = StageBuffer::for_stage(&name, capacity)?;
        let downstream = Downstream::connect(&name, SOURCE_OFFERS, consumer)?;
        let representation = downstream.representation();
        if capacity % representation.unit_width() != 0 {
            return Err(PipelineError::Misaligned {
                stage: name,
                representation,
                len: capacity,
            });
        }
        Ok(Self {
            name,
            input,
            buffer,
            downstream,
            metrics,
            flush_error: None,
        })
    }

    /// Representation negotiated with the next stage
    pub fn output_representation(&self) -> Representation {
        self.downstream.representation()
    }

    /// Size of each read in bytes
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Take the error from the end-of-stream flush sent after a failed read.
    ///
    /// `run` returns the read error itself, so a failing flush is only
    /// reported here.
    pub fn take_flush_error(&mut self) -> Option<PipelineError> {
        self.flush_error.take()
    }

    /// Pump the whole input through the pipeline, then send end of stream.
    ///
    /// A read failure after at least one chunk went out still sends end of
    /// stream, so downstream buffers are flushed, before the read error is
    /// returned. A failure of that flush is kept for [`Self::take_flush_error`].
    pub fn run(&mut self) -> Result<()> {
        let mut first = true;
        loop {
            let start = Instant::now();
            let n = match self.buffer.read_from(&mut self.input) {
                Ok(n) => n,
                Err(e) => {
                    let err = PipelineError::io(&self.name, e);
                    if !first {
                        self.buffer.clear();
                        self.flush_error = self.notify().err();
                    }
                    return Err(err);
                }
            };
            first = false;

            if n == 0 {
                let result = self.notify();
                self.metrics.record_chunk(0, start.elapsed());
                return result;
            }

            self.metrics.record_output(n);
            self.notify()?;
            self.metrics.record_chunk(n, start.elapsed());
        }
    }

    fn notify(&mut self) -> Result<()> {
        let outlet = Outlet {
            stage: &self.name,
            offers: SOURCE_OFFERS,
            buffer: &self.buffer,
        };
        self.downstream.notify(&outlet)
    }
}
