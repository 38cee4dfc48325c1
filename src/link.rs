//! The link protocol between adjacent stages.
//!
//! A link is negotiated once, when the pipeline is wired: the consumer's
//! preference list is walked in order and the first representation the
//! provider also offers wins. At run time the provider calls
//! [`Consumer::notify`], and the consumer pulls an owned [`Chunk`] in the
//! negotiated representation. `None` from a pull is the end-of-stream notice.

use crate::buffer::StageBuffer;
use crate::error::{PipelineError, Result};

/// The shapes a chunk can take when it crosses a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Representation {
    /// Raw bytes
    Bytes,
    /// Big-endian 16-bit character codes
    Chars,
    /// Big-endian 32-bit integers
    Ints,
}

impl Representation {
    /// Number of bytes in one unit of this representation
    pub fn unit_width(self) -> usize {
        match self {
            Representation::Bytes => 1,
            Representation::Chars => 2,
            Representation::Ints => 4,
        }
    }
}

/// An owned chunk of data in one representation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Bytes(Vec<u8>),
    Chars(Vec<u16>),
    Ints(Vec<i32>),
}

impl Chunk {
    /// Reinterpret raw bytes as `representation`.
    ///
    /// Fails with the byte length if it is not a multiple of the unit width.
    pub fn from_bytes(
        representation: Representation,
        bytes: &[u8],
    ) -> std::result::Result<Self, usize> {
        if bytes.len() % representation.unit_width() != 0 {
            return Err(bytes.len());
        }
        Ok(match representation {
            Representation::Bytes => Chunk::Bytes(bytes.to_vec()),
            Representation::Chars => Chunk::Chars(
                bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect(),
            ),
            Representation::Ints => Chunk::Ints(
                bytes
                    .chunks_exact(4)
                    .map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
        })
    }

    /// Length in bytes
    pub fn byte_len(&self) -> usize {
        match self {
            Chunk::Bytes(b) => b.len(),
            Chunk::Chars(c) => c.len() * 2,
            Chunk::Ints(i) => i.len() * 4,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.byte_len() == 0
    }

    /// Convert back to the raw bytes the chunk was built from
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Chunk::Bytes(b) => b,
            Chunk::Chars(c) => c.iter().flat_map(|v| v.to_be_bytes()).collect(),
            Chunk::Ints(i) => i.iter().flat_map(|v| v.to_be_bytes()).collect(),
        }
    }
}

/// Pick the first representation in the consumer's preference order that the
/// provider also offers
pub fn negotiate(consumer: &[Representation], provider: &[Representation]) -> Option<Representation> {
    consumer.iter().copied().find(|r| provider.contains(r))
}

/// The upstream side of a link, as seen by a consumer during `notify`
pub trait Provider {
    /// Stage name used in error reports
    fn name(&self) -> &str;

    /// Representations this provider can hand out, in its own order
    fn offers(&self) -> &[Representation];

    /// Fetch a fresh copy of the current chunk, or `None` at end of stream
    fn pull(&self, representation: Representation) -> Result<Option<Chunk>>;
}

/// The downstream side of a link
pub trait Consumer {
    /// Stage name used in error reports
    fn name(&self) -> &str;

    /// Representations this consumer accepts, most preferred first
    fn accepts(&self) -> &[Representation];

    /// Record the representation negotiated for the incoming link
    fn bind(&mut self, representation: Representation);

    /// Data (or end of stream) is ready to be pulled from `upstream`.
    ///
    /// Returns only after everything downstream has handled the induced data.
    fn notify(&mut self, upstream: &dyn Provider) -> Result<()>;
}

/// A provider view over a stage's buffer
pub struct Outlet<'a> {
    pub stage: &'a str,
    pub offers: &'a [Representation],
    pub buffer: &'a StageBuffer,
}

impl Provider for Outlet<'_> {
    fn name(&self) -> &str {
        self.stage
    }

    fn offers(&self) -> &[Representation] {
        self.offers
    }

    fn pull(&self, representation: Representation) -> Result<Option<Chunk>> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        Chunk::from_bytes(representation, self.buffer.as_slice())
            .map(Some)
            .map_err(|len| PipelineError::Misaligned {
                stage: self.stage.to_string(),
                representation,
                len,
            })
    }
}

/// A negotiated connection to the next stage
pub struct Downstream {
    consumer: Box<dyn Consumer>,
    representation: Representation,
}

impl Downstream {
    /// Negotiate a link from a provider offering `offers` into `consumer`
    pub fn connect(
        provider: &str,
        offers: &[Representation],
        mut consumer: Box<dyn Consumer>,
    ) -> Result<Self> {
        let representation = negotiate(consumer.accepts(), offers).ok_or_else(|| {
            PipelineError::NoCommonRepresentation {
                provider: provider.to_string(),
                consumer: consumer.name().to_string(),
            }
        })?;
        consumer.bind(representation);
        Ok(Self {
            consumer,
            representation,
        })
    }

    /// The representation negotiated for this link
    pub fn representation(&self) -> Representation {
        self.representation
    }

    /// Signal the consumer that `upstream` has data (or end of stream)
    pub fn notify(&mut self, upstream: &dyn Provider) -> Result<()> {
        self.consumer.notify(upstream)
    }
}
