//! Run-length encoding transform.
//!
//! The encoded stream is a sequence of records with no header or footer.
//! Each record starts with a signed control byte:
//!
//! | control      | record  | payload                              |
//! |--------------|---------|--------------------------------------|
//! | `1..=127`    | run     | one byte, repeated `control` times   |
//! | `-128..=-1`  | literal | `-control` bytes, copied verbatim    |
//! | `0`          | never produced, rejected by the decoder        |
//!
//! The encoder works on each chunk independently, so a run that straddles a
//! chunk boundary becomes two records. The decoder keeps state across chunks
//! because records in the encoded stream are split wherever the upstream
//! buffer happens to end.

use crate::error::{PipelineError, Result};
use crate::stage::{ByteSink, Transform};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longest run a single record can describe
pub const MAX_RUN: usize = 127;

/// Longest literal a single record can carry
pub const MAX_LITERAL: usize = 128;

/// Which direction the codec stage works in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Mode {
    Encode,
    Decode,
}

impl FromStr for Mode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("encode") {
            Ok(Mode::Encode)
        } else if s.eq_ignore_ascii_case("decode") {
            Ok(Mode::Decode)
        } else {
            Err(PipelineError::Config(format!(
                "unknown mode '{s}', expected ENCODE or DECODE"
            )))
        }
    }
}

impl TryFrom<String> for Mode {
    type Error = PipelineError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Mode> for String {
    fn from(mode: Mode) -> Self {
        mode.to_string()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Encode => f.write_str("ENCODE"),
            Mode::Decode => f.write_str("DECODE"),
        }
    }
}

/// Build the codec transform for `mode`
pub fn codec(mode: Mode) -> Box<dyn Transform> {
    match mode {
        Mode::Encode => Box::new(RleEncoder),
        Mode::Decode => Box::new(RleDecoder::default()),
    }
}

/// The record being accumulated by the encoder
#[derive(Debug, Clone, Copy)]
enum Record {
    Run { value: u8, len: usize },
    Literal { start: usize, len: usize },
}

/// Where classification restarts from; decides the shape of a lone trailing byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Restart {
    AfterRun,
    AfterLiteral,
}

/// Classify the record beginning at `pos`. Returns it with the index of the
/// first byte it has not consumed.
fn start_record(bytes: &[u8], pos: usize, restart: Restart) -> (Option<Record>, usize) {
    match bytes.len() - pos {
        0 => (None, pos),
        1 if restart == Restart::AfterLiteral => (Some(Record::Literal { start: pos, len: 1 }), pos + 1),
        1 => (
            Some(Record::Run {
                value: bytes[pos],
                len: 1,
            }),
            pos + 1,
        ),
        _ if bytes[pos] == bytes[pos + 1] => (
            Some(Record::Run {
                value: bytes[pos],
                len: 2,
            }),
            pos + 2,
        ),
        _ => (Some(Record::Literal { start: pos, len: 2 }), pos + 2),
    }
}

fn emit(record: Record, bytes: &[u8], out: &mut dyn ByteSink) -> Result<()> {
    match record {
        Record::Run { value, len } => {
            out.put(len as u8)?;
            out.put(value)
        }
        Record::Literal { start, len } => {
            out.put((len as i16).wrapping_neg() as u8)?;
            out.put_slice(&bytes[start..start + len])
        }
    }
}

/// Encode one chunk as a self-contained record sequence
pub fn encode_chunk(bytes: &[u8], out: &mut dyn ByteSink) -> Result<()> {
    let (mut record, mut pos) = start_record(bytes, 0, Restart::AfterRun);

    while let Some(current) = record {
        match current {
            Record::Run { len, .. } if len == MAX_RUN => {
                emit(current, bytes, out)?;
                (record, pos) = start_record(bytes, pos, Restart::AfterRun);
                continue;
            }
            Record::Literal { len, .. } if len == MAX_LITERAL => {
                emit(current, bytes, out)?;
                (record, pos) = start_record(bytes, pos, Restart::AfterLiteral);
                continue;
            }
            _ => {}
        }

        let Some(&byte) = bytes.get(pos) else {
            break;
        };

        match current {
            Record::Run { value, len } if byte == value => {
                record = Some(Record::Run { value, len: len + 1 });
                pos += 1;
            }
            Record::Run { .. } => {
                emit(current, bytes, out)?;
                (record, pos) = start_record(bytes, pos, Restart::AfterRun);
            }
            Record::Literal { start, len } if byte == bytes[pos - 1] => {
                // The last literal byte and this one open a run.
                emit(Record::Literal { start, len: len - 1 }, bytes, out)?;
                record = Some(Record::Run { value: byte, len: 2 });
                pos += 1;
            }
            Record::Literal { start, len } => {
                record = Some(Record::Literal { start, len: len + 1 });
                pos += 1;
            }
        }
    }

    match record {
        Some(current) => emit(current, bytes, out),
        None => Ok(()),
    }
}

/// Encoder half of the codec; holds no state between chunks
#[derive(Debug, Default)]
pub struct RleEncoder;

impl Transform for RleEncoder {
    fn process(&mut self, input: Option<&[u8]>, out: &mut dyn ByteSink) -> Result<()> {
        match input {
            Some(bytes) => encode_chunk(bytes, out),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "rle-encode"
    }
}

/// Decoder half of the codec
///
/// At most one of the pending fields is non-zero at any time.
#[derive(Debug, Default)]
pub struct RleDecoder {
    /// A run control byte ended the previous chunk; its value byte is next
    pending_run: usize,
    /// Literal bytes still owed by the previous chunk's last record
    pending_literal: usize,
}

impl RleDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if a record was left incomplete by the last chunk
    pub fn has_pending(&self) -> bool {
        self.pending_run != 0 || self.pending_literal != 0
    }

    /// Decode one chunk of the encoded stream
    pub fn decode_chunk(&mut self, bytes: &[u8], out: &mut dyn ByteSink) -> Result<()> {
        debug_assert!(self.pending_run == 0 || self.pending_literal == 0);
        if bytes.is_empty() {
            return Ok(());
        }

        let mut pos = 0;
        if self.pending_run > 0 {
            out.put_repeated(bytes[0], self.pending_run)?;
            self.pending_run = 0;
            pos = 1;
        } else if self.pending_literal > 0 {
            let n = self.pending_literal.min(bytes.len());
            out.put_slice(&bytes[..n])?;
            self.pending_literal -= n;
            pos = n;
        }

        while pos < bytes.len() {
            let control = bytes[pos] as i8;
            if control == 0 {
                return Err(PipelineError::malformed(
                    self.name(),
                    "zero control byte",
                ));
            }
            pos += 1;

            if control > 0 {
                let count = control as usize;
                match bytes.get(pos) {
                    Some(&value) => {
                        out.put_repeated(value, count)?;
                        pos += 1;
                    }
                    None => self.pending_run = count,
                }
            } else {
                let need = (control as i16).unsigned_abs() as usize;
                let take = need.min(bytes.len() - pos);
                out.put_slice(&bytes[pos..pos + take])?;
                self.pending_literal = need - take;
                pos += take;
            }
        }
        Ok(())
    }

    /// Check the stream ended on a record boundary
    pub fn finish(&mut self) -> Result<()> {
        if self.pending_run > 0 {
            let count = std::mem::take(&mut self.pending_run);
            return Err(PipelineError::malformed(
                self.name(),
                format!("stream ended before the value of a run of {count}"),
            ));
        }
        if self.pending_literal > 0 {
            let missing = std::mem::take(&mut self.pending_literal);
            return Err(PipelineError::malformed(
                self.name(),
                format!("stream ended {missing} bytes short of a literal"),
            ));
        }
        Ok(())
    }
}

impl Transform for RleDecoder {
    fn process(&mut self, input: Option<&[u8]>, out: &mut dyn ByteSink) -> Result<()> {
        match input {
            Some(bytes) => self.decode_chunk(bytes, out),
            None => self.finish(),
        }
    }

    fn name(&self) -> &str {
        "rle-decode"
    }
}
