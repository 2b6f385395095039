//! The persisted [`Chunk`] type: a 2-byte sample-count header followed by a
//! schema/spans preamble and a sequence of delta/DoD/XOR-encoded samples.
//!
//! This module owns the header and preamble codec (reading/writing
//! `schema`, `positive_spans`, `negative_spans`); per-sample encoding lives
//! in [`appender`], decoding in [`iterator`], and the in-place layout
//! rewrite in [`recode`].

pub mod appender;
pub mod iterator;
mod recode;

pub use appender::Appender;
pub use iterator::HistoIterator;

use crate::bitstream::{BitReader, BitWriter};
use crate::error::HistoChunkError;
use crate::histogram::Span;
use crate::varint::{read_ivarint, read_uvarint, write_ivarint, write_uvarint};

/// Encoding tag identifying a sparse-histogram chunk to whatever block
/// format stores it alongside other chunk kinds. Not itself part of the
/// chunk's own byte buffer.
pub const ENCODING_TAG: u8 = 0x10;

/// Sanity cap on the total number of populated buckets a single span list
/// may describe, guarding against a corrupt length varint driving an
/// unbounded allocation.
const MAX_SPAN_BUCKETS: u64 = 1 << 20;

/// Allocation tunables for a [`Chunk`]. Not part of the wire format.
#[derive(Debug, Clone, Copy)]
pub struct ChunkOptions {
    /// Bytes to pre-allocate when a chunk is created.
    pub initial_capacity: usize,
    /// [`Chunk::compact`] only shrinks the backing buffer once its spare
    /// capacity exceeds this many bytes.
    pub compact_slack_threshold: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            initial_capacity: 128,
            compact_slack_threshold: 64,
        }
    }
}

/// A self-contained, append-only byte buffer holding a bounded run of
/// sparse-histogram observations sharing one schema.
///
/// The first two bytes are a big-endian sample count; everything after is a
/// bit-packed stream starting with the schema/spans preamble.
#[derive(Debug, Clone)]
pub struct Chunk {
    writer: BitWriter,
    options: ChunkOptions,
}

impl Chunk {
    /// Creates an empty chunk with default allocation tunables.
    pub fn new() -> Self {
        Self::with_options(ChunkOptions::default())
    }

    pub fn with_options(options: ChunkOptions) -> Self {
        let mut writer = BitWriter::with_capacity(options.initial_capacity);
        writer.write_bits(0, 16);
        Self { writer, options }
    }

    pub fn encoding(&self) -> u8 {
        ENCODING_TAG
    }

    /// The chunk's persistent byte form: a 2-byte sample count followed by
    /// the preamble and sample bitstream.
    pub fn bytes(&self) -> &[u8] {
        self.writer.bytes()
    }

    pub fn num_samples(&self) -> u16 {
        let bytes = self.writer.bytes();
        u16::from_be_bytes([bytes[0], bytes[1]])
    }

    pub(crate) fn set_num_samples(&mut self, n: u16) {
        self.writer.overwrite_bytes(0, &n.to_be_bytes());
    }

    pub(crate) fn writer_mut(&mut self) -> &mut BitWriter {
        &mut self.writer
    }

    /// Reads the schema/spans preamble.
    ///
    /// # Panics
    ///
    /// Panics if the chunk has zero samples. Use [`Chunk::try_meta`] for a
    /// non-panicking variant.
    pub fn meta(&self) -> (i32, Vec<Span>, Vec<Span>) {
        self.try_meta().expect("meta() called on an empty chunk")
    }

    pub fn try_meta(&self) -> Result<(i32, Vec<Span>, Vec<Span>), HistoChunkError> {
        if self.num_samples() == 0 {
            return Err(HistoChunkError::EmptyChunk);
        }
        let body = &self.writer.bytes()[2..];
        let total_bits = self.writer.len_bits() - 16;
        let mut r = BitReader::new(body, total_bits);
        read_meta(&mut r)
    }

    /// Shrinks the backing buffer's capacity to its length, but only once
    /// spare capacity exceeds [`ChunkOptions::compact_slack_threshold`].
    /// Never shrinks below the current length; a no-op if already compact.
    pub fn compact(&mut self) {
        let slack = self.writer.capacity() - self.writer.bytes().len();
        let span = tracing::debug_span!("compact", slack, threshold = self.options.compact_slack_threshold);
        let _enter = span.enter();
        if slack > self.options.compact_slack_threshold {
            self.writer.shrink_to_fit();
        }
    }

    /// Rebuilds an [`Appender`] bound to this chunk by replaying its
    /// existing samples through a fresh [`HistoIterator`]. Cheap for an
    /// empty chunk; for a populated one the cost is proportional to the
    /// chunk's current sample count.
    pub fn appender(&mut self) -> Result<Appender<'_>, HistoChunkError> {
        Appender::rehydrate(self)
    }

    /// Creates an iterator over this chunk's current samples. `reuse`, if
    /// given, is reset in place instead of allocating a new one.
    pub fn iterator<'a>(&'a self, reuse: Option<HistoIterator<'a>>) -> HistoIterator<'a> {
        let mut it = reuse.unwrap_or_default();
        it.reset(self.bytes());
        it
    }
}

impl Default for Chunk {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn write_meta(w: &mut BitWriter, schema: i32, positive_spans: &[Span], negative_spans: &[Span]) {
    write_ivarint(w, schema as i64);
    write_spans(w, positive_spans);
    write_spans(w, negative_spans);
}

fn write_spans(w: &mut BitWriter, spans: &[Span]) {
    write_uvarint(w, spans.len() as u64);
    for span in spans {
        write_ivarint(w, span.offset as i64);
        write_uvarint(w, span.length as u64);
    }
}

pub(crate) fn read_meta(r: &mut BitReader<'_>) -> Result<(i32, Vec<Span>, Vec<Span>), HistoChunkError> {
    let schema = read_ivarint(r)? as i32;
    let positive_spans = read_spans(r)?;
    let negative_spans = read_spans(r)?;
    Ok((schema, positive_spans, negative_spans))
}

fn read_spans(r: &mut BitReader<'_>) -> Result<Vec<Span>, HistoChunkError> {
    let count = read_uvarint(r)?;
    if count > MAX_SPAN_BUCKETS {
        return Err(HistoChunkError::Corrupt(format!(
            "span list length {count} exceeds sanity cap"
        )));
    }
    let mut spans = Vec::with_capacity(count as usize);
    let mut total_length: u64 = 0;
    for _ in 0..count {
        let offset = read_ivarint(r)? as i32;
        let length = read_uvarint(r)?;
        total_length += length;
        if total_length > MAX_SPAN_BUCKETS {
            return Err(HistoChunkError::Corrupt(format!(
                "span bucket count {total_length} exceeds sanity cap"
            )));
        }
        spans.push(Span::new(offset, length as u32));
    }
    Ok(spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_chunk_is_empty_with_just_the_header() {
        let chunk = Chunk::new();
        assert_eq!(chunk.num_samples(), 0);
        assert_eq!(chunk.bytes(), &[0u8, 0u8]);
    }

    #[test]
    fn try_meta_on_empty_chunk_returns_empty_chunk_error() {
        let chunk = Chunk::new();
        assert_eq!(chunk.try_meta(), Err(HistoChunkError::EmptyChunk));
    }

    #[test]
    #[should_panic(expected = "meta() called on an empty chunk")]
    fn meta_on_empty_chunk_panics() {
        let chunk = Chunk::new();
        let _ = chunk.meta();
    }

    #[test]
    fn meta_roundtrips_schema_and_spans() {
        let mut w = BitWriter::new();
        let positive = vec![Span::new(0, 2), Span::new(3, 1)];
        let negative = vec![Span::new(-1, 1)];
        write_meta(&mut w, 3, &positive, &negative);
        let bytes = w.into_bytes();
        let mut r = BitReader::new(&bytes, bytes.len() * 8);
        let (schema, pos, neg) = read_meta(&mut r).unwrap();
        assert_eq!(schema, 3);
        assert_eq!(pos, positive);
        assert_eq!(neg, negative);
    }

    #[test]
    fn compact_shrinks_once_slack_exceeds_threshold() {
        let mut chunk = Chunk::with_options(ChunkOptions {
            initial_capacity: 4096,
            compact_slack_threshold: 8,
        });
        assert!(chunk.writer.capacity() >= 4096);
        chunk.compact();
        assert!(chunk.writer.capacity() < 4096);
        assert!(chunk.writer.capacity() >= chunk.bytes().len());
    }
}
