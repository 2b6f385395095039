//! Forward-only decoder that replays a chunk's byte buffer into a sequence
//! of [`SparseHistogram`] observations.

use crate::bitstream::BitReader;
use crate::error::HistoChunkError;
use crate::histogram::{Span, SparseHistogram};
use crate::varint::{read_ivarint, read_uvarint};
use crate::vbbucket::read_dod;
use crate::xorfloat::XorDecoder;

use super::{read_meta, ENCODING_TAG};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    NotStarted,
    First,
    Subsequent,
}

/// State an [`super::Appender`] needs to resume encoding after a chunk has
/// been rehydrated by replaying it through an iterator to completion.
pub(crate) struct ResumeState {
    pub schema: i32,
    pub positive_spans: Vec<Span>,
    pub negative_spans: Vec<Span>,
    pub t: i64,
    pub count: u64,
    pub zero_count: u64,
    pub t_delta: i64,
    pub count_delta: i64,
    pub zero_count_delta: i64,
    pub xor: (u64, Option<(u8, u8)>),
    pub positive_buckets: Vec<i64>,
    pub negative_buckets: Vec<i64>,
    pub positive_bucket_deltas: Vec<i64>,
    pub negative_bucket_deltas: Vec<i64>,
}

/// Stateful, forward-only decoder over a chunk's bytes. There is no random
/// access: [`HistoIterator::seek`] is just repeated [`HistoIterator::next_sample`].
#[derive(Debug, Clone)]
pub struct HistoIterator<'a> {
    reader: BitReader<'a>,
    num_samples: u16,
    num_read: u16,
    stage: Stage,
    err: Option<HistoChunkError>,

    schema: i32,
    positive_spans: Vec<Span>,
    negative_spans: Vec<Span>,

    t: i64,
    count: u64,
    zero_count: u64,
    sum: f64,
    t_delta: i64,
    count_delta: i64,
    zero_count_delta: i64,
    xor: XorDecoder,

    positive_buckets: Vec<i64>,
    negative_buckets: Vec<i64>,
    positive_bucket_deltas: Vec<i64>,
    negative_bucket_deltas: Vec<i64>,
}

impl<'a> Default for HistoIterator<'a> {
    fn default() -> Self {
        Self {
            reader: BitReader::new(&[], 0),
            num_samples: 0,
            num_read: 0,
            stage: Stage::NotStarted,
            err: None,
            schema: 0,
            positive_spans: Vec::new(),
            negative_spans: Vec::new(),
            t: 0,
            count: 0,
            zero_count: 0,
            sum: 0.0,
            t_delta: 0,
            count_delta: 0,
            zero_count_delta: 0,
            xor: XorDecoder::new(),
            positive_buckets: Vec::new(),
            negative_buckets: Vec::new(),
            positive_bucket_deltas: Vec::new(),
            negative_bucket_deltas: Vec::new(),
        }
    }
}

impl<'a> HistoIterator<'a> {
    /// Creates an iterator over a chunk's byte buffer (2-byte header plus
    /// bitstream body).
    pub fn new(bytes: &'a [u8]) -> Self {
        let mut it = Self::default();
        it.reset(bytes);
        it
    }

    /// Re-points the iterator at a new buffer, clearing all accumulator
    /// state. Previously allocated bucket-vector capacity is retained.
    pub fn reset(&mut self, bytes: &'a [u8]) {
        self.num_samples = u16::from_be_bytes([bytes[0], bytes[1]]);
        self.reader = BitReader::new(&bytes[2..], (bytes.len() - 2) * 8);
        self.num_read = 0;
        self.stage = Stage::NotStarted;
        self.err = None;
        self.schema = 0;
        self.positive_spans.clear();
        self.negative_spans.clear();
        self.t = 0;
        self.count = 0;
        self.zero_count = 0;
        self.sum = 0.0;
        self.t_delta = 0;
        self.count_delta = 0;
        self.zero_count_delta = 0;
        self.xor = XorDecoder::new();
        self.positive_buckets.clear();
        self.negative_buckets.clear();
        self.positive_bucket_deltas.clear();
        self.negative_bucket_deltas.clear();
    }

    pub fn chunk_encoding(&self) -> u8 {
        ENCODING_TAG
    }

    /// The error that halted iteration, if any. `next_sample` returning
    /// `false` with `err()` still `None` means ordinary exhaustion.
    pub fn err(&self) -> Option<&HistoChunkError> {
        self.err.as_ref()
    }

    /// Advances to the next sample. Returns `false` on exhaustion or error.
    pub fn next_sample(&mut self) -> bool {
        if self.err.is_some() || self.num_read >= self.num_samples {
            return false;
        }
        match self.advance() {
            Ok(()) => {
                self.num_read += 1;
                true
            }
            Err(e) => {
                tracing::warn!(
                    bit_pos = self.reader.bit_pos(),
                    num_read = self.num_read,
                    error = %e,
                    "histogram chunk decode error"
                );
                self.err = Some(e);
                false
            }
        }
    }

    /// Advances the iterator until the current sample's timestamp is `>=
    /// t`, or exhaustion. Returns whether such a sample was reached.
    pub fn seek(&mut self, t: i64) -> bool {
        if self.num_read > 0 && self.t >= t {
            return true;
        }
        while self.next_sample() {
            if self.t >= t {
                return true;
            }
        }
        false
    }

    /// The current sample as a [`SparseHistogram`]. Only meaningful after a
    /// successful [`HistoIterator::next_sample`] call.
    pub fn at_histogram(&self) -> SparseHistogram {
        SparseHistogram {
            timestamp: self.t,
            count: self.count,
            zero_count: self.zero_count,
            sum: self.sum,
            schema: self.schema,
            positive_spans: self.positive_spans.clone(),
            negative_spans: self.negative_spans.clone(),
            positive_buckets: self.positive_buckets.clone(),
            negative_buckets: self.negative_buckets.clone(),
        }
    }

    /// This codec only ever stores histogram samples; there is no scalar
    /// `(timestamp, value)` pair to return.
    pub fn at(&self) -> ! {
        panic!("at() is not meaningful for a histogram chunk; use at_histogram()")
    }

    pub(crate) fn resume_state(&self) -> ResumeState {
        ResumeState {
            schema: self.schema,
            positive_spans: self.positive_spans.clone(),
            negative_spans: self.negative_spans.clone(),
            t: self.t,
            count: self.count,
            zero_count: self.zero_count,
            t_delta: self.t_delta,
            count_delta: self.count_delta,
            zero_count_delta: self.zero_count_delta,
            xor: self.xor.state(),
            positive_buckets: self.positive_buckets.clone(),
            negative_buckets: self.negative_buckets.clone(),
            positive_bucket_deltas: self.positive_bucket_deltas.clone(),
            negative_bucket_deltas: self.negative_bucket_deltas.clone(),
        }
    }

    fn advance(&mut self) -> Result<(), HistoChunkError> {
        match self.stage {
            Stage::NotStarted => self.advance_first(),
            Stage::First => self.advance_second(),
            Stage::Subsequent => self.advance_subsequent(),
        }
    }

    fn advance_first(&mut self) -> Result<(), HistoChunkError> {
        let (schema, positive_spans, negative_spans) = read_meta(&mut self.reader)?;
        let pos_len = SparseHistogram::span_bucket_count(&positive_spans);
        let neg_len = SparseHistogram::span_bucket_count(&negative_spans);

        self.schema = schema;
        self.positive_spans = positive_spans;
        self.negative_spans = negative_spans;

        self.t = read_ivarint(&mut self.reader)?;
        self.count = read_uvarint(&mut self.reader)?;
        self.zero_count = read_uvarint(&mut self.reader)?;
        self.sum = self.xor.decode_first(&mut self.reader)?;

        self.positive_buckets = Vec::with_capacity(pos_len);
        for _ in 0..pos_len {
            self.positive_buckets.push(read_ivarint(&mut self.reader)?);
        }
        self.negative_buckets = Vec::with_capacity(neg_len);
        for _ in 0..neg_len {
            self.negative_buckets.push(read_ivarint(&mut self.reader)?);
        }
        self.positive_bucket_deltas = vec![0i64; pos_len];
        self.negative_bucket_deltas = vec![0i64; neg_len];

        self.stage = Stage::First;
        Ok(())
    }

    fn advance_second(&mut self) -> Result<(), HistoChunkError> {
        self.t_delta = read_ivarint(&mut self.reader)?;
        self.count_delta = read_ivarint(&mut self.reader)?;
        self.zero_count_delta = read_ivarint(&mut self.reader)?;
        self.t = self.t.wrapping_add(self.t_delta);
        self.count = (self.count as i64 + self.count_delta) as u64;
        self.zero_count = (self.zero_count as i64 + self.zero_count_delta) as u64;
        self.sum = self.xor.decode_next(&mut self.reader)?;

        for i in 0..self.positive_buckets.len() {
            let delta = read_ivarint(&mut self.reader)?;
            self.positive_buckets[i] += delta;
            self.positive_bucket_deltas[i] = delta;
        }
        for i in 0..self.negative_buckets.len() {
            let delta = read_ivarint(&mut self.reader)?;
            self.negative_buckets[i] += delta;
            self.negative_bucket_deltas[i] = delta;
        }

        self.stage = Stage::Subsequent;
        Ok(())
    }

    fn advance_subsequent(&mut self) -> Result<(), HistoChunkError> {
        let t_dod = read_dod(&mut self.reader)?;
        let count_dod = read_dod(&mut self.reader)?;
        let zero_count_dod = read_dod(&mut self.reader)?;
        self.t_delta += t_dod;
        self.count_delta += count_dod;
        self.zero_count_delta += zero_count_dod;
        self.t = self.t.wrapping_add(self.t_delta);
        self.count = (self.count as i64 + self.count_delta) as u64;
        self.zero_count = (self.zero_count as i64 + self.zero_count_delta) as u64;
        self.sum = self.xor.decode_next(&mut self.reader)?;

        for i in 0..self.positive_buckets.len() {
            let dod = read_dod(&mut self.reader)?;
            let delta = self.positive_bucket_deltas[i] + dod;
            self.positive_buckets[i] += delta;
            self.positive_bucket_deltas[i] = delta;
        }
        for i in 0..self.negative_buckets.len() {
            let dod = read_dod(&mut self.reader)?;
            let delta = self.negative_bucket_deltas[i] + dod;
            self.negative_buckets[i] += delta;
            self.negative_bucket_deltas[i] = delta;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::appender::Appender;
    use crate::chunk::Chunk;

    fn sample(t: i64, count: u64, sum: f64, positive_buckets: Vec<i64>) -> SparseHistogram {
        SparseHistogram {
            timestamp: t,
            count,
            zero_count: 0,
            sum,
            schema: 0,
            positive_spans: vec![Span::new(0, positive_buckets.len() as u32)],
            negative_spans: vec![],
            positive_buckets,
            negative_buckets: vec![],
        }
    }

    #[test]
    fn iterating_an_empty_chunk_yields_nothing() {
        let chunk = Chunk::new();
        let mut it = chunk.iterator(None);
        assert!(!it.next_sample());
        assert!(it.err().is_none());
    }

    #[test]
    fn iterates_samples_in_order() {
        let mut chunk = Chunk::new();
        {
            let mut app = Appender::rehydrate(&mut chunk).unwrap();
            app.append_histogram(100, &sample(100, 5, 1.0, vec![5])).unwrap();
            app.append_histogram(160, &sample(160, 7, 1.5, vec![6])).unwrap();
            app.append_histogram(220, &sample(220, 9, 2.0, vec![8])).unwrap();
        }

        let mut it = chunk.iterator(None);
        let mut seen = Vec::new();
        while it.next_sample() {
            seen.push(it.at_histogram());
        }
        assert!(it.err().is_none());
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].timestamp, 100);
        assert_eq!(seen[1].timestamp, 160);
        assert_eq!(seen[2].timestamp, 220);
        assert_eq!(seen[2].positive_buckets, vec![8]);
        assert_eq!(seen[2].count, 9);
        assert!((seen[2].sum - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn seek_advances_to_first_sample_at_or_after_target() {
        let mut chunk = Chunk::new();
        {
            let mut app = Appender::rehydrate(&mut chunk).unwrap();
            app.append_histogram(100, &sample(100, 1, 0.0, vec![1])).unwrap();
            app.append_histogram(200, &sample(200, 2, 0.0, vec![2])).unwrap();
            app.append_histogram(300, &sample(300, 3, 0.0, vec![3])).unwrap();
        }

        let mut it = chunk.iterator(None);
        assert!(it.seek(150));
        assert_eq!(it.at_histogram().timestamp, 200);
        assert!(it.seek(200));
        assert_eq!(it.at_histogram().timestamp, 200);
        assert!(!it.seek(1000));
    }

    #[test]
    fn reset_reuses_the_iterator_for_a_different_buffer() {
        let mut a = Chunk::new();
        Appender::rehydrate(&mut a)
            .unwrap()
            .append_histogram(1, &sample(1, 1, 0.0, vec![1]))
            .unwrap();
        let mut b = Chunk::new();
        {
            let mut app = Appender::rehydrate(&mut b).unwrap();
            app.append_histogram(1, &sample(1, 1, 0.0, vec![1])).unwrap();
            app.append_histogram(2, &sample(2, 2, 0.0, vec![2])).unwrap();
        }

        let mut it = a.iterator(None);
        assert!(it.next_sample());
        assert!(!it.next_sample());

        let mut it = b.iterator(Some(it));
        let mut count = 0;
        while it.next_sample() {
            count += 1;
        }
        assert_eq!(count, 2);
    }
}
