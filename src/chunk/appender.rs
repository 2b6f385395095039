//! Per-sample encoding: the first/second/subsequent-sample cases that turn
//! a [`SparseHistogram`] into the chunk's delta/DoD/XOR bitstream.

use crate::error::HistoChunkError;
use crate::histogram::{Span, SparseHistogram};
use crate::spans::compare_spans;
use crate::varint::{write_ivarint, write_uvarint};
use crate::vbbucket::write_dod;
use crate::xorfloat::XorEncoder;

use super::iterator::HistoIterator;
use super::recode::recode;
use super::{write_meta, Chunk};

/// Stateful encoder bound to a [`Chunk`]. Converts successive
/// `(timestamp, histogram)` observations into the chunk's bitstream,
/// triggering a [recode](super::recode) whenever a new sample's layout
/// introduces buckets no prior sample populated.
pub struct Appender<'a> {
    pub(super) chunk: &'a mut Chunk,

    pub(super) schema: i32,
    pub(super) positive_spans: Vec<Span>,
    pub(super) negative_spans: Vec<Span>,

    t: i64,
    count: u64,
    zero_count: u64,
    t_delta: i64,
    count_delta: i64,
    zero_count_delta: i64,
    xor: XorEncoder,

    pub(super) positive_buckets: Vec<i64>,
    pub(super) negative_buckets: Vec<i64>,
    pub(super) positive_bucket_deltas: Vec<i64>,
    pub(super) negative_bucket_deltas: Vec<i64>,

    pub(super) scratch_pos: Vec<i64>,
    pub(super) scratch_neg: Vec<i64>,
}

impl<'a> Appender<'a> {
    pub(super) fn new_empty(chunk: &'a mut Chunk) -> Self {
        Self {
            chunk,
            schema: 0,
            positive_spans: Vec::new(),
            negative_spans: Vec::new(),
            t: 0,
            count: 0,
            zero_count: 0,
            t_delta: 0,
            count_delta: 0,
            zero_count_delta: 0,
            xor: XorEncoder::new(),
            positive_buckets: Vec::new(),
            negative_buckets: Vec::new(),
            positive_bucket_deltas: Vec::new(),
            negative_bucket_deltas: Vec::new(),
            scratch_pos: Vec::new(),
            scratch_neg: Vec::new(),
        }
    }

    /// Rebuilds an appender for `chunk` by replaying its existing samples
    /// through a fresh iterator. For a freshly created, empty chunk this is
    /// immediate; for a populated one the cost is proportional to its
    /// current sample count, which this codec's chunk-size caps keep small.
    pub(crate) fn rehydrate(chunk: &'a mut Chunk) -> Result<Self, HistoChunkError> {
        let mut appender = Self::new_empty(chunk);
        if appender.chunk.num_samples() == 0 {
            return Ok(appender);
        }

        let bytes = appender.chunk.bytes().to_vec();
        let mut it = HistoIterator::new(&bytes);
        while it.next_sample() {}
        if let Some(e) = it.err() {
            return Err(e.clone());
        }

        let resume = it.resume_state();
        appender.schema = resume.schema;
        appender.positive_spans = resume.positive_spans;
        appender.negative_spans = resume.negative_spans;
        appender.t = resume.t;
        appender.count = resume.count;
        appender.zero_count = resume.zero_count;
        appender.t_delta = resume.t_delta;
        appender.count_delta = resume.count_delta;
        appender.zero_count_delta = resume.zero_count_delta;
        appender.xor = XorEncoder::from_state(resume.xor.0, resume.xor.1);
        appender.positive_buckets = resume.positive_buckets;
        appender.negative_buckets = resume.negative_buckets;
        appender.positive_bucket_deltas = resume.positive_bucket_deltas;
        appender.negative_bucket_deltas = resume.negative_bucket_deltas;
        Ok(appender)
    }

    /// Appends one histogram observation.
    ///
    /// If `h`'s span layout introduces buckets no prior sample in this
    /// chunk populated, the chunk is transparently [recoded](super::recode)
    /// first so every sample shares the widest layout seen so far. Returns
    /// [`HistoChunkError::LayoutShrunk`] if `h` drops a bucket a prior
    /// sample populated -- the caller must roll to a new chunk.
    pub fn append_histogram(&mut self, t: i64, h: &SparseHistogram) -> Result<(), HistoChunkError> {
        let n = self.chunk.num_samples();
        tracing::trace!(t, n, "appending histogram sample");
        if n == 0 {
            self.append_first(t, h);
        } else {
            self.maybe_recode(h)?;
            if n == 1 {
                self.append_second(t, h);
            } else {
                self.append_subsequent(t, h);
            }
        }
        self.chunk.set_num_samples(n + 1);
        Ok(())
    }

    /// This chunk only accepts histogram samples.
    pub fn append(&mut self, _t: i64, _v: f64) -> Result<(), HistoChunkError> {
        Err(HistoChunkError::WrongAppendKind)
    }

    fn maybe_recode(&mut self, h: &SparseHistogram) -> Result<(), HistoChunkError> {
        let pos_cmp = compare_spans(&self.positive_spans, &h.positive_spans);
        let neg_cmp = compare_spans(&self.negative_spans, &h.negative_spans);
        if !pos_cmp.ok || !neg_cmp.ok {
            return Err(HistoChunkError::LayoutShrunk);
        }
        if pos_cmp.interjections.is_empty() && neg_cmp.interjections.is_empty() {
            return Ok(());
        }
        recode(
            self,
            &h.positive_spans,
            &h.negative_spans,
            &pos_cmp.interjections,
            &neg_cmp.interjections,
        )
    }

    fn append_first(&mut self, t: i64, h: &SparseHistogram) {
        write_meta(self.chunk.writer_mut(), h.schema, &h.positive_spans, &h.negative_spans);
        write_ivarint(self.chunk.writer_mut(), t);
        write_uvarint(self.chunk.writer_mut(), h.count);
        write_uvarint(self.chunk.writer_mut(), h.zero_count);
        self.xor.encode_first(self.chunk.writer_mut(), h.sum);

        for &b in &h.positive_buckets {
            write_ivarint(self.chunk.writer_mut(), b);
        }
        for &b in &h.negative_buckets {
            write_ivarint(self.chunk.writer_mut(), b);
        }

        self.schema = h.schema;
        self.positive_spans = h.positive_spans.clone();
        self.negative_spans = h.negative_spans.clone();
        self.t = t;
        self.count = h.count;
        self.zero_count = h.zero_count;
        self.positive_buckets = h.positive_buckets.clone();
        self.negative_buckets = h.negative_buckets.clone();
        self.positive_bucket_deltas = vec![0i64; h.positive_buckets.len()];
        self.negative_bucket_deltas = vec![0i64; h.negative_buckets.len()];
    }

    fn append_second(&mut self, t: i64, h: &SparseHistogram) {
        let t_delta = t - self.t;
        let count_delta = h.count as i64 - self.count as i64;
        let zero_count_delta = h.zero_count as i64 - self.zero_count as i64;

        write_ivarint(self.chunk.writer_mut(), t_delta);
        write_ivarint(self.chunk.writer_mut(), count_delta);
        write_ivarint(self.chunk.writer_mut(), zero_count_delta);
        self.xor.encode_next(self.chunk.writer_mut(), h.sum);

        for i in 0..h.positive_buckets.len() {
            let delta = h.positive_buckets[i] - self.positive_buckets[i];
            write_ivarint(self.chunk.writer_mut(), delta);
            self.positive_bucket_deltas[i] = delta;
        }
        for i in 0..h.negative_buckets.len() {
            let delta = h.negative_buckets[i] - self.negative_buckets[i];
            write_ivarint(self.chunk.writer_mut(), delta);
            self.negative_bucket_deltas[i] = delta;
        }

        self.t = t;
        self.count = h.count;
        self.zero_count = h.zero_count;
        self.t_delta = t_delta;
        self.count_delta = count_delta;
        self.zero_count_delta = zero_count_delta;
        self.positive_buckets = h.positive_buckets.clone();
        self.negative_buckets = h.negative_buckets.clone();
    }

    fn append_subsequent(&mut self, t: i64, h: &SparseHistogram) {
        let t_delta = t - self.t;
        let count_delta = h.count as i64 - self.count as i64;
        let zero_count_delta = h.zero_count as i64 - self.zero_count as i64;

        write_dod(self.chunk.writer_mut(), t_delta - self.t_delta);
        write_dod(self.chunk.writer_mut(), count_delta - self.count_delta);
        write_dod(self.chunk.writer_mut(), zero_count_delta - self.zero_count_delta);
        self.xor.encode_next(self.chunk.writer_mut(), h.sum);

        for i in 0..h.positive_buckets.len() {
            let delta = h.positive_buckets[i] - self.positive_buckets[i];
            write_dod(self.chunk.writer_mut(), delta - self.positive_bucket_deltas[i]);
            self.positive_bucket_deltas[i] = delta;
        }
        for i in 0..h.negative_buckets.len() {
            let delta = h.negative_buckets[i] - self.negative_buckets[i];
            write_dod(self.chunk.writer_mut(), delta - self.negative_bucket_deltas[i]);
            self.negative_bucket_deltas[i] = delta;
        }

        self.t = t;
        self.count = h.count;
        self.zero_count = h.zero_count;
        self.t_delta = t_delta;
        self.count_delta = count_delta;
        self.zero_count_delta = zero_count_delta;
        self.positive_buckets = h.positive_buckets.clone();
        self.negative_buckets = h.negative_buckets.clone();
    }
}
