//! Rewrites a chunk's body in place when a newer sample's layout introduces
//! buckets no prior sample in the chunk populated.
//!
//! The rewrite goes through a disposable chunk and appender rather than
//! patching the existing buffer: every previously appended sample is
//! decoded via a fresh iterator, widened to the new layout by splicing in
//! zero buckets at the computed interjection points, and re-appended. Only
//! once that succeeds does the result replace the live appender's buffer
//! and bucket state.

use crate::error::HistoChunkError;
use crate::histogram::Span;
use crate::spans::{interject, Interjection};

use super::appender::Appender;
use super::iterator::HistoIterator;
use super::Chunk;

pub(super) fn recode(
    appender: &mut Appender<'_>,
    new_positive_spans: &[Span],
    new_negative_spans: &[Span],
    positive_interjections: &[Interjection],
    negative_interjections: &[Interjection],
) -> Result<(), HistoChunkError> {
    let span = tracing::info_span!(
        "recode",
        n_samples = appender.chunk.num_samples(),
        old_positive_buckets = appender.positive_buckets.len(),
        new_positive_buckets = new_positive_spans
            .iter()
            .map(|s| s.length as usize)
            .sum::<usize>(),
    );
    let _enter = span.enter();

    let old_bytes = appender.chunk.bytes().to_vec();
    let mut source = HistoIterator::new(&old_bytes);

    let mut fresh_chunk = Chunk::with_options(appender.chunk.options);
    {
        let mut fresh_appender = Appender::new_empty(&mut fresh_chunk);
        while source.next_sample() {
            let mut widened = source.at_histogram();

            interject(&widened.positive_buckets, &mut appender.scratch_pos, positive_interjections);
            widened.positive_buckets = appender.scratch_pos.clone();
            interject(&widened.negative_buckets, &mut appender.scratch_neg, negative_interjections);
            widened.negative_buckets = appender.scratch_neg.clone();
            widened.positive_spans = new_positive_spans.to_vec();
            widened.negative_spans = new_negative_spans.to_vec();

            fresh_appender.append_histogram(widened.timestamp, &widened)?;
        }
    }
    if let Some(e) = source.err() {
        return Err(e.clone());
    }

    *appender.chunk = fresh_chunk;
    appender.positive_spans = new_positive_spans.to_vec();
    appender.negative_spans = new_negative_spans.to_vec();

    interject(&appender.positive_buckets, &mut appender.scratch_pos, positive_interjections);
    appender.positive_buckets = appender.scratch_pos.clone();
    interject(&appender.negative_buckets, &mut appender.scratch_neg, negative_interjections);
    appender.negative_buckets = appender.scratch_neg.clone();
    interject(
        &appender.positive_bucket_deltas,
        &mut appender.scratch_pos,
        positive_interjections,
    );
    appender.positive_bucket_deltas = appender.scratch_pos.clone();
    interject(
        &appender.negative_bucket_deltas,
        &mut appender.scratch_neg,
        negative_interjections,
    );
    appender.negative_bucket_deltas = appender.scratch_neg.clone();

    Ok(())
}
