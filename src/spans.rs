//! Comparing two histogram layouts ("spans") and splicing zero buckets into
//! an old bucket vector so it matches a newer, wider layout.
//!
//! A [`Span`] list describes a sequence of populated-bucket runs in
//! ascending index order. This module never looks at bucket *values*, only
//! at which indices are populated.

use crate::histogram::Span;

/// An instruction to splice `count` zero buckets into an old bucket vector
/// before position `insert_at`, in the old vector's own coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interjection {
    pub insert_at: usize,
    pub count: usize,
}

/// The result of comparing an old span layout against a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanComparison {
    /// `false` when a bucket populated in the old layout is missing from the
    /// new one -- the chunk cannot continue and the caller must roll to a
    /// new chunk.
    pub ok: bool,
    /// Positions (in old-bucket-vector coordinates) where new buckets must
    /// be spliced in. Empty when the two layouts already describe the same
    /// populated-bucket set.
    pub interjections: Vec<Interjection>,
}

/// Expands a span list into the absolute, ascending indices of the buckets
/// it populates.
pub fn bucket_indices(spans: &[Span]) -> Vec<i64> {
    let mut indices = Vec::with_capacity(Span::span_total_length(spans));
    let mut pos: i64 = 0;
    for (i, span) in spans.iter().enumerate() {
        pos = if i == 0 {
            span.offset as i64
        } else {
            pos + span.offset as i64
        };
        for _ in 0..span.length {
            indices.push(pos);
            pos += 1;
        }
    }
    indices
}

impl Span {
    fn span_total_length(spans: &[Span]) -> usize {
        spans.iter().map(|s| s.length as usize).sum()
    }
}

/// Compares `old_spans` against `new_spans`, both describing the same
/// histogram schema, and computes the interjections needed to widen a
/// bucket vector built from `old_spans` into one matching `new_spans`.
pub fn compare_spans(old_spans: &[Span], new_spans: &[Span]) -> SpanComparison {
    let old_idx = bucket_indices(old_spans);
    let new_idx = bucket_indices(new_spans);

    let mut interjections = Vec::new();
    let mut oi = 0usize;
    let mut ni = 0usize;
    let mut run_start: Option<usize> = None;
    let mut run_count = 0usize;

    while ni < new_idx.len() {
        if oi < old_idx.len() && old_idx[oi] == new_idx[ni] {
            if run_count > 0 {
                interjections.push(Interjection {
                    insert_at: run_start.unwrap(),
                    count: run_count,
                });
                run_count = 0;
                run_start = None;
            }
            oi += 1;
            ni += 1;
        } else if oi < old_idx.len() && old_idx[oi] < new_idx[ni] {
            // An old, populated index is absent from the new layout.
            return SpanComparison {
                ok: false,
                interjections: Vec::new(),
            };
        } else {
            if run_start.is_none() {
                run_start = Some(oi);
            }
            run_count += 1;
            ni += 1;
        }
    }
    if run_count > 0 {
        interjections.push(Interjection {
            insert_at: run_start.unwrap(),
            count: run_count,
        });
    }
    if oi != old_idx.len() {
        return SpanComparison {
            ok: false,
            interjections: Vec::new(),
        };
    }
    SpanComparison {
        ok: true,
        interjections,
    }
}

/// Splices `interjections` worth of zero buckets into `old_buckets`, writing
/// the expanded vector into `scratch`. `scratch` is cleared first and may be
/// reused across samples to avoid reallocating.
pub fn interject(old_buckets: &[i64], scratch: &mut Vec<i64>, interjections: &[Interjection]) {
    scratch.clear();
    let mut old_pos = 0usize;
    for inj in interjections {
        scratch.extend_from_slice(&old_buckets[old_pos..inj.insert_at]);
        scratch.resize(scratch.len() + inj.count, 0);
        old_pos = inj.insert_at;
    }
    scratch.extend_from_slice(&old_buckets[old_pos..]);
}
