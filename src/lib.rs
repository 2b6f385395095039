//! # sparse-histo-chunk
//!
//! A bit-granular, append-only chunk codec for sparse exponential
//! histograms in a time-series storage engine.
//!
//! ## Algorithm overview
//!
//! Each chunk holds samples sharing one schema and bucket layout. Three
//! Gorilla-family techniques keep the encoding small:
//!
//! - **Timestamps, counts, and zero-counts** use delta-of-delta encoding:
//!   the first sample is stored raw, the second as a first difference, and
//!   every later sample as the difference of differences, via a
//!   variable-length prefix code ([`vbbucket`]).
//! - **The running sum** uses Gorilla's XOR-float encoding with a reusable
//!   leading/trailing-zero window ([`xorfloat`]).
//! - **Bucket values** follow the same delta/DoD progression as the scalar
//!   fields, one value per populated bucket.
//!
//! When a later sample populates a bucket no earlier sample did, the chunk
//! cannot simply append: every previously stored sample's bucket vector is
//! missing that column. [`chunk::recode`] handles this by comparing the
//! old and new span layouts ([`spans`]), computing where zero buckets must
//! be spliced into the old vectors, and rewriting the chunk so every
//! sample shares the widest layout seen so far.
//!
//! ## Example
//!
//! ```
//! use sparse_histo_chunk::{Chunk, Span, SparseHistogram};
//!
//! let mut chunk = Chunk::new();
//! {
//!     let mut appender = chunk.appender().unwrap();
//!     appender
//!         .append_histogram(
//!             1_700_000_000,
//!             &SparseHistogram {
//!                 timestamp: 1_700_000_000,
//!                 count: 10,
//!                 zero_count: 1,
//!                 sum: 42.5,
//!                 schema: 0,
//!                 positive_spans: vec![Span::new(0, 2)],
//!                 negative_spans: vec![],
//!                 positive_buckets: vec![5, 4],
//!                 negative_buckets: vec![],
//!             },
//!         )
//!         .unwrap();
//! }
//!
//! let mut it = chunk.iterator(None);
//! assert!(it.next_sample());
//! assert_eq!(it.at_histogram().count, 10);
//! ```
//!
//! ## Lazy iteration
//!
//! [`chunk::HistoIterator`] decodes one sample at a time and never
//! allocates for the whole chunk up front:
//!
//! ```
//! # use sparse_histo_chunk::{Chunk, Span, SparseHistogram};
//! # let mut chunk = Chunk::new();
//! # {
//! #     let mut appender = chunk.appender().unwrap();
//! #     appender.append_histogram(1, &SparseHistogram {
//! #         timestamp: 1, count: 1, zero_count: 0, sum: 1.0, schema: 0,
//! #         positive_spans: vec![Span::new(0, 1)], negative_spans: vec![],
//! #         positive_buckets: vec![1], negative_buckets: vec![],
//! #     }).unwrap();
//! # }
//! let mut it = chunk.iterator(None);
//! while it.next_sample() {
//!     let h = it.at_histogram();
//!     println!("{}: count={}", h.timestamp, h.count);
//! }
//! assert!(it.err().is_none());
//! ```

pub mod bitstream;
pub mod chunk;
pub mod error;
pub mod histogram;
pub mod spans;
pub mod varint;
pub mod vbbucket;
pub mod xorfloat;

pub use chunk::{Appender, Chunk, ChunkOptions, HistoIterator};
pub use error::HistoChunkError;
pub use histogram::{Span, SparseHistogram};
pub use spans::{compare_spans, interject, Interjection, SpanComparison};
