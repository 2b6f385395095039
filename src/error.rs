//! Error taxonomy shared by every fallible operation in the codec.

use thiserror::Error;

/// Failure modes produced by the bitstream, codec, and chunk layers.
///
/// Every fallible operation in this crate returns `Result<T, HistoChunkError>`.
/// `Meta()`-on-an-empty-chunk is the one exception: it is treated as a
/// programmer error and panics (see [`crate::chunk::Chunk::meta`]), though a
/// non-panicking `try_meta` is also provided for callers that would rather
/// not crash on a contract violation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoChunkError {
    /// A read crossed the end of the input bitstream.
    #[error("unexpected end of bitstream")]
    UnexpectedEof,

    /// The bitstream contains a value that cannot be a well-formed encoding:
    /// a varint that never terminates, an undefined VBBucket prefix, a
    /// leading-zero count or significant-bit count out of range, or a span
    /// length sum past the sanity cap.
    #[error("corrupt chunk: {0}")]
    Corrupt(String),

    /// A newly appended histogram drops buckets that a prior sample
    /// populated. The chunk cannot continue; the caller must start a new
    /// one.
    #[error("histogram layout shrank: a previously populated bucket is absent from the new layout")]
    LayoutShrunk,

    /// `Meta()` was called on a chunk with zero samples.
    #[error("meta() called on an empty chunk")]
    EmptyChunk,

    /// The scalar `Append` entry point was called on a histogram appender.
    #[error("wrong append kind: this chunk only accepts AppendHistogram")]
    WrongAppendKind,
}
