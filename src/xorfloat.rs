//! Gorilla-style XOR float compression with a reusable leading/trailing-zero
//! window.
//!
//! Design note: the reference implementation represents "no window yet" with
//! a sentinel byte (`0xff`). This implementation uses `Option<(u8, u8)>`
//! instead -- the wire format only cares about which bit-sequence branch gets
//! taken on the first non-zero delta, not how "uninitialized" is spelled in
//! memory.

use crate::bitstream::{BitReader, BitWriter};
use crate::error::HistoChunkError;

/// Encoder-side state: the last encoded value and its leading/trailing zero
/// window, if a window has been established yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct XorEncoder {
    last_bits: u64,
    window: Option<(u8, u8)>,
}

impl XorEncoder {
    /// Creates a fresh encoder. The first call to `encode_first` establishes
    /// the baseline value.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes the raw 64-bit representation of the first value in a stream.
    /// Must be called exactly once, before any `encode_next`.
    pub fn encode_first(&mut self, w: &mut BitWriter, value: f64) {
        let bits = value.to_bits();
        w.write_bits(bits, 64);
        self.last_bits = bits;
        self.window = None;
    }

    /// XOR-encodes `value` against the previous value, reusing the
    /// leading/trailing-zero window when possible.
    pub fn encode_next(&mut self, w: &mut BitWriter, value: f64) {
        let bits = value.to_bits();
        let xor = bits ^ self.last_bits;

        if xor == 0 {
            w.write_bit(false);
            self.last_bits = bits;
            return;
        }
        w.write_bit(true);

        let leading = (xor.leading_zeros() as u8).min(31);
        let trailing = xor.trailing_zeros() as u8;

        let reuse = match self.window {
            Some((win_leading, win_trailing)) => leading >= win_leading && trailing >= win_trailing,
            None => false,
        };

        if reuse {
            let (win_leading, win_trailing) = self.window.unwrap();
            w.write_bit(false);
            let meaningful_bits = 64 - win_leading - win_trailing;
            let meaningful = (xor >> win_trailing) & bitmask(meaningful_bits);
            w.write_bits(meaningful, meaningful_bits);
        } else {
            w.write_bit(true);
            let meaningful_bits = 64 - leading - trailing;
            w.write_bits(leading as u64, 5);
            // Store as (length - 1) so that 64 significant bits fits in 6 bits.
            w.write_bits((meaningful_bits - 1) as u64, 6);
            let meaningful = (xor >> trailing) & bitmask(meaningful_bits);
            w.write_bits(meaningful, meaningful_bits);
            self.window = Some((leading, trailing));
        }

        self.last_bits = bits;
    }

    /// Rebuilds an encoder from previously decoded state, so appending can
    /// resume after a chunk has been rehydrated from its bytes.
    pub(crate) fn from_state(last_bits: u64, window: Option<(u8, u8)>) -> Self {
        Self { last_bits, window }
    }
}

/// Decoder-side mirror of [`XorEncoder`].
#[derive(Debug, Clone, Copy, Default)]
pub struct XorDecoder {
    last_bits: u64,
    window: Option<(u8, u8)>,
}

impl XorDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the raw 64-bit first value.
    pub fn decode_first(&mut self, r: &mut BitReader<'_>) -> Result<f64, HistoChunkError> {
        let bits = r.read_bits(64)?;
        self.last_bits = bits;
        self.window = None;
        Ok(f64::from_bits(bits))
    }

    /// Reads and applies the next XOR-encoded value.
    pub fn decode_next(&mut self, r: &mut BitReader<'_>) -> Result<f64, HistoChunkError> {
        if !r.read_bit()? {
            return Ok(f64::from_bits(self.last_bits));
        }

        if !r.read_bit()? {
            let (win_leading, win_trailing) = self
                .window
                .ok_or_else(|| HistoChunkError::Corrupt("xor window reused before being set".into()))?;
            let meaningful_bits = 64 - win_leading - win_trailing;
            let meaningful = r.read_bits(meaningful_bits)?;
            let xor = meaningful << win_trailing;
            self.last_bits ^= xor;
        } else {
            let leading = r.read_bits(5)? as u8;
            let meaningful_bits = r.read_bits(6)? as u8 + 1;
            if leading as u32 + meaningful_bits as u32 > 64 {
                return Err(HistoChunkError::Corrupt(format!(
                    "xor window leading={leading} sigbits={meaningful_bits} exceeds 64 bits"
                )));
            }
            let trailing = 64 - leading - meaningful_bits;
            let meaningful = r.read_bits(meaningful_bits)?;
            let xor = meaningful << trailing;
            self.last_bits ^= xor;
            self.window = Some((leading, trailing));
        }

        Ok(f64::from_bits(self.last_bits))
    }

    /// Exposes the decoder's internal state so an appender resuming from a
    /// replayed chunk can continue XOR-encoding from the same baseline.
    pub(crate) fn state(&self) -> (u64, Option<(u8, u8)>) {
        (self.last_bits, self.window)
    }
}

#[inline]
fn bitmask(n: u8) -> u64 {
    if n >= 64 {
        u64::MAX
    } else {
        (1u64 << n) - 1
    }
}
