#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

//! Minimal compression & decompression library for embedded use.
//! Implements the Heatshrink compression algorithm
//! described here <https://github.com/atomicobject/heatshrink>
//! and here <https://spin.atomicobject.com/2013/03/14/heatshrink-embedded-data-compression/>
//!
//! Unlike the original C library (and earlier Rust ports of it), the window
//! size, lookahead size and input buffer size are runtime constructor
//! parameters rather than crate-wide constants, and the byte storage backing
//! an instance is a pluggable [`Storage`] implementation: a heap-allocated
//! `Vec<u8>` for "dynamic mode" (feature `alloc`), or a fixed-size inline
//! array for "static mode" on targets without a global allocator.

#[cfg(feature = "alloc")]
extern crate alloc;

/// module to uncompress some compressed data
pub mod decoder;
/// module to compress data
pub mod encoder;
/// pluggable longest-match search backends for the encoder
pub mod search;

/// Smallest supported window size, in bits.
pub const MIN_WINDOW_BITS: u8 = 4;
/// Largest supported window size, in bits.
///
/// At `W = 15`, `2 * window_len() == 65536`, the point at which at least one
/// existing Rust port of this algorithm overflowed a signed 16-bit
/// search-index element (confirmed by a panic when sweeping window sizes up
/// to 15). This crate's indexed search engine uses 32-bit index slots, so
/// `MAX_WINDOW_BITS` can be the full value the wire format allows.
pub const MAX_WINDOW_BITS: u8 = 15;
/// Smallest supported lookahead size, in bits.
pub const MIN_LOOKAHEAD_BITS: u8 = 3;
/// Default size, in bytes, of the decoder's internal input buffer when built
/// with [`decoder::Decoder::new`].
pub const DEFAULT_INPUT_BUFFER_SIZE: usize = 32;

/// Errors that can occur while constructing an encoder or decoder instance.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConstructError {
    /// The window size was outside `[MIN_WINDOW_BITS, MAX_WINDOW_BITS]`.
    WindowBitsOutOfRange,
    /// The lookahead size was outside `[MIN_LOOKAHEAD_BITS, window_bits)`.
    LookaheadBitsOutOfRange,
    /// The requested input buffer size was zero.
    InputBufferSizeInvalid,
    /// A static (fixed-size array) [`Storage`] was smaller than the chosen
    /// parameters require.
    BufferTooSmall,
}

/// Result of a `sink` call: how many bytes were accepted.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SinkResult {
    /// Bytes were accepted into the internal buffer.
    Ok(usize),
    /// Nothing was accepted because the internal buffer is already full;
    /// the caller must drain it with `poll` before sinking more.
    Full,
    /// The call was invalid in the current phase, e.g. `sink` after `finish`.
    ErrorMisuse,
}

/// Result of a `poll` call: how many bytes were written to the caller's
/// output buffer, and whether the state machine could still make progress.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PollResult {
    /// The state machine ran out of work (input exhausted, or a terminal
    /// state reached) before the output buffer filled up.
    Empty(usize),
    /// The output buffer filled up before the state machine ran out of
    /// work; call `poll` again with a fresh buffer.
    More(usize),
}

/// Result of a `finish` call.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FinishResult {
    /// All input has been consumed and all output produced.
    Done,
    /// Output remains buffered; keep calling `poll` (and then `finish`
    /// again) until this returns `Done`.
    More,
}

/// Window and lookahead geometry shared by the encoder and decoder,
/// validated once at construction time so the state machines never need to
/// re-check bounds while running.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Params {
    pub(crate) window_bits: u8,
    pub(crate) lookahead_bits: u8,
}

impl Params {
    pub(crate) fn new(window_bits: u8, lookahead_bits: u8) -> Result<Self, ConstructError> {
        if !(MIN_WINDOW_BITS..=MAX_WINDOW_BITS).contains(&window_bits) {
            return Err(ConstructError::WindowBitsOutOfRange);
        }
        if lookahead_bits < MIN_LOOKAHEAD_BITS || lookahead_bits >= window_bits {
            return Err(ConstructError::LookaheadBitsOutOfRange);
        }
        Ok(Params {
            window_bits,
            lookahead_bits,
        })
    }

    #[inline]
    pub(crate) fn window_len(&self) -> usize {
        1usize << self.window_bits
    }

    #[inline]
    pub(crate) fn lookahead_len(&self) -> usize {
        1usize << self.lookahead_bits
    }

    /// Minimum back-reference length, in bytes, that is cheaper to encode
    /// than the literal bytes it would replace.
    #[inline]
    pub(crate) fn break_even(&self) -> usize {
        (1 + self.window_bits as usize + self.lookahead_bits as usize) / 8
    }
}

/// A byte-addressable region of memory backing an encoder or decoder
/// instance.
///
/// Two implementations ship in this crate: `Vec<u8>` (feature `alloc`, the
/// default "dynamic mode", sized to exactly what the chosen parameters
/// require) and any fixed-size inline array `[u8; N]` ("static mode", for
/// targets without a global allocator -- the caller picks `N` to fit their
/// own parameters).
pub trait Storage: AsRef<[u8]> + AsMut<[u8]> {
    /// Allocate (or claim) `required_len` zeroed bytes of storage.
    ///
    /// Implementations backed by a fixed-size array fail with
    /// [`ConstructError::BufferTooSmall`] if their capacity is less than
    /// `required_len`.
    fn with_zeroed_len(required_len: usize) -> Result<Self, ConstructError>
    where
        Self: Sized;

    /// Zero every byte currently in use. `reset()` calls this so a reused
    /// instance never observes stale data from a previous stream.
    fn zero_fill(&mut self) {
        self.as_mut().iter_mut().for_each(|b| *b = 0);
    }
}

#[cfg(feature = "alloc")]
impl Storage for alloc::vec::Vec<u8> {
    fn with_zeroed_len(required_len: usize) -> Result<Self, ConstructError> {
        Ok(alloc::vec![0u8; required_len])
    }
}

impl<const N: usize> Storage for [u8; N] {
    fn with_zeroed_len(required_len: usize) -> Result<Self, ConstructError> {
        if required_len > N {
            return Err(ConstructError::BufferTooSmall);
        }
        Ok([0u8; N])
    }
}

/// Tracks how much of a caller-supplied output buffer has been filled during
/// one `poll` call, across however many state-machine steps that takes.
pub(crate) struct OutputInfo<'a> {
    output_buffer: &'a mut [u8],
    output_size: usize,
}

impl<'a> OutputInfo<'a> {
    pub(crate) fn new(output_buffer: &'a mut [u8]) -> Self {
        OutputInfo {
            output_buffer,
            output_size: 0,
        }
    }

    /// Add a byte to the referenced buffer.
    pub(crate) fn push_byte(&mut self, byte: u8) {
        self.output_buffer[self.output_size] = byte;
        self.output_size += 1;
    }

    /// Check if there is space left in the buffer.
    pub(crate) fn can_take_byte(&self) -> bool {
        self.output_size < self.output_buffer.len()
    }

    /// Get the free space left in the buffer.
    pub(crate) fn remaining_free_size(&self) -> usize {
        self.output_buffer.len() - self.output_size
    }

    pub(crate) fn written(&self) -> usize {
        self.output_size
    }
}

#[cfg(all(test, feature = "alloc"))]
mod tests {
    use super::decoder::Decoder;
    use super::encoder::Encoder;
    use super::search::ScalarEngine;
    use super::{FinishResult, PollResult};
    use alloc::vec::Vec;

    fn roundtrip(src: &[u8], window_bits: u8, lookahead_bits: u8) {
        let mut enc: Encoder<Vec<u8>, ScalarEngine> =
            Encoder::new(window_bits, lookahead_bits).unwrap();
        let mut compressed = Vec::new();
        let mut scratch = [0u8; 64];

        let mut remaining = src;
        while !remaining.is_empty() {
            if let super::SinkResult::Ok(n) = enc.sink(remaining) {
                remaining = &remaining[n..];
            }
            loop {
                match enc.poll(&mut scratch) {
                    PollResult::Empty(n) => {
                        compressed.extend_from_slice(&scratch[..n]);
                        break;
                    }
                    PollResult::More(n) => {
                        compressed.extend_from_slice(&scratch[..n]);
                    }
                }
            }
        }
        while enc.finish() == FinishResult::More {
            if let PollResult::More(n) | PollResult::Empty(n) = enc.poll(&mut scratch) {
                compressed.extend_from_slice(&scratch[..n]);
            }
        }

        let mut dec: Decoder<Vec<u8>> = Decoder::new(32, window_bits, lookahead_bits).unwrap();
        let mut decompressed = Vec::new();
        let mut remaining = compressed.as_slice();
        while !remaining.is_empty() {
            if let super::SinkResult::Ok(n) = dec.sink(remaining) {
                remaining = &remaining[n..];
            }
            loop {
                match dec.poll(&mut scratch) {
                    PollResult::Empty(n) => {
                        decompressed.extend_from_slice(&scratch[..n]);
                        break;
                    }
                    PollResult::More(n) => {
                        decompressed.extend_from_slice(&scratch[..n]);
                    }
                }
            }
        }
        let _ = dec.finish();

        assert_eq!(src, decompressed.as_slice());
    }

    #[test]
    fn empty_input() {
        roundtrip(b"", 8, 4);
    }

    #[test]
    fn single_byte() {
        roundtrip(b"a", 8, 4);
    }

    #[test]
    fn repeated_pattern() {
        let data: Vec<u8> = b"The quick brown fox "
            .iter()
            .cycle()
            .take(1024)
            .copied()
            .collect();
        roundtrip(&data, 8, 4);
    }

    #[test]
    fn all_byte_values_roundtrip() {
        let data: Vec<u8> = (0..=255u8).cycle().take(512).collect();
        roundtrip(&data, 8, 4);
    }

    #[test]
    fn small_window_and_lookahead() {
        let data: Vec<u8> = b"abcabcabcabcabcabcabc".to_vec();
        roundtrip(&data, 4, 3);
    }

    #[test]
    fn large_window_crossing_i16_boundary() {
        // exercises the 32-bit search index at the point where a 16-bit
        // index would have overflowed (window_bits == 15).
        let data: Vec<u8> = (0u32..20000).map(|i| (i % 251) as u8).collect();
        roundtrip(&data, 15, 6);
    }

    #[test]
    fn output_past_head_index_u16_range() {
        // head_index must wrap modulo the window instead of overflowing its
        // u16 storage; this input decodes to well over 65536 bytes.
        let data: Vec<u8> = (0u32..200_000).map(|i| ((i * 31) % 113) as u8).collect();
        roundtrip(&data, 10, 5);
    }
}
