use crate::search::SearchEngine;
use crate::{ConstructError, FinishResult, OutputInfo, Params, PollResult, SinkResult, Storage};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum State {
    NotFull,       // input buffer not full enough
    Filled,        // buffer is full
    Search,        // searching for patterns
    YieldTagBit,   // yield tag bit
    YieldLiteral,  // emit literal byte
    YieldBrIndex,  // yielding backref index
    YieldBrLength, // yielding backref length
    SaveBacklog,   // copying buffer to backlog
    FlushBits,     // flush bit buffer
    Done,          // done
}

/// A constant flag to mark an encoder as finishing.
const FLAG_IS_FINISHING: u8 = 1;

/// A streaming LZSS-style compressor.
///
/// `S` is the byte [`Storage`] backing the sliding window (`Vec<u8>` for
/// dynamic mode, a fixed-size array for static mode), and `E` is the
/// [`SearchEngine`] used to look for backreferences. Both are chosen at
/// construction time and fixed for the instance's lifetime.
#[derive(Debug)]
pub struct Encoder<S: Storage, E: SearchEngine> {
    params: Params,
    input_size: usize,
    match_scan_index: usize,
    match_length: usize,
    match_pos: usize,
    outgoing_bits: u16,
    outgoing_bits_count: u8,
    flags: u8,
    current_byte: u8,
    bit_index: u8,
    state: State,
    buffer: S,
    engine: E,
}

impl<S: Storage, E: SearchEngine> Encoder<S, E> {
    /// Create a new encoder for the given window and lookahead sizes, in
    /// bits. `window_bits` must be within
    /// `[MIN_WINDOW_BITS, MAX_WINDOW_BITS]`, and `lookahead_bits` within
    /// `[MIN_LOOKAHEAD_BITS, window_bits)`.
    ///
    /// The backing `Storage` is allocated (or claimed, for a fixed-size
    /// array) to hold `2 * 2^window_bits` bytes; a static `Storage` smaller
    /// than that fails with [`ConstructError::BufferTooSmall`].
    pub fn new(window_bits: u8, lookahead_bits: u8) -> Result<Self, ConstructError> {
        let params = Params::new(window_bits, lookahead_bits)?;
        let buffer = S::with_zeroed_len(2 * params.window_len())?;
        Ok(Encoder {
            params,
            input_size: 0,
            match_scan_index: 0,
            match_length: 0,
            match_pos: 0,
            outgoing_bits: 0,
            outgoing_bits_count: 0,
            flags: 0,
            current_byte: 0,
            bit_index: 0x80,
            state: State::NotFull,
            buffer,
            engine: E::default(),
        })
    }

    /// Reset this encoder, discarding any buffered state, so it can be
    /// reused for a new stream with the same window and lookahead sizes.
    pub fn reset(&mut self) {
        self.input_size = 0;
        self.match_scan_index = 0;
        self.match_length = 0;
        self.match_pos = 0;
        self.outgoing_bits = 0;
        self.outgoing_bits_count = 0;
        self.flags = 0;
        self.current_byte = 0;
        self.bit_index = 0x80;
        self.state = State::NotFull;
        self.buffer.zero_fill();
        self.engine = E::default();
    }

    /// Feed more raw input bytes in. Returns how many bytes of `input`
    /// were accepted into the internal buffer.
    pub fn sink(&mut self, input: &[u8]) -> SinkResult {
        // Sinking more content after saying the content is done, tsk tsk.
        if self.is_finishing() {
            return SinkResult::ErrorMisuse;
        }

        // Sinking more content before processing is done.
        if self.state != State::NotFull {
            return SinkResult::ErrorMisuse;
        }

        let write_offset = self.input_offset() + self.input_size;
        let remaining_size = self.input_buffer_size() - self.input_size;

        if remaining_size == 0 {
            return SinkResult::Full;
        }

        let copy_size = remaining_size.min(input.len());
        self.buffer.as_mut()[write_offset..write_offset + copy_size]
            .copy_from_slice(&input[..copy_size]);
        self.input_size += copy_size;

        if self.input_size == self.input_buffer_size() {
            self.state = State::Filled;
        }

        SinkResult::Ok(copy_size)
    }

    /// Process the internal buffer and write compressed bytes into
    /// `output`. Call repeatedly until it returns `PollResult::Empty`.
    pub fn poll(&mut self, output: &mut [u8]) -> PollResult {
        if output.is_empty() {
            return PollResult::More(0);
        }

        let mut out = OutputInfo::new(output);

        loop {
            let in_state = self.state;

            #[cfg(feature = "logging")]
            log::trace!("encoder state {:?}", in_state);

            match in_state {
                State::NotFull => return PollResult::Empty(out.written()),
                State::Filled => {
                    self.do_indexing();
                    self.state = State::Search;
                }
                State::Search => self.state = self.st_step_search(),
                State::YieldTagBit => self.state = self.st_yield_tag_bit(&mut out),
                State::YieldLiteral => self.state = self.st_yield_literal(&mut out),
                State::YieldBrIndex => self.state = self.st_yield_br_index(&mut out),
                State::YieldBrLength => self.state = self.st_yield_br_length(&mut out),
                State::SaveBacklog => self.state = self.st_save_backlog(),
                State::FlushBits => self.state = self.st_flush_bit_buffer(&mut out),
                State::Done => return PollResult::Empty(out.written()),
            }

            // If the current state cannot advance, check if the output
            // buffer is exhausted.
            if self.state == in_state && !out.can_take_byte() {
                return PollResult::More(out.written());
            }
        }
    }

    /// Mark the input stream as finished: no more `sink` calls are
    /// accepted, and the final partial match and bit buffer will be
    /// flushed. Keep calling `poll` until this returns `FinishResult::Done`.
    pub fn finish(&mut self) -> FinishResult {
        self.flags |= FLAG_IS_FINISHING;

        if self.state == State::NotFull {
            self.state = State::Filled;
        }

        if self.state == State::Done {
            FinishResult::Done
        } else {
            FinishResult::More
        }
    }

    fn st_step_search(&mut self) -> State {
        let lookahead_floor = if self.is_finishing() {
            1
        } else {
            self.params.lookahead_len()
        };

        if self.match_scan_index > self.input_size.saturating_sub(lookahead_floor) {
            if self.is_finishing() {
                State::FlushBits
            } else {
                State::SaveBacklog
            }
        } else {
            let end = self.input_offset() + self.match_scan_index;
            let start = end - self.input_buffer_size();
            let max_possible = self
                .params
                .lookahead_len()
                .min(self.input_size - self.match_scan_index);

            match self
                .engine
                .longest_match(self.buffer.as_ref(), start, end, max_possible, &self.params)
            {
                None => {
                    self.match_scan_index += 1;
                    self.match_length = 0;
                }
                Some((distance, length)) => {
                    #[cfg(feature = "logging")]
                    log::trace!("match: distance={distance} length={length}");
                    self.match_pos = distance;
                    self.match_length = length;
                }
            }
            State::YieldTagBit
        }
    }

    fn st_yield_tag_bit(&mut self, out: &mut OutputInfo) -> State {
        if out.can_take_byte() {
            if self.match_length == 0 {
                self.add_tag_bit(out, 0x1);
                State::YieldLiteral
            } else {
                self.add_tag_bit(out, 0);
                self.outgoing_bits = (self.match_pos - 1) as u16;
                self.outgoing_bits_count = self.params.window_bits;
                State::YieldBrIndex
            }
        } else {
            State::YieldTagBit
        }
    }

    fn st_yield_literal(&mut self, out: &mut OutputInfo) -> State {
        if out.can_take_byte() {
            self.push_literal_byte(out);
            State::Search
        } else {
            State::YieldLiteral
        }
    }

    fn st_yield_br_index(&mut self, out: &mut OutputInfo) -> State {
        if out.can_take_byte() {
            if self.push_outgoing_bits(out) > 0 {
                State::YieldBrIndex
            } else {
                self.outgoing_bits = (self.match_length - 1) as u16;
                self.outgoing_bits_count = self.params.lookahead_bits;
                State::YieldBrLength
            }
        } else {
            State::YieldBrIndex
        }
    }

    fn st_yield_br_length(&mut self, out: &mut OutputInfo) -> State {
        if out.can_take_byte() {
            if self.push_outgoing_bits(out) > 0 {
                State::YieldBrLength
            } else {
                self.match_scan_index += self.match_length;
                self.match_length = 0;
                State::Search
            }
        } else {
            State::YieldBrLength
        }
    }

    fn st_save_backlog(&mut self) -> State {
        self.save_backlog();
        State::NotFull
    }

    fn st_flush_bit_buffer(&self, out: &mut OutputInfo) -> State {
        if self.bit_index == 0x80 {
            State::Done
        } else if out.can_take_byte() {
            out.push_byte(self.current_byte);
            State::Done
        } else {
            State::FlushBits
        }
    }

    fn add_tag_bit(&mut self, out: &mut OutputInfo, tag: u8) {
        self.push_bits(1, tag, out)
    }

    fn input_offset(&self) -> usize {
        self.input_buffer_size()
    }

    fn input_buffer_size(&self) -> usize {
        self.buffer.as_ref().len() / 2
    }

    fn is_finishing(&self) -> bool {
        (self.flags & FLAG_IS_FINISHING) == FLAG_IS_FINISHING
    }

    fn do_indexing(&mut self) {
        if self.input_size == 0 {
            return;
        }
        let valid_len = self.input_offset() + self.input_size - 1;
        self.engine.reindex(self.buffer.as_ref(), valid_len);
    }

    fn push_outgoing_bits(&mut self, out: &mut OutputInfo) -> u8 {
        let (count, bits) = if self.outgoing_bits_count > 8 {
            (8, (self.outgoing_bits >> (self.outgoing_bits_count - 8)) as u8)
        } else {
            (self.outgoing_bits_count, self.outgoing_bits as u8)
        };

        if count > 0 {
            self.push_bits(count, bits, out);
            self.outgoing_bits_count -= count;
        }

        count
    }

    fn push_bits(&mut self, count: u8, bits: u8, out: &mut OutputInfo) {
        if count == 8 && self.bit_index == 0x80 {
            out.push_byte(bits);
        } else {
            let mut i = count;
            while i != 0 {
                if (bits & (1 << (i - 1))) != 0 {
                    self.current_byte |= self.bit_index;
                }
                self.bit_index >>= 1;
                if self.bit_index == 0 {
                    self.bit_index = 0x80;
                    out.push_byte(self.current_byte);
                    self.current_byte = 0;
                }
                i -= 1;
            }
        }
    }

    fn push_literal_byte(&mut self, out: &mut OutputInfo) {
        let offset = self.match_scan_index - 1;
        let c = self.buffer.as_ref()[self.input_offset() + offset];
        self.push_bits(8, c, out);
    }

    fn save_backlog(&mut self) {
        // Copy processed data to beginning of buffer, so it can be used for
        // future matches. Don't bother checking whether the input is less
        // than the maximum size, because if it isn't, we're done anyway.
        let input_buffer_size = self.input_buffer_size();
        let remaining_size = input_buffer_size - self.match_scan_index; // unprocessed bytes
        let shift_size = input_buffer_size + remaining_size;
        self.buffer
            .as_mut()
            .copy_within(self.match_scan_index..self.match_scan_index + shift_size, 0);
        self.match_scan_index = 0;
        self.input_size -= input_buffer_size - remaining_size;
    }
}

#[cfg(all(test, feature = "alloc"))]
mod tests {
    use super::*;
    use crate::search::ScalarEngine;
    use alloc::vec::Vec;

    #[test]
    fn rejects_window_out_of_range() {
        let err = Encoder::<Vec<u8>, ScalarEngine>::new(2, 1).unwrap_err();
        assert_eq!(err, ConstructError::WindowBitsOutOfRange);
    }

    #[test]
    fn rejects_lookahead_out_of_range() {
        let err = Encoder::<Vec<u8>, ScalarEngine>::new(8, 8).unwrap_err();
        assert_eq!(err, ConstructError::LookaheadBitsOutOfRange);
    }

    #[test]
    fn sink_after_finish_is_misuse() {
        let mut enc = Encoder::<Vec<u8>, ScalarEngine>::new(8, 4).unwrap();
        enc.finish();
        assert_eq!(enc.sink(b"x"), SinkResult::ErrorMisuse);
    }

    #[test]
    fn static_storage_too_small_is_rejected() {
        let err = Encoder::<[u8; 4], ScalarEngine>::new(8, 4).unwrap_err();
        assert_eq!(err, ConstructError::BufferTooSmall);
    }

    #[test]
    fn static_storage_large_enough_is_accepted() {
        let enc = Encoder::<[u8; 512], ScalarEngine>::new(8, 4);
        assert!(enc.is_ok());
    }
}
