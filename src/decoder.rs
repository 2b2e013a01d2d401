use crate::{ConstructError, FinishResult, OutputInfo, Params, PollResult, SinkResult, Storage};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum State {
    TagBit,          // tag bit
    YieldLiteral,    // ready to yield literal byte
    BackrefIndexMsb, // most significant bits of backref index
    BackrefIndexLsb, // least significant bits of backref index
    BackrefCountMsb, // most significant bits of backref count
    BackrefCountLsb, // least significant bits of backref count
    YieldBackref,    // ready to yield back-reference
}

/// A streaming LZSS-style decompressor.
///
/// `SI` is the byte [`Storage`] backing the input (compressed) bit buffer,
/// and `SO` is the byte [`Storage`] backing the sliding output window. Both
/// are chosen at construction time: typically `Vec<u8>` for both in dynamic
/// mode, or two independently-sized fixed arrays in static mode.
#[derive(Debug)]
pub struct Decoder<SI: Storage, SO: Storage> {
    params: Params,
    input_size: usize,
    input_index: usize,
    output_count: u16,
    output_index: u16,
    head_index: u16,
    current_byte: u8,
    bit_index: u8,
    state: State,
    input_buffer: SI,
    output_buffer: SO,
}

impl<SI: Storage, SO: Storage> Decoder<SI, SO> {
    /// Create a new decoder with an `input_buffer_size`-byte staging buffer
    /// for compressed bytes, and the given window and lookahead sizes (in
    /// bits), which must match the encoder that produced the stream.
    pub fn new(
        input_buffer_size: usize,
        window_bits: u8,
        lookahead_bits: u8,
    ) -> Result<Self, ConstructError> {
        if input_buffer_size == 0 || input_buffer_size > u16::MAX as usize {
            return Err(ConstructError::InputBufferSizeInvalid);
        }
        let params = Params::new(window_bits, lookahead_bits)?;
        let input_buffer = SI::with_zeroed_len(input_buffer_size)?;
        let output_buffer = SO::with_zeroed_len(params.window_len())?;

        Ok(Decoder {
            params,
            input_size: 0,
            input_index: 0,
            output_count: 0,
            output_index: 0,
            head_index: 0,
            current_byte: 0,
            bit_index: 0,
            state: State::TagBit,
            input_buffer,
            output_buffer,
        })
    }

    /// Reset this decoder, discarding any buffered state, so it can be
    /// reused for a new stream with the same parameters.
    pub fn reset(&mut self) {
        self.input_size = 0;
        self.input_index = 0;
        self.output_count = 0;
        self.output_index = 0;
        self.head_index = 0;
        self.current_byte = 0;
        self.bit_index = 0;
        self.state = State::TagBit;
        self.input_buffer.zero_fill();
        self.output_buffer.zero_fill();
    }

    /// Feed more compressed bytes in. Returns how many bytes of `input`
    /// were accepted into the internal staging buffer.
    pub fn sink(&mut self, input: &[u8]) -> SinkResult {
        let remaining_size = self.input_buffer.as_ref().len() - self.input_size;

        if remaining_size == 0 {
            return SinkResult::Full;
        }

        let copy_size = remaining_size.min(input.len());
        self.input_buffer.as_mut()[self.input_size..self.input_size + copy_size]
            .copy_from_slice(&input[..copy_size]);
        self.input_size += copy_size;

        SinkResult::Ok(copy_size)
    }

    /// Process the internal buffer and write decompressed bytes into
    /// `output`. Call repeatedly until it returns `PollResult::Empty`.
    pub fn poll(&mut self, output: &mut [u8]) -> PollResult {
        if output.is_empty() {
            return PollResult::More(0);
        }

        let mut out = OutputInfo::new(output);

        loop {
            let in_state = self.state;

            #[cfg(feature = "logging")]
            log::trace!("decoder state {:?}", in_state);

            match in_state {
                State::TagBit => self.state = self.st_tag_bit(),
                State::YieldLiteral => self.state = self.st_yield_literal(&mut out),
                State::BackrefIndexMsb => self.state = self.st_backref_index_msb(),
                State::BackrefIndexLsb => self.state = self.st_backref_index_lsb(),
                State::BackrefCountMsb => self.state = self.st_backref_count_msb(),
                State::BackrefCountLsb => self.state = self.st_backref_count_lsb(),
                State::YieldBackref => self.state = self.st_yield_backref(&mut out),
            }

            // If the current state cannot advance, check whether the input
            // or output buffer is what's exhausted.
            if self.state == in_state {
                return if out.can_take_byte() {
                    PollResult::Empty(out.written())
                } else {
                    PollResult::More(out.written())
                };
            }
        }
    }

    fn st_tag_bit(&mut self) -> State {
        match self.get_bits(1) {
            None => State::TagBit,
            Some(0) => {
                self.output_index = 0;
                State::BackrefIndexMsb
            }
            Some(_) => State::YieldLiteral,
        }
    }

    fn st_yield_literal(&mut self, out: &mut OutputInfo) -> State {
        // Emit a byte, and add it (again) to the window buffer. (Note that
        // a later back-reference can include this very byte.)
        if out.can_take_byte() {
            match self.get_bits(8) {
                None => State::YieldLiteral, // input buffer is consumed
                Some(x) => {
                    let c = (x & 0xff) as u8;
                    let mask = self.output_buffer.as_ref().len() - 1;
                    self.output_buffer.as_mut()[self.head_index as usize & mask] = c;
                    self.head_index = (self.head_index + 1) & mask as u16;
                    out.push_byte(c);
                    State::TagBit
                }
            }
        } else {
            State::YieldLiteral
        }
    }

    fn st_backref_index_msb(&mut self) -> State {
        let msb_bits = self.params.window_bits.saturating_sub(8);
        match self.get_bits(msb_bits) {
            None => State::BackrefIndexMsb,
            Some(x) => {
                self.output_index = x << 8;
                State::BackrefIndexLsb
            }
        }
    }

    fn st_backref_index_lsb(&mut self) -> State {
        let lsb_bits = self.params.window_bits.min(8);
        match self.get_bits(lsb_bits) {
            None => State::BackrefIndexLsb,
            Some(x) => {
                self.output_index |= x;
                self.output_index += 1;
                self.output_count = 0;
                State::BackrefCountMsb
            }
        }
    }

    fn st_backref_count_msb(&mut self) -> State {
        let msb_bits = self.params.lookahead_bits.saturating_sub(8);
        match self.get_bits(msb_bits) {
            None => State::BackrefCountMsb,
            Some(x) => {
                self.output_count = x << 8;
                State::BackrefCountLsb
            }
        }
    }

    fn st_backref_count_lsb(&mut self) -> State {
        let lsb_bits = self.params.lookahead_bits.min(8);
        match self.get_bits(lsb_bits) {
            None => State::BackrefCountLsb,
            Some(x) => {
                self.output_count |= x;
                self.output_count += 1;
                State::YieldBackref
            }
        }
    }

    fn st_yield_backref(&mut self, out: &mut OutputInfo) -> State {
        if out.can_take_byte() {
            let mask = self.output_buffer.as_ref().len() - 1;
            let mut count = out.remaining_free_size();
            if usize::from(self.output_count) < count {
                count = usize::from(self.output_count);
            }

            for _ in 0..count {
                // Wrapping subtraction before masking lets this read land on
                // a never-yet-written (zero-initialized) window slot near
                // the start of a stream without a special-case guard; the
                // window length is always a power of two so `& mask` still
                // recovers the correct ring position.
                let src = (self.head_index as usize).wrapping_sub(self.output_index as usize) & mask;
                let c = self.output_buffer.as_ref()[src];
                self.output_buffer.as_mut()[self.head_index as usize & mask] = c;
                out.push_byte(c);
                self.head_index = (self.head_index + 1) & mask as u16;
            }

            self.output_count -= count as u16;

            if self.output_count == 0 {
                return State::TagBit;
            }
        }
        State::YieldBackref
    }

    /// Get the next `count` bits from the input buffer, saving incremental
    /// progress across suspend points. Returns `None` on end of input, or
    /// if more than 15 bits are requested.
    fn get_bits(&mut self, count: u8) -> Option<u16> {
        if count == 0 {
            return Some(0);
        }
        if count > 15 {
            return None;
        }

        // If we aren't able to get `count` bits, suspend immediately,
        // because we don't track how many bits of `count` we've
        // accumulated before suspending.
        if self.input_size == 0 && self.bit_index < (1 << (count - 1)) {
            return None;
        }

        let mut accumulator: u16 = 0;
        let mut i = 0u8;

        while i < count {
            if self.bit_index == 0 {
                if self.input_size == 0 {
                    return None;
                }
                self.current_byte = self.input_buffer.as_ref()[self.input_index];
                self.input_index += 1;
                if self.input_index == self.input_size {
                    // input buffer is consumed
                    self.input_index = 0;
                    self.input_size = 0;
                }
                self.bit_index = 0x80;
            }
            accumulator <<= 1;
            if self.current_byte & self.bit_index != 0 {
                accumulator |= 0x1;
            }
            self.bit_index >>= 1;
            i += 1;
        }

        Some(accumulator)
    }

    /// Mark the input stream as finished. Any bits still buffered past this
    /// point are padding. Returns `Done` once all sunk input has been
    /// consumed by `poll`.
    pub fn finish(&self) -> FinishResult {
        if self.input_size == 0 {
            FinishResult::Done
        } else {
            FinishResult::More
        }
    }
}

#[cfg(all(test, feature = "alloc"))]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn rejects_zero_input_buffer() {
        let err = Decoder::<Vec<u8>, Vec<u8>>::new(0, 8, 4).unwrap_err();
        assert_eq!(err, ConstructError::InputBufferSizeInvalid);
    }

    #[test]
    fn rejects_oversized_input_buffer() {
        let err =
            Decoder::<Vec<u8>, Vec<u8>>::new(u16::MAX as usize + 1, 8, 4).unwrap_err();
        assert_eq!(err, ConstructError::InputBufferSizeInvalid);
    }

    #[test]
    fn accepts_max_input_buffer() {
        let dec = Decoder::<Vec<u8>, Vec<u8>>::new(u16::MAX as usize, 8, 4);
        assert!(dec.is_ok());
    }

    #[test]
    fn sink_reports_full() {
        let mut dec = Decoder::<Vec<u8>, Vec<u8>>::new(2, 8, 4).unwrap();
        assert_eq!(dec.sink(&[1, 2]), SinkResult::Ok(2));
        assert_eq!(dec.sink(&[3]), SinkResult::Full);
    }

    #[test]
    fn clib_compatibility() {
        let src = hex_literal::hex!("90D4B2B549A4082BE00F000E4C46DF2817C605F005B4BE0825F00280");
        let expected = hex_literal::hex!(
            "21529554340200000000000000000000000000000000000000000000000000000000000000000 0009302000000000000F202F102F0020000000000002F0400000000000000000000000000000000000000000000"
        );

        let mut dec = Decoder::<Vec<u8>, Vec<u8>>::new(64, 8, 4).unwrap();
        let mut dst = Vec::new();
        let mut scratch = [0u8; 128];

        let mut remaining: &[u8] = &src;
        while !remaining.is_empty() {
            if let SinkResult::Ok(n) = dec.sink(remaining) {
                remaining = &remaining[n..];
            }
        }
        loop {
            match dec.poll(&mut scratch) {
                PollResult::Empty(n) => {
                    dst.extend_from_slice(&scratch[..n]);
                    break;
                }
                PollResult::More(n) => {
                    dst.extend_from_slice(&scratch[..n]);
                }
            }
        }

        assert_eq!(dec.finish(), FinishResult::Done);
        assert_eq!(&expected[..], dst.as_slice());
    }
}
