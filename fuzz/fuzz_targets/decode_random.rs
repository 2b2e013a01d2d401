#![no_main]

use heatshrink::decoder::Decoder;
use heatshrink::{PollResult, SinkResult};
use libfuzzer_sys::fuzz_target;

const WINDOW_BITS: u8 = 8;
const LOOKAHEAD_BITS: u8 = 4;

// The decoder must never panic, even on input that was never produced by
// our own encoder.
fuzz_target!(|data: &[u8]| {
    let mut dec: Decoder<Vec<u8>, Vec<u8>> = match Decoder::new(256, WINDOW_BITS, LOOKAHEAD_BITS) {
        Ok(d) => d,
        Err(_) => return,
    };
    let mut scratch = [0u8; 4096];
    let mut remaining = data;

    while !remaining.is_empty() {
        if let SinkResult::Ok(n) = dec.sink(remaining) {
            remaining = &remaining[n..];
        }
        loop {
            match dec.poll(&mut scratch) {
                PollResult::More(_) => {}
                PollResult::Empty(_) => break,
            }
        }
    }
    let _ = dec.finish();
});
