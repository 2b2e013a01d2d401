#![no_main]

use heatshrink::decoder::Decoder;
use heatshrink::encoder::Encoder;
use heatshrink::search::ScalarEngine;
use heatshrink::{FinishResult, PollResult, SinkResult};
use libfuzzer_sys::fuzz_target;

const WINDOW_BITS: u8 = 8;
const LOOKAHEAD_BITS: u8 = 4;

fuzz_target!(|data: &[u8]| {
    let mut enc: Encoder<Vec<u8>, ScalarEngine> =
        Encoder::new(WINDOW_BITS, LOOKAHEAD_BITS).unwrap();
    let mut compressed = Vec::new();
    let mut scratch = [0u8; 4096];

    let mut remaining = data;
    while !remaining.is_empty() {
        if let SinkResult::Ok(n) = enc.sink(remaining) {
            remaining = &remaining[n..];
        }
        loop {
            match enc.poll(&mut scratch) {
                PollResult::More(n) => compressed.extend_from_slice(&scratch[..n]),
                PollResult::Empty(n) => {
                    compressed.extend_from_slice(&scratch[..n]);
                    break;
                }
            }
        }
    }
    while enc.finish() == FinishResult::More {
        match enc.poll(&mut scratch) {
            PollResult::More(n) | PollResult::Empty(n) => {
                compressed.extend_from_slice(&scratch[..n])
            }
        }
    }

    let mut dec: Decoder<Vec<u8>, Vec<u8>> =
        Decoder::new(256, WINDOW_BITS, LOOKAHEAD_BITS).unwrap();
    let mut decompressed = Vec::new();
    let mut remaining = compressed.as_slice();
    while !remaining.is_empty() {
        if let SinkResult::Ok(n) = dec.sink(remaining) {
            remaining = &remaining[n..];
        }
        loop {
            match dec.poll(&mut scratch) {
                PollResult::More(n) => decompressed.extend_from_slice(&scratch[..n]),
                PollResult::Empty(n) => {
                    decompressed.extend_from_slice(&scratch[..n]);
                    break;
                }
            }
        }
    }

    assert_eq!(data, decompressed.as_slice());
});
