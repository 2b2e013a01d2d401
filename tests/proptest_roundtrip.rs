use heatshrink::decoder::Decoder;
use heatshrink::encoder::Encoder;
use heatshrink::search::ScalarEngine;
use heatshrink::{FinishResult, PollResult, SinkResult};
use proptest::prelude::*;

/// Compresses then decompresses `data`, sinking it in `chunk_size`-sized
/// pieces and always polling into a deliberately awkward scratch buffer
/// size, so suspend/resume is exercised on both ends of the pipe.
fn roundtrip(data: &[u8], window_bits: u8, lookahead_bits: u8, chunk_size: usize) -> Vec<u8> {
    let mut enc: Encoder<Vec<u8>, ScalarEngine> =
        Encoder::new(window_bits, lookahead_bits).unwrap();
    let mut compressed = Vec::new();
    let mut scratch = [0u8; 37];

    for chunk in data.chunks(chunk_size.max(1)) {
        let mut remaining = chunk;
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
    }
    while enc.finish() == FinishResult::More {
        match enc.poll(&mut scratch) {
            PollResult::More(n) | PollResult::Empty(n) => compressed.extend_from_slice(&scratch[..n]),
        }
    }

    let mut dec: Decoder<Vec<u8>, Vec<u8>> = Decoder::new(17, window_bits, lookahead_bits).unwrap();
    let mut decompressed = Vec::new();
    for chunk in compressed.chunks(chunk_size.max(1)) {
        let mut remaining = chunk;
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
    }
    let _ = dec.finish();
    decompressed
}

proptest! {
    #[test]
    fn roundtrips_arbitrary_bytes(
        data in proptest::collection::vec(any::<u8>(), 0..2000),
        window_bits in 4u8..=12,
        chunk_size in 1usize..64,
    ) {
        let lookahead_bits = window_bits - 1;
        let decompressed = roundtrip(&data, window_bits, lookahead_bits, chunk_size);
        prop_assert_eq!(data, decompressed);
    }

    #[test]
    fn roundtrips_one_byte_at_a_time(
        data in proptest::collection::vec(any::<u8>(), 0..200),
    ) {
        let decompressed = roundtrip(&data, 8, 4, 1);
        prop_assert_eq!(data, decompressed);
    }
}
