use clap::{ArgGroup, Parser};
use heatshrink::decoder::Decoder;
use heatshrink::encoder::Encoder;
use heatshrink::{FinishResult, PollResult, SinkResult};
use std::fs::File;
use std::io::{self, Read, Write};
use std::process::ExitCode;

#[cfg(feature = "heatshrink-use-index")]
use heatshrink::search::IndexedEngine as DefaultEngine;
#[cfg(not(feature = "heatshrink-use-index"))]
use heatshrink::search::ScalarEngine as DefaultEngine;

const APP_BUFFER_SIZE: usize = 64 * 1024;
const DEFAULT_WINDOW_BITS: u8 = 11;
const DEFAULT_LOOKAHEAD_BITS: u8 = 4;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("command").required(true).args(["encode", "decode"])))]
struct Cli {
    #[arg(short = 'e', long = "encode", help = "Compress data")]
    encode: bool,

    #[arg(short = 'd', long = "decode", help = "Decompress data")]
    decode: bool,

    #[arg(
        short = 'v',
        long = "verbose",
        help = "Print input & output sizes, compression ratio, etc."
    )]
    verbose: bool,

    #[arg(
        short = 'w',
        long = "window",
        default_value_t = DEFAULT_WINDOW_BITS,
        help = "Window size, in bits"
    )]
    window_bits: u8,

    #[arg(
        short = 'l',
        long = "lookahead",
        default_value_t = DEFAULT_LOOKAHEAD_BITS,
        help = "Lookahead size, in bits"
    )]
    lookahead_bits: u8,

    #[arg(
        short = 'b',
        long = "decoder-buffer",
        default_value_t = heatshrink::DEFAULT_INPUT_BUFFER_SIZE,
        help = "Decoder staging buffer size, in bytes (decode mode only)"
    )]
    decoder_buffer_size: usize,

    /// Input file; reads standard input if omitted.
    input_file: Option<String>,

    /// Output file; writes standard output if omitted.
    output_file: Option<String>,
}

fn open_input(path: &Option<String>) -> io::Result<Box<dyn Read>> {
    match path {
        Some(p) => Ok(Box::new(File::open(p)?)),
        None => Ok(Box::new(io::stdin())),
    }
}

fn open_output(path: &Option<String>) -> io::Result<Box<dyn Write>> {
    match path {
        Some(p) => Ok(Box::new(File::create(p)?)),
        None => Ok(Box::new(io::stdout())),
    }
}

fn construct_error(e: heatshrink::ConstructError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, format!("{e:?}"))
}

fn run_encode(
    mut input: Box<dyn Read>,
    mut output: Box<dyn Write>,
    window_bits: u8,
    lookahead_bits: u8,
) -> io::Result<(u64, u64)> {
    let mut enc: Encoder<Vec<u8>, DefaultEngine> =
        Encoder::new(window_bits, lookahead_bits).map_err(construct_error)?;

    let mut in_buf = [0u8; APP_BUFFER_SIZE];
    let mut out_buf = [0u8; APP_BUFFER_SIZE];
    let mut total_in = 0u64;
    let mut total_out = 0u64;
    let mut done = false;

    while !done {
        let read = input.read(&mut in_buf)?;
        total_in += read as u64;

        let mut consumed = 0;
        loop {
            if consumed < read {
                match enc.sink(&in_buf[consumed..read]) {
                    SinkResult::Ok(n) => consumed += n,
                    SinkResult::Full => {}
                    SinkResult::ErrorMisuse => {
                        return Err(io::Error::new(io::ErrorKind::Other, "encoder sink misuse"));
                    }
                }
            }

            loop {
                match enc.poll(&mut out_buf) {
                    PollResult::More(n) => {
                        if n > 0 {
                            output.write_all(&out_buf[..n])?;
                            total_out += n as u64;
                        }
                    }
                    PollResult::Empty(n) => {
                        if n > 0 {
                            output.write_all(&out_buf[..n])?;
                            total_out += n as u64;
                        }
                        break;
                    }
                }
            }

            if read == 0 {
                if enc.finish() == FinishResult::Done {
                    done = true;
                }
                break;
            }

            if consumed == read {
                break;
            }
        }
    }

    output.flush()?;
    Ok((total_in, total_out))
}

fn run_decode(
    mut input: Box<dyn Read>,
    mut output: Box<dyn Write>,
    decoder_buffer_size: usize,
    window_bits: u8,
    lookahead_bits: u8,
) -> io::Result<(u64, u64)> {
    let mut dec: Decoder<Vec<u8>, Vec<u8>> =
        Decoder::new(decoder_buffer_size, window_bits, lookahead_bits).map_err(construct_error)?;

    let mut in_buf = [0u8; APP_BUFFER_SIZE];
    let mut out_buf = [0u8; APP_BUFFER_SIZE];
    let mut total_in = 0u64;
    let mut total_out = 0u64;

    loop {
        let read = input.read(&mut in_buf)?;
        total_in += read as u64;

        let mut consumed = 0;
        while consumed < read {
            match dec.sink(&in_buf[consumed..read]) {
                SinkResult::Ok(n) => consumed += n,
                SinkResult::Full => {}
                SinkResult::ErrorMisuse => {
                    return Err(io::Error::new(io::ErrorKind::Other, "decoder sink misuse"));
                }
            }

            loop {
                match dec.poll(&mut out_buf) {
                    PollResult::More(n) => {
                        output.write_all(&out_buf[..n])?;
                        total_out += n as u64;
                    }
                    PollResult::Empty(n) => {
                        output.write_all(&out_buf[..n])?;
                        total_out += n as u64;
                        break;
                    }
                }
            }
        }

        if read == 0 {
            break;
        }
    }

    output.flush()?;
    let _ = dec.finish();
    Ok((total_in, total_out))
}

fn report(cli: &Cli, input_len: u64, output_len: u64) {
    let ratio = if input_len > 0 {
        100.0 - (100.0 * output_len as f32) / input_len as f32
    } else {
        0.0
    };
    eprintln!(
        "{ratio:.2}%\t{input_len} -> {output_len} (-w {} -l {})",
        cli.window_bits, cli.lookahead_bits
    );
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let input = match open_input(&cli.input_file) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error opening input: {e}");
            return ExitCode::FAILURE;
        }
    };
    let output = match open_output(&cli.output_file) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("error opening output: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = if cli.encode {
        run_encode(input, output, cli.window_bits, cli.lookahead_bits)
    } else {
        run_decode(
            input,
            output,
            cli.decoder_buffer_size,
            cli.window_bits,
            cli.lookahead_bits,
        )
    };

    match result {
        Ok((total_in, total_out)) => {
            if cli.verbose {
                report(&cli, total_in, total_out);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
