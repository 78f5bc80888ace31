use std::fs;
use std::sync::Arc;

use telelink_frame::{decode_message, ChannelMux, ParseOutcome, Phase};
use tracing::{info, warn};

use crate::cmd::{Context, DecodeArgs};
use crate::exit::{frame_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::print_message;

pub fn run(args: DecodeArgs, ctx: &Context) -> CliResult<i32> {
    let bytes = match (&args.hex, &args.file) {
        (Some(hex), _) => parse_hex(hex)?,
        (None, Some(path)) => fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?,
        (None, None) => return Err(CliError::new(USAGE, "one of --hex or --file is required")),
    };

    let channel = ctx.peer.channel;
    let mut mux = ChannelMux::new(Arc::clone(&ctx.registry));
    let mut decoded = 0usize;

    for outcome in mux.feed_slice(channel, &bytes) {
        if let ParseOutcome::FrameReady(frame) = outcome {
            let message = decode_message(&ctx.registry, &frame)
                .map_err(|err| frame_error("decode failed", err))?;
            print_message(&message, ctx.format);
            decoded += 1;
        }
    }

    if let Some(parser) = mux.channel(channel) {
        if parser.phase() != Phase::Idle {
            warn!(phase = ?parser.phase(), "input ends inside a frame");
        }
    }

    let stats = mux.stats(channel).unwrap_or_default();
    info!(
        decoded,
        dropped = stats.dropped_frame_count,
        sequence_gaps = stats.sequence_gaps,
        bytes_discarded = stats.bytes_discarded,
        "decode finished"
    );

    if decoded == 0 {
        return Err(CliError::new(
            DATA_INVALID,
            format!(
                "no valid frames in {} bytes ({} rejected)",
                bytes.len(),
                stats.dropped_frame_count
            ),
        ));
    }

    Ok(SUCCESS)
}

/// Parse a hex dump. Bytes may be separated by whitespace, commas or
/// colons and carry an optional `0x` prefix; unseparated runs are split
/// into pairs.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input
        .split(|c: char| c.is_whitespace() || c == ',' || c == ':')
        .map(|token| {
            token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token)
        })
        .collect();

    hex::decode(&digits)
        .map_err(|err| CliError::new(USAGE, format!("not a hex dump ({err}): {input:?}")))
}
