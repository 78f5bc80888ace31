use std::sync::Arc;

use telelink_frame::Encoder;
use telelink_peer::Endpoint;
use tracing::info;

use crate::cmd::{resolve_message, Context, SendArgs};
use crate::exit::{frame_error, peer_error, schema_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::print_frame;

pub fn run(args: SendArgs, ctx: &Context) -> CliResult<i32> {
    let descriptor = resolve_message(&ctx.registry, &args.message)?;
    let assignments = parse_assignments(&args.fields)?;
    let values = descriptor
        .parse_values(assignments)
        .map_err(|err| schema_error("invalid field", err))?;

    let frame = match &args.device {
        Some(path) => {
            let mut endpoint = Endpoint::open(path, Arc::clone(&ctx.registry), ctx.peer.clone())
                .map_err(|err| peer_error("open failed", err))?;
            let frame = endpoint
                .send(descriptor.id(), &values)
                .map_err(|err| peer_error("send failed", err))?;
            info!(
                device = %path.display(),
                message = descriptor.name(),
                sequence = frame.sequence(),
                "message sent"
            );
            frame
        }
        None => Encoder::new(&ctx.registry)
            .pack(
                ctx.peer.system_id,
                ctx.peer.component_id,
                descriptor.id(),
                &values,
                args.sequence,
            )
            .map_err(|err| frame_error("pack failed", err))?,
    };

    print_frame(&frame, descriptor, ctx.format);
    Ok(SUCCESS)
}

/// Split `NAME=VALUE` arguments; the value may itself contain `=`.
fn parse_assignments(fields: &[String]) -> CliResult<Vec<(&str, &str)>> {
    fields
        .iter()
        .map(|field| {
            field
                .split_once('=')
                .map(|(name, value)| (name.trim(), value))
                .filter(|(name, _)| !name.is_empty())
                .ok_or_else(|| CliError::new(USAGE, format!("expected NAME=VALUE, got {field:?}")))
        })
        .collect()
}
