use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use telelink_peer::Endpoint;
use tracing::info;

use crate::cmd::{Context, ListenArgs};
use crate::exit::{peer_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::print_message;

pub fn run(args: ListenArgs, ctx: &Context) -> CliResult<i32> {
    let mut endpoint = Endpoint::open(&args.device, Arc::clone(&ctx.registry), ctx.peer.clone())
        .map_err(|err| peer_error("open failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    info!(device = %args.device.display(), "listening");
    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let message = match endpoint.recv() {
            Ok(message) => message,
            Err(err) if err.is_disconnect() => break,
            Err(err) => return Err(peer_error("receive failed", err)),
        };

        if let Some(ids) = &args.messages {
            if !ids.contains(&message.frame.message_id()) {
                continue;
            }
        }

        print_message(&message, ctx.format);
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                break;
            }
        }
    }

    let stats = endpoint.stats();
    info!(
        printed,
        received = stats.frames_received,
        dropped = stats.dropped_frame_count,
        sequence_gaps = stats.sequence_gaps,
        bytes_discarded = stats.bytes_discarded,
        "link statistics"
    );

    Ok(SUCCESS)
}

/// The first interrupt stops after the next message; a second one exits
/// immediately, since a quiet link leaves `recv` blocked.
fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        if !running.swap(false, Ordering::SeqCst) {
            std::process::exit(130);
        }
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
