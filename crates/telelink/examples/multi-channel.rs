//! Multi-channel example: two links share one process, one of them noisy.
//!
//! Each channel keeps its own parser and statistics, so garbage on one
//! link never costs the other a frame.
//!
//! Run with:
//!   cargo run --example multi-channel

use std::sync::Arc;

use telelink::frame::{
    channel_name, pack_into_wire_bytes, ChannelMux, Encoder, ParseOutcome, COMM_0, COMM_1,
};
use telelink::schema::{catalog, FieldValue, MessageRegistry};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let registry = Arc::new(MessageRegistry::builtin()?);
    let encoder = Encoder::new(&registry);

    let mut radio = Vec::new();
    let mut serial = Vec::new();
    for seq in 0..4u8 {
        let trigger = encoder.pack(1, 1, catalog::PI_TRIGGER, &[FieldValue::U8(seq)], seq)?;
        let mut wire = pack_into_wire_bytes(&trigger).to_vec();
        if seq == 2 {
            // A bit flip in flight.
            wire[6] ^= 0x10;
        }
        radio.extend_from_slice(&[0x00, 0x7F]);
        radio.extend_from_slice(&wire);

        let heartbeat = encoder.pack(
            2,
            1,
            catalog::HEARTBEAT,
            &[
                FieldValue::U32(0),
                FieldValue::U8(1),
                FieldValue::U8(3),
                FieldValue::U8(0x80),
                FieldValue::U8(4),
                FieldValue::U8(3),
            ],
            seq,
        )?;
        serial.extend_from_slice(&pack_into_wire_bytes(&heartbeat));
    }

    let mut mux = ChannelMux::new(registry);
    let (mut radio_bytes, mut serial_bytes) = (radio.iter(), serial.iter());

    // Interleave the two captures byte by byte.
    loop {
        let mut progressed = false;
        for (channel, next) in [
            (COMM_0, radio_bytes.next()),
            (COMM_1, serial_bytes.next()),
        ] {
            let Some(&byte) = next else { continue };
            progressed = true;
            if let ParseOutcome::FrameReady(frame) = mux.feed(channel, byte) {
                println!(
                    "{}: message {} seq {} from {}",
                    channel_name(channel),
                    frame.message_id(),
                    frame.sequence(),
                    frame.system_id()
                );
            }
        }
        if !progressed {
            break;
        }
    }

    for channel in mux.channel_ids() {
        if let Some(stats) = mux.stats(channel) {
            println!(
                "{}: received={} dropped={} gaps={} discarded={}",
                channel_name(channel),
                stats.frames_received,
                stats.dropped_frame_count,
                stats.sequence_gaps,
                stats.bytes_discarded
            );
        }
    }

    Ok(())
}
