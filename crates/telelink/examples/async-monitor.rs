//! Async monitor example: decode frames from an async byte stream.
//!
//! Run with:
//!   cargo run --example async-monitor --features async

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use telelink::frame::{decode_message, Encoder, TelemetryCodec};
use telelink::schema::{catalog, FieldValue, MessageRegistry};
use tokio_util::codec::{FramedRead, FramedWrite};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let registry = Arc::new(MessageRegistry::builtin()?);
    let (link_tx, link_rx) = tokio::io::duplex(1024);

    let sender_registry = Arc::clone(&registry);
    let sender = tokio::spawn(async move {
        let mut sink = FramedWrite::new(link_tx, TelemetryCodec::new(Arc::clone(&sender_registry)));
        let encoder = Encoder::new(&sender_registry);
        for seq in 0..5u8 {
            let frame = encoder.pack(
                1,
                1,
                catalog::ATTITUDE,
                &[
                    FieldValue::U32(u32::from(seq) * 100),
                    FieldValue::F32(0.01 * f32::from(seq)),
                    FieldValue::F32(0.0),
                    FieldValue::F32(1.57),
                    FieldValue::F32(0.0),
                    FieldValue::F32(0.0),
                    FieldValue::F32(0.0),
                ],
                seq,
            )?;
            sink.send(frame).await?;
        }
        Ok::<_, telelink::frame::FrameError>(())
    });

    let mut frames = FramedRead::new(link_rx, TelemetryCodec::new(Arc::clone(&registry)));
    while let Some(frame) = frames.next().await {
        let message = decode_message(&registry, &frame?)?;
        println!(
            "{} #{} time_boot_ms={} roll={}",
            message.name(),
            message.frame.sequence(),
            message.get("time_boot_ms").map(|v| v.to_string()).unwrap_or_default(),
            message.get("roll").map(|v| v.to_string()).unwrap_or_default()
        );
    }

    sender.await??;
    let stats = frames.decoder().stats();
    println!(
        "received={} dropped={}",
        stats.frames_received, stats.dropped_frame_count
    );
    Ok(())
}
