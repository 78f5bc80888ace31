//! Loopback example: a vehicle and a ground station over a socket pair.
//!
//! Run with:
//!   cargo run --example loopback --features peer

#[cfg(unix)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::os::unix::net::UnixStream;
    use std::sync::Arc;
    use std::thread;

    use telelink::peer::{Endpoint, PeerConfig, PeerError};
    use telelink::schema::MessageRegistry;
    use telelink::transport::StreamTransport;

    let registry = Arc::new(MessageRegistry::builtin()?);
    let (vehicle_link, ground_link) = UnixStream::pair()?;

    let vehicle_registry = Arc::clone(&registry);
    let vehicle = thread::spawn(move || -> Result<(), PeerError> {
        let config = PeerConfig {
            system_id: 1,
            component_id: 1,
            ..PeerConfig::default()
        };
        let mut vehicle = Endpoint::new(StreamTransport::new(vehicle_link), vehicle_registry, config);

        vehicle.send_named(
            "HEARTBEAT",
            &[("type", "2"), ("autopilot", "3"), ("mavlink_version", "3")],
        )?;
        vehicle.send_named(
            "ATTITUDE",
            &[("time_boot_ms", "1500"), ("roll", "0.05"), ("yaw", "1.57")],
        )?;
        vehicle.send_named("STATUSTEXT", &[("severity", "6"), ("text", "armed")])?;

        let request = vehicle.recv()?;
        eprintln!(
            "[vehicle] {} from system {}",
            request.name(),
            request.frame.system_id()
        );
        Ok(())
    });

    let mut ground = Endpoint::new(
        StreamTransport::new(ground_link),
        registry,
        PeerConfig::default(),
    );

    for _ in 0..3 {
        let message = ground.recv()?;
        let fields: Vec<String> = message
            .fields()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        eprintln!(
            "[ground] #{} {} {}",
            message.frame.sequence(),
            message.name(),
            fields.join(" ")
        );
    }

    ground.send_named(
        "REQUEST_DATA_STREAM",
        &[
            ("req_message_rate", "4"),
            ("target_system", "1"),
            ("target_component", "1"),
            ("start_stop", "1"),
        ],
    )?;

    vehicle.join().map_err(|_| "vehicle thread panicked")??;

    let stats = ground.stats();
    eprintln!(
        "[ground] received={} dropped={} gaps={}",
        stats.frames_received, stats.dropped_frame_count, stats.sequence_gaps
    );
    Ok(())
}

#[cfg(not(unix))]
fn main() {
    eprintln!("the loopback example needs unix socket pairs");
}
