use std::path::Path;
use std::sync::Arc;

use telelink_frame::{
    channel_name, decode_message, transmit_frame, ChannelId, ChannelMux, ChannelStats,
    DecodedMessage, Encoder, Frame, ParseOutcome, COMM_0, DEFAULT_COMPONENT_ID, DEFAULT_SYSTEM_ID,
};
use telelink_schema::{FieldValue, MessageRegistry};
use telelink_transport::{LinkTransport, SerialDevice, StreamTransport, TransportError};
use tracing::debug;

use crate::error::{PeerError, Result};

/// Identity and channel of an endpoint.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// Channel whose parser state and transmit sequence this endpoint uses.
    pub channel: ChannelId,
    /// System id stamped on outgoing frames.
    pub system_id: u8,
    /// Component id stamped on outgoing frames.
    pub component_id: u8,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            channel: COMM_0,
            system_id: DEFAULT_SYSTEM_ID,
            component_id: DEFAULT_COMPONENT_ID,
        }
    }
}

/// One side of a telemetry link.
///
/// Owns the transport; packs outgoing messages with its own sender identity
/// and sequence, and parses incoming bytes on its channel.
pub struct Endpoint<T> {
    transport: T,
    mux: ChannelMux,
    config: PeerConfig,
}

impl<T: LinkTransport> Endpoint<T> {
    pub fn new(transport: T, registry: Arc<MessageRegistry>, config: PeerConfig) -> Self {
        Self {
            transport,
            mux: ChannelMux::new(registry),
            config,
        }
    }

    /// Pack and transmit one message, waiting until it has drained.
    pub fn send(&mut self, message_id: u8, values: &[FieldValue]) -> Result<Frame> {
        let channel = self.config.channel;
        let frame = Encoder::new(self.mux.registry()).pack(
            self.config.system_id,
            self.config.component_id,
            message_id,
            values,
            self.mux.tx_sequence(channel),
        )?;
        self.mux.next_sequence(channel);

        transmit_frame(&mut self.transport, &frame)?;
        debug!(
            channel,
            message_id,
            sequence = frame.sequence(),
            "message sent"
        );
        Ok(frame)
    }

    /// Send a message by name, parsing `name=value` field text.
    ///
    /// Fields left out are sent as zero.
    pub fn send_named(&mut self, message: &str, fields: &[(&str, &str)]) -> Result<Frame> {
        let (message_id, values) = {
            let descriptor = self
                .mux
                .registry()
                .lookup_by_name(message)
                .ok_or_else(|| PeerError::UnknownMessageName(message.to_string()))?;
            (
                descriptor.id(),
                descriptor.parse_values(fields.iter().copied())?,
            )
        };
        self.send(message_id, &values)
    }

    /// Block until the next valid frame arrives.
    pub fn recv_frame(&mut self) -> Result<Frame> {
        let channel = self.config.channel;
        loop {
            let byte = match self.transport.read_byte() {
                Ok(byte) => byte,
                Err(TransportError::Closed) => {
                    return Err(PeerError::Disconnected(channel_name(channel)));
                }
                Err(err) => return Err(err.into()),
            };

            if let ParseOutcome::FrameReady(frame) = self.mux.feed(channel, byte) {
                return Ok(frame);
            }
        }
    }

    /// Block until the next valid message arrives and decode it.
    pub fn recv(&mut self) -> Result<DecodedMessage> {
        let frame = self.recv_frame()?;
        Ok(decode_message(self.mux.registry(), &frame)?)
    }

    /// Receive counters of this endpoint's channel.
    pub fn stats(&self) -> ChannelStats {
        self.mux.stats(self.config.channel).unwrap_or_default()
    }

    /// Abandon any partially received frame.
    pub fn reset(&mut self) {
        self.mux.reset_channel(self.config.channel);
    }

    pub fn registry(&self) -> &Arc<MessageRegistry> {
        self.mux.registry()
    }

    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    /// Borrow the underlying transport.
    pub fn get_ref(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the underlying transport.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the endpoint and return the transport.
    pub fn into_inner(self) -> T {
        self.transport
    }
}

impl Endpoint<StreamTransport<SerialDevice>> {
    /// Open a device node as an endpoint.
    pub fn open(
        path: impl AsRef<Path>,
        registry: Arc<MessageRegistry>,
        config: PeerConfig,
    ) -> Result<Self> {
        let transport = SerialDevice::open_transport(path)?;
        Ok(Self::new(transport, registry, config))
    }
}

impl<T> std::fmt::Debug for Endpoint<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
