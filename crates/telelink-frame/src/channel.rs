//! Channel multiplexing.
//!
//! A channel is one independent byte stream (a physical link or a logical
//! sub-stream) with its own parser state and transmit sequence counter.
//! Channels 0-3 are conventionally the first four links of a device.

use std::collections::HashMap;
use std::sync::Arc;

use telelink_schema::MessageRegistry;
use tracing::{debug, warn};

use crate::parser::{ChannelStats, ParseOutcome, ParserState};

/// Identifies one channel.
pub type ChannelId = u16;

/// First link.
pub const COMM_0: ChannelId = 0;

/// Second link.
pub const COMM_1: ChannelId = 1;

/// Third link.
pub const COMM_2: ChannelId = 2;

/// Fourth link.
pub const COMM_3: ChannelId = 3;

/// Returns a human-readable name for a channel ID.
pub fn channel_name(id: ChannelId) -> String {
    match id {
        COMM_0..=COMM_3 => format!("COMM_{id}"),
        _ => format!("CHANNEL_{id}"),
    }
}

#[derive(Debug, Default)]
struct Channel {
    parser: ParserState,
    tx_sequence: u8,
}

/// Owns per-channel parser state and transmit sequences over a shared registry.
///
/// Bytes fed under one channel id never touch another channel's state.
#[derive(Debug)]
pub struct ChannelMux {
    registry: Arc<MessageRegistry>,
    channels: HashMap<ChannelId, Channel>,
}

impl ChannelMux {
    pub fn new(registry: Arc<MessageRegistry>) -> Self {
        Self {
            registry,
            channels: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<MessageRegistry> {
        &self.registry
    }

    /// Parser state of `id`, created on first use.
    pub fn get_or_create_channel(&mut self, id: ChannelId) -> &mut ParserState {
        &mut self.channel_mut(id).parser
    }

    /// Parser state of `id`, if the channel has been used.
    pub fn channel(&self, id: ChannelId) -> Option<&ParserState> {
        self.channels.get(&id).map(|channel| &channel.parser)
    }

    /// Feed one byte received on channel `id`.
    pub fn feed(&mut self, id: ChannelId, byte: u8) -> ParseOutcome {
        let registry = Arc::clone(&self.registry);
        let parser = self.get_or_create_channel(id);
        let gaps_before = parser.stats().sequence_gaps;
        let outcome = parser.feed_byte(&registry, byte);

        match &outcome {
            ParseOutcome::FrameRejected(reason) => {
                warn!(
                    channel = id,
                    %reason,
                    dropped = parser.dropped_frame_count(),
                    "frame rejected"
                );
            }
            ParseOutcome::FrameReady(frame) => {
                let gaps = parser.stats().sequence_gaps - gaps_before;
                if gaps > 0 {
                    debug!(
                        channel = id,
                        sequence = frame.sequence(),
                        missing = gaps,
                        "sequence gap"
                    );
                }
            }
            ParseOutcome::Incomplete => {}
        }

        outcome
    }

    /// Feed a run of bytes on channel `id`, collecting every non-incomplete outcome.
    pub fn feed_slice(&mut self, id: ChannelId, bytes: &[u8]) -> Vec<ParseOutcome> {
        bytes
            .iter()
            .map(|&byte| self.feed(id, byte))
            .filter(|outcome| !outcome.is_incomplete())
            .collect()
    }

    /// Sequence the next frame sent on `id` will carry.
    pub fn tx_sequence(&self, id: ChannelId) -> u8 {
        self.channels.get(&id).map_or(0, |channel| channel.tx_sequence)
    }

    /// Current transmit sequence of `id`; advances it modulo 256.
    pub fn next_sequence(&mut self, id: ChannelId) -> u8 {
        let channel = self.channel_mut(id);
        let sequence = channel.tx_sequence;
        channel.tx_sequence = sequence.wrapping_add(1);
        sequence
    }

    /// Abandon any partial frame on `id`.
    pub fn reset_channel(&mut self, id: ChannelId) {
        if let Some(channel) = self.channels.get_mut(&id) {
            debug!(channel = id, phase = ?channel.parser.phase(), "channel reset");
            channel.parser.reset();
        }
    }

    /// Drop all state for `id`.
    pub fn remove_channel(&mut self, id: ChannelId) -> Option<ParserState> {
        self.channels.remove(&id).map(|channel| channel.parser)
    }

    pub fn stats(&self, id: ChannelId) -> Option<ChannelStats> {
        self.channel(id).map(ParserState::stats)
    }

    /// Ids of channels in use, ascending.
    pub fn channel_ids(&self) -> Vec<ChannelId> {
        let mut ids: Vec<_> = self.channels.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn channel_mut(&mut self, id: ChannelId) -> &mut Channel {
        self.channels.entry(id).or_default()
    }
}
