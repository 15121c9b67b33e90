//! Buffer-exchange endpoint facing the external USB-class transport.
//!
//! The transport calls [`TransportBridge::exchange`] once per hardware-clocked
//! period with the buffers about to hit the wire. The bridge converts that
//! single callback into a fixed sequence of link operations with the
//! Distributor (or, for the inline topology, a direct cascade pass) and must
//! return well inside the period budget: it never blocks longer than one
//! Distributor rendezvous, regardless of how deep the filter graph is.

use crate::dsp::{BiquadCascade, Sample};
use crate::error::{FxpipeError, Result};
use crate::frame::Frame;
use crate::link::{LinkReceiver, LinkSender};

enum BridgeMode {
    /// No channel wired yet; `exchange` is a configuration error.
    Unwired,
    /// Cascades run directly inside the transport callback.
    Inline { cascades: Vec<BiquadCascade> },
    /// Frames are exchanged with a Distributor over a pair of links.
    Linked {
        to_dist: LinkSender<Frame>,
        from_dist: LinkReceiver<Frame>,
    },
}

/// The transport side of the pipeline.
pub struct TransportBridge {
    output_channels: usize,
    input_channels: usize,
    mode: BridgeMode,
}

impl TransportBridge {
    /// An unwired bridge; [`set_channel`](Self::set_channel) must be called
    /// exactly once before the first transport callback.
    pub fn new(output_channels: usize, input_channels: usize) -> Self {
        Self {
            output_channels,
            input_channels,
            mode: BridgeMode::Unwired,
        }
    }

    /// A bridge that owns one cascade per output channel and filters inside
    /// the callback itself: zero added latency, zero links.
    pub fn inline(cascades: Vec<BiquadCascade>, input_channels: usize) -> Self {
        Self {
            output_channels: cascades.len(),
            input_channels,
            mode: BridgeMode::Inline { cascades },
        }
    }

    /// One-time wiring of the link endpoints toward the Distributor.
    ///
    /// Topology builders call this; wiring an already-wired bridge is a
    /// configuration error.
    pub fn set_channel(
        &mut self,
        to_dist: LinkSender<Frame>,
        from_dist: LinkReceiver<Frame>,
    ) -> Result<()> {
        match self.mode {
            BridgeMode::Unwired => {
                self.mode = BridgeMode::Linked { to_dist, from_dist };
                Ok(())
            }
            _ => Err(FxpipeError::BridgeAlreadyWired),
        }
    }

    /// Idempotent no-op hook reserved for future state reset.
    pub fn init(&mut self) {}

    /// Number of slots in the frames this bridge exchanges: output channels
    /// first, then input channels.
    pub fn frame_len(&self) -> usize {
        self.output_channels + self.input_channels
    }

    pub fn output_channels(&self) -> usize {
        self.output_channels
    }

    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    /// One period's buffer exchange, in place.
    ///
    /// On entry `output` holds the samples about to be transmitted and
    /// `input` the samples just received. On return `output` has been
    /// overwritten with the previous cycle's processed result; `input` has
    /// been forwarded into the pipeline for processing in subsequent cycles.
    pub fn exchange(&mut self, output: &mut [Sample], input: &[Sample]) {
        debug_assert_eq!(output.len(), self.output_channels);
        debug_assert_eq!(input.len(), self.input_channels);

        match &mut self.mode {
            BridgeMode::Unwired => {
                debug_assert!(false, "exchange called before set_channel");
            }
            BridgeMode::Inline { cascades } => {
                for (slot, cascade) in output.iter_mut().zip(cascades.iter_mut()) {
                    *slot = cascade.process(*slot);
                }
            }
            BridgeMode::Linked { to_dist, from_dist } => {
                let mut raw = Vec::with_capacity(output.len() + input.len());
                raw.extend_from_slice(output);
                raw.extend_from_slice(input);

                // Disconnection only happens at teardown; the transport side
                // then leaves its buffers untouched.
                if to_dist.send(Frame::new(raw)).is_err() {
                    return;
                }
                let Ok(done) = from_dist.recv() else {
                    return;
                };
                debug_assert_eq!(done.len(), output.len() + input.len());
                output.copy_from_slice(&done.samples[..output.len()]);
            }
        }
    }
}
