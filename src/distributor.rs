//! The Distributor: the single real-time-facing choke point of a pipeline.
//!
//! Whatever the internal graph looks like, the TransportBridge only ever talks
//! to the Distributor, and only for one rendezvous round-trip per period. The
//! graph's internal latency is hidden behind frames that are already computed
//! (or primed) by the time the bridge asks for them.

use crate::frame::Frame;
use crate::link::{LinkReceiver, LinkSender};
use std::ops::Range;

/// Link pair and slot assignment for one parallel stage worker.
pub struct StagePort {
    pub to_stage: LinkSender<Frame>,
    pub from_stage: LinkReceiver<Frame>,
    /// Contiguous frame slots this stage owns. Fixed at build time; there is
    /// no dynamic load balancing.
    pub slots: Range<usize>,
}

enum GraphSide {
    /// Split-parallel: scatter disjoint slot ranges to the stages, gather the
    /// results back into one frame.
    FanOut {
        ports: Vec<StagePort>,
        frame_len: usize,
    },
    /// Staged chain: forward whole frames to the first stage, collect whole
    /// frames from the last. The chain's primed return link holds the frames
    /// that hide its latency.
    Chain {
        to_first: LinkSender<Frame>,
        from_last: LinkReceiver<Frame>,
    },
}

pub struct Distributor {
    from_bridge: LinkReceiver<Frame>,
    to_bridge: LinkSender<Frame>,
    graph: GraphSide,
}

impl Distributor {
    pub fn fan_out(
        from_bridge: LinkReceiver<Frame>,
        to_bridge: LinkSender<Frame>,
        ports: Vec<StagePort>,
        frame_len: usize,
    ) -> Self {
        Self {
            from_bridge,
            to_bridge,
            graph: GraphSide::FanOut { ports, frame_len },
        }
    }

    pub fn chain(
        from_bridge: LinkReceiver<Frame>,
        to_bridge: LinkSender<Frame>,
        to_first: LinkSender<Frame>,
        from_last: LinkReceiver<Frame>,
    ) -> Self {
        Self {
            from_bridge,
            to_bridge,
            graph: GraphSide::Chain {
                to_first,
                from_last,
            },
        }
    }

    pub fn run(self) {
        match self.graph {
            GraphSide::FanOut { ports, frame_len } => {
                run_fan_out(self.from_bridge, self.to_bridge, ports, frame_len);
            }
            GraphSide::Chain {
                to_first,
                from_last,
            } => {
                run_chain(self.from_bridge, self.to_bridge, to_first, from_last);
            }
        }
    }
}

/// Split-parallel loop: receive the period's raw frame, immediately answer
/// with the previous period's already-computed result, then scatter, then
/// gather into the frame answered next period. The interleaving (answer
/// before scatter, not after gather) is what keeps the bridge's blocking time
/// at one rendezvous.
fn run_fan_out(
    from_bridge: LinkReceiver<Frame>,
    to_bridge: LinkSender<Frame>,
    ports: Vec<StagePort>,
    frame_len: usize,
) {
    let mut result = Frame::zeroed(frame_len);

    while let Ok(raw) = from_bridge.recv() {
        debug_assert_eq!(raw.len(), frame_len);

        let done = std::mem::replace(&mut result, Frame::zeroed(frame_len));
        if to_bridge.send(done).is_err() {
            return;
        }

        for port in &ports {
            let sub = Frame::new(raw.samples[port.slots.clone()].to_vec());
            if port.to_stage.send(sub).is_err() {
                return;
            }
        }

        for port in &ports {
            let Ok(sub) = port.from_stage.recv() else {
                return;
            };
            debug_assert_eq!(sub.len(), port.slots.len());
            result.samples[port.slots.clone()].copy_from_slice(&sub.samples);
        }
    }
}

/// Staged-chain loop: the raw frame goes into the head of the chain and the
/// frame handed back to the bridge comes off the primed tail link, which in
/// steady state always has a frame ready.
fn run_chain(
    from_bridge: LinkReceiver<Frame>,
    to_bridge: LinkSender<Frame>,
    to_first: LinkSender<Frame>,
    from_last: LinkReceiver<Frame>,
) {
    while let Ok(raw) = from_bridge.recv() {
        if to_first.send(raw).is_err() {
            return;
        }
        let Ok(done) = from_last.recv() else {
            return;
        };
        if to_bridge.send(done).is_err() {
            return;
        }
    }
}
