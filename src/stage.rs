//! Filter stage workers.
//!
//! Each worker is one node of the pipeline graph: an infinite
//! `receive / process / send` loop hosting the biquad cascades for the frame
//! slots it owns. Workers run in dedicated threads spawned by the topology
//! builder and block only at link rendezvous points; a link disconnect (graph
//! teardown) is the only way out of the loop.

use crate::dsp::BiquadCascade;
use crate::frame::Frame;
use crate::link::{LinkReceiver, LinkSender};

/// A worker with one upstream link and one or more downstream links.
///
/// Applies one cascade per frame slot, then delivers the processed frame to
/// every downstream link in declaration order (the multi-output form is the
/// broadcast at the head of a staged graph's parallel branches).
pub struct FilterWorker {
    cascades: Vec<BiquadCascade>,
    input: LinkReceiver<Frame>,
    outputs: Vec<LinkSender<Frame>>,
}

impl FilterWorker {
    pub fn new(
        cascades: Vec<BiquadCascade>,
        input: LinkReceiver<Frame>,
        outputs: Vec<LinkSender<Frame>>,
    ) -> Self {
        debug_assert!(!outputs.is_empty());
        Self {
            cascades,
            input,
            outputs,
        }
    }

    pub fn run(mut self) {
        let Some((last, rest)) = self.outputs.split_last() else {
            return;
        };

        while let Ok(mut frame) = self.input.recv() {
            debug_assert_eq!(frame.len(), self.cascades.len());
            for (slot, cascade) in frame.samples.iter_mut().zip(self.cascades.iter_mut()) {
                *slot = cascade.process(*slot);
            }

            for out in rest {
                if out.send(frame.clone()).is_err() {
                    return;
                }
            }
            if last.send(frame).is_err() {
                return;
            }
        }
    }
}

/// The fan-in worker at the tail of a staged graph.
///
/// Receives one frame per upstream branch per period, takes each slot from its
/// configured source branch, applies the slot's exit cascade and sends the
/// merged frame downstream. Before entering its loop it pushes `priming`
/// all-zero frames into the return link, pre-filling the chain's propagation
/// latency so the Distributor's receive is always ready in steady state.
pub struct MergeWorker {
    inputs: Vec<LinkReceiver<Frame>>,
    /// Per slot: index of the upstream branch that supplies it.
    source: Vec<usize>,
    cascades: Vec<BiquadCascade>,
    output: LinkSender<Frame>,
    priming: usize,
}

impl MergeWorker {
    pub fn new(
        inputs: Vec<LinkReceiver<Frame>>,
        source: Vec<usize>,
        cascades: Vec<BiquadCascade>,
        output: LinkSender<Frame>,
        priming: usize,
    ) -> Self {
        debug_assert_eq!(source.len(), cascades.len());
        Self {
            inputs,
            source,
            cascades,
            output,
            priming,
        }
    }

    pub fn run(mut self) {
        let frame_len = self.cascades.len();

        for _ in 0..self.priming {
            if self.output.send(Frame::zeroed(frame_len)).is_err() {
                return;
            }
        }

        loop {
            let mut branches = Vec::with_capacity(self.inputs.len());
            for rx in &self.inputs {
                match rx.recv() {
                    Ok(frame) => branches.push(frame),
                    Err(_) => return,
                }
            }

            let mut merged = Frame::zeroed(frame_len);
            for slot in 0..frame_len {
                let x = branches[self.source[slot]][slot];
                merged[slot] = self.cascades[slot].process(x);
            }

            if self.output.send(merged).is_err() {
                return;
            }
        }
    }
}
