//! Topology builders: fixed graph shapes wiring the Distributor and stage
//! workers together.
//!
//! Each supported shape is one pure builder function that validates its spec,
//! allocates and pairs every link endpoint, moves the endpoints into their
//! owning tasks and spawns one long-lived thread per graph node. The returned
//! [`TransportBridge`] is the transport-facing half; the [`PipelineGraph`]
//! handle reaps the worker threads once the bridge has been dropped.
//!
//! Three shapes are supported, each a different concurrency/latency tradeoff:
//!
//! - **Inline** — cascades run inside the transport callback. 0 periods of
//!   added latency, no threads. For when the whole filter bank fits in the
//!   period budget of one task.
//! - **Split-parallel** — the Distributor fans disjoint slot ranges out to
//!   parallel stage workers and fans the results back in. 1 period of added
//!   latency.
//! - **Staged** — a chain stage0 → {stage1a, stage1b} → stage2 building up
//!   the full response across partial cascades, with the two middle branches
//!   running in parallel. 2 periods of added latency, absorbed by priming.

use crate::bridge::TransportBridge;
use crate::distributor::{Distributor, StagePort};
use crate::dsp::{BiquadCascade, SectionCoeffs};
use crate::error::{FxpipeError, Result};
use crate::frame::Frame;
use crate::link::link;
use crate::stage::{FilterWorker, MergeWorker};
use std::ops::Range;
use std::thread::{self, JoinHandle};

/// Frames a staged graph's merge stage pushes into its return link before the
/// main loop: one fewer than the number of chained stages.
pub const STAGED_PRIMING_FRAMES: usize = 2;

/// The ordered coefficient sets making up one frame slot's cascade. Empty
/// means pass-through.
pub type ChannelCascade = Vec<SectionCoeffs>;

/// The fixed graph shape connecting Distributor to filter stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    Inline,
    SplitParallel,
    Staged,
}

impl Topology {
    /// Periods of latency the shape adds between a raw frame entering the
    /// bridge and its processed result coming back.
    pub fn added_latency(self) -> usize {
        match self {
            Topology::Inline => 0,
            Topology::SplitParallel => 1,
            Topology::Staged => STAGED_PRIMING_FRAMES,
        }
    }
}

/// Handle to a running pipeline graph.
///
/// Worker loops exit when their links disconnect, which happens once the
/// bridge (and the graph's own internal endpoints, transitively) are dropped:
/// drop the [`TransportBridge`] first, then call [`join`](Self::join).
pub struct PipelineGraph {
    threads: Vec<JoinHandle<()>>,
}

impl PipelineGraph {
    fn empty() -> Self {
        Self {
            threads: Vec::new(),
        }
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// Waits for every worker thread to exit.
    pub fn join(self) -> Result<()> {
        for handle in self.threads {
            handle.join().map_err(|_| FxpipeError::Topology {
                message: "pipeline worker thread panicked".to_string(),
            })?;
        }
        Ok(())
    }
}

fn check_q(q: u32) -> Result<()> {
    if !(1..=30).contains(&q) {
        return Err(FxpipeError::QFormat { q });
    }
    Ok(())
}

fn check_channels(output_channels: usize) -> Result<()> {
    if output_channels == 0 {
        return Err(FxpipeError::Topology {
            message: "pipeline needs at least one output channel".to_string(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Inline
// ---------------------------------------------------------------------------

/// Spec for the inline (single-task) shape: one cascade per output channel,
/// run directly inside the transport callback.
#[derive(Debug, Clone)]
pub struct InlineSpec {
    pub output_cascades: Vec<ChannelCascade>,
    pub input_channels: usize,
    pub q: u32,
}

pub fn build_inline(spec: InlineSpec) -> Result<(TransportBridge, PipelineGraph)> {
    check_q(spec.q)?;
    check_channels(spec.output_cascades.len())?;

    let cascades = spec
        .output_cascades
        .iter()
        .map(|c| BiquadCascade::new(c, spec.q))
        .collect();
    let bridge = TransportBridge::inline(cascades, spec.input_channels);
    Ok((bridge, PipelineGraph::empty()))
}

// ---------------------------------------------------------------------------
// Split-parallel
// ---------------------------------------------------------------------------

/// One parallel stage of a split graph: a contiguous slot range and the
/// cascades for those slots.
#[derive(Debug, Clone)]
pub struct SplitPartition {
    pub slots: Range<usize>,
    pub cascades: Vec<ChannelCascade>,
}

#[derive(Debug, Clone)]
pub struct SplitSpec {
    pub partitions: Vec<SplitPartition>,
    pub output_channels: usize,
    pub input_channels: usize,
    pub q: u32,
}

impl SplitSpec {
    /// Two stages splitting the frame down the middle, output-channel
    /// cascades as given and input slots passing through.
    pub fn two_way(
        output_cascades: Vec<ChannelCascade>,
        input_channels: usize,
        q: u32,
    ) -> Result<Self> {
        let output_channels = output_cascades.len();
        let frame_len = output_channels + input_channels;
        if frame_len < 2 {
            return Err(FxpipeError::Topology {
                message: "split-parallel needs at least two frame slots".to_string(),
            });
        }

        let slot_cascades = |slots: Range<usize>| -> Vec<ChannelCascade> {
            slots
                .map(|slot| {
                    output_cascades
                        .get(slot)
                        .cloned()
                        .unwrap_or_default()
                })
                .collect()
        };

        let mid = frame_len / 2;
        Ok(Self {
            partitions: vec![
                SplitPartition {
                    slots: 0..mid,
                    cascades: slot_cascades(0..mid),
                },
                SplitPartition {
                    slots: mid..frame_len,
                    cascades: slot_cascades(mid..frame_len),
                },
            ],
            output_channels,
            input_channels,
            q,
        })
    }

    fn frame_len(&self) -> usize {
        self.output_channels + self.input_channels
    }

    fn validate(&self) -> Result<()> {
        check_q(self.q)?;
        check_channels(self.output_channels)?;
        if self.partitions.len() < 2 {
            return Err(FxpipeError::Topology {
                message: "split-parallel needs at least two stage partitions".to_string(),
            });
        }

        // Partitions must tile the frame: disjoint, in order, no gaps.
        let mut next = 0;
        for (i, part) in self.partitions.iter().enumerate() {
            if part.slots.start != next || part.slots.is_empty() {
                return Err(FxpipeError::Topology {
                    message: format!(
                        "partition {} covers slots {:?}, expected a nonempty range starting at {}",
                        i, part.slots, next
                    ),
                });
            }
            if part.cascades.len() != part.slots.len() {
                return Err(FxpipeError::CascadeCount {
                    expected: part.slots.len(),
                    actual: part.cascades.len(),
                });
            }
            next = part.slots.end;
        }
        if next != self.frame_len() {
            return Err(FxpipeError::Topology {
                message: format!(
                    "partitions cover slots 0..{}, frame has {}",
                    next,
                    self.frame_len()
                ),
            });
        }
        Ok(())
    }
}

pub fn build_split(spec: SplitSpec) -> Result<(TransportBridge, PipelineGraph)> {
    spec.validate()?;
    let frame_len = spec.frame_len();

    let (bridge_tx, dist_raw) = link::<Frame>();
    let (dist_done, bridge_rx) = link::<Frame>();
    let mut bridge = TransportBridge::new(spec.output_channels, spec.input_channels);
    bridge.set_channel(bridge_tx, bridge_rx)?;

    let mut threads = Vec::with_capacity(spec.partitions.len() + 1);
    let mut ports = Vec::with_capacity(spec.partitions.len());
    for part in spec.partitions {
        let (to_stage, stage_rx) = link::<Frame>();
        let (stage_tx, from_stage) = link::<Frame>();

        let cascades = part
            .cascades
            .iter()
            .map(|c| BiquadCascade::new(c, spec.q))
            .collect();
        let worker = FilterWorker::new(cascades, stage_rx, vec![stage_tx]);
        threads.push(thread::spawn(move || worker.run()));

        ports.push(StagePort {
            to_stage,
            from_stage,
            slots: part.slots,
        });
    }

    let dist = Distributor::fan_out(dist_raw, dist_done, ports, frame_len);
    threads.push(thread::spawn(move || dist.run()));

    Ok((bridge, PipelineGraph { threads }))
}

// ---------------------------------------------------------------------------
// Staged
// ---------------------------------------------------------------------------

/// Which parallel branch of a staged graph supplies a slot at the merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    A,
    B,
}

/// Spec for the staged chain stage0 → {stage1a, stage1b} → stage2.
///
/// Every cascade list has one entry per frame slot. stage0 applies `entry`
/// and broadcasts its result to both branches; each branch applies its own
/// cascades (per-branch coefficients are independent — never shared); stage2
/// takes slot i from `merge_from[i]`, applies `exit[i]` and returns the frame
/// to the Distributor.
#[derive(Debug, Clone)]
pub struct StagedSpec {
    pub entry: Vec<ChannelCascade>,
    pub branch_a: Vec<ChannelCascade>,
    pub branch_b: Vec<ChannelCascade>,
    pub exit: Vec<ChannelCascade>,
    pub merge_from: Vec<Branch>,
    pub output_channels: usize,
    pub input_channels: usize,
    pub q: u32,
}

impl StagedSpec {
    /// Distributes each output channel's full cascade across the chain: first
    /// section at stage0, last section at stage2, the rest on the channel's
    /// merge branch (alternating A/B by slot). Slot-for-slot, the composed
    /// chain equals the original cascade, so a staged graph built this way
    /// matches an inline graph except for the added latency.
    pub fn from_channel_cascades(
        output_cascades: Vec<ChannelCascade>,
        input_channels: usize,
        q: u32,
    ) -> Self {
        let frame_len = output_cascades.len() + input_channels;
        let mut entry = vec![ChannelCascade::new(); frame_len];
        let mut branch_a = vec![ChannelCascade::new(); frame_len];
        let mut branch_b = vec![ChannelCascade::new(); frame_len];
        let mut exit = vec![ChannelCascade::new(); frame_len];
        let mut merge_from = Vec::with_capacity(frame_len);

        for slot in 0..frame_len {
            let branch = if slot % 2 == 0 { Branch::A } else { Branch::B };
            merge_from.push(branch);

            let Some(full) = output_cascades.get(slot) else {
                continue; // input slot: pass-through everywhere
            };
            match full.len() {
                0 => {}
                1 => entry[slot] = full.clone(),
                2 => {
                    entry[slot] = vec![full[0]];
                    exit[slot] = vec![full[1]];
                }
                _ => {
                    entry[slot] = vec![full[0]];
                    let middle = full[1..full.len() - 1].to_vec();
                    match branch {
                        Branch::A => branch_a[slot] = middle,
                        Branch::B => branch_b[slot] = middle,
                    }
                    exit[slot] = vec![full[full.len() - 1]];
                }
            }
        }

        Self {
            entry,
            branch_a,
            branch_b,
            exit,
            merge_from,
            output_channels: output_cascades.len(),
            input_channels,
            q,
        }
    }

    fn frame_len(&self) -> usize {
        self.output_channels + self.input_channels
    }

    fn validate(&self) -> Result<()> {
        check_q(self.q)?;
        check_channels(self.output_channels)?;
        let frame_len = self.frame_len();
        for (name, len) in [
            ("entry", self.entry.len()),
            ("branch_a", self.branch_a.len()),
            ("branch_b", self.branch_b.len()),
            ("exit", self.exit.len()),
            ("merge_from", self.merge_from.len()),
        ] {
            if len != frame_len {
                return Err(FxpipeError::Topology {
                    message: format!(
                        "staged {} list has {} entries, frame has {} slots",
                        name, len, frame_len
                    ),
                });
            }
        }
        Ok(())
    }
}

pub fn build_staged(spec: StagedSpec) -> Result<(TransportBridge, PipelineGraph)> {
    spec.validate()?;
    let q = spec.q;

    let (bridge_tx, dist_raw) = link::<Frame>();
    let (dist_done, bridge_rx) = link::<Frame>();
    let mut bridge = TransportBridge::new(spec.output_channels, spec.input_channels);
    bridge.set_channel(bridge_tx, bridge_rx)?;

    let (to_stage0, stage0_rx) = link::<Frame>();
    let (stage0_to_a, branch_a_rx) = link::<Frame>();
    let (stage0_to_b, branch_b_rx) = link::<Frame>();
    let (branch_a_tx, merge_from_a) = link::<Frame>();
    let (branch_b_tx, merge_from_b) = link::<Frame>();
    let (merge_tx, from_merge) = link::<Frame>();

    let cascades = |specs: &[ChannelCascade]| -> Vec<BiquadCascade> {
        specs.iter().map(|c| BiquadCascade::new(c, q)).collect()
    };

    let stage0 = FilterWorker::new(
        cascades(&spec.entry),
        stage0_rx,
        vec![stage0_to_a, stage0_to_b],
    );
    let stage1a = FilterWorker::new(cascades(&spec.branch_a), branch_a_rx, vec![branch_a_tx]);
    let stage1b = FilterWorker::new(cascades(&spec.branch_b), branch_b_rx, vec![branch_b_tx]);
    let stage2 = MergeWorker::new(
        vec![merge_from_a, merge_from_b],
        spec.merge_from
            .iter()
            .map(|b| match b {
                Branch::A => 0,
                Branch::B => 1,
            })
            .collect(),
        cascades(&spec.exit),
        merge_tx,
        STAGED_PRIMING_FRAMES,
    );
    let dist = Distributor::chain(dist_raw, dist_done, to_stage0, from_merge);

    let threads = vec![
        thread::spawn(move || stage0.run()),
        thread::spawn(move || stage1a.run()),
        thread::spawn(move || stage1b.run()),
        thread::spawn(move || stage2.run()),
        thread::spawn(move || dist.run()),
    ];

    Ok((bridge, PipelineGraph { threads }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::Q28;

    fn identity_cascades(channels: usize) -> Vec<ChannelCascade> {
        vec![vec![SectionCoeffs::identity(Q28)]; channels]
    }

    #[test]
    fn test_added_latency_per_shape() {
        assert_eq!(Topology::Inline.added_latency(), 0);
        assert_eq!(Topology::SplitParallel.added_latency(), 1);
        assert_eq!(Topology::Staged.added_latency(), 2);
    }

    #[test]
    fn test_inline_builds_with_no_threads() {
        let (_bridge, graph) = build_inline(InlineSpec {
            output_cascades: identity_cascades(2),
            input_channels: 1,
            q: Q28,
        })
        .unwrap();
        assert_eq!(graph.thread_count(), 0);
        graph.join().unwrap();
    }

    #[test]
    fn test_inline_rejects_zero_channels() {
        let result = build_inline(InlineSpec {
            output_cascades: vec![],
            input_channels: 0,
            q: Q28,
        });
        assert!(matches!(result, Err(FxpipeError::Topology { .. })));
    }

    #[test]
    fn test_inline_rejects_bad_q() {
        let result = build_inline(InlineSpec {
            output_cascades: identity_cascades(1),
            input_channels: 0,
            q: 31,
        });
        assert!(matches!(result, Err(FxpipeError::QFormat { q: 31 })));
    }

    #[test]
    fn test_split_two_way_tiles_the_frame() {
        let spec = SplitSpec::two_way(identity_cascades(2), 1, Q28).unwrap();
        assert_eq!(spec.partitions.len(), 2);
        assert_eq!(spec.partitions[0].slots, 0..1);
        assert_eq!(spec.partitions[1].slots, 1..3);
        spec.validate().unwrap();
    }

    #[test]
    fn test_split_rejects_single_partition() {
        let spec = SplitSpec {
            partitions: vec![SplitPartition {
                slots: 0..2,
                cascades: identity_cascades(2),
            }],
            output_channels: 2,
            input_channels: 0,
            q: Q28,
        };
        assert!(matches!(
            spec.validate(),
            Err(FxpipeError::Topology { .. })
        ));
    }

    #[test]
    fn test_split_rejects_gap_between_partitions() {
        let spec = SplitSpec {
            partitions: vec![
                SplitPartition {
                    slots: 0..1,
                    cascades: identity_cascades(1),
                },
                SplitPartition {
                    slots: 2..3,
                    cascades: identity_cascades(1),
                },
            ],
            output_channels: 3,
            input_channels: 0,
            q: Q28,
        };
        assert!(matches!(
            spec.validate(),
            Err(FxpipeError::Topology { .. })
        ));
    }

    #[test]
    fn test_split_rejects_cascade_count_mismatch() {
        let spec = SplitSpec {
            partitions: vec![
                SplitPartition {
                    slots: 0..1,
                    cascades: identity_cascades(2),
                },
                SplitPartition {
                    slots: 1..2,
                    cascades: identity_cascades(1),
                },
            ],
            output_channels: 2,
            input_channels: 0,
            q: Q28,
        };
        assert!(matches!(
            spec.validate(),
            Err(FxpipeError::CascadeCount {
                expected: 1,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_staged_spec_distributes_sections() {
        let full: ChannelCascade = vec![
            SectionCoeffs::new([1, 0, 0, 0, 0]),
            SectionCoeffs::new([2, 0, 0, 0, 0]),
            SectionCoeffs::new([3, 0, 0, 0, 0]),
            SectionCoeffs::new([4, 0, 0, 0, 0]),
        ];
        let spec = StagedSpec::from_channel_cascades(vec![full.clone(), full.clone()], 1, Q28);

        assert_eq!(spec.entry[0], vec![full[0]]);
        assert_eq!(spec.branch_a[0], vec![full[1], full[2]]);
        assert!(spec.branch_b[0].is_empty());
        assert_eq!(spec.exit[0], vec![full[3]]);
        assert_eq!(spec.merge_from[0], Branch::A);

        assert_eq!(spec.branch_b[1], vec![full[1], full[2]]);
        assert!(spec.branch_a[1].is_empty());
        assert_eq!(spec.merge_from[1], Branch::B);

        // Input slot: pass-through on every stage.
        assert!(spec.entry[2].is_empty());
        assert!(spec.exit[2].is_empty());
        spec.validate().unwrap();
    }

    #[test]
    fn test_staged_rejects_mismatched_lists() {
        let mut spec = StagedSpec::from_channel_cascades(identity_cascades(2), 0, Q28);
        spec.merge_from.pop();
        assert!(matches!(
            spec.validate(),
            Err(FxpipeError::Topology { .. })
        ));
    }

    #[test]
    fn test_split_graph_runs_and_joins() {
        let spec = SplitSpec::two_way(identity_cascades(2), 0, Q28).unwrap();
        let (mut bridge, graph) = build_split(spec).unwrap();
        assert_eq!(graph.thread_count(), 3);

        let mut output = [100, 200];
        bridge.exchange(&mut output, &[]);
        assert_eq!(output, [0, 0]);
        bridge.exchange(&mut output, &[]);
        assert_eq!(output, [100, 200]);

        drop(bridge);
        graph.join().unwrap();
    }

    #[test]
    fn test_staged_graph_runs_and_joins() {
        let spec = StagedSpec::from_channel_cascades(identity_cascades(2), 0, Q28);
        let (mut bridge, graph) = build_staged(spec).unwrap();
        assert_eq!(graph.thread_count(), 5);

        let mut output;
        let mut seen = Vec::new();
        for period in 0..4 {
            output = [10 * (period + 1), 20 * (period + 1)];
            bridge.exchange(&mut output, &[]);
            seen.push(output);
        }
        assert_eq!(seen[0], [0, 0]);
        assert_eq!(seen[1], [0, 0]);
        assert_eq!(seen[2], [10, 20]);
        assert_eq!(seen[3], [20, 40]);

        drop(bridge);
        graph.join().unwrap();
    }
}
