//! fxpipe - Fixed-latency biquad filter pipeline for USB-class audio streams
//!
//! Streaming PCM frames arrive at a constant, hardware-clocked rate from a
//! transport and come back filtered before the next frame deadline. Frames
//! move between the transport bridge and the filter stages over unbuffered
//! rendezvous links; the graph shape (inline, split-parallel, staged) picks
//! the concurrency/latency tradeoff.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod bridge;
pub mod cli;
pub mod config;
pub mod distributor;
pub mod dsp;
pub mod error;
pub mod frame;
pub mod link;
pub mod stage;
pub mod topology;

// Transport boundary
pub use bridge::TransportBridge;

// Filter kernels
pub use dsp::{Biquad, BiquadCascade, Q28, Sample, SectionCoeffs};

// Dataflow primitives
pub use frame::Frame;
pub use link::{Disconnected, LinkReceiver, LinkSender, link};

// Graph construction
pub use topology::{
    Branch, ChannelCascade, InlineSpec, PipelineGraph, STAGED_PRIMING_FRAMES, SplitPartition,
    SplitSpec, StagedSpec, Topology, build_inline, build_split, build_staged,
};

// Error handling
pub use error::{FxpipeError, Result};

// Config
pub use config::{Config, FilterConfig, PipelineConfig, TopologyKind};

/// Build version string with optional git commit hash.
///
/// Returns "X.Y.Z (abc1234)" when built inside a git checkout, "X.Y.Z"
/// otherwise.
pub fn version() -> String {
    match option_env!("GIT_HASH") {
        Some(hash) => format!("{} ({})", env!("CARGO_PKG_VERSION"), hash),
        None => env!("CARGO_PKG_VERSION").to_string(),
    }
}
