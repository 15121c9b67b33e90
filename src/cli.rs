//! Command-line interface for fxpipe
//!
//! Provides argument parsing using clap derive macros.

use crate::config::TopologyKind;
use clap::builder::PossibleValue;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

// Command-line spellings for the config-side topology enum, kept here so the
// config module stays clap-free. Names match the TOML serialization.
impl ValueEnum for TopologyKind {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Inline, Self::SplitParallel, Self::Staged]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        Some(match self {
            Self::Inline => PossibleValue::new("inline"),
            Self::SplitParallel => PossibleValue::new("split-parallel"),
            Self::Staged => PossibleValue::new("staged"),
        })
    }
}

/// Fixed-latency biquad filter pipeline
#[derive(Parser, Debug)]
#[command(
    name = "fxpipe",
    version,
    about = "Fixed-latency biquad filter pipeline"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Topology override (inline, split-parallel, staged)
    #[arg(long, global = true, value_name = "SHAPE")]
    pub topology: Option<TopologyKind>,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream a WAV file through the configured filter graph
    Run {
        /// Input WAV file (16-bit integer PCM)
        #[arg(value_name = "INPUT")]
        input: PathBuf,
        /// Output WAV file
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,
    },
    /// Load a configuration, build the graph once and tear it down
    Validate,
    /// Feed a synthetic impulse through every topology and report latency
    Demo {
        /// Number of periods to simulate
        #[arg(long, default_value_t = 16)]
        periods: usize,
    },
}
