use anyhow::{Context, Result, bail};
use clap::Parser;
use fxpipe::cli::{Cli, Commands};
use fxpipe::config::{Config, TopologyKind};
use fxpipe::topology::Topology;
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(kind) = cli.topology {
        config.pipeline.topology = kind;
    }

    match cli.command {
        Some(Commands::Run { input, output }) => run_wav(&config, &input, &output, cli.quiet),
        Some(Commands::Validate) => validate(&config, cli.quiet),
        Some(Commands::Demo { periods }) => demo(&config, periods, cli.quiet),
        None => demo(&config, 16, cli.quiet),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            Config::load(path).with_context(|| format!("loading config {}", path.display()))
        }
        None => Ok(Config::default()),
    }
}

/// Builds the configured graph once, tears it down and reports.
fn validate(config: &Config, quiet: bool) -> Result<()> {
    let (bridge, graph) = config.build()?;
    let threads = graph.thread_count();
    drop(bridge);
    graph.join()?;

    if !quiet {
        println!(
            "configuration OK: {:?} topology, {} output + {} input channels, Q{}, {} worker thread(s)",
            config.pipeline.topology,
            config.pipeline.output_channels,
            config.pipeline.input_channels,
            config.pipeline.q_format,
            threads,
        );
    }
    Ok(())
}

/// Streams a 16-bit PCM WAV file through the configured graph, compensating
/// for the topology's added latency so input and output line up
/// sample-for-sample.
fn run_wav(config: &Config, input: &Path, output: &Path, quiet: bool) -> Result<()> {
    let mut reader =
        hound::WavReader::open(input).with_context(|| format!("opening {}", input.display()))?;
    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        bail!("only 16-bit integer PCM WAV input is supported");
    }
    let channels = spec.channels as usize;

    // The WAV's channels become the output channels; there is no capture
    // direction in an offline run.
    let mut config = config.clone();
    config.pipeline.output_channels = channels;
    config.pipeline.input_channels = 0;

    let q = config.pipeline.q_format as i32;
    let shift = q - 15; // align i16 full scale with the configured Q format
    let latency = Topology::from(config.pipeline.topology).added_latency();

    let samples: Vec<i16> = reader
        .samples::<i16>()
        .collect::<std::result::Result<_, _>>()
        .context("reading WAV samples")?;
    let total_frames = samples.len() / channels;

    let (mut bridge, graph) = config.build()?;
    let mut processed: Vec<Vec<i32>> = Vec::with_capacity(total_frames + latency);

    // Feed `latency` extra zero frames to flush the last real frames out of
    // the graph, then drop the leading priming outputs.
    for period in 0..total_frames + latency {
        let mut frame: Vec<i32> = (0..channels)
            .map(|ch| {
                if period < total_frames {
                    scale_up(samples[period * channels + ch], shift)
                } else {
                    0
                }
            })
            .collect();
        bridge.exchange(&mut frame, &[]);
        processed.push(frame);
    }

    drop(bridge);
    graph.join()?;

    let mut writer = hound::WavWriter::create(output, spec)
        .with_context(|| format!("creating {}", output.display()))?;
    for frame in &processed[latency..] {
        for &sample in frame {
            writer.write_sample(scale_down(sample, shift))?;
        }
    }
    writer.finalize()?;

    if !quiet {
        println!(
            "{} frame(s) x {} channel(s) -> {} ({:?} topology, {} period(s) of latency compensated)",
            total_frames,
            channels,
            output.display(),
            config.pipeline.topology,
            latency,
        );
    }
    Ok(())
}

/// Builds every topology from the same coefficient tables, feeds an impulse
/// and reports when it comes back.
fn demo(config: &Config, periods: usize, quiet: bool) -> Result<()> {
    for kind in [
        TopologyKind::Inline,
        TopologyKind::SplitParallel,
        TopologyKind::Staged,
    ] {
        let expected = Topology::from(kind).added_latency();
        let first = impulse_latency(config, kind, periods)?;
        if !quiet {
            match first {
                Some(period) => println!(
                    "{:<16} impulse returned at period {} (expected latency {})",
                    format!("{:?}:", kind),
                    period,
                    expected
                ),
                None => println!(
                    "{:<16} no response within {} periods",
                    format!("{:?}:", kind),
                    periods
                ),
            }
        }
    }
    Ok(())
}

/// Runs an impulse through one topology and returns the first period with a
/// nonzero output frame.
fn impulse_latency(config: &Config, kind: TopologyKind, periods: usize) -> Result<Option<usize>> {
    let mut config = config.clone();
    config.pipeline.topology = kind;

    let (mut bridge, graph) = config.build()?;
    let input_zeros = vec![0; bridge.input_channels()];
    let impulse = 1 << (config.pipeline.q_format - 4);

    let mut first = None;
    for period in 0..periods {
        let mut frame = vec![if period == 0 { impulse } else { 0 }; bridge.output_channels()];
        bridge.exchange(&mut frame, &input_zeros);
        if first.is_none() && frame.iter().any(|&s| s != 0) {
            first = Some(period);
        }
    }

    drop(bridge);
    graph.join()?;
    Ok(first)
}

fn scale_up(sample: i16, shift: i32) -> i32 {
    if shift >= 0 {
        (sample as i32) << shift
    } else {
        (sample as i32) >> -shift
    }
}

fn scale_down(sample: i32, shift: i32) -> i16 {
    let restored = if shift >= 0 {
        (sample as i64) >> shift
    } else {
        (sample as i64) << -shift
    };
    restored.clamp(i16::MIN as i64, i16::MAX as i64) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_round_trip() {
        for s in [-32768i16, -1, 0, 1, 32767] {
            assert_eq!(scale_down(scale_up(s, 13), 13), s);
        }
    }

    #[test]
    fn test_scale_down_clamps() {
        assert_eq!(scale_down(i32::MAX, 13), i16::MAX);
        assert_eq!(scale_down(i32::MIN, 13), i16::MIN);
    }

    #[test]
    fn test_impulse_latency_matches_topology() {
        let config = Config::default();
        for (kind, expected) in [
            (TopologyKind::Inline, 0),
            (TopologyKind::SplitParallel, 1),
            (TopologyKind::Staged, 2),
        ] {
            assert_eq!(
                impulse_latency(&config, kind, 8).unwrap(),
                Some(expected),
                "{:?}",
                kind
            );
        }
    }
}
