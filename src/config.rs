//! TOML configuration for the pipeline.
//!
//! The filter graph itself is fixed once built; the config file only selects
//! which graph gets built: topology, channel counts, Q format and the
//! per-channel coefficient tables.

use crate::bridge::TransportBridge;
use crate::dsp::{Q28, SectionCoeffs};
use crate::error::{FxpipeError, Result};
use crate::topology::{
    ChannelCascade, InlineSpec, PipelineGraph, SplitSpec, StagedSpec, Topology, build_inline,
    build_split, build_staged,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    /// One table per filtered output channel; unlisted channels pass through.
    #[serde(rename = "filter")]
    pub filters: Vec<FilterConfig>,
}

/// Pipeline shape and frame layout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub topology: TopologyKind,
    pub output_channels: usize,
    pub input_channels: usize,
    pub q_format: u32,
}

/// Coefficient table for one output channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilterConfig {
    pub channel: usize,
    /// Rows of `{b2/a0, b1/a0, b0/a0, -a1/a0, -a2/a0}` in Q format.
    pub sections: Vec<[i32; 5]>,
}

/// Topology selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TopologyKind {
    Inline,
    SplitParallel,
    Staged,
}

impl From<TopologyKind> for Topology {
    fn from(kind: TopologyKind) -> Self {
        match kind {
            TopologyKind::Inline => Topology::Inline,
            TopologyKind::SplitParallel => Topology::SplitParallel,
            TopologyKind::Staged => Topology::Staged,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            topology: TopologyKind::Inline,
            output_channels: 2,
            input_channels: 1,
            q_format: Q28,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|_| FxpipeError::ConfigFileNotFound {
            path: path.display().to_string(),
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.output_channels == 0 {
            return Err(FxpipeError::ConfigInvalidValue {
                key: "pipeline.output_channels".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if !(1..=30).contains(&self.pipeline.q_format) {
            return Err(FxpipeError::ConfigInvalidValue {
                key: "pipeline.q_format".to_string(),
                message: "must be in 1..=30".to_string(),
            });
        }
        for filter in &self.filters {
            if filter.channel >= self.pipeline.output_channels {
                return Err(FxpipeError::ConfigInvalidValue {
                    key: "filter.channel".to_string(),
                    message: format!(
                        "channel {} out of range (output_channels = {})",
                        filter.channel, self.pipeline.output_channels
                    ),
                });
            }
        }
        Ok(())
    }

    /// Per-output-channel cascades, pass-through for unconfigured channels.
    pub fn output_cascades(&self) -> Vec<ChannelCascade> {
        let mut cascades = vec![ChannelCascade::new(); self.pipeline.output_channels];
        for filter in &self.filters {
            cascades[filter.channel] = filter
                .sections
                .iter()
                .map(|&words| SectionCoeffs::new(words))
                .collect();
        }
        cascades
    }

    /// Builds the configured pipeline: the transport-facing bridge plus the
    /// running graph.
    pub fn build(&self) -> Result<(TransportBridge, PipelineGraph)> {
        self.validate()?;
        let cascades = self.output_cascades();
        let input_channels = self.pipeline.input_channels;
        let q = self.pipeline.q_format;

        match self.pipeline.topology {
            TopologyKind::Inline => build_inline(InlineSpec {
                output_cascades: cascades,
                input_channels,
                q,
            }),
            TopologyKind::SplitParallel => {
                build_split(SplitSpec::two_way(cascades, input_channels, q)?)
            }
            TopologyKind::Staged => build_staged(StagedSpec::from_channel_cascades(
                cascades,
                input_channels,
                q,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.pipeline.topology, TopologyKind::Inline);
        assert_eq!(config.pipeline.output_channels, 2);
        assert_eq!(config.pipeline.input_channels, 1);
        assert_eq!(config.pipeline.q_format, 28);
        assert!(config.filters.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [pipeline]
            topology = "staged"
            output_channels = 2
            input_channels = 1
            q_format = 28

            [[filter]]
            channel = 0
            sections = [
                [261565110, -521424736, 260038367, 521424736, -253168021],
                [255074543, -506484921, 252105451, 506484921, -238744538],
            ]

            [[filter]]
            channel = 1
            sections = [[268435456, 0, 0, 0, 0]]
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.pipeline.topology, TopologyKind::Staged);
        assert_eq!(config.filters.len(), 2);
        assert_eq!(config.filters[0].sections.len(), 2);

        let cascades = config.output_cascades();
        assert_eq!(cascades[0].len(), 2);
        assert_eq!(cascades[1].len(), 1);
        assert_eq!(
            cascades[1][0],
            SectionCoeffs::new([268435456, 0, 0, 0, 0])
        );
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: Config = toml::from_str("[pipeline]\ntopology = \"split-parallel\"").unwrap();
        assert_eq!(config.pipeline.topology, TopologyKind::SplitParallel);
        assert_eq!(config.pipeline.output_channels, 2);
        assert_eq!(config.pipeline.q_format, 28);
    }

    #[test]
    fn test_validate_rejects_zero_output_channels() {
        let config: Config = toml::from_str("[pipeline]\noutput_channels = 0").unwrap();
        assert!(matches!(
            config.validate(),
            Err(FxpipeError::ConfigInvalidValue { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_out_of_range_filter_channel() {
        let toml_str = r#"
            [pipeline]
            output_channels = 2

            [[filter]]
            channel = 5
            sections = [[268435456, 0, 0, 0, 0]]
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(matches!(
            config.validate(),
            Err(FxpipeError::ConfigInvalidValue { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/fxpipe.toml")).unwrap_err();
        assert!(matches!(err, FxpipeError::ConfigFileNotFound { .. }));
    }

    #[test]
    fn test_build_inline_from_config() {
        let config = Config::default();
        let (bridge, graph) = config.build().unwrap();
        assert_eq!(bridge.output_channels(), 2);
        assert_eq!(graph.thread_count(), 0);
        drop(bridge);
        graph.join().unwrap();
    }

    #[test]
    fn test_round_trip_serialization() {
        let config = Config {
            pipeline: PipelineConfig {
                topology: TopologyKind::Staged,
                output_channels: 4,
                input_channels: 2,
                q_format: 28,
            },
            filters: vec![FilterConfig {
                channel: 2,
                sections: vec![[1, 2, 3, 4, 5]],
            }],
        };
        let serialized = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed, config);
    }
}
