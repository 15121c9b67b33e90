//! One real-time period's worth of samples.

use crate::dsp::Sample;

/// A fixed-length block of samples, one slot per logical channel.
///
/// Frames are produced and consumed atomically once per period and move by
/// value across channel links; after a handoff the sending task holds no
/// alias. The slot layout is output channels first, then input channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub samples: Vec<Sample>,
}

impl Frame {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    /// An all-zero frame, used for priming and for the pre-steady-state
    /// outputs of a freshly built graph.
    pub fn zeroed(len: usize) -> Self {
        Self {
            samples: vec![0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl std::ops::Index<usize> for Frame {
    type Output = Sample;

    fn index(&self, index: usize) -> &Sample {
        &self.samples[index]
    }
}

impl std::ops::IndexMut<usize> for Frame {
    fn index_mut(&mut self, index: usize) -> &mut Sample {
        &mut self.samples[index]
    }
}
