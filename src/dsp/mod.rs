//! Fixed-point filter kernels.

pub mod biquad;

pub use biquad::{Biquad, BiquadCascade, Q28, Sample, SectionCoeffs};
