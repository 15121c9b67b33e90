//! Second-order IIR ("biquad") sections and cascades in Q(31-G) fixed point.
//!
//! Samples are 32-bit signed fixed-point words with a configurable number of
//! fractional bits (Q28 by default: 28 fractional, 3 integer, 1 sign).
//! Multiplications accumulate in a wide accumulator and the result saturates
//! on the final store; wraparound is never permitted. Each product fits in 64
//! bits but the sum of five full-scale products does not, so the accumulator
//! is 128 bits.

use crate::error::{FxpipeError, Result};

/// A single fixed-point PCM sample.
pub type Sample = i32;

/// Default Q format: 28 fractional bits, 3 guard bits.
pub const Q28: u32 = 28;

/// The 5 normalized coefficients of one biquad section, in the order
/// `{b2/a0, b1/a0, b0/a0, -a1/a0, -a2/a0}`. The first word multiplies the
/// current input sample. Immutable after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionCoeffs {
    words: [i32; 5],
}

impl SectionCoeffs {
    pub const fn new(words: [i32; 5]) -> Self {
        Self { words }
    }

    /// The pass-through section for the given Q format: unity on the current
    /// input, zero everywhere else.
    pub const fn identity(q: u32) -> Self {
        Self {
            words: [1 << q, 0, 0, 0, 0],
        }
    }

    /// Builds a coefficient set from a slice, rejecting anything that is not
    /// exactly 5 words long.
    pub fn from_slice(words: &[i32]) -> Result<Self> {
        let words: [i32; 5] = words
            .try_into()
            .map_err(|_| FxpipeError::CoefficientLength {
                actual: words.len(),
            })?;
        Ok(Self { words })
    }

    pub fn words(&self) -> &[i32; 5] {
        &self.words
    }
}

/// Clamp a wide accumulator to the 32-bit sample range.
#[inline]
fn saturate(acc: i128) -> Sample {
    acc.clamp(Sample::MIN as i128, Sample::MAX as i128) as Sample
}

/// One biquad section: 5 coefficient words plus a 4-word delay line.
///
/// The state layout is `[x1, x2, y1, y2]`: the previous two inputs followed by
/// the previous two outputs.
#[derive(Debug, Clone)]
pub struct Biquad {
    coeffs: SectionCoeffs,
    state: [i32; 4],
    q: u32,
}

impl Biquad {
    pub fn new(coeffs: SectionCoeffs, q: u32) -> Self {
        debug_assert!(q >= 1 && q <= 30);
        Self {
            coeffs,
            state: [0; 4],
            q,
        }
    }

    /// Runs one sample through the difference equation
    /// `y = (c0*x + c1*x1 + c2*x2 + c3*y1 + c4*y2) >> q`,
    /// shifts the delay line and returns the saturated result.
    ///
    /// Pure and total: identical (coefficients, state, input) always yield the
    /// identical (output, new state) pair.
    #[inline]
    pub fn process(&mut self, x: Sample) -> Sample {
        let [x1, x2, y1, y2] = self.state;
        let c = &self.coeffs.words;

        let mut acc = c[0] as i128 * x as i128;
        acc += c[1] as i128 * x1 as i128;
        acc += c[2] as i128 * x2 as i128;
        acc += c[3] as i128 * y1 as i128;
        acc += c[4] as i128 * y2 as i128;
        let y = saturate(acc >> self.q);

        self.state = [x, x1, y, y1];
        y
    }

    /// Current delay line, `[x1, x2, y1, y2]`.
    pub fn state(&self) -> &[i32; 4] {
        &self.state
    }

    pub fn coeffs(&self) -> &SectionCoeffs {
        &self.coeffs
    }
}

/// An ordered chain of biquad sections applied to one logical channel.
///
/// Section order is fixed at construction: section i's output feeds section
/// i+1's input. Each cascade exclusively owns its sections' state; cascades
/// are never shared across channels or stages.
#[derive(Debug, Clone)]
pub struct BiquadCascade {
    sections: Vec<Biquad>,
}

impl BiquadCascade {
    pub fn new(coeffs: &[SectionCoeffs], q: u32) -> Self {
        Self {
            sections: coeffs.iter().map(|&c| Biquad::new(c, q)).collect(),
        }
    }

    /// A cascade with no sections; passes samples through unchanged.
    pub fn passthrough() -> Self {
        Self {
            sections: Vec::new(),
        }
    }

    /// Folds one sample through every section in order.
    #[inline]
    pub fn process(&mut self, x: Sample) -> Sample {
        self.sections.iter_mut().fold(x, |s, sec| sec.process(s))
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn section(&self, index: usize) -> Option<&Biquad> {
        self.sections.get(index)
    }
}
