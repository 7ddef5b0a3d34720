//! A continuous piecewise linear function, used to remap the feed-specific
//! `shape_dist_traveled` scale onto the normalized meter scale.

use crate::Error;

/// Growable set of `(x, y)` samples interpolated linearly between the two
/// bracketing samples, clamped to the first/last `y` outside the sampled
/// range. Samples are lazily sorted by `x` on the first query after an
/// insertion; the sort is stable so ties in `x` resolve to the
/// later-inserted sample.
#[derive(Debug, Default, Clone)]
pub struct PiecewiseLinearFunction {
    samples: Vec<(f64, f64)>,
    sorted: bool,
}

impl PiecewiseLinearFunction {
    /// A function with no samples yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `(x, y)` sample
    pub fn append(&mut self, x: f64, y: f64) {
        self.samples.push((x, y));
        self.sorted = false;
    }

    /// Whether no sample was added yet
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the interpolated `y` value at `x`.
    ///
    /// Fails with [Error::EmptyPiecewiseFunction] when no sample was added.
    pub fn interpolate(&mut self, x: f64) -> Result<f64, Error> {
        if self.samples.is_empty() {
            return Err(Error::EmptyPiecewiseFunction);
        }
        if !self.sorted {
            // Stable: later-inserted samples win on equal x
            self.samples.sort_by(|a, b| a.0.total_cmp(&b.0));
            self.sorted = true;
        }
        // Index of the first sample strictly greater than x. On equal x this
        // lands past every tied sample, so the last inserted one brackets.
        let idx = self.samples.partition_point(|&(sx, _)| sx <= x);
        if idx == 0 {
            // Clamp to left
            return Ok(self.samples[0].1);
        }
        if idx == self.samples.len() {
            // Clamp to right
            return Ok(self.samples[self.samples.len() - 1].1);
        }
        let (x1, y1) = self.samples[idx - 1];
        let (x2, y2) = self.samples[idx];
        // By construction x2 > x1: equal samples are never bracketed
        Ok((x - x1) * (y2 - y1) / (x2 - x1) + y1)
    }
}
