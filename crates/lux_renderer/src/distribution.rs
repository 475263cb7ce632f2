//! Discrete importance-sampling tables.
//!
//! [`Piecewise1D`] is a Vose alias table: O(n) to build, O(1) to sample.
//! [`PiecewiseIndependent2D`] stacks one table per row under a marginal
//! table over row sums, for sampling images proportionally to a weight.

use lux_math::{UVec2, Vec2};

/// Largest float below one, so remapped samples stay in `[0, 1)`.
const ONE_MINUS_EPSILON: f32 = 1.0 - f32::EPSILON / 2.0;

#[derive(Debug, Clone, Copy)]
struct AliasEntry {
    alias: usize,
    /// Probability of keeping the slot's own index
    split: f32,
}

/// Discrete distribution proportional to a weight vector.
///
/// Negative and non-finite weights count as zero. When every weight is zero
/// the table samples uniformly while [`Piecewise1D::sum`] still reports 0.
#[derive(Debug, Clone)]
pub struct Piecewise1D {
    sum: f32,
    weights: Vec<f32>,
    table: Vec<AliasEntry>,
}

impl Piecewise1D {
    /// Build the table. `weights` must not be empty.
    pub fn new(weights: &[f32]) -> Self {
        assert!(!weights.is_empty(), "Piecewise1D needs at least one weight");

        let weights: Vec<f32> = weights
            .iter()
            .map(|&w| if w.is_finite() && w > 0.0 { w } else { 0.0 })
            .collect();
        let n = weights.len();
        let sum: f32 = weights.iter().sum();

        // Scaled so the average slot holds exactly 1
        let mut scaled: Vec<f64> = if sum > 0.0 {
            let k = n as f64 / f64::from(sum);
            weights.iter().map(|&w| f64::from(w) * k).collect()
        } else {
            vec![1.0; n]
        };

        let mut table: Vec<AliasEntry> = (0..n).map(|i| AliasEntry { alias: i, split: 1.0 }).collect();
        let mut small = Vec::with_capacity(n);
        let mut large = Vec::with_capacity(n);
        for (i, &p) in scaled.iter().enumerate() {
            if p < 1.0 {
                small.push(i);
            } else {
                large.push(i);
            }
        }

        while let (Some(&s), Some(&l)) = (small.last(), large.last()) {
            small.pop();
            large.pop();
            table[s] = AliasEntry {
                alias: l,
                split: scaled[s] as f32,
            };
            scaled[l] = scaled[l] + scaled[s] - 1.0;
            if scaled[l] < 1.0 {
                small.push(l);
            } else {
                large.push(l);
            }
        }
        // Leftovers are 1 up to rounding
        for i in small.into_iter().chain(large) {
            table[i] = AliasEntry { alias: i, split: 1.0 };
        }

        Self { sum, weights, table }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Sum of the (sanitized) weights.
    pub fn sum(&self) -> f32 {
        self.sum
    }

    pub fn weight(&self, index: usize) -> f32 {
        self.weights[index]
    }

    /// Probability of drawing `index`.
    pub fn pmf(&self, index: usize) -> f32 {
        if self.sum > 0.0 {
            self.weights[index] / self.sum
        } else {
            1.0 / self.len() as f32
        }
    }

    /// Draw an index. Returns `(index, pmf, remapped)` where `remapped` is a
    /// fresh uniform number in `[0, 1)` recovered from the unused bits of `u`.
    pub fn sample(&self, u: f32) -> (usize, f32, f32) {
        let n = self.len();
        let x = u.clamp(0.0, ONE_MINUS_EPSILON) * n as f32;
        let slot = (x as usize).min(n - 1);
        let frac = (x - slot as f32).clamp(0.0, ONE_MINUS_EPSILON);
        let entry = self.table[slot];

        let (index, remapped) = if frac < entry.split {
            (slot, frac / entry.split)
        } else {
            (entry.alias, (frac - entry.split) / (1.0 - entry.split))
        };
        (index, self.pmf(index), remapped.clamp(0.0, ONE_MINUS_EPSILON))
    }
}

/// Joint distribution over a `width x height` grid of weights (row-major).
#[derive(Debug, Clone)]
pub struct PiecewiseIndependent2D {
    width: u32,
    height: u32,
    conditional: Vec<Piecewise1D>,
    marginal: Piecewise1D,
}

impl PiecewiseIndependent2D {
    pub fn new(weights: &[f32], width: u32, height: u32) -> Self {
        assert!(width > 0 && height > 0, "empty grid");
        assert_eq!(weights.len(), (width * height) as usize);

        let conditional: Vec<Piecewise1D> = weights
            .chunks_exact(width as usize)
            .map(Piecewise1D::new)
            .collect();
        let row_sums: Vec<f32> = conditional.iter().map(Piecewise1D::sum).collect();
        let marginal = Piecewise1D::new(&row_sums);

        Self {
            width,
            height,
            conditional,
            marginal,
        }
    }

    pub fn resolution(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }

    pub fn sum(&self) -> f32 {
        self.marginal.sum()
    }

    /// Draw a cell. Returns `(cell, pmf, jitter)`, `jitter` being a uniform
    /// position inside the cell.
    pub fn sample(&self, u: Vec2) -> (UVec2, f32, Vec2) {
        let (row, pmf_row, jitter_y) = self.marginal.sample(u.y);
        let (col, pmf_col, jitter_x) = self.conditional[row].sample(u.x);
        (
            UVec2::new(col as u32, row as u32),
            pmf_row * pmf_col,
            Vec2::new(jitter_x, jitter_y),
        )
    }

    /// Probability of drawing `cell`.
    pub fn pmf(&self, cell: UVec2) -> f32 {
        let row = (cell.y.min(self.height - 1)) as usize;
        let col = (cell.x.min(self.width - 1)) as usize;
        self.marginal.pmf(row) * self.conditional[row].pmf(col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_piecewise1d_frequencies() {
        let weights = [1.0, 0.0, 3.0, 0.5, 5.5, 2.0];
        let dist = Piecewise1D::new(&weights);
        let sum: f32 = weights.iter().sum();
        assert!((dist.sum() - sum).abs() < 1e-5);

        let draws = 1_000_000;
        let mut counts = [0usize; 6];
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..draws {
            let (i, pmf, remapped) = dist.sample(rng.gen());
            assert!((pmf - weights[i] / sum).abs() < 1e-6);
            assert!((0.0..1.0).contains(&remapped));
            counts[i] += 1;
        }

        assert_eq!(counts[1], 0);
        for (i, &w) in weights.iter().enumerate() {
            let expected = w / sum;
            let got = counts[i] as f32 / draws as f32;
            // ~5 standard deviations at 1e6 draws
            assert!((got - expected).abs() < 3e-3, "bucket {i}: {got} vs {expected}");
        }
    }

    #[test]
    fn test_piecewise1d_remapped_is_uniform() {
        let dist = Piecewise1D::new(&[1.0, 2.0, 3.0]);
        let mut rng = StdRng::seed_from_u64(5);
        let mut below_half = 0;
        let draws = 100_000;
        for _ in 0..draws {
            let (_, _, r) = dist.sample(rng.gen());
            if r < 0.5 {
                below_half += 1;
            }
        }
        let frac = below_half as f32 / draws as f32;
        assert!((frac - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_piecewise1d_all_zero_is_uniform() {
        let dist = Piecewise1D::new(&[0.0, 0.0, 0.0, 0.0]);
        assert_eq!(dist.sum(), 0.0);
        assert_eq!(dist.pmf(2), 0.25);
        let (i, _, _) = dist.sample(0.6);
        assert_eq!(i, 2);
    }

    #[test]
    fn test_piecewise2d_pmf_consistent() {
        let weights = [0.0, 1.0, 2.0, 3.0, 4.0, 0.0];
        let dist = PiecewiseIndependent2D::new(&weights, 3, 2);
        let total: f32 = weights.iter().sum();
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..1000 {
            let (cell, pmf, jitter) = dist.sample(Vec2::new(rng.gen(), rng.gen()));
            let w = weights[(cell.y * 3 + cell.x) as usize];
            assert!(w > 0.0);
            assert!((pmf - w / total).abs() < 1e-5);
            assert!((dist.pmf(cell) - pmf).abs() < 1e-6);
            assert!(jitter.cmpge(Vec2::ZERO).all() && jitter.cmplt(Vec2::ONE).all());
        }
    }
}
