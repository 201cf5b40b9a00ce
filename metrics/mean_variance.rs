//! https://en.wikipedia.org/wiki/Algorithms_for_calculating_variance#Parallel_algorithm

use num_traits::cast::ToPrimitive;
use std::num::NonZeroU64;

/// The mean and variance of a set of values, fitted in one pass. The variance is the
/// population variance, `m2 / n`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeanVariance {
	pub n: u64,
	pub mean: f32,
	pub variance: f32,
}

impl MeanVariance {
	/// Compute the mean and variance of the finite values in `values`. Non-finite
	/// values are skipped, so a column with missing entries can be fitted directly.
	pub fn compute(values: &[f32]) -> Self {
		let mut n: u64 = 0;
		let mut mean = 0.0;
		let mut m2 = 0.0;
		for value in values {
			if !value.is_finite() {
				continue;
			}
			let (new_mean, new_m2) =
				merge_mean_m2(n, mean, m2, 1, value.to_f64().unwrap(), 0.0);
			mean = new_mean;
			m2 = new_m2;
			n += 1;
		}
		let variance = match NonZeroU64::new(n) {
			Some(n) => m2_to_variance(m2, n),
			None => 0.0,
		};
		Self {
			n,
			mean: mean.to_f32().unwrap(),
			variance,
		}
	}
}

/// Combine two separate means and m2's into a single mean and m2. This makes it
/// possible to accumulate over histogram buckets or partitions of the data.
pub fn merge_mean_m2(
	n_a: u64,
	mean_a: f64,
	m2_a: f64,
	n_b: u64,
	mean_b: f64,
	m2_b: f64,
) -> (f64, f64) {
	let n_a = n_a.to_f64().unwrap();
	let n_b = n_b.to_f64().unwrap();
	(
		(((n_a * mean_a) + (n_b * mean_b)) / (n_a + n_b)),
		m2_a + m2_b + (mean_b - mean_a) * (mean_b - mean_a) * (n_a * n_b / (n_a + n_b)),
	)
}

pub fn m2_to_variance(m2: f64, n: NonZeroU64) -> f32 {
	(m2 / n.get().to_f64().unwrap()) as f32
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_compute() {
		let mv = MeanVariance::compute(&[0.0, 5.2, 1.3, 10.0]);
		assert_eq!(mv.n, 4);
		assert!((mv.mean - 4.125).abs() < 1e-6);
		// population variance of [0.0, 5.2, 1.3, 10.0]
		assert!((mv.variance - 15.166875).abs() < 1e-3);
	}

	#[test]
	fn test_compute_skips_non_finite() {
		let with_nan = MeanVariance::compute(&[1.0, std::f32::NAN, 3.0]);
		let without = MeanVariance::compute(&[1.0, 3.0]);
		assert_eq!(with_nan.n, 2);
		assert_eq!(with_nan.mean, without.mean);
		assert_eq!(with_nan.variance, without.variance);
	}

	#[test]
	fn test_compute_empty() {
		let mv = MeanVariance::compute(&[]);
		assert_eq!(mv.n, 0);
		assert_eq!(mv.mean, 0.0);
		assert_eq!(mv.variance, 0.0);
	}

	#[test]
	fn test_merge_matches_single_pass() {
		let a = [1.0f64, 2.0, 3.0];
		let b = [10.0f64, 20.0];
		let mean_a = 2.0;
		let m2_a = 2.0;
		let mean_b = 15.0;
		let m2_b = 50.0;
		let (mean, m2) = merge_mean_m2(3, mean_a, m2_a, 2, mean_b, m2_b);
		let all: Vec<f64> = a.iter().chain(b.iter()).cloned().collect();
		let expected_mean: f64 = all.iter().sum::<f64>() / all.len() as f64;
		let expected_m2: f64 = all
			.iter()
			.map(|value| (value - expected_mean) * (value - expected_mean))
			.sum();
		assert!((mean - expected_mean).abs() < 1e-9);
		assert!((m2 - expected_m2).abs() < 1e-9);
	}
}
