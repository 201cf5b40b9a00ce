use num_traits::Float;
use std::{
	cmp::{Ord, Ordering},
	hash::{Hash, Hasher},
};
use thiserror::Error;

/// A float that is known to be finite, so it can be ordered and hashed and used as a
/// key in maps such as value histograms.
#[derive(Clone, Copy, Debug)]
pub struct Finite<T>(T)
where
	T: Float;

#[derive(Debug, Error)]
#[error("not finite")]
pub struct NotFiniteError;

impl<T> Finite<T>
where
	T: Float,
{
	pub fn new(value: T) -> Result<Self, NotFiniteError> {
		if value.is_finite() {
			Ok(Self(value))
		} else {
			Err(NotFiniteError)
		}
	}

	pub fn get(self) -> T {
		self.0
	}
}

impl<T> std::ops::Deref for Finite<T>
where
	T: Float,
{
	type Target = T;
	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<T> std::fmt::Display for Finite<T>
where
	T: Float + std::fmt::Display,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl<T> PartialEq for Finite<T>
where
	T: Float,
{
	#[inline]
	fn eq(&self, other: &Self) -> bool {
		self.0.eq(&other.0)
	}
}

impl<T> Eq for Finite<T> where T: Float {}

impl<T> PartialOrd for Finite<T>
where
	T: Float,
{
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		self.0.partial_cmp(&other.0)
	}
}

impl<T> Ord for Finite<T>
where
	T: Float,
{
	fn cmp(&self, other: &Self) -> Ordering {
		self.0.partial_cmp(&other.0).unwrap()
	}
}

impl Hash for Finite<f32> {
	#[inline]
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.0.to_bits().hash(state);
	}
}

impl Hash for Finite<f64> {
	#[inline]
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.0.to_bits().hash(state);
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_rejects_non_finite() {
		assert!(Finite::new(std::f32::NAN).is_err());
		assert!(Finite::new(std::f32::INFINITY).is_err());
		assert!(Finite::new(1.25f32).is_ok());
	}

	#[test]
	fn test_ordering() {
		let mut values = vec![
			Finite::new(3.0f32).unwrap(),
			Finite::new(-1.0f32).unwrap(),
			Finite::new(2.5f32).unwrap(),
		];
		values.sort();
		let values: Vec<f32> = values.into_iter().map(|value| value.get()).collect();
		assert_eq!(values, vec![-1.0, 2.5, 3.0]);
	}
}
