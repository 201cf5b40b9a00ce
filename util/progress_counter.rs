use std::sync::{
	atomic::{AtomicU64, Ordering},
	Arc,
};

/// A counter that can be shared between the thread doing the work and the thread
/// rendering progress.
#[derive(Clone, Debug)]
pub struct ProgressCounter {
	current: Arc<AtomicU64>,
	total: u64,
}

impl ProgressCounter {
	pub fn new(total: u64) -> Self {
		Self {
			current: Arc::new(AtomicU64::new(0)),
			total,
		}
	}

	pub fn total(&self) -> u64 {
		self.total
	}

	pub fn get(&self) -> u64 {
		self.current.load(Ordering::Relaxed)
	}

	pub fn set(&self, value: u64) {
		self.current.store(value, Ordering::Relaxed);
	}

	pub fn inc(&self, amount: u64) {
		self.current.fetch_add(amount, Ordering::Relaxed);
	}

	/// Fraction of the work that is done, in `0.0..=1.0`. A zero total reports 1.0 so
	/// empty work always renders as complete.
	pub fn fraction(&self) -> f32 {
		if self.total == 0 {
			return 1.0;
		}
		(self.get() as f64 / self.total as f64).min(1.0) as f32
	}
}
