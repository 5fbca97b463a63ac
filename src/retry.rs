//! Finite, jittered retry scheduling for one logical request.

// crates.io
use rand::Rng;
// self
use crate::_prelude::*;

/// Immutable retry budget threaded through a request's attempt chain.
///
/// Instances never mutate in place; [`consume`](Self::consume) produces the
/// next value, so an attempt chain cannot corrupt shared state even if it is
/// ever parallelized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FiniteRetry {
	attempts_left: u32,
}
impl FiniteRetry {
	/// Default total attempt budget.
	pub const DEFAULT_ATTEMPTS: u32 = 3;

	/// Creates a budget allowing `attempts` total attempts (`attempts - 1`
	/// retries).
	pub fn new(attempts: u32) -> Self {
		Self { attempts_left: attempts }
	}

	/// Attempts still available, including the current one.
	pub fn attempts_left(&self) -> u32 {
		self.attempts_left
	}

	/// Returns `true` while another retry is allowed.
	pub fn should_retry(&self) -> bool {
		self.attempts_left > 1
	}

	/// Returns a budget with one fewer attempt.
	pub fn consume(self) -> Self {
		Self { attempts_left: self.attempts_left.saturating_sub(1) }
	}

	/// Sleeps out the jittered backoff owed before this attempt. The first
	/// attempt of a default budget never sleeps.
	pub async fn sleep_before_retry(&self) {
		if let Some(seconds) = self.sleep_seconds() {
			tracing::debug!("sleeping {seconds:.2} seconds prior to retry");
			tokio::time::sleep(StdDuration::from_secs_f64(seconds)).await;
		}
	}

	/// Backoff sample for this attempt: nothing while three or more attempts
	/// remain, 0–2s of jitter alone at exactly two, and 2–4s (a 2s base plus
	/// jitter) at one or fewer.
	pub(crate) fn sleep_seconds(&self) -> Option<f64> {
		if self.attempts_left >= Self::DEFAULT_ATTEMPTS {
			return None;
		}

		let base = if self.attempts_left == 2 { 0. } else { 2. };

		Some(base + 2. * rand::rng().random::<f64>())
	}
}
impl Default for FiniteRetry {
	fn default() -> Self {
		Self::new(Self::DEFAULT_ATTEMPTS)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn budget_of_three_allows_exactly_two_retries() {
		let first = FiniteRetry::default();

		assert!(first.should_retry());

		let second = first.consume();

		assert!(second.should_retry());

		let third = second.consume();

		assert!(!third.should_retry());
		assert_eq!(third.attempts_left(), 1);
	}

	#[test]
	fn consume_returns_a_new_value() {
		let policy = FiniteRetry::new(2);
		let consumed = policy.consume();

		assert_eq!(policy.attempts_left(), 2);
		assert_eq!(consumed.attempts_left(), 1);
	}

	#[test]
	fn backoff_samples_stay_within_their_attempt_bands() {
		for _ in 0..64 {
			assert_eq!(FiniteRetry::new(3).sleep_seconds(), None);

			let second = FiniteRetry::new(2)
				.sleep_seconds()
				.expect("The second attempt should owe a backoff.");

			assert!((0. ..2.).contains(&second));

			let third = FiniteRetry::new(1)
				.sleep_seconds()
				.expect("The final attempt should owe a backoff.");

			assert!((2. ..4.).contains(&third));
			// The later attempt always waits at least the earlier attempt's
			// lower bound.
			assert!(third >= 0.);
		}
	}

	#[test]
	fn oversized_budgets_skip_the_early_backoff() {
		assert_eq!(FiniteRetry::new(5).sleep_seconds(), None);
		assert_eq!(FiniteRetry::new(4).sleep_seconds(), None);
	}
}
