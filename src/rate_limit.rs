//! Adaptive rate limiting driven by `x-ratelimit-*` response feedback.

// crates.io
use reqwest::header::HeaderMap;
// self
use crate::_prelude::*;

/// Upper bound, in seconds, on the proportional spacing of a single call.
const MAX_SPACING_SECS: f64 = 10.;

/// Tracks server-reported quota state and computes the delay owed before the
/// next request.
///
/// Rate limits are controlled entirely from response feedback; until the
/// first metered response arrives the limiter assumes an unconstrained
/// budget. One limiter is owned by one session and mutated only through its
/// own methods.
#[derive(Clone, Debug)]
pub struct RateLimiter {
	remaining: Option<f64>,
	used: Option<u64>,
	reset_at: Option<OffsetDateTime>,
	next_allowed_at: Option<OffsetDateTime>,
	window_size: u64,
}
impl RateLimiter {
	/// Creates a limiter for the given reset-window size, in seconds.
	pub fn new(window_size: u64) -> Self {
		Self { remaining: None, used: None, reset_at: None, next_allowed_at: None, window_size }
	}

	/// Requests reported as remaining in the current window, if known.
	pub fn remaining(&self) -> Option<f64> {
		self.remaining
	}

	/// Requests reported as used in the current window, if known.
	pub fn used(&self) -> Option<u64> {
		self.used
	}

	/// Instant the current window resets, if known.
	pub fn reset_at(&self) -> Option<OffsetDateTime> {
		self.reset_at
	}

	/// Earliest instant the next request may be sent, if constrained.
	pub fn next_allowed_at(&self) -> Option<OffsetDateTime> {
		self.next_allowed_at
	}

	/// Sleeps out any owed delay. Returns immediately when no next-allowed
	/// instant is set or it has already passed.
	pub async fn delay(&self) {
		let Some(next_allowed_at) = self.next_allowed_at else {
			return;
		};
		let wait = next_allowed_at - OffsetDateTime::now_utc();

		if !wait.is_positive() {
			return;
		}

		tracing::debug!("sleeping {:.2} seconds prior to call", wait.as_seconds_f64());
		tokio::time::sleep(StdDuration::from_secs_f64(wait.as_seconds_f64())).await;
	}

	/// Updates limiter state from the headers of a completed response.
	pub fn update(&mut self, headers: &HeaderMap) {
		self.update_at(headers, OffsetDateTime::now_utc());
	}

	/// Pure variant of [`update`](Self::update) against an explicit instant.
	///
	/// A response without rate-limit headers counts as one unmetered unit
	/// against any previously known budget. Such responses usually signal an
	/// error path, so their absence of feedback is not trusted for quota
	/// math beyond that decrement; this is a best-effort approximation, not
	/// a server guarantee.
	pub fn update_at(&mut self, headers: &HeaderMap, now: OffsetDateTime) {
		let metered = (
			header_value::<f64>(headers, "x-ratelimit-remaining"),
			header_value::<u64>(headers, "x-ratelimit-used"),
			header_value::<i64>(headers, "x-ratelimit-reset"),
		);
		let (Some(remaining), Some(used), Some(seconds_to_reset)) = metered else {
			if let Some(remaining) = self.remaining.as_mut() {
				*remaining -= 1.;
			}
			if let Some(used) = self.used.as_mut() {
				*used += 1;
			}

			return;
		};
		let reset_at = now + Duration::seconds(seconds_to_reset);

		self.remaining = Some(remaining);
		self.used = Some(used);
		self.reset_at = Some(reset_at);

		if remaining <= 0. {
			// Budget exhausted: the full window must be waited out.
			self.next_allowed_at = Some(reset_at);

			return;
		}

		self.next_allowed_at =
			Some(reset_at.min(now + spacing(remaining, used, seconds_to_reset, self.window_size)));
	}
}

/// Proportional spacing before the next call: distributes the time left in
/// the window across the remaining budget, weighted by how much of the window
/// is already consumed, clamped to `[0, 10]` seconds. Spreads requests evenly
/// instead of bursting then stalling, while never waiting past the reset and
/// never waiting more than ten seconds for a single call.
pub(crate) fn spacing(
	remaining: f64,
	used: u64,
	seconds_to_reset: i64,
	window_size: u64,
) -> Duration {
	let window = window_size as f64;
	let used = used as f64;
	let estimated_window_elapsed = window - window / (remaining + used) * used;
	let seconds = (seconds_to_reset as f64 - estimated_window_elapsed).clamp(0., MAX_SPACING_SECS);

	Duration::seconds_f64(seconds)
}

fn header_value<T>(headers: &HeaderMap, name: &str) -> Option<T>
where
	T: FromStr,
{
	headers.get(name)?.to_str().ok()?.trim().parse().ok()
}
