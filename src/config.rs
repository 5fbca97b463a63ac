//! Endpoint constants and runtime configuration for transports and sessions.

// std
use std::env;
// self
use crate::_prelude::*;

/// Path of the token endpoint, relative to [`Config::reddit_url`].
pub const ACCESS_TOKEN_PATH: &str = "/api/v1/access_token";
/// Path of the authorization endpoint, relative to [`Config::reddit_url`].
pub const AUTHORIZATION_PATH: &str = "/api/v1/authorize";
/// Path of the revoke endpoint, relative to [`Config::reddit_url`].
pub const REVOKE_TOKEN_PATH: &str = "/api/v1/revoke_token";

const DEFAULT_TIMEOUT_SECS: f64 = 16.;
const DEFAULT_WINDOW_SIZE: u64 = 600;
const DEFAULT_RETRIES: u32 = 3;

/// Runtime configuration shared by transports and sessions.
#[derive(Clone, Debug)]
pub struct Config {
	/// Base URL used when obtaining, refreshing, and revoking tokens.
	pub reddit_url: Url,
	/// Base URL for authenticated API requests.
	pub oauth_url: Url,
	/// Default per-request timeout.
	pub timeout: StdDuration,
	/// Rate limit reset window size, in seconds.
	pub window_size: u64,
	/// Total attempt budget for one logical request.
	pub retries: u32,
}
impl Config {
	/// Builds a configuration from defaults overridden by the
	/// `REDDIT_SESSION_TIMEOUT`, `REDDIT_SESSION_WINDOW_SIZE`, and
	/// `REDDIT_SESSION_RETRIES` environment variables, where set and parsable.
	pub fn from_env() -> Self {
		let mut config = Self::default();

		if let Some(timeout) = env_parse::<f64>("REDDIT_SESSION_TIMEOUT")
			&& timeout.is_finite()
			&& timeout > 0.
		{
			config.timeout = StdDuration::from_secs_f64(timeout);
		}
		if let Some(window_size) = env_parse::<u64>("REDDIT_SESSION_WINDOW_SIZE") {
			config.window_size = window_size;
		}
		if let Some(retries) = env_parse::<u32>("REDDIT_SESSION_RETRIES") {
			config.retries = retries;
		}

		config
	}

	/// Overrides the per-request timeout.
	pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Overrides the base URL used for token and authorization endpoints.
	pub fn with_reddit_url(mut self, reddit_url: Url) -> Self {
		self.reddit_url = reddit_url;

		self
	}

	/// Overrides the base URL used for authenticated API requests.
	pub fn with_oauth_url(mut self, oauth_url: Url) -> Self {
		self.oauth_url = oauth_url;

		self
	}
}
impl Default for Config {
	fn default() -> Self {
		Self {
			reddit_url: Url::parse("https://www.reddit.com")
				.expect("default reddit URL is well-formed"),
			oauth_url: Url::parse("https://oauth.reddit.com")
				.expect("default oauth URL is well-formed"),
			timeout: StdDuration::from_secs_f64(DEFAULT_TIMEOUT_SECS),
			window_size: DEFAULT_WINDOW_SIZE,
			retries: DEFAULT_RETRIES,
		}
	}
}

fn env_parse<T>(name: &str) -> Option<T>
where
	T: FromStr,
{
	env::var(name).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn defaults_match_documented_values() {
		let config = Config::default();

		assert_eq!(config.timeout, StdDuration::from_secs(16));
		assert_eq!(config.window_size, 600);
		assert_eq!(config.retries, 3);
		assert_eq!(config.reddit_url.as_str(), "https://www.reddit.com/");
		assert_eq!(config.oauth_url.as_str(), "https://oauth.reddit.com/");
	}
}
